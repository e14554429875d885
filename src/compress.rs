//! Streaming gzip compression and decompression of files.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use flate2::bufread::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::PipelineError;

/// Direction of a [transform].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Compress,
    Decompress,
}

/// Stream `source` through gzip into `destination`.
///
/// Data is copied in fixed size chunks, the file is never held in memory.
/// On error a partially written `destination` is left for the caller to
/// delete. Returns the number of bytes read from `source`.
pub fn transform(source: &Path, destination: &Path, direction: Direction) -> Result<u64, PipelineError> {
    log::debug!(
        target: "pipeline::compress",
        "{direction:?} {} -> {}",
        source.display(),
        destination.display()
    );

    let input = File::open(source).map_err(PipelineError::stream("open file for gzip"))?;
    let mut reader = BufReader::new(input);
    let output = File::create_new(destination)
        .map_err(PipelineError::stream("create gzip destination"))?;

    match direction {
        Direction::Compress => {
            let mut encoder = GzEncoder::new(BufWriter::new(output), Compression::default());
            let read = io::copy(&mut reader, &mut encoder).map_err(PipelineError::stream("compress"))?;
            encoder
                .finish()
                .and_then(|mut writer| writer.flush())
                .map_err(PipelineError::stream("compress"))?;
            Ok(read)
        }
        Direction::Decompress => {
            let mut decoder = MultiGzDecoder::new(reader);
            let mut writer = BufWriter::new(output);
            let read = io::copy(&mut decoder, &mut writer).map_err(PipelineError::stream("decompress"))?;
            writer.flush().map_err(PipelineError::stream("decompress"))?;
            Ok(read)
        }
    }
}
