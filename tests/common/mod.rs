#![allow(dead_code)]

use std::fs;
use std::io::{Read, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use pg_backup_lib::Config;
use tempfile::TempDir;

pub const DATABASE_URL: &str = "postgresql://u:p@localhost:5432/school";

/// Lines the fake `pg_dump` writes, the second one is sanitized away on restore.
pub const DUMP_HEADER: &str = "SET statement_timeout = 0;\n\
                               SET transaction_timeout = '5min';\n\
                               SELECT pg_catalog.set_config('search_path', '', false);\n\
                               CREATE TABLE public.students (id integer, name text);\n";

/// Temp directories of one test: fake tools live apart from the work dir
/// so the work dir can be checked for leftovers.
pub struct Fixture {
    pub tools: TempDir,
    pub work: TempDir,
    pub config: Config,
}

impl Fixture {
    pub fn new() -> Self {
        let tools = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();

        let dump_tool = write_tool(
            tools.path(),
            "pg_dump",
            &format!(
                r#"for arg in "$@"; do
  case "$arg" in
    --file=*) out="${{arg#--file=}}" ;;
  esac
done
printf '%s' "{DUMP_HEADER}" > "$out"
i=0
while [ $i -lt 300 ]; do
  echo "INSERT INTO public.students VALUES ($i, 'Student');" >> "$out"
  i=$((i+1))
done
echo 'pg_dump: dumping contents of table "public.students"' >&2
exit 0"#
            ),
        );

        let capture = tools.path().join("psql-stdin.sql");
        let restore_tool = write_tool(
            tools.path(),
            "psql",
            &format!(
                r#"cat > "{capture}"
printf '%s' "$PGPASSWORD" > "{capture}.password"
echo 'psql:<stdin>:1: NOTICE:  extension "plpgsql" already exists, skipping' >&2
exit 0"#,
                capture = capture.display()
            ),
        );

        let config = Config {
            temp_dir: Some(work.path().to_path_buf()),
            dump_tool,
            restore_tool,
            ..Config::default()
        };

        Self {
            tools,
            work,
            config,
        }
    }

    /// Replace the dump tool with one that writes half a dump and fails.
    pub fn failing_dump(mut self) -> Self {
        self.config.dump_tool = write_tool(
            self.tools.path(),
            "pg_dump_failing",
            r#"for arg in "$@"; do
  case "$arg" in
    --file=*) out="${arg#--file=}" ;;
  esac
done
echo "CREATE TABLE half" > "$out"
echo 'pg_dump: error: query failed: ERROR:  permission denied for table grades' >&2
exit 1"#,
        );
        self
    }

    /// Replace the dump tool with one that cannot log in, after having
    /// created an empty output file the way `pg_dump` does.
    pub fn rejected_login_dump(mut self) -> Self {
        self.config.dump_tool = write_tool(
            self.tools.path(),
            "pg_dump_rejected",
            r#"for arg in "$@"; do
  case "$arg" in
    --file=*) out="${arg#--file=}" ;;
  esac
done
: > "$out"
echo 'pg_dump: error: connection to server at "localhost" (127.0.0.1), port 5432 failed: FATAL:  password authentication failed for user "school_owner"' >&2
exit 1"#,
        );
        self
    }

    /// Replace the dump tool with one that succeeds without writing anything.
    pub fn dump_writing_nothing(mut self) -> Self {
        self.config.dump_tool = write_tool(self.tools.path(), "pg_dump_nothing", "exit 0");
        self
    }

    /// Replace the dump tool with one that takes a second and leaves a
    /// marker once its output is complete.
    pub fn slow_dump(mut self) -> Self {
        self.config.dump_tool = write_tool(
            self.tools.path(),
            "pg_dump_slow",
            &format!(
                r#"for arg in "$@"; do
  case "$arg" in
    --file=*) out="${{arg#--file=}}" ;;
  esac
done
sleep 1
printf '%s' "{DUMP_HEADER}" > "$out"
: > "{marker}"
exit 0"#,
                marker = self.tools.path().join("dump-finished").display()
            ),
        );
        self
    }

    pub fn dump_finished(&self) -> bool {
        self.tools.path().join("dump-finished").exists()
    }

    /// Replace the restore tool with one that hits a syntax error.
    pub fn failing_restore(mut self) -> Self {
        self.config.restore_tool = write_tool(
            self.tools.path(),
            "psql_failing",
            r#"cat > /dev/null
echo 'psql:<stdin>:7: ERROR:  syntax error at or near "INSRT"' >&2
exit 3"#,
        );
        self
    }

    pub fn missing_tools(mut self) -> Self {
        self.config.dump_tool = self.tools.path().join("not-installed").join("pg_dump");
        self.config.restore_tool = self.tools.path().join("not-installed").join("psql");
        self
    }

    /// What the fake `psql` received on stdin, if it ran.
    pub fn restored_script(&self) -> Option<String> {
        fs::read_to_string(self.tools.path().join("psql-stdin.sql")).ok()
    }

    pub fn restore_password(&self) -> Option<String> {
        fs::read_to_string(self.tools.path().join("psql-stdin.sql.password")).ok()
    }

    /// Files currently in the work dir.
    pub fn leftovers(&self) -> Vec<PathBuf> {
        entries(self.work.path())
    }

    /// A directory outside the work dir to place "uploaded" files in.
    pub fn upload_dir(&self) -> PathBuf {
        let dir = self.tools.path().join("uploads");
        fs::create_dir_all(&dir).unwrap();
        dir
    }
}

pub fn write_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut permissions = fs::metadata(&path).unwrap().permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(&path, permissions).unwrap();
    path
}

pub fn entries(dir: &Path) -> Vec<PathBuf> {
    fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect()
}

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub fn gunzip(data: &[u8]) -> String {
    let mut out = String::new();
    MultiGzDecoder::new(data).read_to_string(&mut out).unwrap();
    out
}

/// A script containing a denylisted setting between regular statements.
pub fn script_with_timeout() -> String {
    "SET client_encoding = 'UTF8';\n\
     SET transaction_timeout = '5min';\n\
     CREATE TABLE public.courses (id integer);\n\
     \n\
     INSERT INTO public.courses VALUES (1);\n"
        .to_string()
}

pub fn script_without_timeout() -> String {
    "SET client_encoding = 'UTF8';\n\
     CREATE TABLE public.courses (id integer);\n\
     \n\
     INSERT INTO public.courses VALUES (1);\n"
        .to_string()
}
