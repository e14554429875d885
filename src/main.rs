use std::process::ExitCode;

use clap::Parser;
use pg_backup_lib::cli::{Action, BackupArgs, Cli, RestoreArgs};
use pg_backup_lib::http::{self, AppState};
use pg_backup_lib::{pipeline, Config, ConnectionInfo};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // init logger
    let mut env_logger = env_logger::builder();
    if let Some(level) = cli.verbose {
        env_logger.filter_level(level);
    }
    if let Err(e) = env_logger.try_init() {
        eprintln!("Initializing the logger failed: {e}");
    }

    let config = match Config::load_or_create(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match cli.action {
        Action::Serve => serve(config, cli.database_url),
        Action::Backup(BackupArgs { output }) => {
            let backup = ConnectionInfo::from_optional(cli.database_url.as_deref())
                .map_err(Into::into)
                .and_then(|conn| pipeline::backup(&config, &conn))
                .and_then(|artifact| artifact.persist_into(&output));
            match backup {
                Ok(path) => {
                    log::info!(target: "backup", "Backup stored at {}", path.display());
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    log::error!(target: "backup", "Backup of the database resulted in a fatal error: {e}");
                    ExitCode::FAILURE
                }
            }
        }
        Action::Restore(RestoreArgs { file }) => {
            let original_name = file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let restore = ConnectionInfo::from_optional(cli.database_url.as_deref())
                .map_err(Into::into)
                .and_then(|conn| pipeline::restore(&config, &conn, &file, &original_name));
            match restore {
                Ok(summary) => {
                    log::info!(
                        target: "restore",
                        "Restored database from {} ({} statements sanitized)",
                        file.display(),
                        summary.removed_statements
                    );
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    log::error!(target: "restore", "Restore of the database resulted in a fatal error: {e}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}

fn serve(config: Config, database_url: Option<String>) -> ExitCode {
    if database_url.is_none() {
        log::warn!("No DATABASE_URL configured, backups and restores will fail");
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("Starting the async runtime failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(http::serve(AppState::new(config, database_url))) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("HTTP server failed: {e}");
            ExitCode::FAILURE
        }
    }
}
