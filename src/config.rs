//! Configuration file of the backup service.

use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use derive_more::{Display, Error, From};

use crate::sanitize::DEFAULT_DENYLIST;

/// Everything the pipelines need besides the connection URL.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    /// Application identifier used in backup file names.
    pub app_name: String,

    /// Directory for dumps, uploads and intermediate files.
    ///
    /// Defaults to the system temp directory if unset.
    pub temp_dir: Option<PathBuf>,

    /// `pg_dump` executable, looked up in `PATH` unless absolute.
    pub dump_tool: PathBuf,

    /// `psql` executable, looked up in `PATH` unless absolute.
    pub restore_tool: PathBuf,

    pub sanitize: SanitizeConfig,

    pub http: HttpConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "school".into(),
            temp_dir: None,
            dump_tool: "pg_dump".into(),
            restore_tool: "psql".into(),
            sanitize: SanitizeConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl Config {
    /// Directory for all artifacts of a pipeline run.
    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Settings of the SQL sanitizer.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SanitizeConfig {
    /// Server parameters whose `SET` statements are removed before restore.
    pub parameters: Vec<String>,
}

impl Default for SanitizeConfig {
    fn default() -> Self {
        Self {
            parameters: DEFAULT_DENYLIST.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Settings of the HTTP server.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: SocketAddr,

    /// Bearer token required on backup and restore routes.
    ///
    /// Without a token the routes are unprotected and must only be reachable
    /// through an authenticating proxy.
    pub admin_token: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            admin_token: None,
        }
    }
}

#[derive(Debug, Display, Error, From)]
/// Errors on loading the [Config].
pub enum ConfigError {
    #[display("Reading the config file failed: {_0}")]
    Read(io::Error),
    #[display("Parsing the config file failed: {_0}")]
    Parse(toml::de::Error),
    #[from(ignore)]
    #[display("Writing the default config failed: {_0}")]
    WriteDefault(io::Error),
    #[display("Serializing the default config failed: {_0}")]
    Serialize(toml::ser::Error),
}

impl Config {
    /// Load the config at `path`.
    ///
    /// A missing file is created with the default configuration.
    pub fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(config_str) => Ok(toml::from_str(&config_str)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!(
                    "Writing default config to {} because it doesn't exist yet",
                    path.display()
                );
                let default_config = Self::default();
                let config_str = toml::to_string_pretty(&default_config)?;
                std::fs::write(path, config_str).map_err(ConfigError::WriteDefault)?;

                Ok(default_config)
            }
            Err(e) => Err(ConfigError::Read(e)),
        }
    }
}
