//! Runtime configuration from the environment.
//!
//! Variables:
//! - `FAMTREE_DB_PATH`: SQLite file, default `<temp>/famtree.sqlite3`.
//! - `FAMTREE_LOG_LEVEL`: default [`default_log_level`].
//! - `FAMTREE_LOG_DIR`: absolute directory; file logging is off when unset.

use crate::logging::{default_log_level, normalize_level};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const DB_PATH_VAR: &str = "FAMTREE_DB_PATH";
pub const LOG_LEVEL_VAR: &str = "FAMTREE_LOG_LEVEL";
pub const LOG_DIR_VAR: &str = "FAMTREE_LOG_DIR";

const DEFAULT_DB_FILE_NAME: &str = "famtree.sqlite3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    EmptyValue(&'static str),
    InvalidLogLevel(String),
    RelativeLogDir(PathBuf),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyValue(var) => write!(f, "{var} must not be empty"),
            Self::InvalidLogLevel(level) => write!(
                f,
                "unsupported log level `{level}`; expected trace|debug|info|warn|error"
            ),
            Self::RelativeLogDir(dir) => {
                write!(f, "log directory must be absolute, got `{}`", dir.display())
            }
        }
    }
}

impl Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub db_path: PathBuf,
    pub log_level: &'static str,
    pub log_dir: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            log_level: default_log_level(),
            log_dir: None,
        }
    }
}

impl CoreConfig {
    /// Reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads variables through `lookup`; unset variables keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup(DB_PATH_VAR) {
            config = config.with_db_path(non_empty(DB_PATH_VAR, raw)?)?;
        }
        if let Some(raw) = lookup(LOG_LEVEL_VAR) {
            config = config.with_log_level(&non_empty(LOG_LEVEL_VAR, raw)?)?;
        }
        if let Some(raw) = lookup(LOG_DIR_VAR) {
            config = config.with_log_dir(non_empty(LOG_DIR_VAR, raw)?)?;
        }

        Ok(config)
    }

    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(ConfigError::EmptyValue(DB_PATH_VAR));
        }
        self.db_path = path;
        Ok(self)
    }

    pub fn with_log_level(mut self, level: &str) -> Result<Self, ConfigError> {
        self.log_level =
            normalize_level(level).map_err(|_| ConfigError::InvalidLogLevel(level.to_string()))?;
        Ok(self)
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let dir = dir.into();
        if !dir.is_absolute() {
            return Err(ConfigError::RelativeLogDir(dir));
        }
        self.log_dir = Some(dir);
        Ok(self)
    }
}

/// `<temp>/famtree.sqlite3`.
pub fn default_db_path() -> PathBuf {
    std::env::temp_dir().join(DEFAULT_DB_FILE_NAME)
}

fn non_empty(var: &'static str, raw: String) -> Result<String, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::EmptyValue(var));
    }
    Ok(trimmed.to_string())
}
