use std::path::PathBuf;
use std::time::Duration;
use crate::core::{DbError, Result};

const SQLITE_SCHEME: &str = "sqlite://";
const SQLITE_MEMORY: &str = "sqlite::memory:";

pub const ENV_URL: &str = "ASSOCDB_URL";
pub const ENV_LOG_STATEMENTS: &str = "ASSOCDB_LOG_STATEMENTS";

/// Storage connection configuration
///
/// URL forms: `sqlite://path/to/file.db` or `sqlite::memory:`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionConfig {
    /// Database file, `None` for an in-memory database
    pub path: Option<PathBuf>,

    /// How long a statement waits on a locked database
    pub busy_timeout: Duration,

    /// Log every statement at info level instead of debug
    pub log_statements: bool,
}

impl ConnectionConfig {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            busy_timeout: Duration::from_secs(5),
            log_statements: false,
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::in_memory()
        }
    }

    /// Set busy timeout
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Enable or disable statement logging
    pub fn log_statements(mut self, enabled: bool) -> Self {
        self.log_statements = enabled;
        self
    }

    pub fn path(&self) -> Option<&std::path::Path> {
        self.path.as_deref()
    }

    /// Parse from connection string
    ///
    /// # Examples
    ///
    /// ```
    /// # use assocdb::ConnectionConfig;
    /// let config = ConnectionConfig::from_url("sqlite://data/app.db").unwrap();
    /// assert_eq!(config.to_url(), "sqlite://data/app.db");
    /// ```
    pub fn from_url(url: &str) -> Result<Self> {
        let url = url.trim();
        if url == SQLITE_MEMORY {
            return Ok(Self::in_memory());
        }

        let Some(path) = url.strip_prefix(SQLITE_SCHEME) else {
            return Err(DbError::configuration(format!(
                "URL must be '{}' or start with '{}', got '{}'",
                SQLITE_MEMORY, SQLITE_SCHEME, url
            )));
        };

        if path.is_empty() {
            return Err(DbError::configuration("Database path cannot be empty"));
        }

        Ok(Self::file(path))
    }

    /// Convert to connection string
    pub fn to_url(&self) -> String {
        match &self.path {
            Some(path) => format!("{}{}", SQLITE_SCHEME, path.display()),
            None => SQLITE_MEMORY.to_string(),
        }
    }

    /// Build from `ASSOCDB_URL` and `ASSOCDB_LOG_STATEMENTS`.
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var(ENV_URL) {
            Ok(url) if !url.trim().is_empty() => Self::from_url(&url)?,
            _ => Self::in_memory(),
        };

        if let Ok(flag) = std::env::var(ENV_LOG_STATEMENTS) {
            config.log_statements = parse_flag(&flag)?;
        }

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if let Some(path) = &self.path {
            if path.as_os_str().is_empty() {
                return Err(DbError::configuration("Database path cannot be empty"));
            }
            if path.is_dir() {
                return Err(DbError::configuration(format!(
                    "Database path '{}' is a directory",
                    path.display()
                )));
            }
        }
        Ok(())
    }

    pub fn open(&self) -> Result<super::SqliteConnection> {
        super::SqliteConnection::open(self.clone())
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

fn parse_flag(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(DbError::configuration(format!(
            "Invalid value '{}' for {}",
            other, ENV_LOG_STATEMENTS
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConnectionConfig::default();
        assert!(config.path.is_none());
        assert_eq!(config.to_url(), "sqlite::memory:");
        assert!(!config.log_statements);
    }

    #[test]
    fn test_builder_pattern() {
        let config = ConnectionConfig::file("app.db")
            .busy_timeout(Duration::from_millis(250))
            .log_statements(true);

        assert_eq!(config.busy_timeout, Duration::from_millis(250));
        assert!(config.log_statements);
        assert_eq!(config.to_url(), "sqlite://app.db");
    }

    #[test]
    fn test_from_url() {
        let config = ConnectionConfig::from_url("sqlite:///tmp/assoc.db").unwrap();
        assert_eq!(config.path(), Some(std::path::Path::new("/tmp/assoc.db")));

        let memory = ConnectionConfig::from_url("sqlite::memory:").unwrap();
        assert!(memory.path.is_none());
    }

    #[test]
    fn test_invalid_url() {
        assert!(ConnectionConfig::from_url("postgres://u:p@host/db").is_err());
        assert!(ConnectionConfig::from_url("sqlite://").is_err());
        assert!(
            ConnectionConfig::from_url("mysql://x")
                .unwrap_err()
                .is_configuration()
        );
    }

    #[test]
    fn test_validate_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ConnectionConfig::file(dir.path()).validate().is_err());
        assert!(ConnectionConfig::file(dir.path().join("x.db")).validate().is_ok());
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("TRUE").unwrap());
        assert!(!parse_flag("off").unwrap());
        assert!(parse_flag("sometimes").is_err());
    }

    #[test]
    fn test_open_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConnectionConfig::file(dir.path().join("assoc.db"));
        let conn = config.open().unwrap();
        assert_eq!(crate::interface::StorageHandle::backend_name(&conn), "sqlite");
    }
}
