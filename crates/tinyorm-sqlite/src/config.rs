//! Engine configuration.

use std::path::PathBuf;

use tinyorm_core::{Error, Result};

/// Where the database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabasePath {
    Memory,
    File(PathBuf),
}

/// Connection settings.
///
/// ```
/// use tinyorm_sqlite::{DatabasePath, EngineConfig};
///
/// let config = EngineConfig::from_url("sqlite:///db.sqlite3").unwrap().echo(true);
/// assert_eq!(config.path, DatabasePath::File("db.sqlite3".into()));
/// assert!(config.echo);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub path: DatabasePath,
    /// Log every statement at `info` instead of `debug`.
    pub echo: bool,
    /// Enforce foreign keys (`PRAGMA foreign_keys = ON`).
    pub foreign_keys: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::memory()
    }
}

impl EngineConfig {
    pub fn memory() -> Self {
        Self {
            path: DatabasePath::Memory,
            echo: false,
            foreign_keys: true,
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: DatabasePath::File(path.into()),
            ..Self::memory()
        }
    }

    /// Parse a `sqlite://` URL.
    ///
    /// - `sqlite://` and `sqlite:///:memory:` open an in-memory database
    /// - `sqlite:///relative.db` opens a path relative to the working directory
    /// - `sqlite:////abs/path.db` opens an absolute path
    pub fn from_url(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix("sqlite://")
            .ok_or_else(|| Error::Config(format!("unsupported database URL: {url}")))?;

        if rest.is_empty() {
            return Ok(Self::memory());
        }
        let path = rest.strip_prefix('/').ok_or_else(|| {
            Error::Config(format!(
                "database URL must have the form sqlite:///path, got: {url}"
            ))
        })?;
        match path {
            "" | ":memory:" => Ok(Self::memory()),
            path => Ok(Self::file(path)),
        }
    }

    #[must_use]
    pub fn echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    #[must_use]
    pub fn foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }
}
