use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Context, Result};
use crate::db::migrations::MigrationManager;

/// Default time an operation waits on a locked database before failing
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Settings read from `~/.pipestore/rc`
///
/// The rc file holds `key=value` lines:
///
/// ```text
/// data.location=./pipelines.db
/// db.busy_timeout_ms=2000
/// ```
///
/// Relative `data.location` paths resolve against the rc file's directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub data_location: PathBuf,
    pub busy_timeout: Duration,
}

impl DbConfig {
    /// Defaults rooted at the given home directory
    pub fn with_home(home: &Path) -> Self {
        DbConfig {
            data_location: home.join(".pipestore").join("pipelines.db"),
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
        }
    }

    /// Parse rc file content. `base_dir` anchors relative paths.
    pub fn parse(content: &str, base_dir: &Path, defaults: DbConfig) -> Result<DbConfig> {
        let mut config = defaults;

        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                anyhow::bail!("Invalid config line {}: '{}'", lineno + 1, line);
            };
            let value = value.trim();
            match key.trim() {
                "data.location" => {
                    let path = PathBuf::from(value);
                    config.data_location = if path.is_relative() {
                        base_dir.join(path)
                    } else {
                        path
                    };
                }
                "db.busy_timeout_ms" => {
                    let ms: u64 = value.parse().with_context(|| {
                        format!("Invalid db.busy_timeout_ms on line {}: '{}'", lineno + 1, value)
                    })?;
                    config.busy_timeout = Duration::from_millis(ms);
                }
                other => log::warn!("ignoring unknown config key '{}'", other),
            }
        }

        Ok(config)
    }

    /// Load the configuration from the rc file, falling back to defaults
    pub fn load() -> Result<DbConfig> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        let defaults = DbConfig::with_home(&home);
        let config_path = DbConnection::config_path()?;

        if !config_path.exists() {
            return Ok(defaults);
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config: {}", config_path.display()))?;
        let base_dir = config_path.parent().unwrap_or(home.as_path());
        DbConfig::parse(&content, base_dir, defaults)
            .with_context(|| format!("Failed to parse config: {}", config_path.display()))
    }
}

/// Database connection manager
pub struct DbConnection;

impl DbConnection {
    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".pipestore").join("rc"))
    }

    /// Connect to the configured database, creating it and parent directories if needed
    pub fn connect_with(config: &DbConfig) -> Result<Connection> {
        let db_path = &config.data_location;

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database: {}", db_path.display()))?;
        conn.busy_timeout(config.busy_timeout)
            .context("Failed to set busy timeout")?;

        Self::prepare(&conn)?;
        log::debug!("opened database {}", db_path.display());

        Ok(conn)
    }

    /// Connect to an in-memory database (for testing)
    pub fn connect_in_memory() -> Result<Connection> {
        let conn = Connection::open_in_memory()
            .context("Failed to open in-memory database")?;

        Self::prepare(&conn)?;

        Ok(conn)
    }

    fn prepare(conn: &Connection) -> Result<()> {
        // Must be set outside any transaction to take effect
        conn.pragma_update(None, "foreign_keys", true)
            .context("Failed to enable foreign keys")?;
        MigrationManager::initialize(conn)
            .context("Failed to initialize database schema")?;
        Ok(())
    }
}
