use std::path::PathBuf;

use anyhow::Result;

pub const DB_ENV: &str = "CLIENTDESK_DB";
pub const FAKE_APPDATA_ENV: &str = "CLIENTDESK_FAKE_APPDATA";
pub const LOG_FILTER_ENV: &str = "CLIENTDESK_LOG";
pub const LOG_DIR_ENV: &str = "CLIENTDESK_LOG_DIR";

pub const APP_DIR: &str = "clientdesk";
pub const DB_FILE: &str = "clientdesk.sqlite3";
pub const DEFAULT_LOG_FILTER: &str = "clientdesk=info,sqlx=warn";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub log_filter: String,
    pub log_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves the config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_path = match (lookup(DB_ENV), lookup(FAKE_APPDATA_ENV)) {
            (Some(explicit), _) => PathBuf::from(explicit),
            (None, Some(fake)) => PathBuf::from(fake).join(DB_FILE),
            (None, None) => default_db_path()?,
        };

        Ok(Self {
            db_path,
            log_filter: lookup(LOG_FILTER_ENV).unwrap_or_else(|| DEFAULT_LOG_FILTER.into()),
            log_dir: lookup(LOG_DIR_ENV).map(PathBuf::from),
        })
    }

    pub fn with_db_override(mut self, db: Option<PathBuf>) -> Self {
        if let Some(path) = db {
            self.db_path = path;
        }
        self
    }
}

fn default_db_path() -> Result<PathBuf> {
    let base = dirs::data_dir()
        .or_else(|| std::env::current_dir().ok())
        .ok_or_else(|| anyhow::anyhow!("failed to resolve application data directory"))?;
    Ok(base.join(APP_DIR).join(DB_FILE))
}
