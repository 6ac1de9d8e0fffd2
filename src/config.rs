//! Application configuration read from `flashcards.toml`.

use crate::models::leitner::DemotionPolicy;
use crate::models::review_session::SessionOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "flashcards.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// The user whose cards are shown.
    #[serde(default = "default_owner")]
    pub owner: String,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub calendar: CalendarConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            owner: default_owner(),
            database: DatabaseConfig::default(),
            scheduler: SchedulerConfig::default(),
            session: SessionConfig::default(),
            calendar: CalendarConfig::default(),
        }
    }
}

fn default_owner() -> String {
    "local".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: default_database_path(),
        }
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("db.sqlite3")
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub demotion: DemotionPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Cards per session; no cap when absent.
    #[serde(default)]
    pub max_cards: Option<usize>,
    #[serde(default = "default_persist_attempts")]
    pub persist_attempts: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            max_cards: None,
            persist_attempts: default_persist_attempts(),
        }
    }
}

fn default_persist_attempts() -> u32 {
    3
}

impl SessionConfig {
    pub fn options(&self) -> SessionOptions {
        SessionOptions {
            limit: self.max_cards,
            persist_attempts: self.persist_attempts,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CalendarMode {
    /// Today is the machine's local date.
    System,
    /// Today is stored in the database and moved by hand.
    #[default]
    Simulated,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalendarConfig {
    #[serde(default)]
    pub mode: CalendarMode,
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Reads `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(text) => {
                let config = Self::from_toml_str(&text)?;
                log::info!("Loaded config from {}", path.display());
                Ok(config)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::info!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }
}
