use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur while loading settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

/// Application settings.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub source: SourceSettings,
    #[serde(default)]
    pub ui: UiSettings,
}

impl Settings {
    /// Load settings, later sources overriding earlier ones:
    /// 1. built-in defaults
    /// 2. `config/default.toml` (optional)
    /// 3. environment variables prefixed with `BUDGET_DASHBOARD__`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new("config"))
    }

    pub fn load_from(dir: &Path) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::from(dir.join("default.toml")).required(false))
            .add_source(
                Environment::with_prefix("BUDGET_DASHBOARD")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.source.sheet_id.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "source.sheet_id".into(),
                message: "must not be empty".into(),
            });
        }
        if self.source.kind == SourceKind::SheetsApi && self.source.token_env.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "source.token_env".into(),
                message: "required for the sheets_api source".into(),
            });
        }
        Ok(())
    }
}

/// Which backend supplies the dataset.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Public sheet read through its CSV export.
    #[default]
    CsvExport,
    /// Authenticated values API; also accepts uploads.
    SheetsApi,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SourceSettings {
    pub kind: SourceKind,
    pub sheet_id: String,
    pub sheet_name: String,
    /// Environment variable holding the API bearer token.
    pub token_env: String,
    /// 0 disables caching.
    pub cache_ttl_secs: u64,
    pub timeout_secs: u64,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            kind: SourceKind::CsvExport,
            sheet_id: "1Pjf0A4-M9NTxkK8Cj0AMCMiLmazfQNqq7zRb3Lnw2G8".into(),
            sheet_name: "Sheet1".into(),
            token_env: "BUDGET_SHEETS_TOKEN".into(),
            cache_ttl_secs: 0,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct UiSettings {
    /// TTF/OTF font with Thai glyphs, installed ahead of egui's defaults.
    pub font_path: Option<PathBuf>,
    pub window_title: String,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            font_path: None,
            window_title: "ข้อมูล - งบประมาณ ปี 2561-2568".into(),
        }
    }
}
