use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::SettingsError;
use crate::logging;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PanelSettings {
    /// Trailing segment of every panel window title
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_title_separator")]
    pub title_separator: String,
    /// Mirror log output into this directory (disabled when unset)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    #[serde(default = "default_log_file_stem")]
    pub log_file_stem: String,
}

fn default_app_name() -> String {
    "WireTAP".to_string()
}
fn default_title_separator() -> String {
    " \u{00b7} ".to_string() // middle dot
}
fn default_log_file_stem() -> String {
    "wiretap-panel".to_string()
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            title_separator: default_title_separator(),
            log_dir: None,
            log_file_stem: default_log_file_stem(),
        }
    }
}

impl PanelSettings {
    /// Parse settings from TOML. Missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        let settings: Self = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        let settings = Self::from_toml_str(&content)?;
        tlog!("[settings] Loaded panel settings from {}", path.display());
        Ok(settings)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, SettingsError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.app_name.trim().is_empty() {
            return Err(SettingsError::Invalid("app_name must not be empty".to_string()));
        }
        if self.log_file_stem.trim().is_empty() || self.log_file_stem.contains(['/', '\\']) {
            return Err(SettingsError::Invalid(format!(
                "log_file_stem '{}' is not a plain file name",
                self.log_file_stem
            )));
        }
        Ok(())
    }

    /// Start file logging when `log_dir` is set. Returns the log file path.
    pub fn init_logging(&self) -> Result<Option<PathBuf>, SettingsError> {
        match &self.log_dir {
            Some(dir) => Ok(Some(logging::init_file_logging(dir, &self.log_file_stem)?)),
            None => Ok(None),
        }
    }
}
