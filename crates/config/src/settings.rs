// User settings
// Loaded from ~/.config/qcdiff/settings.toml (or $QCDIFF_SETTINGS)

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable that overrides the settings file location.
pub const SETTINGS_ENV: &str = "QCDIFF_SETTINGS";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: {message}")]
    Parse { path: String, message: String },

    #[error("{path}: {message}")]
    Invalid { path: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
}

/// Fallback numeric tolerance, used when neither the command line nor the
/// spec file sets one.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToleranceSettings {
    pub abs: Option<f64>,
    pub rel: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PortfolioSettings {
    /// Worker threads for portfolio runs. Unset means one per CPU.
    pub jobs: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub tolerance: ToleranceSettings,
    pub warnings_only: Option<bool>,
    pub output: OutputSettings,
    pub portfolio: PortfolioSettings,
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        if let Some(path) = std::env::var_os(SETTINGS_ENV).filter(|p| !p.is_empty()) {
            return PathBuf::from(path);
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("qcdiff")
            .join("settings.toml")
    }

    /// Load settings from disk, falling back to defaults. A broken settings
    /// file never stops a run: the problem is logged and defaults are used.
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            log::debug!("no settings file at {}", path.display());
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(settings) => {
                log::debug!("settings loaded from {}", path.display());
                settings
            }
            Err(e) => {
                log::warn!("{e}; using default settings");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&contents, &path.display().to_string())
    }

    fn parse(contents: &str, origin: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(contents).map_err(|e| SettingsError::Parse {
            path: origin.to_string(),
            message: e.to_string(),
        })?;
        settings.validate().map_err(|message| SettingsError::Invalid {
            path: origin.to_string(),
            message,
        })?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), String> {
        for (name, value) in [("tolerance.abs", self.tolerance.abs), ("tolerance.rel", self.tolerance.rel)] {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(format!("{name} must be a finite number >= 0, got {v}"));
                }
            }
        }
        if self.portfolio.jobs == Some(0) {
            return Err("portfolio.jobs must be at least 1".to_string());
        }
        Ok(())
    }
}
