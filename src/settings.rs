use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::db::DB_FILE;
use crate::error::{ReportError, Result};
use crate::reports::ReportMode;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    #[serde(default = "default_panels")]
    pub panels: Vec<String>,
    #[serde(default = "default_panel")]
    pub default_panel: String,
    #[serde(default)]
    pub report_mode: ReportMode,
    #[serde(default = "default_download_prefix")]
    pub download_prefix: String,
}

fn default_panels() -> Vec<String> {
    vec!["1".to_string(), "2".to_string()]
}

fn default_panel() -> String {
    "1".to_string()
}

fn default_download_prefix() -> String {
    "/output/".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            panels: default_panels(),
            default_panel: default_panel(),
            report_mode: ReportMode::default(),
            download_prefix: default_download_prefix(),
        }
    }
}

impl Settings {
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_path().join(DB_FILE)
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.data_path().join("uploads")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.data_path().join("output")
    }

    /// The requested panel, or the default one when none was given.
    pub fn resolve_panel(&self, requested: Option<&str>) -> String {
        requested
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(&self.default_panel)
            .to_string()
    }

    pub fn download_url(&self, filename: &str) -> String {
        if self.download_prefix.ends_with('/') {
            format!("{}{filename}", self.download_prefix)
        } else {
            format!("{}/{filename}", self.download_prefix)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.panels.is_empty() {
            return Err(ReportError::Settings("at least one panel must be configured".to_string()));
        }
        if !self.panels.contains(&self.default_panel) {
            return Err(ReportError::Settings(format!(
                "default panel '{}' is not one of the configured panels ({})",
                self.default_panel,
                self.panels.join(", ")
            )));
        }
        Ok(())
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("payout")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("payout")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "unreadable settings, using defaults");
            Settings::default()
        })
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| ReportError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}
