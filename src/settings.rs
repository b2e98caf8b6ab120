use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{PloutosError, Result};

pub const DB_FILE: &str = "ploutos.db";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    #[serde(default = "default_transfer_window_days")]
    pub transfer_window_days: i64,
    #[serde(default = "default_date_weight")]
    pub date_weight: f64,
    #[serde(default = "default_description_weight")]
    pub description_weight: f64,
    /// `tracing` filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_transfer_window_days() -> i64 {
    3
}

fn default_date_weight() -> f64 {
    0.7
}

fn default_description_weight() -> f64 {
    0.3
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            transfer_window_days: default_transfer_window_days(),
            date_weight: default_date_weight(),
            description_weight: default_description_weight(),
            log_filter: default_log_filter(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.transfer_window_days < 0 {
            return Err(PloutosError::Settings(format!(
                "transfer_window_days must be >= 0, got {}",
                self.transfer_window_days
            )));
        }
        for (name, weight) in [
            ("date_weight", self.date_weight),
            ("description_weight", self.description_weight),
        ] {
            if !(0.0..=1.0).contains(&weight) {
                return Err(PloutosError::Settings(format!(
                    "{name} must be between 0 and 1, got {weight}"
                )));
            }
        }
        Ok(())
    }

    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(DB_FILE)
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("ploutos")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("ploutos")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_default()
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| PloutosError::Settings(e.to_string()))?;
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            data_dir: "/tmp/test".to_string(),
            transfer_window_days: 5,
            date_weight: 0.5,
            description_weight: 0.5,
            log_filter: "ploutos=debug".to_string(),
        };
        let json = serde_json::to_string_pretty(&settings).unwrap();
        std::fs::write(&path, &json).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let loaded: Settings = serde_json::from_str(&content).unwrap();
        assert_eq!(loaded.data_dir, "/tmp/test");
        assert_eq!(loaded.transfer_window_days, 5);
        assert_eq!(loaded.log_filter, "ploutos=debug");
    }

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.transfer_window_days, 3);
        assert_eq!(s.date_weight, 0.7);
        assert_eq!(s.description_weight, 0.3);
        assert_eq!(s.log_filter, "info");
        assert!(s.db_path().ends_with(DB_FILE));
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_load_merges_with_defaults() {
        let json = r#"{"data_dir": "/tmp/test", "transfer_window_days": 7}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.transfer_window_days, 7);
        assert_eq!(s.date_weight, 0.7);
        assert_eq!(s.log_filter, "info");
    }

    #[test]
    fn test_validate_rejects_bad_weights() {
        let s = Settings {
            date_weight: 1.5,
            ..Settings::default()
        };
        assert!(matches!(s.validate(), Err(PloutosError::Settings(_))));
        let s = Settings {
            transfer_window_days: -1,
            ..Settings::default()
        };
        assert!(s.validate().is_err());
    }
}
