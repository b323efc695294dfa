use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

use crate::{db::models::TargetRange, glucose::validate_range};

pub const CONFIG_PATH_VAR: &str = "GLUCOLOG_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "glucolog.json";
/// Longest default window accepted, roughly a century.
pub const MAX_WINDOW_DAYS: i64 = 36_500;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub database_path: PathBuf,
    /// Applied to every user without a stored target range.
    pub default_target_range: TargetRange,
    /// Window length used when a query omits `startDate`.
    pub default_window_days: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
            database_path: PathBuf::from("glucolog.sqlite3"),
            default_target_range: TargetRange::default(),
            default_window_days: 7,
        }
    }
}

impl Settings {
    /// Read settings from `$GLUCOLOG_CONFIG` (or `glucolog.json`), then apply
    /// `GLUCOLOG_HOST`, `GLUCOLOG_PORT` and `GLUCOLOG_DB_PATH` overrides.
    pub fn load() -> Result<Self> {
        let path = env::var(CONFIG_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut settings = Self::from_file(&path)?;
        settings.apply_env(|key| env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    /// A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings in {}", path.display()))
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(host) = lookup("GLUCOLOG_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("GLUCOLOG_PORT") {
            self.port = port
                .parse()
                .with_context(|| format!("Invalid GLUCOLOG_PORT value {port}"))?;
        }
        if let Some(path) = lookup("GLUCOLOG_DB_PATH") {
            self.database_path = PathBuf::from(path);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        validate_range(&self.default_target_range)
            .map_err(|err| anyhow!("invalid default_target_range: {err}"))?;
        if !(1..=MAX_WINDOW_DAYS).contains(&self.default_window_days) {
            return Err(anyhow!(
                "default_window_days must be between 1 and {MAX_WINDOW_DAYS}, got {}",
                self.default_window_days
            ));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::from_file(&dir.path().join("absent.json")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.default_target_range, TargetRange::new(70.0, 140.0));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("glucolog.json");
        fs::write(
            &path,
            r#"{"port": 9000, "default_target_range": {"min": 80, "max": 160}}"#,
        )
        .unwrap();

        let settings = Settings::from_file(&path).unwrap();
        assert_eq!(settings.port, 9000);
        assert_eq!(settings.host, "127.0.0.1");
        assert_eq!(settings.default_target_range, TargetRange::new(80.0, 160.0));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("glucolog.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(Settings::from_file(&path).is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let vars: HashMap<&str, &str> = [
            ("GLUCOLOG_HOST", "0.0.0.0"),
            ("GLUCOLOG_PORT", "3100"),
            ("GLUCOLOG_DB_PATH", "/var/lib/glucolog/db.sqlite3"),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        settings
            .apply_env(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(settings.bind_addr(), "0.0.0.0:3100");
        assert_eq!(
            settings.database_path,
            PathBuf::from("/var/lib/glucolog/db.sqlite3")
        );
    }

    #[test]
    fn bad_port_override_is_an_error() {
        let mut settings = Settings::default();
        assert!(settings
            .apply_env(|key| (key == "GLUCOLOG_PORT").then(|| "eighty".to_string()))
            .is_err());
    }

    #[test]
    fn rejects_inverted_default_range() {
        let settings = Settings {
            default_target_range: TargetRange::new(150.0, 90.0),
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn rejects_window_outside_accepted_days() {
        for days in [0, -3, MAX_WINDOW_DAYS + 1, 100_000_000, i64::MAX] {
            let settings = Settings {
                default_window_days: days,
                ..Settings::default()
            };
            assert!(settings.validate().is_err(), "{days} days accepted");
        }

        let settings = Settings {
            default_window_days: MAX_WINDOW_DAYS,
            ..Settings::default()
        };
        assert!(settings.validate().is_ok());
    }
}
