//! TOML-backed run configuration: the location/date defaults the CLI falls
//! back to when a flag is omitted. Mirrors the teacher's manifest
//! load/save shape, scaled down to this crate's much smaller config
//! surface (no dependency table, no package registry fields).

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE_NAME: &str = "zmanim.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub elevation_m: f64,
    pub timezone: String,
    /// ISO `YYYY-MM-DD`. Absent means "the current date", resolved by the
    /// caller.
    #[serde(default)]
    pub date: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        // Jerusalem, matching this crate's own test fixtures.
        RunConfig { latitude: 31.7683, longitude: 35.2137, elevation_m: 800.0, timezone: "Asia/Jerusalem".to_string(), date: None }
    }
}

impl RunConfig {
    pub fn load(dir: &Path) -> Result<Option<RunConfig>, Box<dyn std::error::Error>> {
        let path = dir.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path)?;
        let config: RunConfig = toml::from_str(&text)?;
        Ok(Some(config))
    }

    pub fn to_toml(&self) -> Result<String, Box<dyn std::error::Error>> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn parsed_date(&self) -> Result<Option<NaiveDate>, Box<dyn std::error::Error>> {
        self.date.as_deref().map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").map_err(Into::into)).transpose()
    }

    pub fn timezone(&self) -> Result<chrono_tz::Tz, Box<dyn std::error::Error>> {
        self.timezone.parse().map_err(|_| format!("unknown timezone '{}'", self.timezone).into())
    }
}

pub fn find_config(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(d) = dir {
        let candidate = d.join(CONFIG_FILE_NAME);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = d.parent();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_jerusalem() {
        let config = RunConfig::default();
        assert_eq!(config.timezone, "Asia/Jerusalem");
    }

    #[test]
    fn round_trips_through_toml() {
        let config = RunConfig::default();
        let text = config.to_toml().unwrap();
        let parsed: RunConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.latitude, config.latitude);
    }

    #[test]
    fn load_returns_none_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let result = RunConfig::load(dir.path()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn load_reads_written_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig { latitude: 40.0, longitude: -74.0, elevation_m: 10.0, timezone: "America/New_York".to_string(), date: None };
        fs::write(dir.path().join(CONFIG_FILE_NAME), config.to_toml().unwrap()).unwrap();
        let loaded = RunConfig::load(dir.path()).unwrap().unwrap();
        assert_eq!(loaded.latitude, 40.0);
    }

    #[test]
    fn parsed_date_accepts_iso_format() {
        let config = RunConfig { date: Some("2024-03-21".to_string()), ..RunConfig::default() };
        let date = config.parsed_date().unwrap().unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 3, 21).unwrap());
    }
}
