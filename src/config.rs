use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveTime;
use log::warn;
use serde::{Deserialize, Serialize};

/// Clock times in the config document are plain `HH:MM` strings.
mod hhmm {
    use chrono::NaiveTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, "%H:%M").map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Local,
    Database,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub kind: StorageKind,
    #[serde(default = "default_attendance_file")]
    pub attendance_file: PathBuf,
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: StorageKind::Local,
            attendance_file: default_attendance_file(),
            database_path: default_database_path(),
        }
    }
}

/// Process-wide tunables. Every field has a standalone default so a partial
/// config document loads cleanly; unknown keys are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Continuous-sighting seconds required before a punch commits.
    #[serde(default = "default_confirmation_seconds")]
    pub confirmation_seconds: f64,
    /// Minimum seconds between two commits for the same identity.
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: u64,
    #[serde(default = "default_standard_entry", with = "hhmm")]
    pub standard_entry: NaiveTime,
    #[serde(default = "default_standard_exit", with = "hhmm")]
    pub standard_exit: NaiveTime,
    #[serde(default = "default_lunch_minutes")]
    pub lunch_minutes: i64,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            confirmation_seconds: default_confirmation_seconds(),
            cooldown_seconds: default_cooldown_seconds(),
            standard_entry: default_standard_entry(),
            standard_exit: default_standard_exit(),
            lunch_minutes: default_lunch_minutes(),
            storage: StorageConfig::default(),
        }
    }
}

impl SystemConfig {
    /// Repairs out-of-range values from a hand-edited document.
    fn sanitized(mut self) -> Self {
        if !(self.confirmation_seconds > 0.0) {
            warn!(
                "confirmation_seconds must be positive, got {}; using default",
                self.confirmation_seconds
            );
            self.confirmation_seconds = default_confirmation_seconds();
        }
        if self.lunch_minutes < 0 {
            warn!("lunch_minutes must not be negative, got {}; using 0", self.lunch_minutes);
            self.lunch_minutes = 0;
        }
        self
    }
}

fn default_confirmation_seconds() -> f64 {
    3.0
}

fn default_cooldown_seconds() -> u64 {
    60
}

fn default_standard_entry() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap()
}

fn default_standard_exit() -> NaiveTime {
    NaiveTime::from_hms_opt(18, 0, 0).unwrap()
}

fn default_lunch_minutes() -> i64 {
    60
}

fn default_attendance_file() -> PathBuf {
    PathBuf::from("attendance.csv")
}

fn default_database_path() -> PathBuf {
    PathBuf::from("ponto_eletronico.db")
}

/// Loads and persists the config document. The live copy is owned by the
/// service, which mutates it under its own lock; this type only handles the
/// file round-trip.
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Missing or unreadable documents never fail startup; they yield the
    /// built-in defaults.
    pub fn load(&self) -> SystemConfig {
        if !self.path.exists() {
            return SystemConfig::default();
        }

        match fs::read_to_string(&self.path) {
            Ok(contents) => match serde_json::from_str::<SystemConfig>(&contents) {
                Ok(config) => config.sanitized(),
                Err(err) => {
                    warn!(
                        "failed to parse config {}: {err}; using defaults",
                        self.path.display()
                    );
                    SystemConfig::default()
                }
            },
            Err(err) => {
                warn!(
                    "failed to read config {}: {err}; using defaults",
                    self.path.display()
                );
                SystemConfig::default()
            }
        }
    }

    pub fn persist(&self, config: &SystemConfig) -> Result<()> {
        let serialized = serde_json::to_string_pretty(config)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("failed to write config to {}", self.path.display()))
    }
}
