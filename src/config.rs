use chrono::Weekday;
use std::env;

use crate::engine::dates::Zone;
use crate::error::ConfigError;

/// Values threaded through every engine call. Nothing in the engine reads
/// global state; handlers build one of these and pass it down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Zone used to cut timestamps into calendar days.
    pub timezone: Zone,
    /// Assumed days between ovulation and the next period.
    pub luteal_phase_days: i64,
    /// First column of the calendar grid.
    pub week_start: Weekday,
    /// How far back the pipelines look when rebuilding statistics.
    pub history_days: i64,
}

pub const DEFAULT_LUTEAL_PHASE_DAYS: i64 = 14;
pub const DEFAULT_HISTORY_DAYS: i64 = 730;
/// About a century; keeps the history window inside chrono's date range.
pub const MAX_HISTORY_DAYS: i64 = 36_500;

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timezone: Zone::utc(),
            luteal_phase_days: DEFAULT_LUTEAL_PHASE_DAYS,
            week_start: Weekday::Mon,
            history_days: DEFAULT_HISTORY_DAYS,
        }
    }
}

impl EngineConfig {
    /// Reads the engine settings through `lookup`, falling back to defaults
    /// for anything unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup("CYCLE_TIMEZONE") {
            config.timezone = raw.parse::<Zone>().map_err(|_| ConfigError::Invalid {
                key: "CYCLE_TIMEZONE",
                value: raw.clone(),
            })?;
        }

        if let Some(raw) = lookup("LUTEAL_PHASE_DAYS") {
            config.luteal_phase_days = raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|days| (1..=20).contains(days))
                .ok_or(ConfigError::Invalid {
                    key: "LUTEAL_PHASE_DAYS",
                    value: raw.clone(),
                })?;
        }

        if let Some(raw) = lookup("CALENDAR_WEEK_START") {
            config.week_start = match raw.trim().to_lowercase().as_str() {
                "monday" | "mon" => Weekday::Mon,
                "sunday" | "sun" => Weekday::Sun,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "CALENDAR_WEEK_START",
                        value: raw,
                    })
                }
            };
        }

        if let Some(raw) = lookup("CYCLE_HISTORY_DAYS") {
            config.history_days = raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|days| (1..=MAX_HISTORY_DAYS).contains(days))
                .ok_or(ConfigError::Invalid {
                    key: "CYCLE_HISTORY_DAYS",
                    value: raw.clone(),
                })?;
        }

        Ok(config)
    }
}

/// Process-level configuration for the maintenance binary.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub engine: EngineConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::Invalid {
                    key: "DATABASE_MAX_CONNECTIONS",
                    value: raw.clone(),
                })?,
            None => 5,
        };

        Ok(Self {
            database_url,
            max_connections,
            engine: EngineConfig::from_lookup(&lookup)?,
        })
    }
}
