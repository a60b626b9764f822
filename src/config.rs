// Runtime configuration from the environment (and an optional .env file)

use chrono::{Days, NaiveDate, Utc};
use std::path::PathBuf;
use std::time::Duration;

use crate::api_client::HORIZONS_BASE_URL;
use crate::data_cache::parse_date;
use crate::error::{OrbitalError, Result};

pub const DEFAULT_PLAYBACK_SECONDS: f64 = 30.0;
pub const DEFAULT_PLAYBACK_DAYS: u64 = 30;
pub const DEFAULT_FRAME_RATE: u32 = 60;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub horizons_base_url: String,
    /// `None` keeps the element cache in memory only
    pub cache_dir: Option<PathBuf>,
    pub playback_start: NaiveDate,
    pub playback_end: NaiveDate,
    pub playback_duration: Duration,
    pub frame_rate: u32,
}

impl Config {
    /// Reads `.env` if present, then the process environment
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let today = Utc::now().date_naive();

        let playback_start = match lookup("PLAYBACK_START") {
            Some(value) => parse_date(&value)?,
            None => today,
        };
        let playback_end = match lookup("PLAYBACK_END") {
            Some(value) => parse_date(&value)?,
            None => playback_start
                .checked_add_days(Days::new(DEFAULT_PLAYBACK_DAYS))
                .ok_or_else(|| OrbitalError::Config("playback end out of range".to_string()))?,
        };
        if playback_end <= playback_start {
            return Err(OrbitalError::InvalidRange {
                start: playback_start.to_string(),
                end: playback_end.to_string(),
            });
        }

        let seconds = match lookup("PLAYBACK_SECONDS") {
            Some(value) => value
                .trim()
                .parse::<f64>()
                .map_err(|e| OrbitalError::Config(format!("PLAYBACK_SECONDS: {}", e)))?,
            None => DEFAULT_PLAYBACK_SECONDS,
        };
        if !(seconds.is_finite() && seconds > 0.0) {
            return Err(OrbitalError::InvalidDuration(format!(
                "PLAYBACK_SECONDS must be positive, got {}",
                seconds
            )));
        }
        let playback_duration = Duration::try_from_secs_f64(seconds).map_err(|e| {
            OrbitalError::InvalidDuration(format!("PLAYBACK_SECONDS {}: {}", seconds, e))
        })?;

        let frame_rate = match lookup("FRAME_RATE") {
            Some(value) => value
                .trim()
                .parse::<u32>()
                .map_err(|e| OrbitalError::Config(format!("FRAME_RATE: {}", e)))?
                .clamp(1, 240),
            None => DEFAULT_FRAME_RATE,
        };

        Ok(Self {
            horizons_base_url: lookup("HORIZONS_BASE_URL")
                .unwrap_or_else(|| HORIZONS_BASE_URL.to_string()),
            cache_dir: lookup("ORBITAL_CACHE_DIR")
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from),
            playback_start,
            playback_end,
            playback_duration,
            frame_rate,
        })
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frame_rate as f64)
    }
}
