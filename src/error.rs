// Error types for the orbital playback engine
// Numeric non-convergence and missing data are not errors: they surface as
// silent best estimates and `Option`s respectively.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrbitalError {
    #[error("Invalid date range: end {end} is before start {start}")]
    InvalidRange { start: String, end: String },

    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Invalid playback duration: {0}")]
    InvalidDuration(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cache store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, OrbitalError>;

/// Failure to obtain data from the ephemeris provider for one body/day.
/// Caught at the data cache boundary, never fatal to a range operation.
#[derive(Debug, Error)]
pub enum EphemerisError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API returned status: {0}")]
    Status(u16),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("No data returned for {body} on {date}")]
    MissingData { body: String, date: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_range_message() {
        let err = OrbitalError::InvalidRange {
            start: "2025-01-03".to_string(),
            end: "2025-01-01".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid date range: end 2025-01-01 is before start 2025-01-03"
        );
    }

    #[test]
    fn test_json_error_converts() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{oops");
        let err: OrbitalError = parse.unwrap_err().into();
        assert!(matches!(err, OrbitalError::Serialization(_)));
    }
}
