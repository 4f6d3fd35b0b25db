//! Domain error types.

/// Top-level error type for turtlesoup.
#[derive(Debug, thiserror::Error)]
pub enum SoupError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("{context}: missing required fields: {}", fields.join(", "))]
    MissingFields { context: String, fields: Vec<String> },

    #[error("invalid bar at index {index}: {reason}")]
    InvalidBar { index: usize, reason: String },

    #[error("bars out of order at index {index}: timestamp {timestamp} does not follow {previous}")]
    UnorderedBars {
        index: usize,
        timestamp: i64,
        previous: i64,
    },

    #[error("feature rows do not line up with bars: {bars} bars, {features} feature rows")]
    LengthMismatch { bars: usize, features: usize },

    #[error("no data for {instrument} {timeframe}")]
    NoData {
        instrument: String,
        timeframe: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&SoupError> for std::process::ExitCode {
    fn from(err: &SoupError) -> Self {
        let code: u8 = match err {
            SoupError::Io(_) => 1,
            SoupError::ConfigParse { .. }
            | SoupError::ConfigMissing { .. }
            | SoupError::ConfigInvalid { .. } => 2,
            SoupError::Database { .. } | SoupError::DatabaseQuery { .. } => 3,
            SoupError::MissingFields { .. }
            | SoupError::InvalidBar { .. }
            | SoupError::UnorderedBars { .. }
            | SoupError::LengthMismatch { .. }
            | SoupError::NoData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
