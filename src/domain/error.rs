//! Domain error types.

/// Top-level error type for ghbtrader.
#[derive(Debug, thiserror::Error)]
pub enum GhbError {
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

    #[error("data source error: {reason}")]
    DataSource { reason: String },

    #[error("no data for {ticker}")]
    NoData { ticker: String },

    #[error("insufficient data for {ticker}: have {bars} bars, need {minimum}")]
    InsufficientData {
        ticker: String,
        bars: usize,
        minimum: usize,
    },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl GhbError {
    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        GhbError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn missing(section: &str, key: &str) -> Self {
        GhbError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }
    }

    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            GhbError::ConfigParse { .. } | GhbError::ConfigMissing { .. } | GhbError::ConfigInvalid { .. }
        )
    }
}

impl From<&GhbError> for std::process::ExitCode {
    fn from(err: &GhbError) -> Self {
        let code: u8 = match err {
            GhbError::Io(_) => 1,
            GhbError::ConfigParse { .. }
            | GhbError::ConfigMissing { .. }
            | GhbError::ConfigInvalid { .. } => 2,
            GhbError::DataSource { .. } | GhbError::Csv(_) => 3,
            GhbError::NoData { .. } | GhbError::InsufficientData { .. } => 5,
            GhbError::Report { .. } | GhbError::Json(_) => 6,
        };
        std::process::ExitCode::from(code)
    }
}
