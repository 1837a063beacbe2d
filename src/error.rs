use thiserror::Error;

/// Failures surfaced by the atlas library. Most components degrade instead of
/// returning these; only caller-contract violations propagate.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AtlasError {
    #[error("policy not found: {id}")]
    NotFound { id: String },

    #[error("dataset unavailable: {0}")]
    DataUnavailable(String),

    #[error("invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("chart already registered: {0}")]
    DuplicateRegistration(String),

    #[error("unknown chart: {0}")]
    UnknownChart(String),

    #[error("invalid config: {0}")]
    Config(String),
}

impl AtlasError {
    pub fn not_found(id: impl Into<String>) -> Self {
        AtlasError::NotFound { id: id.into() }
    }
}
