use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Input validation failed with {} problem(s): {}", errors.len(), errors.join("; "))]
    InputValidation { errors: Vec<String> },

    #[error("Ambiguous conflict for {identity}: {detail}")]
    AmbiguousConflict { identity: String, detail: String },

    #[error("No decision available: {0}")]
    DecisionUnavailable(String),

    #[error("Mapping store error: {0}")]
    MappingStore(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
