use thiserror::Error;

pub type FlowResult<T> = Result<T, FlowError>;

#[derive(Error, Debug)]
pub enum FlowError {
    /// Malformed declarative flow input. Raised while compiling the flow and
    /// never at interview time.
    #[error("Flow specification error: {0}")]
    Specification(String),

    /// A flow-authoring bug surfaced at runtime (e.g. a locked-year date field
    /// whose source fact is incomplete).
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Unknown fact: {0}")]
    UnknownFact(String),

    #[error("Fact is not writable: {0}")]
    NotWritable(String),

    #[error("Invalid fact path: {0}")]
    InvalidPath(String),

    #[error("Type mismatch for {path}: expected {expected}, found {found}")]
    TypeMismatch {
        path: String,
        expected: String,
        found: String,
    },

    #[error("Navigation error: {0}")]
    Navigation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for FlowError {
    fn from(err: config::ConfigError) -> Self {
        FlowError::Config(err.to_string())
    }
}
