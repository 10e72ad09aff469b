/// Liveprog-specific errors
use thiserror::Error;

/// Result type alias using `LiveprogError`
pub type Result<T> = std::result::Result<T, LiveprogError>;

/// Liveprog error types
#[derive(Error, Debug)]
pub enum LiveprogError {
    /// Property bounds are inverted or empty
    #[error("Minimum must be smaller than the maximum (key={key})")]
    InvalidRange { key: String },

    /// List properties must start at zero
    #[error("Minimum must be zero for list-type parameters (key={key})")]
    ListMinimum { key: String },

    /// Script file does not exist
    #[error("Script file not found: {0}")]
    FileNotFound(String),

    /// Script text failed to compile
    #[error("Syntax error at line {line}, column {column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },

    /// Core errors (file store)
    #[error(transparent)]
    Core(#[from] resonant_core::CoreError),
}

impl LiveprogError {
    /// Create a syntax error at a source position
    pub fn syntax(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            column,
            message: message.into(),
        }
    }
}
