/// Audio engine errors
use thiserror::Error;

/// Result type alias using `AudioError`
pub type Result<T> = std::result::Result<T, AudioError>;

/// Audio error types
///
/// These stay on the control side. The processing path never returns errors;
/// configuration setters turn them into `false` plus a log line.
#[derive(Error, Debug)]
pub enum AudioError {
    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Impulse response could not be decoded
    #[error("Corrupted impulse response: {0}")]
    CorruptedImpulse(String),

    /// Impulse response decoded to zero frames
    #[error("Impulse response has no frames")]
    EmptyImpulse,

    /// Channel layout the convolver cannot use
    #[error("Unsupported channel count: {0}")]
    UnsupportedChannels(usize),

    /// Resampling failed
    #[error("Resampling error: {0}")]
    Resampling(String),

    /// Malformed parameter string or value
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// DDC file could not be parsed
    #[error("DDC parse error: {0}")]
    DdcParse(String),

    /// WAV reader error
    #[error(transparent)]
    Wav(#[from] hound::Error),

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    /// Script subsystem error
    #[error(transparent)]
    Liveprog(#[from] resonant_liveprog::LiveprogError),

    /// Core error
    #[error(transparent)]
    Core(#[from] resonant_core::CoreError),
}

impl AudioError {
    /// Create an invalid parameter error
    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }
}
