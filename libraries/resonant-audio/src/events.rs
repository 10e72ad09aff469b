//! Messages the engine raises for the host
//!
//! Events are queued on the engine and drained by the host after processing
//! or configuration calls.

use crate::pipeline::{ModuleId, ModuleStatus};
use serde::{Deserialize, Serialize};

/// Why an impulse response was rejected or adjusted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvolverErrorCode {
    Unknown,
    /// File could not be decoded
    Corrupted,
    /// File decoded to zero frames
    NoFrames,
    /// Tuning string malformed or out of range
    AdvParamsInvalid,
}

impl ConvolverErrorCode {
    /// Numeric code as exchanged with hosts
    pub fn code(self) -> i32 {
        match self {
            ConvolverErrorCode::Unknown => 0,
            ConvolverErrorCode::Corrupted => 1,
            ConvolverErrorCode::NoFrames => 2,
            ConvolverErrorCode::AdvParamsInvalid => 3,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            1 => ConvolverErrorCode::Corrupted,
            2 => ConvolverErrorCode::NoFrames,
            3 => ConvolverErrorCode::AdvParamsInvalid,
            _ => ConvolverErrorCode::Unknown,
        }
    }
}

/// Event raised by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProcessorEvent {
    /// Text printed by the running script
    LiveprogOutput { message: String },
    /// A script is about to be loaded
    LiveprogExec { id: String },
    /// A script load finished
    LiveprogResult {
        code: i32,
        id: String,
        error: Option<String>,
    },
    /// A DDC file failed to parse
    VdcParseError,
    ConvolverParseError { code: ConvolverErrorCode },
    ModuleStatusChanged {
        module: ModuleId,
        from: ModuleStatus,
        to: ModuleStatus,
    },
    SampleRateChanged { sample_rate: f32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_round_trip() {
        for code in [
            ConvolverErrorCode::Unknown,
            ConvolverErrorCode::Corrupted,
            ConvolverErrorCode::NoFrames,
            ConvolverErrorCode::AdvParamsInvalid,
        ] {
            assert_eq!(ConvolverErrorCode::from_code(code.code()), code);
        }
        assert_eq!(ConvolverErrorCode::from_code(17), ConvolverErrorCode::Unknown);
    }

    #[test]
    fn events_serialize_tagged() {
        let event = ProcessorEvent::ConvolverParseError {
            code: ConvolverErrorCode::NoFrames,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"convolver_parse_error","code":"no_frames"}"#);

        let back: ProcessorEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn liveprog_result_serializes() {
        let event = ProcessorEvent::LiveprogResult {
            code: -1,
            id: "test.eel".to_string(),
            error: Some("1:3: unexpected token".to_string()),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "liveprog_result");
        assert_eq!(value["code"], -1);
    }
}
