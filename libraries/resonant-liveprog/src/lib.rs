//! Resonant Liveprog
//!
//! User scripts for the Resonant DSP engine.
//!
//! This crate provides:
//! - Script properties declared in script text (`gain:2<0,10,0.5>Gain`) and
//!   patched in place on edits
//! - `ScriptDocument`, a loaded script file with its description, tags and
//!   properties
//! - A small expression VM running the script's `@init` and `@sample` code
//! - `LiveprogRuntime`, the bridge between compiled scripts and the audio stage
//!
//! # Example
//!
//! ```rust
//! use resonant_liveprog::{LiveprogRuntime, ScriptRuntime};
//!
//! let mut runtime = LiveprogRuntime::new(48000.0);
//! let outcome = runtime.load_script(true, "half.eel", "@sample\nspl0 *= 0.5;\nspl1 *= 0.5;");
//! assert!(outcome.is_ok());
//!
//! let mut frame = [1.0, 1.0];
//! runtime.process(&mut frame);
//! assert_eq!(frame, [0.5, 0.5]);
//! ```

#![forbid(unsafe_code)]

pub mod bridge;
pub mod document;
mod error;
pub mod property;
pub mod vm;

pub use bridge::{
    LiveprogRuntime, LoadOutcome, ScriptRuntime, ScriptVariable, VariableValue, RESULT_OK,
    RESULT_SYNTAX_ERROR,
};
pub use document::{DocumentState, LoadOptions, ScriptDocument};
pub use error::{LiveprogError, Result};
pub use property::{ListProperty, NumberRangeProperty, ScriptProperty};
pub use vm::{Program, ScriptVm};
