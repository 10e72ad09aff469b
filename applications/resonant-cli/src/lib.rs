//! Resonant command line front-end
//!
//! - `process`: run a WAV file through the engine, configured from a JSON settings file
//! - `script`: inspect and edit the properties a liveprog script declares

pub mod process;
pub mod script;
pub mod wav;
