//! Resonant Core
//!
//! Platform-agnostic building blocks shared by the Resonant DSP engine.
//!
//! This crate provides the foundational pieces used by the audio engine, the
//! liveprog scripting subsystem and the command line front-end.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Settings**: `SettingValue`, the `SettingsStore` trait and its in-memory/JSON stores
//! - **Namespaces**: the per-module settings namespaces, their keys and defaults
//! - **Files**: the `FileStore` abstraction used for IR, DDC and script files
//! - **Configuration**: `EngineConfig`, loaded from file and environment
//! - **Error Handling**: Unified `CoreError` and `Result` types
//!
//! # Example
//!
//! ```rust
//! use resonant_core::{keys, MemorySettings, Namespace, SettingValue, SettingsStore};
//!
//! let mut settings = MemorySettings::new();
//! settings.set(Namespace::Equalizer, keys::EQ_ENABLE, SettingValue::Bool(true));
//!
//! assert_eq!(
//!     settings.get(Namespace::Equalizer, keys::EQ_ENABLE),
//!     Some(SettingValue::Bool(true))
//! );
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod files;
pub mod namespace;
pub mod settings;

// Re-export commonly used types
pub use self::config::EngineConfig;
pub use error::{CoreError, Result};
pub use files::{FileStore, LocalFileStore};
pub use namespace::{defaults, keys, Namespace};
pub use settings::{JsonSettings, MemorySettings, SettingValue, SettingsStore};
