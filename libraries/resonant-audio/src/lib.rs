//! Resonant Audio
//!
//! Real-time DSP engine for interleaved stereo streams.
//!
//! This crate provides:
//! - A buffer codec for `i16`, `i32` and `f32` host buffers
//! - Twelve effect modules run in a fixed order by the [`Pipeline`]
//! - The [`Engine`] handle with its [`DspController`] configuration surface
//! - A settings-driven [`ParameterSynchronizer`] that only re-applies what changed
//! - A lock-free control/audio [`realtime::split`]
//!
//! # Example: Processing
//!
//! ```rust
//! use resonant_audio::{DspController, Engine};
//! use resonant_core::LocalFileStore;
//! use std::sync::Arc;
//!
//! let mut engine = Engine::new(48000.0, Arc::new(LocalFileStore::new(".")));
//! engine.set_bass_boost(true, 6.0);
//! engine.set_stereo_enhancement(true, 70.0);
//!
//! let input = vec![0i16; 1024];
//! let mut output = vec![0i16; 1024];
//! engine.process_i16(&input, &mut output);
//! ```
//!
//! # Example: Syncing From Settings
//!
//! ```rust
//! use resonant_audio::{Engine, ParameterSynchronizer};
//! use resonant_core::{keys, LocalFileStore, MemorySettings, Namespace, SettingValue, SettingsStore};
//! use std::sync::Arc;
//!
//! let mut settings = MemorySettings::new();
//! settings.set(Namespace::Tube, keys::TUBE_ENABLE, SettingValue::Bool(true));
//!
//! let mut engine = Engine::new(48000.0, Arc::new(LocalFileStore::new(".")));
//! let mut sync = ParameterSynchronizer::new(settings);
//! let report = sync.sync(&mut engine, &[]);
//! assert!(report.failed.is_empty());
//! ```

pub mod codec;
mod control;
pub mod effects;
mod engine;
mod error;
mod events;
pub mod pipeline;
pub mod realtime;
pub mod sync;

pub use codec::{Codec, Sample};
pub use control::{DspController, RetainedInputs};
pub use engine::Engine;
pub use error::{AudioError, Result};
pub use events::{ConvolverErrorCode, ProcessorEvent};
pub use pipeline::{ModuleId, ModuleObservation, ModuleStatus, ModuleUpdate, Pipeline, Retired};
pub use realtime::{split, AudioProcessor, RemoteController};
pub use sync::{ParameterCache, ParameterSynchronizer, SyncReport};
