//! Settings-to-engine synchronization
//!
//! The synchronizer polls a [`resonant_core::SettingsStore`], compares every
//! value against a [`ParameterCache`] and re-applies only the namespaces that
//! changed, were forced, or were queued by the module status machine.

mod cache;
mod snapshot;
mod synchronizer;

pub use cache::ParameterCache;
pub use synchronizer::{ParameterSynchronizer, SyncReport};
