//! Settings store
//!
//! Raw DSP configuration lives in a typed key/value store partitioned by
//! [`Namespace`]. The engine never writes to it; hosts (or the CLI) populate it
//! and the parameter synchronizer polls it.

use crate::error::{CoreError, Result};
use crate::namespace::Namespace;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A single stored setting
///
/// List-style settings are frequently persisted as text (`"0"`), so the typed
/// accessors coerce between representations where that is lossless.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl SettingValue {
    /// Interpret as a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(b) => Some(*b),
            SettingValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Interpret as a 32-bit float
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            SettingValue::Float(v) => Some(*v as f32),
            SettingValue::Int(v) => Some(*v as f32),
            SettingValue::Text(s) => s.trim().parse().ok(),
            SettingValue::Bool(_) => None,
        }
    }

    /// Interpret as a 32-bit integer
    ///
    /// Floats are accepted only when they carry no fractional part.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            SettingValue::Int(v) => i32::try_from(*v).ok(),
            SettingValue::Float(v) if v.fract() == 0.0 && v.abs() <= f64::from(i32::MAX) => {
                Some(*v as i32)
            }
            SettingValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Interpret as text
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl PartialEq for SettingValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (SettingValue::Bool(a), SettingValue::Bool(b)) => a == b,
            (SettingValue::Int(a), SettingValue::Int(b)) => a == b,
            // Bit equality keeps NaN stable in the parameter cache
            (SettingValue::Float(a), SettingValue::Float(b)) => a.to_bits() == b.to_bits(),
            (SettingValue::Text(a), SettingValue::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for SettingValue {}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Bool(value)
    }
}

impl From<i32> for SettingValue {
    fn from(value: i32) -> Self {
        SettingValue::Int(i64::from(value))
    }
}

impl From<f32> for SettingValue {
    fn from(value: f32) -> Self {
        SettingValue::Float(f64::from(value))
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::Text(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        SettingValue::Text(value)
    }
}

/// Typed key/value settings partitioned by namespace
pub trait SettingsStore {
    /// Read a raw value
    fn get(&self, namespace: Namespace, key: &str) -> Option<SettingValue>;

    /// Store a raw value
    fn set(&mut self, namespace: Namespace, key: &str, value: SettingValue);

    /// Remove a value, returning the previous one
    fn remove(&mut self, namespace: Namespace, key: &str) -> Option<SettingValue>;

    /// Read a boolean, falling back to `default` when absent or mistyped
    fn get_bool(&self, namespace: Namespace, key: &str, default: bool) -> bool {
        coerce(self.get(namespace, key), namespace, key, default, |v| v.as_bool())
    }

    /// Read a float, falling back to `default` when absent or mistyped
    fn get_f32(&self, namespace: Namespace, key: &str, default: f32) -> f32 {
        coerce(self.get(namespace, key), namespace, key, default, |v| v.as_f32())
    }

    /// Read an integer, falling back to `default` when absent or mistyped
    fn get_i32(&self, namespace: Namespace, key: &str, default: i32) -> i32 {
        coerce(self.get(namespace, key), namespace, key, default, |v| v.as_i32())
    }

    /// Read a string, falling back to `default` when absent or mistyped
    fn get_string(&self, namespace: Namespace, key: &str, default: &str) -> String {
        coerce(self.get(namespace, key), namespace, key, default.to_string(), |v| {
            v.as_str().map(str::to_string)
        })
    }
}

fn coerce<T>(
    value: Option<SettingValue>,
    namespace: Namespace,
    key: &str,
    default: T,
    convert: impl FnOnce(&SettingValue) -> Option<T>,
) -> T {
    match value {
        None => default,
        Some(raw) => match convert(&raw) {
            Some(v) => v,
            None => {
                warn!(
                    "Setting {}/{} has unexpected value {:?}; using default",
                    namespace, key, raw
                );
                default
            }
        },
    }
}

/// In-memory settings store
#[derive(Debug, Clone, Default)]
pub struct MemorySettings {
    values: HashMap<Namespace, BTreeMap<String, SettingValue>>,
}

impl MemorySettings {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored values across all namespaces
    pub fn len(&self) -> usize {
        self.values.values().map(BTreeMap::len).sum()
    }

    /// Check whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every value of a namespace
    pub fn clear_namespace(&mut self, namespace: Namespace) {
        self.values.remove(&namespace);
    }

    fn to_document(&self) -> BTreeMap<String, BTreeMap<String, SettingValue>> {
        self.values
            .iter()
            .map(|(ns, entries)| (ns.as_str().to_string(), entries.clone()))
            .collect()
    }

    fn from_document(doc: BTreeMap<String, BTreeMap<String, SettingValue>>) -> Result<Self> {
        let mut values = HashMap::new();
        for (name, entries) in doc {
            let ns: Namespace = name.parse()?;
            values.insert(ns, entries);
        }
        Ok(Self { values })
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, namespace: Namespace, key: &str) -> Option<SettingValue> {
        self.values.get(&namespace)?.get(key).cloned()
    }

    fn set(&mut self, namespace: Namespace, key: &str, value: SettingValue) {
        self.values
            .entry(namespace)
            .or_default()
            .insert(key.to_string(), value);
    }

    fn remove(&mut self, namespace: Namespace, key: &str) -> Option<SettingValue> {
        self.values.get_mut(&namespace)?.remove(key)
    }
}

/// Settings persisted as a JSON document
///
/// File layout: `{ "dsp_equalizer": { "eq_enable": true, ... }, ... }`.
#[derive(Debug, Clone)]
pub struct JsonSettings {
    path: PathBuf,
    inner: MemorySettings,
}

impl JsonSettings {
    /// Open a settings file; a missing file yields an empty store
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let inner = if path.exists() {
            let text = std::fs::read_to_string(&path)?;
            let doc = serde_json::from_str(&text)?;
            MemorySettings::from_document(doc)?
        } else {
            debug!("Settings file {:?} does not exist yet; starting empty", path);
            MemorySettings::new()
        };

        Ok(Self { path, inner })
    }

    /// Re-read the file, discarding in-memory changes
    pub fn reload(&mut self) -> Result<()> {
        *self = Self::open(&self.path)?;
        Ok(())
    }

    /// Write the current values to disk
    pub fn save(&self) -> Result<()> {
        let text = serde_json::to_string_pretty(&self.inner.to_document())?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, text).map_err(CoreError::from)
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonSettings {
    fn get(&self, namespace: Namespace, key: &str) -> Option<SettingValue> {
        self.inner.get(namespace, key)
    }

    fn set(&mut self, namespace: Namespace, key: &str, value: SettingValue) {
        self.inner.set(namespace, key, value);
    }

    fn remove(&mut self, namespace: Namespace, key: &str) -> Option<SettingValue> {
        self.inner.remove(namespace, key)
    }
}
