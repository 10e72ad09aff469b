use resonant_core::{Namespace, SettingValue};
use std::collections::{BTreeSet, HashMap};

/// Last value seen for every setting
///
/// A namespace counts as changed when any of its keys is seen for the first
/// time or with a different value. Floats compare by bit pattern.
#[derive(Debug, Default)]
pub struct ParameterCache {
    entries: HashMap<(Namespace, String), SettingValue>,
    changed: BTreeSet<Namespace>,
}

impl ParameterCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `value`; true if it differs from what was cached
    pub fn sync(&mut self, namespace: Namespace, key: &str, value: SettingValue) -> bool {
        let slot = (namespace, key.to_string());
        if self.entries.get(&slot) == Some(&value) {
            return false;
        }
        self.entries.insert(slot, value);
        self.changed.insert(namespace);
        true
    }

    /// Namespaces with uncommitted changes, in namespace order
    pub fn changed_namespaces(&self) -> Vec<Namespace> {
        self.changed.iter().copied().collect()
    }

    pub fn is_changed(&self, namespace: Namespace) -> bool {
        self.changed.contains(&namespace)
    }

    pub fn get(&self, namespace: Namespace, key: &str) -> Option<&SettingValue> {
        self.entries.get(&(namespace, key.to_string()))
    }

    /// Forget the pending change set, keeping cached values
    pub fn mark_committed(&mut self) {
        self.changed.clear();
    }

    /// Forget everything; the next sync sees every value as new
    pub fn clear(&mut self) {
        self.entries.clear();
        self.changed.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
