use super::cache::ParameterCache;
use super::snapshot::Snapshot;
use crate::control::DspController;
use resonant_core::{Namespace, SettingsStore};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Outcome of one sync pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Namespaces pushed successfully, in apply order
    pub applied: Vec<Namespace>,
    /// Namespaces whose setter rejected the values
    pub failed: Vec<Namespace>,
}

impl SyncReport {
    /// Nothing was pushed
    pub fn is_empty(&self) -> bool {
        self.applied.is_empty() && self.failed.is_empty()
    }
}

/// Pushes changed settings into a controller
///
/// Namespaces are applied in [`Namespace::ALL`] order, each at most once per
/// pass. Files (impulse responses, DDC, scripts) are only re-read when their
/// namespace is applied.
pub struct ParameterSynchronizer<S: SettingsStore> {
    store: S,
    cache: ParameterCache,
    rate_changed: bool,
    last_rate: Option<f32>,
}

impl<S: SettingsStore> ParameterSynchronizer<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            cache: ParameterCache::new(),
            rate_changed: false,
            last_rate: None,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn cache(&self) -> &ParameterCache {
        &self.cache
    }

    /// Force the rate-dependent namespaces (convolver, DDC) on the next pass
    pub fn notify_sample_rate_changed(&mut self) {
        self.rate_changed = true;
    }

    /// Forget cached values; the next pass re-applies everything
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Run one pass against `target`
    pub fn sync<C: DspController + ?Sized>(&mut self, target: &mut C, force: &[Namespace]) -> SyncReport {
        let mut report = SyncReport::default();
        if !target.is_open() {
            warn!("Skipping sync: engine is closed");
            return report;
        }

        let rate = target.sample_rate();
        if self.last_rate.is_some_and(|last| (last - rate).abs() > f32::EPSILON) {
            debug!("Sample rate moved to {} Hz", rate);
            self.rate_changed = true;
        }
        self.last_rate = Some(rate);

        let snapshots: Vec<Snapshot> = Namespace::ALL
            .iter()
            .map(|ns| Snapshot::read(&self.store, *ns))
            .collect();
        for snapshot in &snapshots {
            let namespace = snapshot.namespace();
            for (key, value) in snapshot.entries() {
                self.cache.sync(namespace, key, value);
            }
        }

        let mut pending: BTreeSet<Namespace> = self.cache.changed_namespaces().into_iter().collect();
        pending.extend(force.iter().copied());
        pending.extend(target.pending_resync());
        if self.rate_changed {
            pending.insert(Namespace::Convolver);
            pending.insert(Namespace::Ddc);
        }

        for snapshot in &snapshots {
            let namespace = snapshot.namespace();
            if !pending.contains(&namespace) {
                continue;
            }
            if snapshot.apply(target) {
                report.applied.push(namespace);
            } else {
                warn!("Applying {} failed", namespace);
                report.failed.push(namespace);
            }
        }

        self.rate_changed = false;
        self.cache.mark_committed();
        if !report.is_empty() {
            info!(
                "Synced {} namespaces ({} failed)",
                report.applied.len() + report.failed.len(),
                report.failed.len()
            );
        }
        report
    }
}
