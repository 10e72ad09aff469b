//! Per-module control status
//!
//! Hosts that share audio effects with other applications can lose control
//! of a module. The host polls each module and reports what it saw; the
//! status machine turns those observations into transitions.
//!
//! - `Enabled` -> `ControlLost` when control is lost
//! - `ControlLost` -> `Reenabling` when control comes back
//! - `Reenabling` -> `Enabled` once the module reports enabled with control
//! - `Reenabling` -> `ControlLost` when control is lost again

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleStatus {
    #[default]
    Enabled,
    /// Another client owns the module; it is skipped while processing
    ControlLost,
    /// Control is back, settings must be pushed again
    Reenabling,
}

/// What the host observed when polling a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleObservation {
    pub enabled: bool,
    pub has_control: bool,
}

impl ModuleStatus {
    /// Status after `observation`
    pub fn next(self, observation: ModuleObservation) -> ModuleStatus {
        match (self, observation.has_control) {
            (ModuleStatus::Enabled, false) => ModuleStatus::ControlLost,
            (ModuleStatus::ControlLost, true) => ModuleStatus::Reenabling,
            (ModuleStatus::Reenabling, false) => ModuleStatus::ControlLost,
            (ModuleStatus::Reenabling, true) if observation.enabled => ModuleStatus::Enabled,
            (status, _) => status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOST: ModuleObservation = ModuleObservation {
        enabled: true,
        has_control: false,
    };
    const BACK_DISABLED: ModuleObservation = ModuleObservation {
        enabled: false,
        has_control: true,
    };
    const BACK_ENABLED: ModuleObservation = ModuleObservation {
        enabled: true,
        has_control: true,
    };

    #[test]
    fn full_cycle() {
        let status = ModuleStatus::Enabled;
        let status = status.next(LOST);
        assert_eq!(status, ModuleStatus::ControlLost);
        let status = status.next(BACK_DISABLED);
        assert_eq!(status, ModuleStatus::Reenabling);
        let status = status.next(BACK_DISABLED);
        assert_eq!(status, ModuleStatus::Reenabling);
        let status = status.next(BACK_ENABLED);
        assert_eq!(status, ModuleStatus::Enabled);
    }

    #[test]
    fn losing_control_while_reenabling() {
        assert_eq!(
            ModuleStatus::Reenabling.next(LOST),
            ModuleStatus::ControlLost
        );
    }

    #[test]
    fn steady_states() {
        assert_eq!(ModuleStatus::Enabled.next(BACK_ENABLED), ModuleStatus::Enabled);
        assert_eq!(ModuleStatus::Enabled.next(BACK_DISABLED), ModuleStatus::Enabled);
        assert_eq!(ModuleStatus::ControlLost.next(LOST), ModuleStatus::ControlLost);
    }
}
