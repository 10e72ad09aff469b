use resonant_core::Namespace;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline stage identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleId {
    OutputControl,
    Equalizer,
    GraphicEq,
    Ddc,
    Compander,
    BassBoost,
    StereoWidener,
    Crossfeed,
    Tube,
    Convolver,
    Reverb,
    Liveprog,
}

impl ModuleId {
    /// Stages in the order audio flows through them
    pub const PROCESSING_ORDER: [ModuleId; 12] = [
        ModuleId::OutputControl,
        ModuleId::Equalizer,
        ModuleId::GraphicEq,
        ModuleId::Ddc,
        ModuleId::Compander,
        ModuleId::BassBoost,
        ModuleId::StereoWidener,
        ModuleId::Crossfeed,
        ModuleId::Tube,
        ModuleId::Convolver,
        ModuleId::Reverb,
        ModuleId::Liveprog,
    ];

    /// Position in [`Self::PROCESSING_ORDER`]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Settings namespace configuring this stage
    pub fn namespace(self) -> Namespace {
        match self {
            ModuleId::OutputControl => Namespace::OutputControl,
            ModuleId::Equalizer => Namespace::Equalizer,
            ModuleId::GraphicEq => Namespace::GraphicEq,
            ModuleId::Ddc => Namespace::Ddc,
            ModuleId::Compander => Namespace::Compander,
            ModuleId::BassBoost => Namespace::Bass,
            ModuleId::StereoWidener => Namespace::StereoWide,
            ModuleId::Crossfeed => Namespace::Crossfeed,
            ModuleId::Tube => Namespace::Tube,
            ModuleId::Convolver => Namespace::Convolver,
            ModuleId::Reverb => Namespace::Reverb,
            ModuleId::Liveprog => Namespace::Liveprog,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ModuleId::OutputControl => "output_control",
            ModuleId::Equalizer => "equalizer",
            ModuleId::GraphicEq => "graphic_eq",
            ModuleId::Ddc => "ddc",
            ModuleId::Compander => "compander",
            ModuleId::BassBoost => "bass_boost",
            ModuleId::StereoWidener => "stereo_widener",
            ModuleId::Crossfeed => "crossfeed",
            ModuleId::Tube => "tube",
            ModuleId::Convolver => "convolver",
            ModuleId::Reverb => "reverb",
            ModuleId::Liveprog => "liveprog",
        }
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_matches_processing_order() {
        for (position, id) in ModuleId::PROCESSING_ORDER.iter().enumerate() {
            assert_eq!(id.index(), position);
        }
    }

    #[test]
    fn every_namespace_has_one_module() {
        let mut namespaces: Vec<Namespace> = ModuleId::PROCESSING_ORDER
            .iter()
            .map(|id| id.namespace())
            .collect();
        namespaces.sort();
        namespaces.dedup();
        assert_eq!(namespaces.len(), Namespace::ALL.len());
    }
}
