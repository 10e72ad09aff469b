//! Settings namespaces
//!
//! Every effect module reads its parameters from one namespace of the settings
//! store. The synchronizer tracks changes per namespace, so a module is
//! reconfigured at most once per settings pass no matter how many of its keys
//! changed.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Settings namespace, one per configurable module group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    /// Post gain and limiter
    OutputControl,
    /// Multiband compander
    Compander,
    /// Dynamic bass boost
    Bass,
    /// 15-band multi equalizer
    Equalizer,
    /// Arbitrary response graphic equalizer
    GraphicEq,
    /// Reverb
    Reverb,
    /// Stereo widener
    StereoWide,
    /// Crossfeed
    Crossfeed,
    /// Vacuum tube saturation
    Tube,
    /// Headphone correction (DDC/VDC files)
    Ddc,
    /// User scripts
    Liveprog,
    /// Convolver
    Convolver,
}

impl Namespace {
    /// All namespaces in the order the synchronizer applies them
    pub const ALL: [Namespace; 12] = [
        Namespace::OutputControl,
        Namespace::Compander,
        Namespace::Bass,
        Namespace::Equalizer,
        Namespace::GraphicEq,
        Namespace::Reverb,
        Namespace::StereoWide,
        Namespace::Crossfeed,
        Namespace::Tube,
        Namespace::Ddc,
        Namespace::Liveprog,
        Namespace::Convolver,
    ];

    /// Storage name of the namespace
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::OutputControl => "dsp_output_control",
            Namespace::Compander => "dsp_compander",
            Namespace::Bass => "dsp_bass",
            Namespace::Equalizer => "dsp_equalizer",
            Namespace::GraphicEq => "dsp_graphiceq",
            Namespace::Reverb => "dsp_reverb",
            Namespace::StereoWide => "dsp_stereowide",
            Namespace::Crossfeed => "dsp_crossfeed",
            Namespace::Tube => "dsp_tube",
            Namespace::Ddc => "dsp_ddc",
            Namespace::Liveprog => "dsp_liveprog",
            Namespace::Convolver => "dsp_convolver",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Namespace {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Namespace::ALL
            .iter()
            .copied()
            .find(|ns| ns.as_str() == s)
            .ok_or_else(|| CoreError::UnknownNamespace(s.to_string()))
    }
}

/// Setting keys, grouped by namespace
pub mod keys {
    // dsp_output_control
    pub const OUTPUT_POSTGAIN: &str = "output_postgain";
    pub const LIMITER_THRESHOLD: &str = "limiter_threshold";
    pub const LIMITER_RELEASE: &str = "limiter_release";

    // dsp_compander
    pub const COMPANDER_ENABLE: &str = "compander_enable";
    pub const COMPANDER_TIMECONSTANT: &str = "compander_timeconstant";
    pub const COMPANDER_GRANULARITY: &str = "compander_granularity";
    pub const COMPANDER_TFTRANSFORMS: &str = "compander_tftransforms";
    pub const COMPANDER_RESPONSE: &str = "compander_response";

    // dsp_bass
    pub const BASS_ENABLE: &str = "bass_enable";
    pub const BASS_MAX_GAIN: &str = "bass_max_gain";

    // dsp_equalizer
    pub const EQ_ENABLE: &str = "eq_enable";
    pub const EQ_FILTER_TYPE: &str = "eq_filter_type";
    pub const EQ_INTERPOLATION: &str = "eq_interpolation";
    pub const EQ_BANDS: &str = "eq_bands";

    // dsp_graphiceq
    pub const GEQ_ENABLE: &str = "geq_enable";
    pub const GEQ_NODES: &str = "geq_nodes";

    // dsp_reverb
    pub const REVERB_ENABLE: &str = "reverb_enable";
    pub const REVERB_PRESET: &str = "reverb_preset";

    // dsp_stereowide
    pub const STEREOWIDE_ENABLE: &str = "stereowide_enable";
    pub const STEREOWIDE_MODE: &str = "stereowide_mode";

    // dsp_crossfeed
    pub const CROSSFEED_ENABLE: &str = "crossfeed_enable";
    pub const CROSSFEED_MODE: &str = "crossfeed_mode";
    pub const CROSSFEED_CUSTOM_FCUT: &str = "crossfeed_custom_fcut";
    pub const CROSSFEED_CUSTOM_FEED: &str = "crossfeed_custom_feed";

    // dsp_tube
    pub const TUBE_ENABLE: &str = "tube_enable";
    pub const TUBE_DRIVE: &str = "tube_drive";

    // dsp_ddc
    pub const DDC_ENABLE: &str = "ddc_enable";
    pub const DDC_FILE: &str = "ddc_file";

    // dsp_liveprog
    pub const LIVEPROG_ENABLE: &str = "liveprog_enable";
    pub const LIVEPROG_FILE: &str = "liveprog_file";

    // dsp_convolver
    pub const CONVOLVER_ENABLE: &str = "convolver_enable";
    pub const CONVOLVER_FILE: &str = "convolver_file";
    pub const CONVOLVER_ADV_IMP: &str = "convolver_adv_imp";
    pub const CONVOLVER_MODE: &str = "convolver_mode";
}

/// Default values used when a key is absent from the settings store
pub mod defaults {
    pub const OUTPUT_POSTGAIN: f32 = 0.0;
    pub const LIMITER_THRESHOLD: f32 = -0.1;
    pub const LIMITER_RELEASE: f32 = 60.0;

    pub const COMPANDER_TIMECONSTANT: f32 = 0.22;
    pub const COMPANDER_GRANULARITY: i32 = 2;
    pub const COMPANDER_TFTRANSFORMS: i32 = 0;
    pub const COMPANDER_RESPONSE: &str =
        "95.0;200.0;400.0;800.0;1600.0;3400.0;7500.0;0;0;0;0;0;0;0";

    pub const BASS_MAX_GAIN: f32 = 5.0;

    pub const EQ_FILTER_TYPE: i32 = 0;
    pub const EQ_INTERPOLATION: i32 = 0;
    pub const EQ_BANDS: &str = "25.0;40.0;63.0;100.0;160.0;250.0;400.0;630.0;1000.0;1600.0;2500.0;4000.0;6300.0;10000.0;16000.0;0.0;0.0;0.0;0.0;0.0;0.0;0.0;0.0;0.0;0.0;0.0;0.0;0.0;0.0;0.0";

    pub const GEQ_NODES: &str = "GraphicEQ: 0.0 0.0;";

    pub const REVERB_PRESET: i32 = 0;

    pub const STEREOWIDE_MODE: f32 = 60.0;

    pub const CROSSFEED_MODE: i32 = 0;
    pub const CROSSFEED_CUSTOM_FCUT: i32 = 700;
    pub const CROSSFEED_CUSTOM_FEED: i32 = 60;

    pub const TUBE_DRIVE: f32 = 2.0;

    pub const CONVOLVER_ADV_IMP: &str = "-80;-100;0;0;0;0";
    pub const CONVOLVER_MODE: i32 = 0;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_names_round_trip() {
        for ns in Namespace::ALL {
            let parsed: Namespace = ns.as_str().parse().unwrap();
            assert_eq!(parsed, ns);
        }
    }

    #[test]
    fn unknown_namespace_is_rejected() {
        assert!("dsp_unknown".parse::<Namespace>().is_err());
    }

    #[test]
    fn default_eq_has_thirty_fields() {
        assert_eq!(defaults::EQ_BANDS.split(';').count(), 30);
        assert_eq!(defaults::COMPANDER_RESPONSE.split(';').count(), 14);
    }
}
