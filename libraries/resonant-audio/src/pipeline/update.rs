use crate::effects::{
    CompanderDesign, CompanderSettings, CrossfeedSettings, DdcDesign, EqDesign, EqSettings,
    GraphicEqNodeList, StereoConvolver,
};
use resonant_liveprog::ScriptVm;

/// A prepared configuration change for one stage
///
/// Everything expensive (parsing, filter design, IR decoding, script
/// compilation) has already happened when an update is built; applying it
/// only moves data into the stage.
pub enum ModuleUpdate {
    Limiter {
        threshold_db: f32,
        release_ms: f32,
    },
    PostGain(f32),
    Equalizer {
        enable: bool,
        settings: Box<EqSettings>,
        design: Box<EqDesign>,
    },
    GraphicEq {
        enable: bool,
        nodes: Box<GraphicEqNodeList>,
        filter: Option<Box<StereoConvolver>>,
    },
    Ddc {
        enable: bool,
        design: Option<Box<DdcDesign>>,
    },
    Compander {
        enable: bool,
        settings: Box<CompanderSettings>,
        design: Box<CompanderDesign>,
    },
    BassBoost {
        enable: bool,
        max_gain_db: f32,
    },
    StereoWidener {
        enable: bool,
        level: f32,
    },
    Crossfeed {
        enable: bool,
        settings: CrossfeedSettings,
    },
    Tube {
        enable: bool,
        drive: f32,
    },
    Reverb {
        enable: bool,
        preset: i32,
    },
    /// `None` disables the convolver with an empty IR
    Convolver(Option<Box<StereoConvolver>>),
    Liveprog {
        enable: bool,
        id: String,
        vm: Option<Box<ScriptVm>>,
    },
    SampleRate(f32),
    Bypass(bool),
}

impl ModuleUpdate {
    /// Short label for logs
    pub fn label(&self) -> &'static str {
        match self {
            ModuleUpdate::Limiter { .. } => "limiter",
            ModuleUpdate::PostGain(_) => "post_gain",
            ModuleUpdate::Equalizer { .. } => "equalizer",
            ModuleUpdate::GraphicEq { .. } => "graphic_eq",
            ModuleUpdate::Ddc { .. } => "ddc",
            ModuleUpdate::Compander { .. } => "compander",
            ModuleUpdate::BassBoost { .. } => "bass_boost",
            ModuleUpdate::StereoWidener { .. } => "stereo_widener",
            ModuleUpdate::Crossfeed { .. } => "crossfeed",
            ModuleUpdate::Tube { .. } => "tube",
            ModuleUpdate::Reverb { .. } => "reverb",
            ModuleUpdate::Convolver(_) => "convolver",
            ModuleUpdate::Liveprog { .. } => "liveprog",
            ModuleUpdate::SampleRate(_) => "sample_rate",
            ModuleUpdate::Bypass(_) => "bypass",
        }
    }
}

impl std::fmt::Debug for ModuleUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ModuleUpdate::{}", self.label())
    }
}

/// Data a stage let go of when an update was applied
///
/// Dropping it frees memory, so the realtime split hands it back to the
/// control thread instead of dropping it in the audio callback.
pub enum Retired {
    Equalizer {
        settings: Option<Box<EqSettings>>,
        design: Box<EqDesign>,
    },
    GraphicEq {
        nodes: Box<GraphicEqNodeList>,
        filter: Option<Box<StereoConvolver>>,
    },
    Ddc(Option<Box<DdcDesign>>),
    Compander {
        settings: Option<Box<CompanderSettings>>,
        design: Box<CompanderDesign>,
    },
    Convolver(Option<Box<StereoConvolver>>),
    Liveprog {
        id: String,
        vm: Option<Box<ScriptVm>>,
    },
}

impl Retired {
    pub fn label(&self) -> &'static str {
        match self {
            Retired::Equalizer { .. } => "equalizer",
            Retired::GraphicEq { .. } => "graphic_eq",
            Retired::Ddc(_) => "ddc",
            Retired::Compander { .. } => "compander",
            Retired::Convolver(_) => "convolver",
            Retired::Liveprog { .. } => "liveprog",
        }
    }
}

impl std::fmt::Debug for Retired {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Retired::{}", self.label())
    }
}
