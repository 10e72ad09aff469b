//! Configuration surface
//!
//! [`DspController`] turns raw setting values into prepared
//! [`ModuleUpdate`]s. Parsing, file reads, filter design, IR decoding and
//! script compilation all happen here, on the caller's thread; the update
//! that reaches the pipeline only carries finished data.
//!
//! Stages whose prepared data depends on the sampling rate (equalizer,
//! graphic EQ, compander, script) keep their last accepted inputs in
//! [`RetainedInputs`], so [`DspController::set_sample_rate`] can redesign
//! them here instead of on the audio thread.
//!
//! Setters return `true` when the change was applied. A rejected change
//! keeps the module's previous state (or disables it when its resource is
//! gone) and is logged. A closed controller rejects everything.

use crate::effects::{
    has_graphic_eq_prefix, impulse_error_code, prepare_graphic_eq, prepare_impulse,
    AdvancedTuning, CompanderDesign, CompanderSettings, ConvolverMode, CrossfeedPreset, CrossfeedSettings,
    DdcDesign, EqDesign, EqSettings, GraphicEqNodeList, StereoConvolver,
};
use crate::error::AudioError;
use crate::events::{ConvolverErrorCode, ProcessorEvent};
use crate::pipeline::ModuleUpdate;
use resonant_core::{FileStore, Namespace};
use resonant_liveprog::LiveprogRuntime;
use std::path::Path;
use tracing::{debug, info, warn};

/// Anything that can receive prepared module updates
pub trait DspController {
    fn is_open(&self) -> bool;

    /// Rate that prepared data is designed for
    fn sample_rate(&self) -> f32;

    fn files(&self) -> &dyn FileStore;

    /// Hand a prepared update to the pipeline
    fn submit(&mut self, update: ModuleUpdate) -> bool;

    /// Raise an event for the host
    fn report(&mut self, event: ProcessorEvent);

    /// Namespaces the module status machine wants pushed again
    fn pending_resync(&mut self) -> Vec<Namespace> {
        Vec::new()
    }

    /// Inputs kept for redesigning rate-dependent stages; `None` opts out
    fn retained(&mut self) -> Option<&mut RetainedInputs> {
        None
    }

    /// Limiter and post gain in one call
    fn set_output_control(&mut self, threshold_db: f32, release_ms: f32, post_gain_db: f32) -> bool {
        let limiter = self.set_limiter(threshold_db, release_ms);
        let gain = self.set_post_gain(post_gain_db);
        limiter && gain
    }

    fn set_limiter(&mut self, threshold_db: f32, release_ms: f32) -> bool {
        if rejected(&*self, "set_limiter") {
            return false;
        }
        self.submit(ModuleUpdate::Limiter {
            threshold_db,
            release_ms,
        })
    }

    fn set_post_gain(&mut self, gain_db: f32) -> bool {
        if rejected(&*self, "set_post_gain") {
            return false;
        }
        self.submit(ModuleUpdate::PostGain(gain_db))
    }

    /// `bands` holds 15 frequencies followed by 15 gains
    fn set_multi_equalizer(
        &mut self,
        enable: bool,
        filter_type: i32,
        interpolation: i32,
        bands: &str,
    ) -> bool {
        if rejected(&*self, "set_multi_equalizer") {
            return false;
        }
        let settings = match EqSettings::parse(filter_type, interpolation, bands) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Equalizer bands rejected: {}", e);
                return false;
            }
        };
        if let Some(retained) = self.retained() {
            retained.equalizer = Some((enable, settings.clone()));
        }
        let update = equalizer_update(enable, settings, self.sample_rate());
        self.submit(update)
    }

    /// `nodes` must carry the `GraphicEQ:` marker; otherwise the stage is
    /// disabled and the call fails
    fn set_graphic_eq(&mut self, enable: bool, nodes: &str) -> bool {
        if rejected(&*self, "set_graphic_eq") {
            return false;
        }
        if !has_graphic_eq_prefix(nodes) {
            warn!("Graphic EQ string has no 'GraphicEQ:' marker; disabling");
            if let Some(retained) = self.retained() {
                retained.graphic_eq = None;
            }
            self.submit(ModuleUpdate::GraphicEq {
                enable: false,
                nodes: Box::default(),
                filter: None,
            });
            return false;
        }

        let list = GraphicEqNodeList::deserialize(nodes);
        if let Some(retained) = self.retained() {
            retained.graphic_eq = Some((enable, list.clone()));
        }
        let update = graphic_eq_update(enable, list, self.sample_rate());
        self.submit(update)
    }

    /// `response` holds 7 frequencies followed by 7 strengths
    fn set_compander(
        &mut self,
        enable: bool,
        time_constant: f32,
        granularity: i32,
        transforms: i32,
        response: &str,
    ) -> bool {
        if rejected(&*self, "set_compander") {
            return false;
        }
        match CompanderSettings::parse(time_constant, granularity, transforms, response) {
            Ok(settings) => {
                if let Some(retained) = self.retained() {
                    retained.compander = Some((enable, settings.clone()));
                }
                let update = compander_update(enable, settings, self.sample_rate());
                self.submit(update)
            }
            Err(e) => {
                warn!("Compander response rejected: {}", e);
                false
            }
        }
    }

    fn set_bass_boost(&mut self, enable: bool, max_gain_db: f32) -> bool {
        if rejected(&*self, "set_bass_boost") {
            return false;
        }
        self.submit(ModuleUpdate::BassBoost {
            enable,
            max_gain_db,
        })
    }

    /// `level` 0..=100, 50 is neutral
    fn set_stereo_enhancement(&mut self, enable: bool, level: f32) -> bool {
        if rejected(&*self, "set_stereo_enhancement") {
            return false;
        }
        self.submit(ModuleUpdate::StereoWidener { enable, level })
    }

    /// Preset crossfeed; use [`Self::set_crossfeed_custom`] for the custom mode
    fn set_crossfeed(&mut self, enable: bool, mode: i32) -> bool {
        if rejected(&*self, "set_crossfeed") {
            return false;
        }
        let settings = CrossfeedSettings::from_preset(CrossfeedPreset::from_mode(mode));
        self.submit(ModuleUpdate::Crossfeed { enable, settings })
    }

    /// Custom crossfeed: cutoff in Hz, feed in 0.1 dB units
    fn set_crossfeed_custom(&mut self, enable: bool, cutoff_hz: i32, feed_tenths_db: i32) -> bool {
        if rejected(&*self, "set_crossfeed_custom") {
            return false;
        }
        let settings = CrossfeedSettings::custom(cutoff_hz, feed_tenths_db);
        self.submit(ModuleUpdate::Crossfeed { enable, settings })
    }

    fn set_vacuum_tube(&mut self, enable: bool, drive: f32) -> bool {
        if rejected(&*self, "set_vacuum_tube") {
            return false;
        }
        self.submit(ModuleUpdate::Tube { enable, drive })
    }

    fn set_reverb(&mut self, enable: bool, preset: i32) -> bool {
        if rejected(&*self, "set_reverb") {
            return false;
        }
        self.submit(ModuleUpdate::Reverb { enable, preset })
    }

    /// Load a DDC file
    ///
    /// A missing file disables the stage and succeeds. A file that does not
    /// parse raises `VdcParseError`, disables the stage and fails.
    fn set_vdc(&mut self, enable: bool, path: &str) -> bool {
        if rejected(&*self, "set_vdc") {
            return false;
        }
        let resolved = self.files().resolve(path);
        if !enable || path.is_empty() || !self.files().is_file(&resolved) {
            if enable {
                warn!("DDC file '{}' not found; disabling", resolved.display());
            }
            return self.submit(ModuleUpdate::Ddc {
                enable: false,
                design: None,
            });
        }

        let parsed = self
            .files()
            .read_to_string(&resolved)
            .map_err(AudioError::from)
            .and_then(|text| DdcDesign::parse(&text));

        match parsed {
            Ok(design) => {
                info!(
                    "Loaded DDC '{}' (rates {:?})",
                    resolved.display(),
                    design.rates()
                );
                self.submit(ModuleUpdate::Ddc {
                    enable: true,
                    design: Some(Box::new(design)),
                })
            }
            Err(e) => {
                warn!("DDC '{}' rejected: {}", resolved.display(), e);
                self.report(ProcessorEvent::VdcParseError);
                self.submit(ModuleUpdate::Ddc {
                    enable: false,
                    design: None,
                });
                false
            }
        }
    }

    /// Load an impulse response
    ///
    /// `advanced` is the six-value tuning string
    /// (`tail;head;left gain;right gain;left delay;right delay`).
    fn set_convolver(&mut self, enable: bool, path: &str, mode: i32, advanced: &str) -> bool {
        if rejected(&*self, "set_convolver") {
            return false;
        }
        let resolved = self.files().resolve(path);
        if !enable || path.is_empty() || !self.files().is_file(&resolved) {
            if enable {
                warn!("Impulse response '{}' not found; disabling", resolved.display());
            }
            return self.submit(ModuleUpdate::Convolver(None));
        }

        let (mut tuning, parse_error) = AdvancedTuning::parse(advanced);
        if let Some(code) = parse_error {
            self.report(ProcessorEvent::ConvolverParseError { code });
        }
        if !tuning.is_valid() {
            warn!("Convolver tuning {:?} out of range; ignoring it", tuning.to_array());
            self.report(ProcessorEvent::ConvolverParseError {
                code: ConvolverErrorCode::AdvParamsInvalid,
            });
            tuning = AdvancedTuning::default();
        }

        match load_impulse(
            self.files(),
            &resolved,
            self.sample_rate(),
            ConvolverMode::from_setting(mode),
            &tuning,
        ) {
            Ok(engine) => {
                info!(
                    "Loaded impulse response '{}' ({} frames)",
                    resolved.display(),
                    engine.frames()
                );
                self.submit(ModuleUpdate::Convolver(Some(Box::new(engine))))
            }
            Err(e) => {
                warn!("Impulse response '{}' rejected: {}", resolved.display(), e);
                self.report(ProcessorEvent::ConvolverParseError {
                    code: impulse_error_code(&e),
                });
                self.submit(ModuleUpdate::Convolver(None));
                false
            }
        }
    }

    /// Load a script
    ///
    /// A missing file installs an empty, disabled stage and succeeds. The
    /// load is bracketed by `LiveprogExec` and `LiveprogResult` events.
    fn set_liveprog(&mut self, enable: bool, path: &str) -> bool {
        if rejected(&*self, "set_liveprog") {
            return false;
        }
        let resolved = self.files().resolve(path);
        if !enable || path.is_empty() || !self.files().is_file(&resolved) {
            if enable {
                warn!("Script '{}' not found; disabling", resolved.display());
            }
            if let Some(retained) = self.retained() {
                retained.liveprog = None;
            }
            return self.submit(ModuleUpdate::Liveprog {
                enable: false,
                id: String::new(),
                vm: None,
            });
        }

        let id = script_id(&resolved, path);
        let source = match self.files().read_to_string(&resolved) {
            Ok(source) => source,
            Err(e) => {
                warn!("Script '{}' unreadable: {}", resolved.display(), e);
                if let Some(retained) = self.retained() {
                    retained.liveprog = None;
                }
                self.submit(ModuleUpdate::Liveprog {
                    enable: false,
                    id: String::new(),
                    vm: None,
                });
                return false;
            }
        };

        self.report(ProcessorEvent::LiveprogExec { id: id.clone() });
        let (vm, outcome) = LiveprogRuntime::prepare(&source, f64::from(self.sample_rate()));
        self.report(ProcessorEvent::LiveprogResult {
            code: outcome.code,
            id: id.clone(),
            error: outcome.error.clone(),
        });

        let loaded = outcome.is_ok();
        info!("Script '{}' loaded (code {})", id, outcome.code);
        if let Some(retained) = self.retained() {
            retained.liveprog = vm.is_some().then(|| RetainedScript {
                enable: loaded,
                id: id.clone(),
                source,
            });
        }
        let submitted = self.submit(ModuleUpdate::Liveprog {
            enable: loaded,
            id,
            vm: vm.map(Box::new),
        });
        submitted && loaded
    }

    /// Announce a new host sampling rate
    ///
    /// Retained equalizer, graphic EQ, compander and script inputs are
    /// redesigned for the new rate and submitted right after the rate.
    /// Convolver and DDC are re-read by the synchronizer instead.
    fn set_sample_rate(&mut self, sample_rate: f32) -> bool {
        if rejected(&*self, "set_sample_rate") {
            return false;
        }
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            warn!("Invalid sample rate {}", sample_rate);
            return false;
        }
        let changed = (self.sample_rate() - sample_rate).abs() > f32::EPSILON;
        if !self.submit(ModuleUpdate::SampleRate(sample_rate)) {
            return false;
        }
        if !changed {
            return true;
        }

        let updates = self
            .retained()
            .map(|retained| retained.redesign(sample_rate))
            .unwrap_or_default();
        if !updates.is_empty() {
            debug!("Redesigning {} stages for {} Hz", updates.len(), sample_rate);
        }
        let mut all = true;
        for update in updates {
            all &= self.submit(update);
        }
        all
    }

    fn set_bypass(&mut self, bypass: bool) -> bool {
        if rejected(&*self, "set_bypass") {
            return false;
        }
        self.submit(ModuleUpdate::Bypass(bypass))
    }
}

/// Last accepted inputs of the rate-dependent stages
#[derive(Debug, Clone, Default)]
pub struct RetainedInputs {
    equalizer: Option<(bool, EqSettings)>,
    graphic_eq: Option<(bool, GraphicEqNodeList)>,
    compander: Option<(bool, CompanderSettings)>,
    liveprog: Option<RetainedScript>,
}

#[derive(Debug, Clone)]
struct RetainedScript {
    enable: bool,
    id: String,
    source: String,
}

impl RetainedInputs {
    /// Prepared updates rebuilding every retained stage for `sample_rate`
    pub fn redesign(&self, sample_rate: f32) -> Vec<ModuleUpdate> {
        let mut updates = Vec::new();
        if let Some((enable, settings)) = &self.equalizer {
            updates.push(equalizer_update(*enable, settings.clone(), sample_rate));
        }
        if let Some((enable, nodes)) = &self.graphic_eq {
            updates.push(graphic_eq_update(*enable, nodes.clone(), sample_rate));
        }
        if let Some((enable, settings)) = &self.compander {
            updates.push(compander_update(*enable, settings.clone(), sample_rate));
        }
        if let Some(script) = &self.liveprog {
            let (vm, outcome) = LiveprogRuntime::prepare(&script.source, f64::from(sample_rate));
            if outcome.is_ok() {
                updates.push(ModuleUpdate::Liveprog {
                    enable: script.enable,
                    id: script.id.clone(),
                    vm: vm.map(Box::new),
                });
            }
        }
        updates
    }

    pub fn is_empty(&self) -> bool {
        self.equalizer.is_none()
            && self.graphic_eq.is_none()
            && self.compander.is_none()
            && self.liveprog.is_none()
    }
}

fn equalizer_update(enable: bool, settings: EqSettings, sample_rate: f32) -> ModuleUpdate {
    let design = EqDesign::prepare(&settings, sample_rate);
    debug!(
        "Equalizer designed at {} Hz ({:?}, latency {} frames)",
        sample_rate,
        settings.filter_type,
        design.latency()
    );
    ModuleUpdate::Equalizer {
        enable,
        settings: Box::new(settings),
        design: Box::new(design),
    }
}

fn graphic_eq_update(enable: bool, nodes: GraphicEqNodeList, sample_rate: f32) -> ModuleUpdate {
    let filter = prepare_graphic_eq(&nodes, sample_rate).map(Box::new);
    debug!("Graphic EQ with {} nodes at {} Hz", nodes.len(), sample_rate);
    ModuleUpdate::GraphicEq {
        enable,
        nodes: Box::new(nodes),
        filter,
    }
}

fn compander_update(enable: bool, settings: CompanderSettings, sample_rate: f32) -> ModuleUpdate {
    let design = CompanderDesign::prepare(&settings, sample_rate);
    ModuleUpdate::Compander {
        enable,
        settings: Box::new(settings),
        design: Box::new(design),
    }
}

fn rejected<C: DspController + ?Sized>(controller: &C, operation: &str) -> bool {
    if controller.is_open() {
        return false;
    }
    warn!("{} called on a closed engine", operation);
    true
}

fn load_impulse(
    files: &dyn FileStore,
    path: &Path,
    sample_rate: f32,
    mode: ConvolverMode,
    tuning: &AdvancedTuning,
) -> Result<StereoConvolver, AudioError> {
    let bytes = files.read_bytes(path)?;
    let ir = prepare_impulse(&bytes, sample_rate, mode, tuning)?;
    Ok(StereoConvolver::new(&ir))
}

fn script_id(resolved: &Path, path: &str) -> String {
    resolved
        .file_name()
        .map_or_else(|| path.to_string(), |name| name.to_string_lossy().into_owned())
}
