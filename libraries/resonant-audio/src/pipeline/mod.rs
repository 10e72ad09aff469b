//! Processing pipeline
//!
//! Owns one instance of every effect module and runs them in a fixed order
//! over interleaved stereo `f32` frames.
//!
//! # Real-Time Safety
//! - `process()` does not allocate, lock or log
//! - `apply()` only swaps prepared data into a module and returns the
//!   replaced data as [`Retired`], so the caller chooses where it is freed
//! - Events raised while processing go into a preallocated queue

mod module;
mod status;
mod update;

pub use module::ModuleId;
pub use status::{ModuleObservation, ModuleStatus};
pub use update::{ModuleUpdate, Retired};

use crate::effects::{
    AudioEffect, BassBoost, Compander, Convolver, Crossfeed, Ddc, GraphicEq, Liveprog,
    MultiEqualizer, OutputControl, Reverb, StereoWidener, VacuumTube,
};
use crate::events::ProcessorEvent;
use resonant_core::Namespace;
use std::collections::BTreeSet;

const EVENT_CAPACITY: usize = 64;

/// Default sampling rate until the host announces one
pub const DEFAULT_SAMPLE_RATE: f32 = 48000.0;

/// The effect chain
pub struct Pipeline {
    output: OutputControl,
    equalizer: MultiEqualizer,
    graphic_eq: GraphicEq,
    ddc: Ddc,
    compander: Compander,
    bass_boost: BassBoost,
    stereo: StereoWidener,
    crossfeed: Crossfeed,
    tube: VacuumTube,
    convolver: Convolver,
    reverb: Reverb,
    liveprog: Liveprog,
    status: [ModuleStatus; 12],
    bypass: bool,
    sample_rate: f32,
    events: Vec<ProcessorEvent>,
    resync: BTreeSet<Namespace>,
}

impl Pipeline {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            output: OutputControl::new(sample_rate),
            equalizer: MultiEqualizer::new(),
            graphic_eq: GraphicEq::new(),
            ddc: Ddc::new(sample_rate),
            compander: Compander::new(sample_rate),
            bass_boost: BassBoost::new(sample_rate),
            stereo: StereoWidener::new(),
            crossfeed: Crossfeed::new(sample_rate),
            tube: VacuumTube::new(),
            convolver: Convolver::new(),
            reverb: Reverb::new(sample_rate),
            liveprog: Liveprog::new(sample_rate),
            status: [ModuleStatus::Enabled; 12],
            bypass: false,
            sample_rate,
            events: Vec::with_capacity(EVENT_CAPACITY),
            resync: BTreeSet::new(),
        }
    }

    /// Run every active module over `buffer` (interleaved stereo)
    ///
    /// A trailing odd sample is left untouched.
    pub fn process(&mut self, buffer: &mut [f32]) {
        if self.bypass {
            return;
        }

        let len = buffer.len() - buffer.len() % 2;
        let frames = &mut buffer[..len];

        for id in ModuleId::PROCESSING_ORDER {
            if self.status[id.index()] == ModuleStatus::ControlLost {
                continue;
            }
            let module = self.module_mut(id);
            if module.is_enabled() {
                module.process(frames);
            }
        }
    }

    /// Swap a prepared configuration into its module
    ///
    /// Returns whatever heap data the module held before, if any; nothing is
    /// freed here.
    pub fn apply(&mut self, update: ModuleUpdate) -> Option<Retired> {
        match update {
            ModuleUpdate::Limiter {
                threshold_db,
                release_ms,
            } => self.output.set_limiter(threshold_db, release_ms),
            ModuleUpdate::PostGain(gain_db) => self.output.set_post_gain(gain_db),
            ModuleUpdate::Equalizer {
                enable,
                settings,
                design,
            } => {
                let (settings, design) = self.equalizer.install(enable, settings, design);
                return Some(Retired::Equalizer { settings, design });
            }
            ModuleUpdate::GraphicEq {
                enable,
                nodes,
                filter,
            } => {
                let (nodes, filter) = self.graphic_eq.install(enable, nodes, filter);
                return Some(Retired::GraphicEq { nodes, filter });
            }
            ModuleUpdate::Ddc { enable, design } => {
                return Some(Retired::Ddc(self.ddc.install(enable, design)));
            }
            ModuleUpdate::Compander {
                enable,
                settings,
                design,
            } => {
                let (settings, design) = self.compander.install(enable, settings, design);
                return Some(Retired::Compander { settings, design });
            }
            ModuleUpdate::BassBoost {
                enable,
                max_gain_db,
            } => {
                self.bass_boost.set_max_gain(max_gain_db);
                self.bass_boost.set_enabled(enable);
            }
            ModuleUpdate::StereoWidener { enable, level } => {
                self.stereo.set_level(level);
                self.stereo.set_enabled(enable);
            }
            ModuleUpdate::Crossfeed { enable, settings } => {
                self.crossfeed.set_settings(settings);
                self.crossfeed.set_enabled(enable);
            }
            ModuleUpdate::Tube { enable, drive } => {
                self.tube.set_drive(drive);
                self.tube.set_enabled(enable);
            }
            ModuleUpdate::Reverb { enable, preset } => {
                self.reverb.set_preset(preset);
                self.reverb.set_enabled(enable);
            }
            ModuleUpdate::Convolver(engine) => {
                return Some(Retired::Convolver(self.convolver.install(engine)));
            }
            ModuleUpdate::Liveprog { enable, id, vm } => {
                let (id, vm) = self.liveprog.install(enable, id, vm);
                return Some(Retired::Liveprog { id, vm });
            }
            ModuleUpdate::SampleRate(rate) => self.set_sample_rate(rate),
            ModuleUpdate::Bypass(bypass) => self.bypass = bypass,
        }
        None
    }

    /// Push a new sampling rate into every module
    ///
    /// Non-positive or non-finite rates are ignored.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return;
        }
        let changed = (self.sample_rate - sample_rate).abs() > f32::EPSILON;
        self.sample_rate = sample_rate;

        for id in ModuleId::PROCESSING_ORDER {
            self.module_mut(id).set_sample_rate(sample_rate);
        }
        if changed {
            self.report(ProcessorEvent::SampleRateChanged { sample_rate });
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn set_bypass(&mut self, bypass: bool) {
        self.bypass = bypass;
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypass
    }

    /// Feed a polled observation into a module's status machine
    ///
    /// Returns the new status. Entering `Reenabling` queues the module's
    /// namespace for a forced re-sync.
    pub fn observe(&mut self, id: ModuleId, observation: ModuleObservation) -> ModuleStatus {
        let from = self.status[id.index()];
        let to = from.next(observation);
        if from != to {
            self.status[id.index()] = to;
            self.report(ProcessorEvent::ModuleStatusChanged {
                module: id,
                from,
                to,
            });
            if to == ModuleStatus::Reenabling {
                self.resync.insert(id.namespace());
            }
        }
        to
    }

    pub fn module_status(&self, id: ModuleId) -> ModuleStatus {
        self.status[id.index()]
    }

    /// Namespaces waiting for a forced re-sync, in namespace order
    pub fn take_resync(&mut self) -> Vec<Namespace> {
        std::mem::take(&mut self.resync).into_iter().collect()
    }

    /// Queued events, oldest first, plus any pending script output
    pub fn drain_events(&mut self) -> Vec<ProcessorEvent> {
        if let Some(message) = self.liveprog.runtime_mut().take_output() {
            self.events.push(ProcessorEvent::LiveprogOutput { message });
        }
        self.events.drain(..).collect()
    }

    /// Clear filter state in every module
    pub fn reset(&mut self) {
        for id in ModuleId::PROCESSING_ORDER {
            self.module_mut(id).reset();
        }
    }

    pub fn module(&self, id: ModuleId) -> &dyn AudioEffect {
        match id {
            ModuleId::OutputControl => &self.output,
            ModuleId::Equalizer => &self.equalizer,
            ModuleId::GraphicEq => &self.graphic_eq,
            ModuleId::Ddc => &self.ddc,
            ModuleId::Compander => &self.compander,
            ModuleId::BassBoost => &self.bass_boost,
            ModuleId::StereoWidener => &self.stereo,
            ModuleId::Crossfeed => &self.crossfeed,
            ModuleId::Tube => &self.tube,
            ModuleId::Convolver => &self.convolver,
            ModuleId::Reverb => &self.reverb,
            ModuleId::Liveprog => &self.liveprog,
        }
    }

    pub fn module_mut(&mut self, id: ModuleId) -> &mut dyn AudioEffect {
        match id {
            ModuleId::OutputControl => &mut self.output,
            ModuleId::Equalizer => &mut self.equalizer,
            ModuleId::GraphicEq => &mut self.graphic_eq,
            ModuleId::Ddc => &mut self.ddc,
            ModuleId::Compander => &mut self.compander,
            ModuleId::BassBoost => &mut self.bass_boost,
            ModuleId::StereoWidener => &mut self.stereo,
            ModuleId::Crossfeed => &mut self.crossfeed,
            ModuleId::Tube => &mut self.tube,
            ModuleId::Convolver => &mut self.convolver,
            ModuleId::Reverb => &mut self.reverb,
            ModuleId::Liveprog => &mut self.liveprog,
        }
    }

    pub fn output_control(&self) -> &OutputControl {
        &self.output
    }

    pub fn equalizer(&self) -> &MultiEqualizer {
        &self.equalizer
    }

    pub fn graphic_eq(&self) -> &GraphicEq {
        &self.graphic_eq
    }

    pub fn ddc(&self) -> &Ddc {
        &self.ddc
    }

    pub fn compander(&self) -> &Compander {
        &self.compander
    }

    pub fn convolver(&self) -> &Convolver {
        &self.convolver
    }

    pub fn reverb(&self) -> &Reverb {
        &self.reverb
    }

    pub fn liveprog(&self) -> &Liveprog {
        &self.liveprog
    }

    pub fn liveprog_mut(&mut self) -> &mut Liveprog {
        &mut self.liveprog
    }

    /// Queue an event for the host
    pub fn report(&mut self, event: ProcessorEvent) {
        // Oldest events win once the host stops draining
        if self.events.len() < EVENT_CAPACITY {
            self.events.push(event);
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resonant_liveprog::LiveprogRuntime;

    fn quiet_pipeline() -> Pipeline {
        let mut pipeline = Pipeline::new(48000.0);
        // Unity gain, limiter far above the test signal
        pipeline.apply(ModuleUpdate::Limiter {
            threshold_db: 20.0,
            release_ms: 60.0,
        });
        pipeline
    }

    fn lost() -> ModuleObservation {
        ModuleObservation {
            enabled: true,
            has_control: false,
        }
    }

    fn back() -> ModuleObservation {
        ModuleObservation {
            enabled: true,
            has_control: true,
        }
    }

    #[test]
    fn only_output_control_starts_enabled() {
        let pipeline = Pipeline::default();
        for id in ModuleId::PROCESSING_ORDER {
            assert_eq!(
                pipeline.module(id).is_enabled(),
                id == ModuleId::OutputControl,
                "{id}"
            );
        }
    }

    #[test]
    fn bypass_leaves_buffer_untouched() {
        let mut pipeline = Pipeline::new(48000.0);
        pipeline.apply(ModuleUpdate::Tube {
            enable: true,
            drive: 12.0,
        });
        pipeline.set_bypass(true);

        let original: Vec<f32> = (0..256).map(|i| ((i as f32) * 0.1).sin() * 0.9).collect();
        let mut buffer = original.clone();
        pipeline.process(&mut buffer);
        assert_eq!(buffer, original);
    }

    #[test]
    fn apply_hands_back_displaced_data() {
        use crate::effects::{ImpulseResponse, StereoConvolver};

        let mut pipeline = Pipeline::new(48000.0);
        let first = ImpulseResponse::new(1, 48000.0, vec![0.5, 0.25, 0.125]).unwrap();
        let second = ImpulseResponse::dirac(2, 48000.0);

        let load = |ir: &ImpulseResponse| {
            ModuleUpdate::Convolver(Some(Box::new(StereoConvolver::new(ir))))
        };

        let retired = pipeline.apply(load(&first));
        assert!(matches!(retired, Some(Retired::Convolver(None))));

        let retired = pipeline.apply(load(&second));
        match retired {
            Some(Retired::Convolver(Some(old))) => assert_eq!(old.frames(), 3),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(pipeline.convolver().frames(), 1);

        assert!(pipeline.apply(ModuleUpdate::PostGain(-3.0)).is_none());
    }

    #[test]
    fn trailing_odd_sample_passes_through() {
        let mut pipeline = quiet_pipeline();
        pipeline.apply(ModuleUpdate::PostGain(-6.0));
        for _ in 0..8 {
            let mut warmup = vec![0.5f32; 512];
            pipeline.process(&mut warmup);
        }

        let mut buffer = vec![0.5f32; 5];
        pipeline.process(&mut buffer);
        assert!(buffer[0] < 0.3);
        assert_eq!(buffer[4], 0.5);
    }

    #[test]
    fn control_lost_module_is_skipped() {
        let (vm, outcome) = LiveprogRuntime::prepare("@sample\nspl0 = 0; spl1 = 0;", 48000.0);
        assert!(outcome.is_ok());

        let mut pipeline = quiet_pipeline();
        pipeline.apply(ModuleUpdate::Liveprog {
            enable: true,
            id: "mute.eel".to_string(),
            vm: vm.map(Box::new),
        });

        let mut buffer = vec![0.25f32; 8];
        pipeline.process(&mut buffer);
        assert!(buffer.iter().all(|s| *s == 0.0));

        pipeline.observe(ModuleId::Liveprog, lost());
        let mut buffer = vec![0.25f32; 8];
        pipeline.process(&mut buffer);
        assert!(buffer.iter().all(|s| (*s - 0.25).abs() < 1e-6));

        // Reenabling modules process again
        pipeline.observe(ModuleId::Liveprog, back());
        assert_eq!(pipeline.module_status(ModuleId::Liveprog), ModuleStatus::Reenabling);
        let mut buffer = vec![0.25f32; 8];
        pipeline.process(&mut buffer);
        assert!(buffer.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn status_changes_raise_events_and_queue_resync() {
        let mut pipeline = Pipeline::default();
        pipeline.observe(ModuleId::Convolver, lost());
        pipeline.observe(ModuleId::Convolver, back());
        // Staying put raises nothing
        pipeline.observe(ModuleId::Equalizer, back());

        let events = pipeline.drain_events();
        assert_eq!(
            events,
            vec![
                ProcessorEvent::ModuleStatusChanged {
                    module: ModuleId::Convolver,
                    from: ModuleStatus::Enabled,
                    to: ModuleStatus::ControlLost,
                },
                ProcessorEvent::ModuleStatusChanged {
                    module: ModuleId::Convolver,
                    from: ModuleStatus::ControlLost,
                    to: ModuleStatus::Reenabling,
                },
            ]
        );
        assert_eq!(pipeline.take_resync(), vec![Namespace::Convolver]);
        assert!(pipeline.take_resync().is_empty());
        assert!(pipeline.drain_events().is_empty());
    }

    #[test]
    fn sample_rate_change_reaches_modules_and_raises_event() {
        let mut pipeline = Pipeline::new(44100.0);
        pipeline.set_sample_rate(44100.0);
        assert!(pipeline.drain_events().is_empty());

        pipeline.apply(ModuleUpdate::SampleRate(96000.0));
        assert_eq!(pipeline.sample_rate(), 96000.0);
        assert_eq!(
            pipeline.drain_events(),
            vec![ProcessorEvent::SampleRateChanged {
                sample_rate: 96000.0
            }]
        );

        pipeline.set_sample_rate(0.0);
        pipeline.set_sample_rate(f32::NAN);
        assert_eq!(pipeline.sample_rate(), 96000.0);
    }

    #[test]
    fn script_output_is_drained_as_event() {
        let (vm, _) = LiveprogRuntime::prepare("@sample\nprintf(\"hi\");", 48000.0);
        let mut pipeline = quiet_pipeline();
        pipeline.apply(ModuleUpdate::Liveprog {
            enable: true,
            id: "talk.eel".to_string(),
            vm: vm.map(Box::new),
        });

        let mut buffer = vec![0.0f32; 2];
        pipeline.process(&mut buffer);

        assert_eq!(
            pipeline.drain_events(),
            vec![ProcessorEvent::LiveprogOutput {
                message: "hi".to_string()
            }]
        );
    }

    #[test]
    fn event_queue_is_bounded() {
        let mut pipeline = Pipeline::default();
        for i in 0..(EVENT_CAPACITY * 2) {
            pipeline.set_sample_rate(40000.0 + i as f32);
        }
        assert_eq!(pipeline.drain_events().len(), EVENT_CAPACITY);
    }
}
