//! Engine handle
//!
//! One [`Engine`] owns one pipeline. Processing and configuration both take
//! `&mut self`; a host that shares the engine between threads serializes
//! access itself, or uses [`crate::realtime::split`] instead.
//!
//! After [`Engine::close`] every processing call copies input to output and
//! every configuration call returns `false`.

use crate::codec::{pass_through, Codec, Sample};
use crate::control::{DspController, RetainedInputs};
use crate::events::ProcessorEvent;
use crate::pipeline::{ModuleId, ModuleObservation, ModuleStatus, ModuleUpdate, Pipeline};
use resonant_core::{EngineConfig, FileStore, LocalFileStore, Namespace};
use resonant_liveprog::{ScriptRuntime, ScriptVariable};
use std::sync::Arc;
use tracing::{info, warn};

struct EngineCore {
    pipeline: Pipeline,
    codec: Codec,
    retained: RetainedInputs,
}

/// DSP engine handle
pub struct Engine {
    core: Option<Box<EngineCore>>,
    files: Arc<dyn FileStore>,
}

impl Engine {
    pub fn new(sample_rate: f32, files: Arc<dyn FileStore>) -> Self {
        info!("Creating engine at {} Hz", sample_rate);
        Self {
            core: Some(Box::new(EngineCore {
                pipeline: Pipeline::new(sample_rate),
                codec: Codec::new(),
                retained: RetainedInputs::default(),
            })),
            files,
        }
    }

    /// Engine at the configured rate, resolving files against the library root
    pub fn from_config(config: &EngineConfig) -> Self {
        let files = Arc::new(LocalFileStore::new(config.library.root.clone()));
        Self::new(config.engine.sample_rate, files)
    }

    pub fn process_i16(&mut self, input: &[i16], output: &mut [i16]) {
        self.process(input, output);
    }

    pub fn process_i32(&mut self, input: &[i32], output: &mut [i32]) {
        self.process(input, output);
    }

    pub fn process_f32(&mut self, input: &[f32], output: &mut [f32]) {
        self.process(input, output);
    }

    fn process<T: Sample>(&mut self, input: &[T], output: &mut [T]) {
        match self.core.as_deref_mut() {
            Some(core) if !core.pipeline.is_bypassed() => {
                let pipeline = &mut core.pipeline;
                core.codec.run(input, output, |buffer| pipeline.process(buffer));
            }
            _ => pass_through(input, output),
        }
    }

    /// Release the pipeline; returns false if it was already closed
    pub fn close(&mut self) -> bool {
        match self.core.take() {
            Some(_) => {
                info!("Engine closed");
                true
            }
            None => false,
        }
    }

    /// Events raised since the last drain, oldest first
    pub fn drain_events(&mut self) -> Vec<ProcessorEvent> {
        self.core
            .as_mut()
            .map(|core| core.pipeline.drain_events())
            .unwrap_or_default()
    }

    /// Feed a polled module observation into the status machine
    pub fn observe_module(
        &mut self,
        id: ModuleId,
        observation: ModuleObservation,
    ) -> Option<ModuleStatus> {
        let core = self.core.as_mut()?;
        Some(core.pipeline.observe(id, observation))
    }

    pub fn module_status(&self, id: ModuleId) -> Option<ModuleStatus> {
        self.core.as_ref().map(|core| core.pipeline.module_status(id))
    }

    /// Read access to the pipeline while open
    pub fn pipeline(&self) -> Option<&Pipeline> {
        self.core.as_ref().map(|core| &core.pipeline)
    }

    /// Variables of the running script; empty when closed or no script runs
    pub fn enumerate_variables(&self) -> Vec<ScriptVariable> {
        self.core
            .as_ref()
            .map(|core| core.pipeline.liveprog().runtime().variables())
            .unwrap_or_default()
    }

    /// Overwrite a numeric script variable
    pub fn manipulate_variable(&mut self, name: &str, value: f64) -> bool {
        match self.core.as_mut() {
            Some(core) => core
                .pipeline
                .liveprog_mut()
                .runtime_mut()
                .set_variable(name, value),
            None => {
                warn!("manipulate_variable called on a closed engine");
                false
            }
        }
    }

    /// Suspend or resume the script's `@sample` code
    pub fn freeze_liveprog(&mut self, frozen: bool) -> bool {
        match self.core.as_mut() {
            Some(core) => {
                core.pipeline.liveprog_mut().runtime_mut().freeze(frozen);
                true
            }
            None => {
                warn!("freeze_liveprog called on a closed engine");
                false
            }
        }
    }
}

impl DspController for Engine {
    fn is_open(&self) -> bool {
        self.core.is_some()
    }

    fn sample_rate(&self) -> f32 {
        self.core
            .as_ref()
            .map_or(crate::pipeline::DEFAULT_SAMPLE_RATE, |core| {
                core.pipeline.sample_rate()
            })
    }

    fn files(&self) -> &dyn FileStore {
        self.files.as_ref()
    }

    fn submit(&mut self, update: ModuleUpdate) -> bool {
        match self.core.as_mut() {
            Some(core) => {
                core.pipeline.apply(update);
                true
            }
            None => false,
        }
    }

    fn report(&mut self, event: ProcessorEvent) {
        if let Some(core) = self.core.as_mut() {
            core.pipeline.report(event);
        }
    }

    fn pending_resync(&mut self) -> Vec<Namespace> {
        self.core
            .as_mut()
            .map(|core| core.pipeline.take_resync())
            .unwrap_or_default()
    }

    fn retained(&mut self) -> Option<&mut RetainedInputs> {
        self.core.as_mut().map(|core| &mut core.retained)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.close();
    }
}
