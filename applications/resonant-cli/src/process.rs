//! Offline processing of a WAV file through the engine

use crate::wav::{self, WavBuffer};
use anyhow::{Context, Result};
use resonant_audio::{Engine, ParameterSynchronizer, ProcessorEvent, SyncReport};
use resonant_core::{EngineConfig, JsonSettings, LocalFileStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Frames handed to the engine per call, like a host audio callback
pub const DEFAULT_BLOCK_FRAMES: usize = 1024;

#[derive(Debug, Clone)]
pub struct ProcessOptions {
    pub input: PathBuf,
    pub output: PathBuf,
    /// JSON settings file; falls back to `settings.path` from the config
    pub settings: Option<PathBuf>,
    /// Engine rate; defaults to the input file's rate
    pub sample_rate: Option<f32>,
    pub block_frames: usize,
}

#[derive(Debug, Clone)]
pub struct ProcessSummary {
    pub frames: usize,
    pub sample_rate: f32,
    pub sync: SyncReport,
    pub events: Vec<ProcessorEvent>,
}

/// Run `options.input` through a freshly configured engine
pub fn process_file(config: &EngineConfig, options: &ProcessOptions) -> Result<ProcessSummary> {
    let (spec, input) = wav::read(&options.input)?;
    let sample_rate = options
        .sample_rate
        .unwrap_or(spec.sample_rate as f32);
    info!(
        "Processing '{}' ({} frames at {} Hz)",
        options.input.display(),
        input.len() / 2,
        sample_rate
    );

    let files = Arc::new(LocalFileStore::new(config.library.root.clone()));
    let mut engine = Engine::new(sample_rate, files);
    let mut events = Vec::new();

    let settings_path = options.settings.as_ref().or(config.settings.path.as_ref());
    let sync = match settings_path {
        Some(path) => {
            let store = JsonSettings::open(path)
                .with_context(|| format!("Failed to open settings '{}'", path.display()))?;
            let mut synchronizer = ParameterSynchronizer::new(store);
            let report = synchronizer.sync(&mut engine, &[]);
            for namespace in &report.failed {
                warn!("Settings for {} were rejected", namespace);
            }
            report
        }
        None => {
            debug!("No settings file; running with engine defaults");
            SyncReport::default()
        }
    };
    collect_events(&mut engine, &mut events);

    let block = options.block_frames.max(1) * 2;
    let output = match &input {
        WavBuffer::I16(samples) => {
            let mut out = vec![0i16; samples.len()];
            for (i, o) in samples.chunks(block).zip(out.chunks_mut(block)) {
                engine.process_i16(i, o);
                collect_events(&mut engine, &mut events);
            }
            WavBuffer::I16(out)
        }
        WavBuffer::I32(samples) => {
            let mut out = vec![0i32; samples.len()];
            for (i, o) in samples.chunks(block).zip(out.chunks_mut(block)) {
                engine.process_i32(i, o);
                collect_events(&mut engine, &mut events);
            }
            WavBuffer::I32(out)
        }
        WavBuffer::F32(samples) => {
            let mut out = vec![0.0f32; samples.len()];
            for (i, o) in samples.chunks(block).zip(out.chunks_mut(block)) {
                engine.process_f32(i, o);
                collect_events(&mut engine, &mut events);
            }
            WavBuffer::F32(out)
        }
    };

    wav::write(&options.output, spec, &output)?;
    engine.close();
    info!("Wrote '{}'", options.output.display());

    Ok(ProcessSummary {
        frames: output.len() / 2,
        sample_rate,
        sync,
        events,
    })
}

fn collect_events(engine: &mut Engine, events: &mut Vec<ProcessorEvent>) {
    for event in engine.drain_events() {
        match &event {
            ProcessorEvent::LiveprogOutput { message } => info!("[script] {}", message),
            other => debug!("Engine event: {:?}", other),
        }
        events.push(event);
    }
}
