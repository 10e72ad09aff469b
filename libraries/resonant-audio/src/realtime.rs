//! Lock-free control/audio split
//!
//! [`split`] returns a [`RemoteController`] for the control thread and an
//! [`AudioProcessor`] for the audio callback, joined by a single-producer
//! single-consumer ring buffer of prepared [`ModuleUpdate`]s. A second ring
//! buffer carries the [`Retired`] data each update displaced back to the
//! controller, which frees it.
//!
//! # Real-Time Safety
//! - The audio side only pops updates and pushes retired data; it never
//!   blocks
//! - All preparation happens on the controller before the push, including
//!   the redesign of rate-dependent stages
//! - A full queue rejects the update on the control side
//! - Retired data is dropped on the controller when it submits or calls
//!   [`RemoteController::collect_retired`]

use crate::codec::{pass_through, Codec, Sample};
use crate::control::{DspController, RetainedInputs};
use crate::events::ProcessorEvent;
use crate::pipeline::{
    ModuleId, ModuleObservation, ModuleStatus, ModuleUpdate, Pipeline, Retired,
};
use resonant_core::{EngineConfig, FileStore, Namespace};
use rtrb::{Consumer, Producer, PushError, RingBuffer};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Build a connected controller/processor pair
pub fn split(config: &EngineConfig, files: Arc<dyn FileStore>) -> (RemoteController, AudioProcessor) {
    let sample_rate = config.engine.sample_rate;
    let capacity = config.engine.command_queue_capacity.max(1);
    let (producer, consumer) = RingBuffer::new(capacity);
    // Queued updates plus those applied since the controller last collected
    let (retired_producer, retired_consumer) = RingBuffer::new(capacity * 2);
    info!(
        "Split engine at {} Hz with a queue of {} updates",
        sample_rate, capacity
    );

    let controller = RemoteController {
        producer,
        retired: retired_consumer,
        files,
        sample_rate,
        retained: RetainedInputs::default(),
        events: Vec::new(),
        open: true,
    };
    let processor = AudioProcessor {
        consumer,
        retired: retired_producer,
        pipeline: Pipeline::new(sample_rate),
        codec: Codec::new(),
        open: true,
    };
    (controller, processor)
}

/// Control-thread half
pub struct RemoteController {
    producer: Producer<ModuleUpdate>,
    retired: Consumer<Retired>,
    files: Arc<dyn FileStore>,
    sample_rate: f32,
    retained: RetainedInputs,
    events: Vec<ProcessorEvent>,
    open: bool,
}

impl RemoteController {
    /// Stop accepting updates; returns false if already closed
    pub fn close(&mut self) -> bool {
        std::mem::replace(&mut self.open, false)
    }

    /// Events raised while preparing updates
    pub fn drain_events(&mut self) -> Vec<ProcessorEvent> {
        std::mem::take(&mut self.events)
    }

    /// Free slots in the update queue
    pub fn available(&self) -> usize {
        self.producer.slots()
    }

    /// Drop the data the audio side has handed back; returns how many
    /// updates it came from
    pub fn collect_retired(&mut self) -> usize {
        let mut collected = 0;
        while let Ok(retired) = self.retired.pop() {
            debug!("Freeing {:?}", retired);
            drop(retired);
            collected += 1;
        }
        collected
    }
}

impl DspController for RemoteController {
    fn is_open(&self) -> bool {
        self.open && !self.producer.is_abandoned()
    }

    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    fn files(&self) -> &dyn FileStore {
        self.files.as_ref()
    }

    fn submit(&mut self, update: ModuleUpdate) -> bool {
        self.collect_retired();
        let rate = match update {
            ModuleUpdate::SampleRate(rate) => Some(rate),
            _ => None,
        };

        match self.producer.push(update) {
            Ok(()) => {
                if let Some(rate) = rate {
                    self.sample_rate = rate;
                }
                true
            }
            Err(PushError::Full(update)) => {
                warn!("Update queue full; dropping {:?}", update);
                false
            }
        }
    }

    fn report(&mut self, event: ProcessorEvent) {
        self.events.push(event);
    }

    fn retained(&mut self) -> Option<&mut RetainedInputs> {
        Some(&mut self.retained)
    }
}

/// Audio-thread half
pub struct AudioProcessor {
    consumer: Consumer<ModuleUpdate>,
    retired: Producer<Retired>,
    pipeline: Pipeline,
    codec: Codec,
    open: bool,
}

impl AudioProcessor {
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
        if !self.open {
            pass_through(input, output);
            return;
        }
        self.apply_pending();

        if self.pipeline.is_bypassed() {
            pass_through(input, output);
            return;
        }
        let pipeline = &mut self.pipeline;
        self.codec.run(input, output, |buffer| pipeline.process(buffer));
    }

    /// Apply every queued update without processing audio
    ///
    /// Displaced data goes back to the controller; it is only dropped here
    /// when the controller has stopped collecting and the return queue is
    /// full.
    pub fn apply_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(update) = self.consumer.pop() {
            if let Some(retired) = self.pipeline.apply(update) {
                let _ = self.retired.push(retired);
            }
            applied += 1;
        }
        applied
    }

    /// Pass audio through from now on; returns false if already closed
    pub fn close(&mut self) -> bool {
        std::mem::replace(&mut self.open, false)
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Events raised on the audio side (status changes, script output)
    pub fn drain_events(&mut self) -> Vec<ProcessorEvent> {
        self.pipeline.drain_events()
    }

    pub fn observe_module(&mut self, id: ModuleId, observation: ModuleObservation) -> ModuleStatus {
        self.pipeline.observe(id, observation)
    }

    /// Namespaces to force on the controller's next sync
    pub fn take_resync(&mut self) -> Vec<Namespace> {
        self.pipeline.take_resync()
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}
