/// Liveprog stage: runs the user script's `@sample` code
use super::effect::AudioEffect;
use resonant_liveprog::{LiveprogRuntime, ScriptVm};

pub struct Liveprog {
    runtime: LiveprogRuntime,
}

impl Liveprog {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            runtime: LiveprogRuntime::new(f64::from(sample_rate)),
        }
    }

    /// Swap in a compiled script (`None` for an empty stage)
    ///
    /// Returns the previous script id and machine.
    pub fn install(
        &mut self,
        enable: bool,
        id: String,
        vm: Option<Box<ScriptVm>>,
    ) -> (String, Option<Box<ScriptVm>>) {
        self.runtime.swap_in(enable, id, vm)
    }

    pub fn runtime(&self) -> &LiveprogRuntime {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut LiveprogRuntime {
        &mut self.runtime
    }
}

impl AudioEffect for Liveprog {
    fn process(&mut self, buffer: &mut [f32]) {
        self.runtime.process(buffer);
    }

    /// `@init` is not re-run here; the controller installs a machine
    /// prepared for the new rate
    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.runtime.note_sample_rate(f64::from(sample_rate));
    }

    fn reset(&mut self) {}

    fn set_enabled(&mut self, enabled: bool) {
        self.runtime.set_enabled(enabled);
    }

    fn is_enabled(&self) -> bool {
        self.runtime.is_enabled()
    }

    fn name(&self) -> &str {
        "Liveprog"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepared_script_runs_after_install() {
        let (vm, outcome) = LiveprogRuntime::prepare("@sample\nspl0 = -spl0;", 48000.0);
        assert!(outcome.is_ok());

        let mut stage = Liveprog::new(48000.0);
        let (previous_id, previous_vm) =
            stage.install(true, "invert.eel".to_string(), vm.map(Box::new));
        assert!(stage.is_enabled());
        assert!(previous_id.is_empty());
        assert!(previous_vm.is_none());

        let mut buffer = vec![0.5, 0.5];
        stage.process(&mut buffer);
        assert_eq!(buffer, vec![-0.5, 0.5]);
    }

    #[test]
    fn empty_stage_cannot_be_enabled() {
        let mut stage = Liveprog::new(48000.0);
        stage.set_enabled(true);
        assert!(!stage.is_enabled());
    }
}
