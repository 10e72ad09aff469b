//! Script runtime bridge
//!
//! Connects compiled scripts to the audio stage. Compilation and `@init`
//! happen in [`LiveprogRuntime::prepare`], which the control side can run
//! off the audio thread; [`LiveprogRuntime::install`] only swaps the result
//! in.

use crate::error::LiveprogError;
use crate::vm::{Program, ScriptVm};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Script compiled and initialized
pub const RESULT_OK: i32 = 1;
/// Script failed to compile
pub const RESULT_SYNTAX_ERROR: i32 = -1;

/// Result of loading a script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadOutcome {
    pub code: i32,
    pub error: Option<String>,
}

impl LoadOutcome {
    pub fn ok() -> Self {
        Self {
            code: RESULT_OK,
            error: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == RESULT_OK
    }
}

/// Value of a script variable as seen from the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableValue {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptVariable {
    pub name: String,
    pub value: VariableValue,
}

/// Host-facing operations on the running script
pub trait ScriptRuntime {
    /// Replace the running script
    ///
    /// The stage is disabled while loading and only re-enabled when `enable`
    /// is set and the script compiled.
    fn load_script(&mut self, enable: bool, id: &str, source: &str) -> LoadOutcome;

    /// Every variable of the running script
    fn variables(&self) -> Vec<ScriptVariable>;

    /// Overwrite a numeric variable; false for unknown or string variables
    fn set_variable(&mut self, name: &str, value: f64) -> bool;

    /// Suspend or resume `@sample` execution without touching script state
    fn freeze(&mut self, frozen: bool);

    fn is_frozen(&self) -> bool;
}

/// Liveprog stage state
pub struct LiveprogRuntime {
    vm: Option<Box<ScriptVm>>,
    id: String,
    enabled: bool,
    frozen: bool,
    sample_rate: f64,
}

impl LiveprogRuntime {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            vm: None,
            id: String::new(),
            enabled: false,
            frozen: false,
            sample_rate,
        }
    }

    /// Compile `source` and run its `@init`
    ///
    /// Blank source yields no machine and a successful outcome.
    pub fn prepare(source: &str, sample_rate: f64) -> (Option<ScriptVm>, LoadOutcome) {
        if source.trim().is_empty() {
            return (None, LoadOutcome::ok());
        }

        match Program::compile(source) {
            Ok(program) => {
                let mut vm = ScriptVm::new(program, sample_rate);
                vm.run_init();
                (Some(vm), LoadOutcome::ok())
            }
            Err(e) => {
                let message = match &e {
                    LiveprogError::Syntax { .. } => e.to_string(),
                    other => format!("Unexpected error: {other}"),
                };
                warn!("Script failed to compile: {}", message);
                (
                    None,
                    LoadOutcome {
                        code: RESULT_SYNTAX_ERROR,
                        error: Some(message),
                    },
                )
            }
        }
    }

    /// Swap in a prepared machine
    pub fn install(&mut self, enable: bool, id: impl Into<String>, vm: Option<ScriptVm>) {
        self.swap_in(enable, id.into(), vm.map(Box::new));
        debug!("Liveprog script '{}' installed (enabled={})", self.id, self.enabled);
    }

    /// Swap in a prepared machine and hand back the previous id and machine
    ///
    /// Nothing is freed here, so the caller decides where the old machine
    /// is dropped.
    pub fn swap_in(
        &mut self,
        enable: bool,
        id: String,
        vm: Option<Box<ScriptVm>>,
    ) -> (String, Option<Box<ScriptVm>>) {
        let previous_id = std::mem::replace(&mut self.id, id);
        let previous_vm = std::mem::replace(&mut self.vm, vm);
        self.enabled = enable && self.vm.is_some();
        let rate = self.sample_rate;
        if let Some(vm) = self.vm.as_mut() {
            if (vm.sample_rate() - rate).abs() > f64::EPSILON {
                vm.set_sample_rate(rate);
            }
        }
        (previous_id, previous_vm)
    }

    /// Run `@sample` over interleaved stereo frames
    pub fn process(&mut self, buffer: &mut [f32]) {
        if !self.enabled || self.frozen {
            return;
        }
        let Some(vm) = self.vm.as_mut() else {
            return;
        };

        for frame in buffer.chunks_exact_mut(2) {
            let (left, right) = vm.process(frame[0], frame[1]);
            frame[0] = left;
            frame[1] = right;
        }
    }

    /// Propagate a rate change into `srate` (re-running `@init`)
    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        if let Some(vm) = self.vm.as_mut() {
            vm.set_sample_rate(sample_rate);
        }
    }

    /// Remember the host rate without touching the running machine
    ///
    /// The machine keeps its `srate` until one prepared for the new rate is
    /// installed; a machine prepared for another rate re-runs `@init` on
    /// install.
    pub fn note_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Pending `printf` output of the running script
    pub fn take_output(&mut self) -> Option<String> {
        self.vm.as_mut().and_then(|vm| vm.take_output())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Toggle the stage; a stage without a script stays disabled
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled && self.vm.is_some();
    }

    pub fn has_script(&self) -> bool {
        self.vm.is_some()
    }
}

impl ScriptRuntime for LiveprogRuntime {
    fn load_script(&mut self, enable: bool, id: &str, source: &str) -> LoadOutcome {
        self.enabled = false;

        if !enable {
            self.install(false, "", None);
            return LoadOutcome::ok();
        }

        let (vm, outcome) = Self::prepare(source, self.sample_rate);
        self.install(outcome.is_ok(), id, vm);
        info!(
            "Loaded script '{}' (code={}, enabled={})",
            id, outcome.code, self.enabled
        );
        outcome
    }

    fn variables(&self) -> Vec<ScriptVariable> {
        let Some(vm) = &self.vm else {
            return Vec::new();
        };

        vm.variables()
            .map(|(name, value)| ScriptVariable {
                name: name.to_string(),
                value: match vm.string_for(value) {
                    Some(text) => VariableValue::Text(text.to_string()),
                    None => VariableValue::Number(value),
                },
            })
            .collect()
    }

    fn set_variable(&mut self, name: &str, value: f64) -> bool {
        let Some(vm) = self.vm.as_mut() else {
            return false;
        };

        match vm.variable(name) {
            None => {
                warn!("Script variable '{}' does not exist", name);
                false
            }
            Some(current) if vm.string_for(current).is_some() => {
                warn!("Script variable '{}' holds a string", name);
                false
            }
            Some(_) => vm.set_variable(name, value),
        }
    }

    fn freeze(&mut self, frozen: bool) {
        self.frozen = frozen;
    }

    fn is_frozen(&self) -> bool {
        self.frozen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GAIN: &str = "desc: Gain\n@init\ng = 0.5;\nlabel = \"gain\";\n@sample\nspl0 = spl0 * g;\nspl1 = spl1 * g;\n";

    fn loaded() -> LiveprogRuntime {
        let mut runtime = LiveprogRuntime::new(48000.0);
        assert!(runtime.load_script(true, "gain.eel", GAIN).is_ok());
        runtime
    }

    #[test]
    fn processes_when_enabled() {
        let mut runtime = loaded();
        let mut buffer = [1.0, -1.0, 0.5, 0.25, 0.9];
        runtime.process(&mut buffer);
        assert_eq!(buffer, [0.5, -0.5, 0.25, 0.125, 0.9]);
        assert_eq!(runtime.id(), "gain.eel");
    }

    #[test]
    fn syntax_error_leaves_stage_disabled() {
        let mut runtime = loaded();
        let outcome = runtime.load_script(true, "bad.eel", "@init\nx = ;");

        assert_eq!(outcome.code, RESULT_SYNTAX_ERROR);
        assert!(outcome.error.unwrap().contains("line 2"));
        assert!(!runtime.is_enabled());

        let mut buffer = [1.0, 1.0];
        runtime.process(&mut buffer);
        assert_eq!(buffer, [1.0, 1.0]);
    }

    #[test]
    fn disable_clears_the_script() {
        let mut runtime = loaded();
        assert!(runtime.load_script(false, "gain.eel", GAIN).is_ok());
        assert!(!runtime.has_script());
        assert!(runtime.variables().is_empty());
    }

    #[test]
    fn noted_rate_waits_for_a_prepared_machine() {
        let source = "@init\nhalf = srate / 2;";
        let mut runtime = LiveprogRuntime::new(48000.0);
        assert!(runtime.load_script(true, "half.eel", source).is_ok());

        runtime.note_sample_rate(96000.0);
        assert_eq!(runtime.sample_rate(), 96000.0);
        let half = |r: &LiveprogRuntime| r.variables().into_iter().find(|v| v.name == "half");
        assert_eq!(half(&runtime).unwrap().value, VariableValue::Number(24000.0));

        let (vm, outcome) = LiveprogRuntime::prepare(source, 96000.0);
        assert!(outcome.is_ok());
        runtime.install(true, "half.eel", vm);
        assert_eq!(half(&runtime).unwrap().value, VariableValue::Number(48000.0));
    }

    #[test]
    fn empty_script_is_accepted() {
        let mut runtime = LiveprogRuntime::new(48000.0);
        assert!(runtime.load_script(true, "empty.eel", "  \n").is_ok());
        assert!(!runtime.is_enabled());
    }

    #[test]
    fn variables_report_numbers_and_strings() {
        let runtime = loaded();
        let vars = runtime.variables();

        let g = vars.iter().find(|v| v.name == "g").unwrap();
        assert_eq!(g.value, VariableValue::Number(0.5));

        let label = vars.iter().find(|v| v.name == "label").unwrap();
        assert_eq!(label.value, VariableValue::Text("gain".into()));

        let srate = vars.iter().find(|v| v.name == "srate").unwrap();
        assert_eq!(srate.value, VariableValue::Number(48000.0));
    }

    #[test]
    fn set_variable_only_touches_numeric_known_names() {
        let mut runtime = loaded();
        assert!(runtime.set_variable("g", 2.0));
        assert!(!runtime.set_variable("missing", 1.0));
        assert!(!runtime.set_variable("label", 1.0));

        let mut buffer = [0.25, 0.5];
        runtime.process(&mut buffer);
        assert_eq!(buffer, [0.5, 1.0]);
    }

    #[test]
    fn freeze_passes_audio_through_and_keeps_state() {
        let mut runtime = loaded();
        runtime.freeze(true);
        assert!(runtime.is_frozen());

        let mut buffer = [1.0, 1.0];
        runtime.process(&mut buffer);
        assert_eq!(buffer, [1.0, 1.0]);

        runtime.freeze(false);
        runtime.process(&mut buffer);
        assert_eq!(buffer, [0.5, 0.5]);
    }
}
