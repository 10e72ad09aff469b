/// Convolver stage
///
/// Holds the prepared impulse response and its convolution engine. The IR
/// is only replaced through [`Convolver::install`]; a sample-rate change
/// keeps running the old IR until the control side reloads the file.
use super::convolution::StereoConvolver;
use super::effect::AudioEffect;

pub struct Convolver {
    engine: Option<Box<StereoConvolver>>,
    enabled: bool,
}

impl Convolver {
    pub fn new() -> Self {
        Self {
            engine: None,
            enabled: false,
        }
    }

    /// Swap in a prepared engine; `None` leaves the stage empty and disabled
    /// Swap in a prepared engine and return the previous one
    pub fn install(
        &mut self,
        engine: Option<Box<StereoConvolver>>,
    ) -> Option<Box<StereoConvolver>> {
        self.enabled = engine.is_some();
        std::mem::replace(&mut self.engine, engine)
    }

    pub fn has_impulse(&self) -> bool {
        self.engine.is_some()
    }

    /// Loaded IR length in frames
    pub fn frames(&self) -> usize {
        self.engine.as_ref().map_or(0, |e| e.frames())
    }

    pub fn latency(&self) -> usize {
        self.engine.as_ref().map_or(0, |e| e.latency())
    }
}

impl Default for Convolver {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioEffect for Convolver {
    fn process(&mut self, buffer: &mut [f32]) {
        if !self.enabled {
            return;
        }
        if let Some(engine) = self.engine.as_mut() {
            engine.process(buffer);
        }
    }

    fn set_sample_rate(&mut self, _sample_rate: f32) {}

    fn reset(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.reset();
        }
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled && self.engine.is_some();
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn name(&self) -> &str {
        "Convolver"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::convolution::ImpulseResponse;

    #[test]
    fn empty_convolver_stays_disabled() {
        let mut convolver = Convolver::new();
        convolver.set_enabled(true);
        assert!(!convolver.is_enabled());
        assert_eq!(convolver.frames(), 0);
    }

    #[test]
    fn installed_kernel_is_applied() {
        let ir = ImpulseResponse::new(1, 48000.0, vec![0.5]).unwrap();
        let mut convolver = Convolver::new();
        convolver.install(Some(Box::new(StereoConvolver::new(&ir))));
        assert!(convolver.is_enabled());

        let mut buffer = vec![1.0, -1.0, 0.5, 0.25];
        convolver.process(&mut buffer);
        assert_eq!(buffer, vec![0.5, -0.5, 0.25, 0.125]);
    }

    #[test]
    fn install_none_clears() {
        let ir = ImpulseResponse::dirac(2, 48000.0);
        let mut convolver = Convolver::new();
        convolver.install(Some(Box::new(StereoConvolver::new(&ir))));
        let previous = convolver.install(None).unwrap();
        assert_eq!(previous.frames(), 1);
        assert!(!convolver.is_enabled());
        assert!(!convolver.has_impulse());
    }
}
