/// Output control stage: post gain followed by a peak limiter
///
/// This is the first stage of the pipeline and is always active. Values are
/// not range-checked here; settings layers are expected to clamp.
use super::effect::{db_to_linear, AudioEffect};
use serde::{Deserialize, Serialize};

/// Number of samples over which to smooth threshold and gain changes
/// At 48kHz, 64 samples = ~1.3ms
const SMOOTH_SAMPLES: u32 = 64;

/// Limiter and post gain parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutputSettings {
    /// Limiter threshold in dB
    pub threshold_db: f32,
    /// Limiter release in milliseconds
    pub release_ms: f32,
    /// Gain applied before limiting, in dB
    pub post_gain_db: f32,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            threshold_db: resonant_core::defaults::LIMITER_THRESHOLD,
            release_ms: resonant_core::defaults::LIMITER_RELEASE,
            post_gain_db: resonant_core::defaults::OUTPUT_POSTGAIN,
        }
    }
}

/// Linear ramp toward a target over `SMOOTH_SAMPLES`
#[derive(Debug, Clone, Copy)]
struct Smoothed {
    current: f32,
    target: f32,
    remaining: u32,
}

impl Smoothed {
    fn new(value: f32) -> Self {
        Self {
            current: value,
            target: value,
            remaining: 0,
        }
    }

    fn set(&mut self, target: f32) {
        if (target - self.target).abs() > 1e-6 {
            self.target = target;
            self.remaining = SMOOTH_SAMPLES;
        }
    }

    #[inline]
    fn next(&mut self) -> f32 {
        if self.remaining > 0 {
            let alpha = 1.0 / self.remaining as f32;
            self.current += alpha * (self.target - self.current);
            self.remaining -= 1;
            if self.remaining == 0 {
                self.current = self.target;
            }
        }
        self.current
    }

    fn snap(&mut self) {
        self.current = self.target;
        self.remaining = 0;
    }
}

/// Post gain plus brick-wall style peak limiter
///
/// The limiter uses a stereo-linked peak envelope with instant attack and
/// exponential release; gain is `threshold / envelope` while the envelope is
/// above the threshold.
///
/// # Real-Time Safety
/// - No allocations in `process()`
pub struct OutputControl {
    settings: OutputSettings,
    threshold: Smoothed,
    post_gain: Smoothed,
    release_coeff: f32,
    envelope: f32,
    sample_rate: f32,
    enabled: bool,
}

impl OutputControl {
    pub fn new(sample_rate: f32) -> Self {
        let settings = OutputSettings::default();
        let mut output = Self {
            settings,
            threshold: Smoothed::new(db_to_linear(settings.threshold_db)),
            post_gain: Smoothed::new(db_to_linear(settings.post_gain_db)),
            release_coeff: 0.0,
            envelope: 0.0,
            sample_rate,
            enabled: true,
        };
        output.update_release();
        output
    }

    /// Set limiter threshold (dB) and release (ms)
    pub fn set_limiter(&mut self, threshold_db: f32, release_ms: f32) {
        self.settings.threshold_db = threshold_db;
        self.settings.release_ms = release_ms;
        self.threshold.set(db_to_linear(threshold_db));
        self.update_release();
    }

    /// Set post gain (dB)
    pub fn set_post_gain(&mut self, gain_db: f32) {
        self.settings.post_gain_db = gain_db;
        self.post_gain.set(db_to_linear(gain_db));
    }

    pub fn settings(&self) -> OutputSettings {
        self.settings
    }

    /// Current limiter envelope (linear peak)
    pub fn envelope(&self) -> f32 {
        self.envelope
    }

    fn update_release(&mut self) {
        let release_samples = (self.settings.release_ms / 1000.0) * self.sample_rate;
        self.release_coeff = (-1.0 / release_samples).exp();
    }
}

impl AudioEffect for OutputControl {
    fn process(&mut self, buffer: &mut [f32]) {
        if !self.enabled {
            return;
        }

        for frame in buffer.chunks_exact_mut(2) {
            let gain = self.post_gain.next();
            let threshold = self.threshold.next();

            let left = frame[0] * gain;
            let right = frame[1] * gain;

            let peak = left.abs().max(right.abs());
            if peak > self.envelope {
                self.envelope = peak;
            } else {
                self.envelope = peak + self.release_coeff * (self.envelope - peak);
            }

            let reduction = if self.envelope > threshold {
                threshold / self.envelope
            } else {
                1.0
            };

            frame[0] = left * reduction;
            frame[1] = right * reduction;
        }
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.update_release();
    }

    fn reset(&mut self) {
        self.envelope = 0.0;
        self.threshold.snap();
        self.post_gain.snap();
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn name(&self) -> &str {
        "Output Control"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48000.0;

    #[test]
    fn quiet_signal_passes_unchanged() {
        let mut output = OutputControl::new(SR);
        let mut buffer = vec![0.25, -0.25, 0.5, -0.5];
        let original = buffer.clone();
        output.process(&mut buffer);
        assert_eq!(buffer, original);
    }

    #[test]
    fn peaks_are_held_at_threshold() {
        let mut output = OutputControl::new(SR);
        output.set_limiter(-6.0, 50.0);
        output.reset();

        let mut buffer = vec![1.0f32; 2 * 512];
        output.process(&mut buffer);

        let ceiling = db_to_linear(-6.0);
        for sample in &buffer {
            assert!(*sample <= ceiling + 1e-5, "{sample} above {ceiling}");
        }
    }

    #[test]
    fn post_gain_applies_after_smoothing() {
        let mut output = OutputControl::new(SR);
        output.set_limiter(0.0, 60.0);
        output.set_post_gain(-6.0206);

        let mut buffer = vec![0.5f32; 2 * 256];
        output.process(&mut buffer);

        let last = buffer[buffer.len() - 1];
        assert!((last - 0.25).abs() < 1e-3);
        // first frame is mid-ramp
        assert!(buffer[0] > 0.25);
    }

    #[test]
    fn limiter_values_are_not_clamped() {
        let mut output = OutputControl::new(SR);
        output.set_limiter(3.0, 5000.0);
        assert_eq!(output.settings().threshold_db, 3.0);
        assert_eq!(output.settings().release_ms, 5000.0);
    }

    #[test]
    fn envelope_releases_over_time() {
        let mut output = OutputControl::new(SR);
        let mut burst = vec![0.9f32; 2 * 16];
        output.process(&mut burst);
        let peak = output.envelope();

        let mut silence = vec![0.0f32; 2 * 4800];
        output.process(&mut silence);
        assert!(output.envelope() < peak * 0.5);
    }
}
