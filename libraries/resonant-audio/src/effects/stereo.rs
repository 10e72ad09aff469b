//! Stereo widener
//!
//! Mid/Side width control driven by a 0..=100 level:
//! - Mid = (L + R) / 2
//! - Side = (L - R) / 2
//! - width = 2 * level / 100, so 50 is neutral, 0 is mono and 100 doubles
//!   the side signal
//!
//! Width changes are smoothed exponentially to avoid clicks.

use super::effect::AudioEffect;

/// Smoothing coefficient for exponential parameter interpolation
const SMOOTH_COEFF: f32 = 0.003;

const MAX_LEVEL: f32 = 100.0;

/// Width for a 0..=100 level
pub fn width_for_level(level: f32) -> f32 {
    2.0 * level.clamp(0.0, MAX_LEVEL) / 100.0
}

pub struct StereoWidener {
    level: f32,
    target_width: f32,
    width: f32,
    enabled: bool,
}

impl StereoWidener {
    pub fn new() -> Self {
        let width = width_for_level(resonant_core::defaults::STEREOWIDE_MODE);
        Self {
            level: resonant_core::defaults::STEREOWIDE_MODE,
            target_width: width,
            width,
            enabled: false,
        }
    }

    /// Set widening level (0..=100, clamped)
    pub fn set_level(&mut self, level: f32) {
        self.level = level.clamp(0.0, MAX_LEVEL);
        self.target_width = width_for_level(self.level);
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn width(&self) -> f32 {
        self.target_width
    }
}

impl Default for StereoWidener {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioEffect for StereoWidener {
    fn process(&mut self, buffer: &mut [f32]) {
        if !self.enabled {
            return;
        }

        for frame in buffer.chunks_exact_mut(2) {
            self.width += SMOOTH_COEFF * (self.target_width - self.width);

            let mid = (frame[0] + frame[1]) * 0.5;
            let side = (frame[0] - frame[1]) * 0.5 * self.width;
            frame[0] = mid + side;
            frame[1] = mid - side;
        }
    }

    fn set_sample_rate(&mut self, _sample_rate: f32) {}

    fn reset(&mut self) {
        self.width = self.target_width;
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn name(&self) -> &str {
        "Stereo Widener"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width_mapping() {
        assert_eq!(width_for_level(0.0), 0.0);
        assert_eq!(width_for_level(50.0), 1.0);
        assert_eq!(width_for_level(100.0), 2.0);
        assert_eq!(width_for_level(250.0), 2.0);
        assert_eq!(width_for_level(-5.0), 0.0);
    }

    #[test]
    fn test_neutral_level_is_transparent() {
        let mut widener = StereoWidener::new();
        widener.set_level(50.0);
        widener.reset();
        widener.set_enabled(true);

        let mut buffer = vec![0.75, -0.25, 0.1, 0.3];
        let original = buffer.clone();
        widener.process(&mut buffer);
        for (a, b) in buffer.iter().zip(&original) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_zero_level_collapses_to_mono() {
        let mut widener = StereoWidener::new();
        widener.set_level(0.0);
        widener.reset();
        widener.set_enabled(true);

        let mut buffer = vec![1.0, 0.0];
        widener.process(&mut buffer);
        assert!((buffer[0] - 0.5).abs() < 1e-6);
        assert!((buffer[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_mono_signal_unchanged() {
        let mut widener = StereoWidener::new();
        widener.set_level(100.0);
        widener.set_enabled(true);

        let mut buffer = vec![0.4, 0.4, -0.2, -0.2];
        let original = buffer.clone();
        widener.process(&mut buffer);
        assert_eq!(buffer, original);
    }

    #[test]
    fn test_width_change_is_smoothed() {
        let mut widener = StereoWidener::new();
        widener.set_level(50.0);
        widener.reset();
        widener.set_enabled(true);
        widener.set_level(100.0);

        let mut buffer = vec![1.0, -1.0];
        widener.process(&mut buffer);
        // first frame barely moves toward double width
        assert!(buffer[0] < 1.1);
    }
}
