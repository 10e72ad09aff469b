/// Dynamic bass boost
///
/// A low shelf whose boost backs off as the low band gets louder, so quiet
/// passages get the full lift while loud bass does not clip the limiter.
use super::biquad::{Biquad, Coefficients};
use super::effect::{linear_to_db, time_constant_coeff, AudioEffect};

/// Shelf corner frequency
const SHELF_HZ: f64 = 110.0;
/// Detector low pass
const DETECT_HZ: f64 = 160.0;
/// Below this low-band level the full boost applies
const FULL_BOOST_DB: f32 = -36.0;
/// At and above this level the boost is gone
const NO_BOOST_DB: f32 = -6.0;
const MAX_BOOST_DB: f32 = 12.0;
/// Frames between shelf updates
const UPDATE_FRAMES: usize = 64;
const ENVELOPE_SECONDS: f32 = 0.15;

pub struct BassBoost {
    max_gain_db: f32,
    detector: Biquad,
    shelf: Biquad,
    envelope: f32,
    envelope_coeff: f32,
    counter: usize,
    current_gain_db: f32,
    sample_rate: f32,
    enabled: bool,
}

impl BassBoost {
    pub fn new(sample_rate: f32) -> Self {
        let mut bass = Self {
            max_gain_db: resonant_core::defaults::BASS_MAX_GAIN,
            detector: Biquad::default(),
            shelf: Biquad::default(),
            envelope: 0.0,
            envelope_coeff: 0.0,
            counter: 0,
            current_gain_db: 0.0,
            sample_rate,
            enabled: false,
        };
        bass.update_filters();
        bass
    }

    /// Set the boost applied to quiet material (dB, clamped to 0..=12)
    pub fn set_max_gain(&mut self, gain_db: f32) {
        self.max_gain_db = gain_db.clamp(0.0, MAX_BOOST_DB);
    }

    pub fn max_gain(&self) -> f32 {
        self.max_gain_db
    }

    /// Boost currently applied (dB)
    pub fn current_gain(&self) -> f32 {
        self.current_gain_db
    }

    fn update_filters(&mut self) {
        let rate = f64::from(self.sample_rate);
        self.detector
            .set_coefficients(Coefficients::low_pass(DETECT_HZ, 0.707, rate));
        self.shelf.set_coefficients(Coefficients::low_shelf(
            SHELF_HZ,
            0.707,
            f64::from(self.current_gain_db),
            rate,
        ));
        self.envelope_coeff = time_constant_coeff(ENVELOPE_SECONDS, self.sample_rate);
    }

    fn boost_for(&self, level_db: f32) -> f32 {
        let amount = (NO_BOOST_DB - level_db) / (NO_BOOST_DB - FULL_BOOST_DB);
        self.max_gain_db * amount.clamp(0.0, 1.0)
    }
}

impl AudioEffect for BassBoost {
    fn process(&mut self, buffer: &mut [f32]) {
        if !self.enabled {
            return;
        }

        for frame in buffer.chunks_exact_mut(2) {
            let (l, r) = self.detector.process_frame(frame[0], frame[1]);
            let peak = l.abs().max(r.abs());
            self.envelope = if peak > self.envelope {
                peak
            } else {
                peak + self.envelope_coeff * (self.envelope - peak)
            };

            self.counter += 1;
            if self.counter >= UPDATE_FRAMES {
                self.counter = 0;
                let gain = self.boost_for(linear_to_db(self.envelope));
                if (gain - self.current_gain_db).abs() > 0.01 {
                    self.current_gain_db = gain;
                    self.shelf.retarget(Coefficients::low_shelf(
                        SHELF_HZ,
                        0.707,
                        f64::from(gain),
                        f64::from(self.sample_rate),
                    ));
                }
            }

            let (l, r) = self.shelf.process_frame(frame[0], frame[1]);
            frame[0] = l;
            frame[1] = r;
        }
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.update_filters();
    }

    fn reset(&mut self) {
        self.detector.reset();
        self.shelf.reset();
        self.envelope = 0.0;
        self.counter = 0;
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn name(&self) -> &str {
        "Bass Boost"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48000.0;

    fn sine(frequency: f32, amplitude: f32, frames: usize) -> Vec<f32> {
        (0..frames)
            .flat_map(|i| {
                let s = (2.0 * std::f32::consts::PI * frequency * i as f32 / SR).sin() * amplitude;
                [s, s]
            })
            .collect()
    }

    #[test]
    fn quiet_bass_gets_full_boost() {
        let mut bass = BassBoost::new(SR);
        bass.set_max_gain(6.0);
        bass.set_enabled(true);

        let mut buffer = sine(60.0, 0.005, 24000);
        bass.process(&mut buffer);
        assert!((bass.current_gain() - 6.0).abs() < 0.1);
    }

    #[test]
    fn loud_bass_backs_off() {
        let mut bass = BassBoost::new(SR);
        bass.set_max_gain(6.0);
        bass.set_enabled(true);

        let mut buffer = sine(60.0, 0.9, 24000);
        bass.process(&mut buffer);
        assert!(bass.current_gain() < 0.5, "gain {}", bass.current_gain());
    }

    #[test]
    fn max_gain_is_clamped() {
        let mut bass = BassBoost::new(SR);
        bass.set_max_gain(40.0);
        assert_eq!(bass.max_gain(), 12.0);
        bass.set_max_gain(-3.0);
        assert_eq!(bass.max_gain(), 0.0);
    }

    #[test]
    fn disabled_is_bypassed() {
        let mut bass = BassBoost::new(SR);
        let mut buffer = sine(60.0, 0.1, 128);
        let original = buffer.clone();
        bass.process(&mut buffer);
        assert_eq!(buffer, original);
    }
}
