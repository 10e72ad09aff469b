//! Stereo biquad sections
//!
//! RBJ cookbook designs plus a direct-form I stereo filter. Coefficients and
//! state are kept in `f64`: DDC files and the IIR equalizer cascade up to six
//! sections per band, where `f32` state drifts audibly at low frequencies.

use std::f64::consts::PI;

/// Per-sample smoothing factor applied when coefficients are retargeted
const SMOOTH_COEFF: f64 = 0.002;

/// Normalized biquad coefficients (`a0 == 1`)
///
/// `y = b0*x + b1*x1 + b2*x2 - a1*y1 - a2*y2`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coefficients {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl Coefficients {
    /// Pass-through section
    pub const IDENTITY: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    fn normalize(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Angular frequency, clamped below Nyquist
    fn omega(frequency: f64, sample_rate: f64) -> Option<f64> {
        if sample_rate < 1.0 || !frequency.is_finite() {
            return None;
        }
        let clamped = frequency.clamp(1.0, sample_rate * 0.45);
        Some(2.0 * PI * clamped / sample_rate)
    }

    /// Peaking EQ
    pub fn peaking(frequency: f64, q: f64, gain_db: f64, sample_rate: f64) -> Self {
        let Some(omega) = Self::omega(frequency, sample_rate) else {
            return Self::IDENTITY;
        };
        let a = 10.0_f64.powf(gain_db / 40.0);
        let (sin, cos) = omega.sin_cos();
        let alpha = sin / (2.0 * q.max(1e-3));

        Self::normalize(
            1.0 + alpha * a,
            -2.0 * cos,
            1.0 - alpha * a,
            1.0 + alpha / a,
            -2.0 * cos,
            1.0 - alpha / a,
        )
    }

    /// Low shelf with slope expressed as Q
    pub fn low_shelf(frequency: f64, q: f64, gain_db: f64, sample_rate: f64) -> Self {
        let Some(omega) = Self::omega(frequency, sample_rate) else {
            return Self::IDENTITY;
        };
        let a = 10.0_f64.powf(gain_db / 40.0);
        let (sin, cos) = omega.sin_cos();
        let alpha = sin / 2.0 * ((a + 1.0 / a) * (1.0 / q.max(1e-3) - 1.0) + 2.0).max(0.0).sqrt();
        let beta = 2.0 * a.sqrt() * alpha;

        Self::normalize(
            a * ((a + 1.0) - (a - 1.0) * cos + beta),
            2.0 * a * ((a - 1.0) - (a + 1.0) * cos),
            a * ((a + 1.0) - (a - 1.0) * cos - beta),
            (a + 1.0) + (a - 1.0) * cos + beta,
            -2.0 * ((a - 1.0) + (a + 1.0) * cos),
            (a + 1.0) + (a - 1.0) * cos - beta,
        )
    }

    /// High shelf with slope expressed as Q
    pub fn high_shelf(frequency: f64, q: f64, gain_db: f64, sample_rate: f64) -> Self {
        let Some(omega) = Self::omega(frequency, sample_rate) else {
            return Self::IDENTITY;
        };
        let a = 10.0_f64.powf(gain_db / 40.0);
        let (sin, cos) = omega.sin_cos();
        let alpha = sin / 2.0 * ((a + 1.0 / a) * (1.0 / q.max(1e-3) - 1.0) + 2.0).max(0.0).sqrt();
        let beta = 2.0 * a.sqrt() * alpha;

        Self::normalize(
            a * ((a + 1.0) + (a - 1.0) * cos + beta),
            -2.0 * a * ((a - 1.0) + (a + 1.0) * cos),
            a * ((a + 1.0) + (a - 1.0) * cos - beta),
            (a + 1.0) - (a - 1.0) * cos + beta,
            2.0 * ((a - 1.0) - (a + 1.0) * cos),
            (a + 1.0) - (a - 1.0) * cos - beta,
        )
    }

    /// Second-order low pass
    pub fn low_pass(frequency: f64, q: f64, sample_rate: f64) -> Self {
        let Some(omega) = Self::omega(frequency, sample_rate) else {
            return Self::IDENTITY;
        };
        let (sin, cos) = omega.sin_cos();
        let alpha = sin / (2.0 * q.max(1e-3));

        Self::normalize(
            (1.0 - cos) / 2.0,
            1.0 - cos,
            (1.0 - cos) / 2.0,
            1.0 + alpha,
            -2.0 * cos,
            1.0 - alpha,
        )
    }

    /// Second-order high pass
    pub fn high_pass(frequency: f64, q: f64, sample_rate: f64) -> Self {
        let Some(omega) = Self::omega(frequency, sample_rate) else {
            return Self::IDENTITY;
        };
        let (sin, cos) = omega.sin_cos();
        let alpha = sin / (2.0 * q.max(1e-3));

        Self::normalize(
            (1.0 + cos) / 2.0,
            -(1.0 + cos),
            (1.0 + cos) / 2.0,
            1.0 + alpha,
            -2.0 * cos,
            1.0 - alpha,
        )
    }

    /// Magnitude response in dB at `frequency`
    pub fn magnitude_db(&self, frequency: f64, sample_rate: f64) -> f64 {
        let w = 2.0 * PI * frequency / sample_rate;
        let (s1, c1) = w.sin_cos();
        let (s2, c2) = (2.0 * w).sin_cos();

        let num_re = self.b0 + self.b1 * c1 + self.b2 * c2;
        let num_im = -(self.b1 * s1 + self.b2 * s2);
        let den_re = 1.0 + self.a1 * c1 + self.a2 * c2;
        let den_im = -(self.a1 * s1 + self.a2 * s2);

        let num = num_re * num_re + num_im * num_im;
        let den = den_re * den_re + den_im * den_im;
        10.0 * (num / den.max(1e-300)).log10()
    }

    /// Poles strictly inside the unit circle
    pub fn is_stable(&self) -> bool {
        self.a2.abs() < 1.0 && self.a1.abs() < 1.0 + self.a2
    }
}

impl Default for Coefficients {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct ChannelState {
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl ChannelState {
    #[inline]
    fn tick(&mut self, c: &Coefficients, x: f64) -> f64 {
        let mut y = c.b0 * x + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;
        if y.abs() < 1e-30 {
            y = 0.0;
        }
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }
}

/// Stereo biquad section
#[derive(Debug, Clone)]
pub struct Biquad {
    active: Coefficients,
    target: Coefficients,
    smoothing: bool,
    left: ChannelState,
    right: ChannelState,
}

impl Biquad {
    pub fn new(coefficients: Coefficients) -> Self {
        Self {
            active: coefficients,
            target: coefficients,
            smoothing: false,
            left: ChannelState::default(),
            right: ChannelState::default(),
        }
    }

    /// Replace coefficients immediately
    pub fn set_coefficients(&mut self, coefficients: Coefficients) {
        self.active = coefficients;
        self.target = coefficients;
        self.smoothing = false;
    }

    /// Glide toward new coefficients over the next few hundred samples
    pub fn retarget(&mut self, coefficients: Coefficients) {
        self.target = coefficients;
        self.smoothing = self.active != self.target;
    }

    pub fn coefficients(&self) -> &Coefficients {
        &self.target
    }

    #[inline]
    fn smooth(&mut self) {
        if !self.smoothing {
            return;
        }
        let (a, t) = (&mut self.active, &self.target);
        a.b0 += SMOOTH_COEFF * (t.b0 - a.b0);
        a.b1 += SMOOTH_COEFF * (t.b1 - a.b1);
        a.b2 += SMOOTH_COEFF * (t.b2 - a.b2);
        a.a1 += SMOOTH_COEFF * (t.a1 - a.a1);
        a.a2 += SMOOTH_COEFF * (t.a2 - a.a2);

        let distance = (t.b0 - a.b0).abs()
            + (t.b1 - a.b1).abs()
            + (t.b2 - a.b2).abs()
            + (t.a1 - a.a1).abs()
            + (t.a2 - a.a2).abs();
        if distance < 1e-9 {
            self.active = self.target;
            self.smoothing = false;
        }
    }

    /// Filter one stereo frame
    #[inline]
    pub fn process_frame(&mut self, left: f32, right: f32) -> (f32, f32) {
        self.smooth();
        let l = self.left.tick(&self.active, f64::from(left));
        let r = self.right.tick(&self.active, f64::from(right));
        (l as f32, r as f32)
    }

    /// Filter an interleaved stereo buffer
    pub fn process(&mut self, buffer: &mut [f32]) {
        for frame in buffer.chunks_exact_mut(2) {
            let (l, r) = self.process_frame(frame[0], frame[1]);
            frame[0] = l;
            frame[1] = r;
        }
    }

    /// Clear state, keep coefficients
    pub fn reset(&mut self) {
        self.left = ChannelState::default();
        self.right = ChannelState::default();
        self.active = self.target;
        self.smoothing = false;
    }
}

impl Default for Biquad {
    fn default() -> Self {
        Self::new(Coefficients::IDENTITY)
    }
}

/// Q for a bandwidth in octaves
pub(crate) fn bandwidth_q(octaves: f64) -> f64 {
    let octaves = octaves.clamp(0.05, 4.0);
    let two_n = 2.0_f64.powf(octaves);
    two_n.sqrt() / (two_n - 1.0)
}

/// Run a cascade of sections over an interleaved buffer
pub fn process_cascade(sections: &mut [Biquad], buffer: &mut [f32]) {
    for frame in buffer.chunks_exact_mut(2) {
        let (mut l, mut r) = (frame[0], frame[1]);
        for section in sections.iter_mut() {
            (l, r) = section.process_frame(l, r);
        }
        frame[0] = l;
        frame[1] = r;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f64 = 48000.0;

    #[test]
    fn peaking_hits_gain_at_center() {
        let c = Coefficients::peaking(1000.0, 1.0, 6.0, SR);
        assert!((c.magnitude_db(1000.0, SR) - 6.0).abs() < 0.01);
        assert!(c.magnitude_db(20.0, SR).abs() < 0.1);
        assert!(c.is_stable());
    }

    #[test]
    fn shelves_reach_their_plateaus() {
        let low = Coefficients::low_shelf(200.0, 0.707, 6.0, SR);
        assert!((low.magnitude_db(20.0, SR) - 6.0).abs() < 0.2);
        assert!(low.magnitude_db(10000.0, SR).abs() < 0.2);

        let high = Coefficients::high_shelf(4000.0, 0.707, -6.0, SR);
        assert!((high.magnitude_db(20000.0, SR) + 6.0).abs() < 0.5);
        assert!(high.magnitude_db(50.0, SR).abs() < 0.1);
    }

    #[test]
    fn invalid_rate_yields_identity() {
        assert_eq!(Coefficients::peaking(1000.0, 1.0, 6.0, 0.0), Coefficients::IDENTITY);
    }

    #[test]
    fn identity_section_passes_audio() {
        let mut section = Biquad::default();
        let mut buffer = vec![0.25, -0.5, 0.75, 1.0];
        let original = buffer.clone();
        section.process(&mut buffer);
        assert_eq!(buffer, original);
    }

    #[test]
    fn retarget_converges() {
        let mut section = Biquad::default();
        let target = Coefficients::peaking(1000.0, 1.0, 12.0, SR);
        section.retarget(target);

        let mut buffer = vec![0.0f32; 2 * 20000];
        section.process(&mut buffer);
        assert_eq!(section.active, target);
    }

    #[test]
    fn low_pass_attenuates_high_frequencies() {
        let c = Coefficients::low_pass(1000.0, 0.707, SR);
        assert!(c.magnitude_db(100.0, SR).abs() < 0.1);
        assert!(c.magnitude_db(10000.0, SR) < -30.0);
    }
}
