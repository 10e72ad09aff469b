/// Vacuum tube saturation
///
/// Asymmetric waveshaper: the input is driven by `drive * 2` dB, offset by a
/// small bias so positive and negative half-waves saturate differently
/// (even harmonics), shaped with `tanh`, then the bias is removed and the
/// result is normalized so a full-scale input stays at full scale.
use super::effect::{db_to_linear, AudioEffect};

const BIAS: f32 = 0.15;
const MAX_DRIVE: f32 = 12.0;
/// DC blocker pole
const DC_POLE: f32 = 0.995;

pub struct VacuumTube {
    drive: f32,
    pre_gain: f32,
    normalize: f32,
    dc_in: [f32; 2],
    dc_out: [f32; 2],
    enabled: bool,
}

impl VacuumTube {
    pub fn new() -> Self {
        let mut tube = Self {
            drive: 0.0,
            pre_gain: 1.0,
            normalize: 1.0,
            dc_in: [0.0; 2],
            dc_out: [0.0; 2],
            enabled: false,
        };
        tube.set_drive(resonant_core::defaults::TUBE_DRIVE);
        tube
    }

    /// Set drive (0..=12, clamped)
    pub fn set_drive(&mut self, drive: f32) {
        self.drive = drive.clamp(0.0, MAX_DRIVE);
        self.pre_gain = db_to_linear(self.drive * 2.0);
        let peak = Self::shape_raw(self.pre_gain)
            .abs()
            .max(Self::shape_raw(-self.pre_gain).abs());
        self.normalize = if peak > 1e-6 { 1.0 / peak } else { 1.0 };
    }

    pub fn drive(&self) -> f32 {
        self.drive
    }

    #[inline]
    fn shape_raw(x: f32) -> f32 {
        (x + BIAS).tanh() - BIAS.tanh()
    }

    #[inline]
    fn shape(&self, x: f32) -> f32 {
        Self::shape_raw(x * self.pre_gain) * self.normalize
    }
}

impl Default for VacuumTube {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioEffect for VacuumTube {
    fn process(&mut self, buffer: &mut [f32]) {
        if !self.enabled {
            return;
        }

        for frame in buffer.chunks_exact_mut(2) {
            for (ch, sample) in frame.iter_mut().enumerate() {
                let shaped = self.shape(*sample);
                // asymmetry leaves a small DC component
                let out = shaped - self.dc_in[ch] + DC_POLE * self.dc_out[ch];
                self.dc_in[ch] = shaped;
                self.dc_out[ch] = out;
                *sample = out;
            }
        }
    }

    fn set_sample_rate(&mut self, _sample_rate: f32) {}

    fn reset(&mut self) {
        self.dc_in = [0.0; 2];
        self.dc_out = [0.0; 2];
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn name(&self) -> &str {
        "Vacuum Tube"
    }
}
