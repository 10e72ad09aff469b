//! Freeverb style reverb
//!
//! Eight parallel damped comb filters feeding four series allpasses per
//! channel, with the right channel's delay lines offset by a stereo spread.
//! Delay lengths are specified at 44.1 kHz and scaled to the engine rate.

use super::effect::AudioEffect;
use tracing::warn;

const COMB_TUNING: [usize; 8] = [1116, 1188, 1277, 1356, 1422, 1491, 1557, 1617];
const ALLPASS_TUNING: [usize; 4] = [556, 441, 341, 225];
const STEREO_SPREAD: usize = 23;
const TUNING_RATE: f32 = 44100.0;

const FIXED_GAIN: f32 = 0.015;
const SCALE_ROOM: f32 = 0.28;
const OFFSET_ROOM: f32 = 0.7;
const SCALE_DAMP: f32 = 0.4;
const ALLPASS_FEEDBACK: f32 = 0.5;

/// Reverb character
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReverbPreset {
    pub name: &'static str,
    /// 0..=1
    pub room_size: f32,
    /// 0..=1
    pub damping: f32,
    pub wet: f32,
    pub dry: f32,
    /// 0..=1
    pub width: f32,
}

/// Preset table indexed by the `reverb_preset` setting
#[rustfmt::skip]
pub const REVERB_PRESETS: [ReverbPreset; 10] = [
    ReverbPreset { name: "Default", room_size: 0.5, damping: 0.5, wet: 0.33, dry: 0.8, width: 1.0 },
    ReverbPreset { name: "Small room", room_size: 0.3, damping: 0.6, wet: 0.25, dry: 0.9, width: 0.8 },
    ReverbPreset { name: "Medium room", room_size: 0.5, damping: 0.5, wet: 0.3, dry: 0.85, width: 0.9 },
    ReverbPreset { name: "Large room", room_size: 0.7, damping: 0.4, wet: 0.35, dry: 0.8, width: 1.0 },
    ReverbPreset { name: "Medium hall", room_size: 0.8, damping: 0.35, wet: 0.35, dry: 0.75, width: 1.0 },
    ReverbPreset { name: "Large hall", room_size: 0.9, damping: 0.3, wet: 0.4, dry: 0.7, width: 1.0 },
    ReverbPreset { name: "Plate", room_size: 0.75, damping: 0.1, wet: 0.3, dry: 0.8, width: 1.0 },
    ReverbPreset { name: "Chamber", room_size: 0.6, damping: 0.55, wet: 0.3, dry: 0.8, width: 0.7 },
    ReverbPreset { name: "Cathedral", room_size: 0.98, damping: 0.2, wet: 0.45, dry: 0.6, width: 1.0 },
    ReverbPreset { name: "Ambience", room_size: 0.2, damping: 0.8, wet: 0.2, dry: 0.95, width: 0.5 },
];

/// Look up a preset, clamping out-of-range indices with a warning
pub fn preset(index: i32) -> ReverbPreset {
    let last = REVERB_PRESETS.len() as i32 - 1;
    let clamped = index.clamp(0, last);
    if clamped != index {
        warn!("Reverb preset {} out of range; using {}", index, clamped);
    }
    REVERB_PRESETS[clamped as usize]
}

#[derive(Debug, Clone)]
struct Comb {
    buffer: Vec<f32>,
    index: usize,
    filter_store: f32,
}

impl Comb {
    fn new(len: usize) -> Self {
        Self {
            buffer: vec![0.0; len.max(1)],
            index: 0,
            filter_store: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32, feedback: f32, damp: f32) -> f32 {
        let output = self.buffer[self.index];
        self.filter_store = output * (1.0 - damp) + self.filter_store * damp;
        self.buffer[self.index] = input + self.filter_store * feedback;
        self.index = (self.index + 1) % self.buffer.len();
        output
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.filter_store = 0.0;
        self.index = 0;
    }
}

#[derive(Debug, Clone)]
struct Allpass {
    buffer: Vec<f32>,
    index: usize,
}

impl Allpass {
    fn new(len: usize) -> Self {
        Self {
            buffer: vec![0.0; len.max(1)],
            index: 0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let buffered = self.buffer[self.index];
        let output = buffered - input;
        self.buffer[self.index] = input + buffered * ALLPASS_FEEDBACK;
        self.index = (self.index + 1) % self.buffer.len();
        output
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.index = 0;
    }
}

#[derive(Debug, Clone)]
struct Tank {
    combs: Vec<Comb>,
    allpasses: Vec<Allpass>,
}

impl Tank {
    fn new(sample_rate: f32, spread: usize) -> Self {
        let scale = |len: usize| ((len + spread) as f32 * sample_rate / TUNING_RATE) as usize;
        Self {
            combs: COMB_TUNING.iter().map(|&len| Comb::new(scale(len))).collect(),
            allpasses: ALLPASS_TUNING
                .iter()
                .map(|&len| Allpass::new(scale(len)))
                .collect(),
        }
    }

    #[inline]
    fn process(&mut self, input: f32, feedback: f32, damp: f32) -> f32 {
        let mut out = 0.0;
        for comb in &mut self.combs {
            out += comb.process(input, feedback, damp);
        }
        for allpass in &mut self.allpasses {
            out = allpass.process(out);
        }
        out
    }

    fn clear(&mut self) {
        self.combs.iter_mut().for_each(Comb::clear);
        self.allpasses.iter_mut().for_each(Allpass::clear);
    }
}

pub struct Reverb {
    preset_index: i32,
    preset: ReverbPreset,
    left: Tank,
    right: Tank,
    sample_rate: f32,
    enabled: bool,
}

impl Reverb {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            preset_index: 0,
            preset: REVERB_PRESETS[0],
            left: Tank::new(sample_rate, 0),
            right: Tank::new(sample_rate, STEREO_SPREAD),
            sample_rate,
            enabled: false,
        }
    }

    /// Select a preset (clamped to the table)
    pub fn set_preset(&mut self, index: i32) {
        self.preset = preset(index);
        self.preset_index = index.clamp(0, REVERB_PRESETS.len() as i32 - 1);
    }

    pub fn preset_index(&self) -> i32 {
        self.preset_index
    }

    pub fn preset(&self) -> &ReverbPreset {
        &self.preset
    }
}

impl AudioEffect for Reverb {
    fn process(&mut self, buffer: &mut [f32]) {
        if !self.enabled {
            return;
        }
        let p = self.preset;
        let feedback = p.room_size * SCALE_ROOM + OFFSET_ROOM;
        let damp = p.damping * SCALE_DAMP;
        let wet1 = p.wet * (p.width / 2.0 + 0.5);
        let wet2 = p.wet * ((1.0 - p.width) / 2.0);

        for frame in buffer.chunks_exact_mut(2) {
            let input = (frame[0] + frame[1]) * FIXED_GAIN;
            let out_l = self.left.process(input, feedback, damp);
            let out_r = self.right.process(input, feedback, damp);

            frame[0] = out_l * wet1 + out_r * wet2 + frame[0] * p.dry;
            frame[1] = out_r * wet1 + out_l * wet2 + frame[1] * p.dry;
        }
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        if (self.sample_rate - sample_rate).abs() < f32::EPSILON {
            return;
        }
        self.sample_rate = sample_rate;
        self.left = Tank::new(sample_rate, 0);
        self.right = Tank::new(sample_rate, STEREO_SPREAD);
    }

    fn reset(&mut self) {
        self.left.clear();
        self.right.clear();
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn name(&self) -> &str {
        "Reverb"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_index_is_clamped() {
        assert_eq!(preset(-4).name, "Default");
        assert_eq!(preset(99).name, REVERB_PRESETS[REVERB_PRESETS.len() - 1].name);

        let mut reverb = Reverb::new(48000.0);
        reverb.set_preset(250);
        assert_eq!(reverb.preset_index(), REVERB_PRESETS.len() as i32 - 1);
    }

    #[test]
    fn impulse_produces_tail() {
        let mut reverb = Reverb::new(44100.0);
        reverb.set_preset(5);
        reverb.set_enabled(true);

        let mut buffer = vec![0.0f32; 2 * 8192];
        buffer[0] = 1.0;
        buffer[1] = 1.0;
        reverb.process(&mut buffer);

        let late_energy: f32 = buffer[2 * 2000..].iter().map(|s| s * s).sum();
        assert!(late_energy > 1e-6);
    }

    #[test]
    fn reset_clears_tail() {
        let mut reverb = Reverb::new(44100.0);
        reverb.set_enabled(true);
        let mut buffer = vec![0.5f32; 2 * 1024];
        reverb.process(&mut buffer);
        reverb.reset();

        let mut silence = vec![0.0f32; 2 * 1024];
        reverb.process(&mut silence);
        assert!(silence.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn delay_lines_scale_with_rate() {
        let tank = Tank::new(88200.0, 0);
        assert_eq!(tank.combs[0].buffer.len(), 2232);
    }
}
