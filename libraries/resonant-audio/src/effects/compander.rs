//! Multiband compander
//!
//! Seven bands, each with a band-pass level detector and a peaking filter
//! whose gain pulls the band level toward a reference. Positive strength
//! compresses (quiet bands rise, loud bands fall), negative strength
//! expands. Gains are recomputed once per block of `32 * 2^granularity`
//! frames.

use super::biquad::{bandwidth_q, Biquad, Coefficients};
use super::effect::{linear_to_db, time_constant_coeff, AudioEffect};
use super::parse_number_list;
use crate::error::Result;
use std::f64::consts::SQRT_2;
use tracing::warn;

pub const COMPANDER_BANDS: usize = 7;

/// Band level the gain pulls toward (dBFS)
const REFERENCE_DB: f32 = -24.0;
/// Gain limit per band (dB)
const MAX_GAIN_DB: f32 = 12.0;
/// Bands quieter than this are left alone
const GATE_DB: f32 = -80.0;
const MAX_GRANULARITY: i32 = 4;

/// Level detector applied to each band
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detector {
    Peak,
    Rms,
    /// Mean of peak and RMS in dB
    Blended,
}

impl Detector {
    pub fn from_setting(value: i32) -> Self {
        match value {
            0 => Detector::Peak,
            1 => Detector::Rms,
            2 => Detector::Blended,
            other => {
                warn!("Unknown compander transform {}; using peak", other);
                Detector::Peak
            }
        }
    }
}

/// Parsed compander configuration
#[derive(Debug, Clone, PartialEq)]
pub struct CompanderSettings {
    /// Level smoothing time constant (seconds)
    pub time_constant: f32,
    /// Block size exponent, 0..=4
    pub granularity: u32,
    pub detector: Detector,
    pub frequencies: [f64; COMPANDER_BANDS],
    pub strengths: [f64; COMPANDER_BANDS],
}

impl CompanderSettings {
    /// Parse the response string (7 frequencies then 7 strengths)
    ///
    /// # Errors
    /// Any non-numeric token or more than 14 tokens rejects the whole
    /// string. Missing trailing values read as zero.
    pub fn parse(
        time_constant: f32,
        granularity: i32,
        transforms: i32,
        response: &str,
    ) -> Result<Self> {
        let values = parse_number_list(response, COMPANDER_BANDS * 2)?;
        let mut frequencies = [0.0; COMPANDER_BANDS];
        let mut strengths = [0.0; COMPANDER_BANDS];
        frequencies.copy_from_slice(&values[..COMPANDER_BANDS]);
        strengths.copy_from_slice(&values[COMPANDER_BANDS..]);

        Ok(Self {
            time_constant: time_constant.max(0.0),
            granularity: granularity.clamp(0, MAX_GRANULARITY) as u32,
            detector: Detector::from_setting(transforms),
            frequencies,
            strengths,
        })
    }

    /// Frames per gain update
    pub fn block_frames(&self) -> usize {
        32 << self.granularity
    }
}

/// Detector and gain state of one band
#[derive(Debug, Clone)]
struct Band {
    frequency: f64,
    strength: f32,
    q: f64,
    high_pass: Biquad,
    low_pass: Biquad,
    shaper: Biquad,
    peak: f32,
    energy: f32,
    level_db: f32,
}

impl Band {
    fn new(frequency: f64, strength: f64, q: f64, sample_rate: f64) -> Self {
        Self {
            frequency,
            strength: strength as f32,
            q,
            high_pass: Biquad::new(Coefficients::high_pass(frequency / SQRT_2, 0.707, sample_rate)),
            low_pass: Biquad::new(Coefficients::low_pass(frequency * SQRT_2, 0.707, sample_rate)),
            shaper: Biquad::default(),
            peak: 0.0,
            energy: 0.0,
            level_db: GATE_DB,
        }
    }

    #[inline]
    fn detect(&mut self, left: f32, right: f32) {
        let (l, r) = self.high_pass.process_frame(left, right);
        let (l, r) = self.low_pass.process_frame(l, r);
        let magnitude = l.abs().max(r.abs());
        self.peak = self.peak.max(magnitude);
        self.energy += 0.5 * (l * l + r * r);
    }

    fn block_level(&mut self, detector: Detector, frames: usize) -> f32 {
        let peak_db = linear_to_db(self.peak);
        let rms_db = linear_to_db((self.energy / frames.max(1) as f32).sqrt());
        self.peak = 0.0;
        self.energy = 0.0;
        match detector {
            Detector::Peak => peak_db,
            Detector::Rms => rms_db,
            Detector::Blended => 0.5 * (peak_db + rms_db),
        }
    }

    fn target_gain(&self) -> f32 {
        if self.level_db <= GATE_DB {
            return 0.0;
        }
        (self.strength * (REFERENCE_DB - self.level_db)).clamp(-MAX_GAIN_DB, MAX_GAIN_DB)
    }

    fn reset(&mut self) {
        self.high_pass.reset();
        self.low_pass.reset();
        self.shaper.set_coefficients(Coefficients::IDENTITY);
        self.shaper.reset();
        self.peak = 0.0;
        self.energy = 0.0;
        self.level_db = GATE_DB;
    }
}

/// Band filters and block timing built for one sampling rate
#[derive(Debug, Clone)]
pub struct CompanderDesign {
    bands: Vec<Band>,
    block_frames: usize,
    level_coeff: f32,
    sample_rate: f32,
}

impl CompanderDesign {
    /// Build the band layout for `settings` at `sample_rate`
    pub fn prepare(settings: &CompanderSettings, sample_rate: f32) -> Self {
        let rate = f64::from(sample_rate);

        let mut centers: Vec<(f64, f64)> = settings
            .frequencies
            .iter()
            .copied()
            .zip(settings.strengths.iter().copied())
            .filter(|(f, _)| *f > 0.0 && f.is_finite())
            .collect();
        centers.sort_by(|a, b| a.0.total_cmp(&b.0));

        let bands = centers
            .iter()
            .enumerate()
            .map(|(i, (frequency, strength))| {
                let below = if i > 0 { centers[i - 1].0 } else { frequency / 2.0 };
                let above = centers.get(i + 1).map_or(frequency * 2.0, |c| c.0);
                let q = bandwidth_q((above / below).log2() / 2.0);
                Band::new(*frequency, *strength, q, rate)
            })
            .collect();

        let block_frames = settings.block_frames();
        let block_rate = sample_rate / block_frames as f32;
        Self {
            bands,
            block_frames,
            level_coeff: time_constant_coeff(settings.time_constant, block_rate),
            sample_rate,
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }
}

/// Multiband compander effect
///
/// # Real-Time Safety
/// - Band state arrives prepared in a [`CompanderDesign`]; neither
///   `install` nor `process()` builds filters
pub struct Compander {
    settings: Option<Box<CompanderSettings>>,
    design: CompanderDesign,
    frames_in_block: usize,
    enabled: bool,
}

impl Compander {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            settings: None,
            design: CompanderDesign {
                bands: Vec::new(),
                block_frames: 128,
                level_coeff: 0.0,
                sample_rate,
            },
            frames_in_block: 0,
            enabled: false,
        }
    }

    /// Swap in prepared settings and bands; returns the previous ones
    pub fn install(
        &mut self,
        enabled: bool,
        settings: Box<CompanderSettings>,
        mut design: Box<CompanderDesign>,
    ) -> (Option<Box<CompanderSettings>>, Box<CompanderDesign>) {
        std::mem::swap(&mut self.design, &mut *design);
        self.frames_in_block = 0;
        self.enabled = enabled;
        (self.settings.replace(settings), design)
    }

    /// Rate the running band filters were designed for
    pub fn design_rate(&self) -> f32 {
        self.design.sample_rate
    }

    pub fn settings(&self) -> Option<&CompanderSettings> {
        self.settings.as_deref()
    }

    /// Current per-band gains in dB
    pub fn band_gains(&self) -> Vec<f32> {
        self.design.bands.iter().map(Band::target_gain).collect()
    }

    fn end_block(&mut self, detector: Detector) {
        let rate = f64::from(self.design.sample_rate);
        let frames = self.design.block_frames;
        let coeff = self.design.level_coeff;
        for band in &mut self.design.bands {
            let level = band.block_level(detector, frames);
            band.level_db = level + coeff * (band.level_db - level);
            let gain = band.target_gain();
            band.shaper
                .retarget(Coefficients::peaking(band.frequency, band.q, f64::from(gain), rate));
        }
    }
}

impl AudioEffect for Compander {
    fn process(&mut self, buffer: &mut [f32]) {
        if !self.enabled || self.design.bands.is_empty() {
            return;
        }
        let detector = self
            .settings
            .as_ref()
            .map_or(Detector::Peak, |s| s.detector);

        for frame in buffer.chunks_exact_mut(2) {
            let (mut l, mut r) = (frame[0], frame[1]);
            for band in &mut self.design.bands {
                band.detect(frame[0], frame[1]);
                (l, r) = band.shaper.process_frame(l, r);
            }
            frame[0] = l;
            frame[1] = r;

            self.frames_in_block += 1;
            if self.frames_in_block >= self.design.block_frames {
                self.frames_in_block = 0;
                self.end_block(detector);
            }
        }
    }

    /// The current bands keep running until a redesign is installed
    fn set_sample_rate(&mut self, _sample_rate: f32) {}

    fn reset(&mut self) {
        self.design.bands.iter_mut().for_each(Band::reset);
        self.frames_in_block = 0;
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn name(&self) -> &str {
        "Compander"
    }
}
