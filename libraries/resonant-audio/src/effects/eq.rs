//! 15-band multi equalizer
//!
//! Bands are given as 15 center frequencies followed by 15 gains. The
//! response is realized either as a minimum phase FIR fitted to the
//! interpolated curve, or as a cascade of peaking sections.

use super::biquad::{bandwidth_q, process_cascade, Biquad, Coefficients};
use super::convolution::{ImpulseResponse, StereoConvolver};
use super::effect::AudioEffect;
use super::fir::{design_fir, Curve, Interpolation};
use super::parse_number_list;
use crate::error::Result;

/// Number of bands
pub const EQ_BAND_COUNT: usize = 15;

/// FIR length used for the minimum phase mode
pub const EQ_FIR_TAPS: usize = 4096;

/// Gains below this magnitude count as flat
const FLAT_DB: f64 = 1e-3;

/// Filter realization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EqFilterType {
    /// Minimum phase FIR
    FirMinimumPhase,
    /// Peaking cascade of the given order (4, 6, 8, 10 or 12)
    Iir(u8),
}

impl EqFilterType {
    /// Map the filter type setting (0 = FIR, 1..=5 = IIR order 4..=12)
    pub fn from_setting(value: i32) -> Self {
        match value {
            1..=5 => EqFilterType::Iir(2 + 2 * value as u8),
            _ => EqFilterType::FirMinimumPhase,
        }
    }

    /// Biquad sections per band
    pub fn sections(&self) -> usize {
        match self {
            EqFilterType::FirMinimumPhase => 0,
            EqFilterType::Iir(order) => usize::from(*order / 2),
        }
    }
}

/// Parsed equalizer configuration
#[derive(Debug, Clone, PartialEq)]
pub struct EqSettings {
    pub filter_type: EqFilterType,
    pub interpolation: Interpolation,
    pub frequencies: [f64; EQ_BAND_COUNT],
    pub gains: [f64; EQ_BAND_COUNT],
}

impl EqSettings {
    /// Parse the `;`-separated band string (15 frequencies then 15 gains)
    ///
    /// # Errors
    /// Any non-numeric token or more than 30 tokens rejects the whole
    /// string. Missing trailing values read as zero.
    pub fn parse(filter_type: i32, interpolation: i32, bands: &str) -> Result<Self> {
        let values = parse_number_list(bands, EQ_BAND_COUNT * 2)?;

        let mut frequencies = [0.0; EQ_BAND_COUNT];
        let mut gains = [0.0; EQ_BAND_COUNT];
        frequencies.copy_from_slice(&values[..EQ_BAND_COUNT]);
        gains.copy_from_slice(&values[EQ_BAND_COUNT..]);

        Ok(Self {
            filter_type: EqFilterType::from_setting(filter_type),
            interpolation: Interpolation::from_setting(interpolation),
            frequencies,
            gains,
        })
    }

    pub fn is_flat(&self) -> bool {
        self.gains.iter().all(|g| g.abs() < FLAT_DB)
    }

    fn points(&self) -> Vec<(f64, f64)> {
        self.frequencies
            .iter()
            .copied()
            .zip(self.gains.iter().copied())
            .collect()
    }
}

/// Equalizer realized for one sample rate
pub enum EqDesign {
    /// All gains flat
    Flat,
    Fir(StereoConvolver),
    Iir(Vec<Biquad>),
}

impl EqDesign {
    /// Realize `settings` at `sample_rate` (allocates; control side)
    pub fn prepare(settings: &EqSettings, sample_rate: f32) -> Self {
        if settings.is_flat() {
            return EqDesign::Flat;
        }
        let rate = f64::from(sample_rate);

        match settings.filter_type {
            EqFilterType::FirMinimumPhase => {
                let curve = Curve::log_frequency(&settings.points(), settings.interpolation);
                let kernel = design_fir(|f| curve.eval_frequency(f), EQ_FIR_TAPS, rate);
                match ImpulseResponse::new(1, sample_rate, kernel) {
                    Ok(ir) => EqDesign::Fir(StereoConvolver::new(&ir)),
                    Err(_) => EqDesign::Flat,
                }
            }
            filter_type @ EqFilterType::Iir(_) => {
                EqDesign::Iir(peaking_cascade(settings, filter_type.sections(), rate))
            }
        }
    }

    /// Added delay in frames
    pub fn latency(&self) -> usize {
        match self {
            EqDesign::Fir(conv) => conv.latency(),
            _ => 0,
        }
    }
}

/// One peaking band per center frequency, split over `sections` biquads
fn peaking_cascade(settings: &EqSettings, sections: usize, sample_rate: f64) -> Vec<Biquad> {
    let mut centers: Vec<(f64, f64)> = settings
        .points()
        .into_iter()
        .filter(|(f, _)| *f > 0.0 && f.is_finite())
        .collect();
    centers.sort_by(|a, b| a.0.total_cmp(&b.0));

    let sections = sections.max(1);
    let mut cascade = Vec::new();
    for (i, (frequency, gain)) in centers.iter().enumerate() {
        if gain.abs() < FLAT_DB {
            continue;
        }
        let below = if i > 0 { centers[i - 1].0 } else { frequency / 2.0 };
        let above = centers.get(i + 1).map_or(frequency * 2.0, |c| c.0);
        let q = bandwidth_q((above / below).log2() / 2.0);

        let coefficients =
            Coefficients::peaking(*frequency, q, gain / sections as f64, sample_rate);
        cascade.extend((0..sections).map(|_| Biquad::new(coefficients)));
    }
    cascade
}

/// Multi equalizer effect
pub struct MultiEqualizer {
    settings: Option<Box<EqSettings>>,
    design: EqDesign,
    enabled: bool,
}

impl MultiEqualizer {
    pub fn new() -> Self {
        Self {
            settings: None,
            design: EqDesign::Flat,
            enabled: false,
        }
    }

    /// Swap in a prepared design
    ///
    /// The returned boxes hold the previous settings and design.
    pub fn install(
        &mut self,
        enabled: bool,
        settings: Box<EqSettings>,
        mut design: Box<EqDesign>,
    ) -> (Option<Box<EqSettings>>, Box<EqDesign>) {
        std::mem::swap(&mut self.design, &mut *design);
        self.enabled = enabled;
        (self.settings.replace(settings), design)
    }

    pub fn settings(&self) -> Option<&EqSettings> {
        self.settings.as_deref()
    }

    pub fn latency(&self) -> usize {
        self.design.latency()
    }
}

impl Default for MultiEqualizer {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioEffect for MultiEqualizer {
    fn process(&mut self, buffer: &mut [f32]) {
        if !self.enabled {
            return;
        }
        match &mut self.design {
            EqDesign::Flat => {}
            EqDesign::Fir(conv) => conv.process(buffer),
            EqDesign::Iir(cascade) => process_cascade(cascade, buffer),
        }
    }

    /// The current design keeps running until a redesign is installed
    fn set_sample_rate(&mut self, _sample_rate: f32) {}

    fn reset(&mut self) {
        match &mut self.design {
            EqDesign::Flat => {}
            EqDesign::Fir(conv) => conv.reset(),
            EqDesign::Iir(cascade) => cascade.iter_mut().for_each(Biquad::reset),
        }
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn name(&self) -> &str {
        "Multi Equalizer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resonant_core::defaults;

    const SR: f32 = 48000.0;

    fn bands_with_gain(index: usize, gain: f64) -> String {
        let mut values: Vec<String> = defaults::EQ_BANDS.split(';').map(str::to_string).collect();
        values[EQ_BAND_COUNT + index] = gain.to_string();
        values.join(";")
    }

    #[test]
    fn default_bands_parse_flat() {
        let settings = EqSettings::parse(0, 0, defaults::EQ_BANDS).unwrap();
        assert!(settings.is_flat());
        assert_eq!(settings.frequencies[0], 25.0);
        assert_eq!(settings.frequencies[14], 16000.0);
        assert!(matches!(EqDesign::prepare(&settings, SR), EqDesign::Flat));
    }

    #[test]
    fn malformed_bands_are_rejected() {
        let bad = defaults::EQ_BANDS.replacen("0.0", "abc", 1);
        assert!(EqSettings::parse(0, 0, &bad).is_err());
        assert!(EqSettings::parse(0, 0, &format!("{};0", defaults::EQ_BANDS)).is_err());
    }

    #[test]
    fn short_band_string_is_zero_filled() {
        let settings = EqSettings::parse(0, 0, "25;40;63").unwrap();
        assert_eq!(settings.frequencies[..3], [25.0, 40.0, 63.0]);
        assert_eq!(settings.frequencies[3], 0.0);
        assert!(settings.is_flat());
    }

    #[test]
    fn filter_type_mapping() {
        assert_eq!(EqFilterType::from_setting(0), EqFilterType::FirMinimumPhase);
        assert_eq!(EqFilterType::from_setting(1), EqFilterType::Iir(4));
        assert_eq!(EqFilterType::from_setting(5), EqFilterType::Iir(12));
        assert_eq!(EqFilterType::from_setting(9), EqFilterType::FirMinimumPhase);
        assert_eq!(EqFilterType::Iir(8).sections(), 4);
    }

    #[test]
    fn iir_cascade_has_sections_per_active_band() {
        let settings = EqSettings::parse(3, 0, &bands_with_gain(8, 6.0)).unwrap();
        let EqDesign::Iir(cascade) = EqDesign::prepare(&settings, SR) else {
            panic!("expected IIR design");
        };
        assert_eq!(cascade.len(), 4);

        let total: f64 = cascade
            .iter()
            .map(|b| b.coefficients().magnitude_db(1000.0, f64::from(SR)))
            .sum();
        assert!((total - 6.0).abs() < 0.01);
    }

    #[test]
    fn fir_design_boosts_band() {
        let settings = EqSettings::parse(0, 1, &bands_with_gain(8, 6.0)).unwrap();
        let EqDesign::Fir(mut conv) = EqDesign::prepare(&settings, SR) else {
            panic!("expected FIR design");
        };

        // steady 1 kHz sine, compare output to input level
        let frames = 48000;
        let mut buffer: Vec<f32> = (0..frames)
            .flat_map(|i| {
                let s = (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / SR).sin() * 0.1;
                [s, s]
            })
            .collect();
        conv.process(&mut buffer);

        let tail = &buffer[buffer.len() / 2..];
        let peak = tail.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        let gain_db = 20.0 * (peak / 0.1).log10();
        assert!((gain_db - 6.0).abs() < 0.5, "gain {gain_db}");
    }

    #[test]
    fn rate_change_keeps_installed_design() {
        let mut eq = MultiEqualizer::new();
        let settings = EqSettings::parse(1, 0, &bands_with_gain(3, 12.0)).unwrap();
        let design = EqDesign::prepare(&settings, SR);
        eq.install(true, Box::new(settings), Box::new(design));

        let expected: Vec<Coefficients> = match &eq.design {
            EqDesign::Iir(cascade) => cascade.iter().map(|b| *b.coefficients()).collect(),
            _ => panic!("expected IIR design"),
        };

        eq.set_sample_rate(96000.0);
        let EqDesign::Iir(cascade) = &eq.design else {
            panic!("expected IIR design");
        };
        let running: Vec<Coefficients> = cascade.iter().map(|b| *b.coefficients()).collect();
        assert_eq!(running, expected);
    }

    #[test]
    fn disabled_equalizer_is_bypassed() {
        let mut eq = MultiEqualizer::new();
        let settings = EqSettings::parse(1, 0, &bands_with_gain(3, 12.0)).unwrap();
        let design = EqDesign::prepare(&settings, SR);
        let (previous, _) = eq.install(false, Box::new(settings), Box::new(design));
        assert!(previous.is_none());

        let mut buffer = vec![0.5, -0.5, 0.25, -0.25];
        let original = buffer.clone();
        eq.process(&mut buffer);
        assert_eq!(buffer, original);
    }
}
