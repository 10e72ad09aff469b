/// Crossfeed (Bauer stereophonic-to-binaural)
///
/// Each output channel is a high-boosted copy of itself plus a low-passed
/// copy of the opposite channel. The filter pair is derived from a cutoff
/// frequency and a feed level so that a mono signal keeps unity gain.
use super::effect::AudioEffect;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::warn;

/// Setting value selecting custom cutoff and feed
pub const CROSSFEED_MODE_CUSTOM: i32 = 99;

const MIN_CUTOFF_HZ: f32 = 300.0;
const MAX_CUTOFF_HZ: f32 = 2000.0;
const MIN_FEED_DB: f32 = 1.0;
const MAX_FEED_DB: f32 = 15.0;

/// Built-in crossfeed presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrossfeedPreset {
    /// 700 Hz, 4.5 dB
    Default,
    /// 700 Hz, 6.0 dB
    ChuMoy,
    /// 650 Hz, 9.5 dB
    JanMeier,
    /// 600 Hz, 11.0 dB
    Strong,
}

impl CrossfeedPreset {
    /// Map a mode setting, falling back to `Default` with a warning
    pub fn from_mode(mode: i32) -> Self {
        match mode {
            0 => CrossfeedPreset::Default,
            1 => CrossfeedPreset::ChuMoy,
            2 => CrossfeedPreset::JanMeier,
            3 => CrossfeedPreset::Strong,
            other => {
                warn!("Unknown crossfeed mode {}; using default", other);
                CrossfeedPreset::Default
            }
        }
    }

    pub fn cutoff_hz(&self) -> f32 {
        match self {
            CrossfeedPreset::Default | CrossfeedPreset::ChuMoy => 700.0,
            CrossfeedPreset::JanMeier => 650.0,
            CrossfeedPreset::Strong => 600.0,
        }
    }

    pub fn feed_db(&self) -> f32 {
        match self {
            CrossfeedPreset::Default => 4.5,
            CrossfeedPreset::ChuMoy => 6.0,
            CrossfeedPreset::JanMeier => 9.5,
            CrossfeedPreset::Strong => 11.0,
        }
    }
}

/// Crossfeed parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CrossfeedSettings {
    pub cutoff_hz: f32,
    /// Feed level in dB
    pub feed_db: f32,
}

impl CrossfeedSettings {
    pub fn from_preset(preset: CrossfeedPreset) -> Self {
        Self {
            cutoff_hz: preset.cutoff_hz(),
            feed_db: preset.feed_db(),
        }
    }

    /// Custom cutoff in Hz and feed in 0.1 dB units, clamped
    pub fn custom(cutoff_hz: i32, feed_tenths_db: i32) -> Self {
        Self {
            cutoff_hz: (cutoff_hz as f32).clamp(MIN_CUTOFF_HZ, MAX_CUTOFF_HZ),
            feed_db: (feed_tenths_db as f32 / 10.0).clamp(MIN_FEED_DB, MAX_FEED_DB),
        }
    }
}

impl Default for CrossfeedSettings {
    fn default() -> Self {
        Self::from_preset(CrossfeedPreset::Default)
    }
}

/// Filter coefficients derived from the settings
#[derive(Debug, Clone, Copy, Default)]
struct Filters {
    a0_lo: f64,
    b1_lo: f64,
    a0_hi: f64,
    a1_hi: f64,
    b1_hi: f64,
    gain: f64,
}

impl Filters {
    fn design(settings: CrossfeedSettings, sample_rate: f32) -> Self {
        let rate = f64::from(sample_rate.max(1.0));
        let feed = f64::from(settings.feed_db);
        let cutoff = f64::from(settings.cutoff_hz);

        let gb_lo = feed * -5.0 / 6.0 - 3.0;
        let gb_hi = feed / 6.0 - 3.0;
        let g_lo = 10.0_f64.powf(gb_lo / 20.0);
        let g_hi = 1.0 - 10.0_f64.powf(gb_hi / 20.0);
        let cutoff_hi = cutoff * 2.0_f64.powf((gb_lo - 20.0 * g_hi.log10()) / 12.0);

        let x = (-2.0 * PI * cutoff / rate).exp();
        let a0_lo = g_lo * (1.0 - x);
        let b1_lo = x;

        let x = (-2.0 * PI * cutoff_hi / rate).exp();
        let a0_hi = 1.0 - g_hi * (1.0 - x);
        let a1_hi = -x;
        let b1_hi = x;

        Self {
            a0_lo,
            b1_lo,
            a0_hi,
            a1_hi,
            b1_hi,
            gain: 1.0 / (1.0 - g_hi + g_lo),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct ChannelState {
    lo: f64,
    hi: f64,
    last_input: f64,
}

pub struct Crossfeed {
    settings: CrossfeedSettings,
    filters: Filters,
    left: ChannelState,
    right: ChannelState,
    sample_rate: f32,
    enabled: bool,
}

impl Crossfeed {
    pub fn new(sample_rate: f32) -> Self {
        let settings = CrossfeedSettings::default();
        Self {
            settings,
            filters: Filters::design(settings, sample_rate),
            left: ChannelState::default(),
            right: ChannelState::default(),
            sample_rate,
            enabled: false,
        }
    }

    pub fn set_settings(&mut self, settings: CrossfeedSettings) {
        self.settings = settings;
        self.filters = Filters::design(settings, self.sample_rate);
    }

    pub fn settings(&self) -> CrossfeedSettings {
        self.settings
    }
}

impl AudioEffect for Crossfeed {
    fn process(&mut self, buffer: &mut [f32]) {
        if !self.enabled {
            return;
        }
        let f = self.filters;

        for chunk in buffer.chunks_exact_mut(2) {
            let left = f64::from(chunk[0]);
            let right = f64::from(chunk[1]);

            self.left.lo = f.a0_lo * left + f.b1_lo * self.left.lo;
            self.right.lo = f.a0_lo * right + f.b1_lo * self.right.lo;

            self.left.hi = f.a0_hi * left + f.a1_hi * self.left.last_input + f.b1_hi * self.left.hi;
            self.right.hi =
                f.a0_hi * right + f.a1_hi * self.right.last_input + f.b1_hi * self.right.hi;
            self.left.last_input = left;
            self.right.last_input = right;

            chunk[0] = ((self.left.hi + self.right.lo) * f.gain) as f32;
            chunk[1] = ((self.right.hi + self.left.lo) * f.gain) as f32;
        }
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.filters = Filters::design(self.settings, sample_rate);
    }

    fn reset(&mut self) {
        self.left = ChannelState::default();
        self.right = ChannelState::default();
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn name(&self) -> &str {
        "Crossfeed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 44100.0;

    #[test]
    fn test_preset_values() {
        let chu_moy = CrossfeedSettings::from_preset(CrossfeedPreset::ChuMoy);
        assert_eq!(chu_moy.cutoff_hz, 700.0);
        assert_eq!(chu_moy.feed_db, 6.0);
        let meier = CrossfeedSettings::from_preset(CrossfeedPreset::JanMeier);
        assert_eq!(meier.cutoff_hz, 650.0);
        assert_eq!(meier.feed_db, 9.5);
    }

    #[test]
    fn test_unknown_mode_falls_back() {
        assert_eq!(CrossfeedPreset::from_mode(3), CrossfeedPreset::Strong);
        assert_eq!(CrossfeedPreset::from_mode(42), CrossfeedPreset::Default);
    }

    #[test]
    fn test_custom_settings() {
        let custom = CrossfeedSettings::custom(700, 60);
        assert_eq!(custom.cutoff_hz, 700.0);
        assert!((custom.feed_db - 6.0).abs() < 1e-6);

        let clamped = CrossfeedSettings::custom(50, 500);
        assert_eq!(clamped.cutoff_hz, 300.0);
        assert_eq!(clamped.feed_db, 15.0);
    }

    #[test]
    fn test_process_stereo() {
        let mut crossfeed = Crossfeed::new(SR);
        crossfeed.set_enabled(true);

        // hard-left DC step: right channel picks up crossfeed
        let mut buffer = vec![0.0f32; 2 * 2048];
        for frame in buffer.chunks_exact_mut(2) {
            frame[0] = 1.0;
        }
        crossfeed.process(&mut buffer);
        let last_right = buffer[buffer.len() - 1];
        assert!(last_right > 0.1, "no crossfeed: {last_right}");
        assert!(buffer[buffer.len() - 2] > last_right);
    }

    #[test]
    fn test_mono_signal_unchanged() {
        let mut crossfeed = Crossfeed::new(SR);
        crossfeed.set_enabled(true);

        let mut buffer = vec![0.5f32; 2 * 8192];
        crossfeed.process(&mut buffer);
        let tail = &buffer[buffer.len() - 2..];
        assert!((tail[0] - 0.5).abs() < 1e-3);
        assert!((tail[1] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_disabled_bypass() {
        let mut crossfeed = Crossfeed::new(SR);
        let mut buffer = vec![1.0, 0.0, 0.5, -0.5];
        let original = buffer.clone();
        crossfeed.process(&mut buffer);
        assert_eq!(buffer, original);
    }

    #[test]
    fn test_reset() {
        let mut crossfeed = Crossfeed::new(SR);
        crossfeed.set_enabled(true);
        let mut buffer = vec![1.0f32, 0.0, 1.0, 0.0];
        crossfeed.process(&mut buffer);
        crossfeed.reset();

        let mut silence = vec![0.0f32; 4];
        crossfeed.process(&mut silence);
        assert!(silence.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_name() {
        assert_eq!(Crossfeed::new(SR).name(), "Crossfeed");
    }
}
