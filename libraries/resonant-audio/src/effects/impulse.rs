//! Impulse response loading and preparation
//!
//! Everything here runs on the control side: decode the WAV file, resample
//! it to the engine rate, then apply the advanced tuning (trims, per-side
//! gain and delay) and the optimization mode before the convolver gets it.

use super::convolution::ImpulseResponse;
use super::fir::minimum_phase;
use crate::error::{AudioError, Result};
use crate::events::ConvolverErrorCode;
use hound::{SampleFormat, WavReader};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::io::Cursor;
use tracing::{debug, warn};

/// Number of values in the tuning string
pub const ADV_PARAM_COUNT: usize = 6;

/// Neutral tuning for a fresh configuration and for out-of-range values
pub const ADV_DEFAULT: [i32; ADV_PARAM_COUNT] = [-80, -100, 0, 0, 0, 0];

/// Tuning used when the string has the right length but bad tokens
pub const ADV_BAD_TOKEN: [i32; ADV_PARAM_COUNT] = [-80, -100, 23, 12, 17, 28];

/// Tuning used when the string has the wrong number of tokens
pub const ADV_WRONG_COUNT: [i32; ADV_PARAM_COUNT] = [-100, -100, 0, 0, 0, 0];

/// Trim thresholds at or below this disable the trim
const TRIM_DISABLED_DB: i32 = -100;

/// Largest per-side delay in samples
const MAX_DELAY_SAMPLES: i32 = 4800;

/// Convolver optimization mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvolverMode {
    /// Use the response as loaded
    Original,
    /// Trim the tail at the tuning threshold
    Shrink,
    /// Convert to minimum phase, then trim the tail
    MinimumPhaseShrink,
}

impl ConvolverMode {
    pub fn from_setting(value: i32) -> Self {
        match value {
            0 => ConvolverMode::Original,
            1 => ConvolverMode::Shrink,
            2 => ConvolverMode::MinimumPhaseShrink,
            other => {
                warn!("Unknown convolver mode {}; using original", other);
                ConvolverMode::Original
            }
        }
    }
}

/// Advanced impulse response tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvancedTuning {
    /// Tail trim threshold (dB relative to peak)
    pub tail_threshold_db: i32,
    /// Head trim threshold (dB relative to peak)
    pub head_threshold_db: i32,
    /// Left gain in 0.1 dB
    pub left_gain: i32,
    /// Right gain in 0.1 dB
    pub right_gain: i32,
    /// Left delay in samples
    pub left_delay: i32,
    /// Right delay in samples
    pub right_delay: i32,
}

impl AdvancedTuning {
    pub fn from_array(values: [i32; ADV_PARAM_COUNT]) -> Self {
        Self {
            tail_threshold_db: values[0],
            head_threshold_db: values[1],
            left_gain: values[2],
            right_gain: values[3],
            left_delay: values[4],
            right_delay: values[5],
        }
    }

    pub fn to_array(self) -> [i32; ADV_PARAM_COUNT] {
        [
            self.tail_threshold_db,
            self.head_threshold_db,
            self.left_gain,
            self.right_gain,
            self.left_delay,
            self.right_delay,
        ]
    }

    /// Parse the `;`-separated tuning string
    ///
    /// A wrong token count yields [`ADV_WRONG_COUNT`], a right count with a
    /// non-integer token yields [`ADV_BAD_TOKEN`]; both report
    /// `AdvParamsInvalid`. The two fallbacks differ in the tail threshold and
    /// the bad-token one carries non-zero gains and delays.
    pub fn parse(text: &str) -> (Self, Option<ConvolverErrorCode>) {
        let tokens: Vec<&str> = text.split(';').map(str::trim).collect();
        if tokens.len() != ADV_PARAM_COUNT {
            warn!(
                "Convolver tuning has {} values, expected {}",
                tokens.len(),
                ADV_PARAM_COUNT
            );
            return (
                Self::from_array(ADV_WRONG_COUNT),
                Some(ConvolverErrorCode::AdvParamsInvalid),
            );
        }

        let mut values = [0; ADV_PARAM_COUNT];
        for (slot, token) in values.iter_mut().zip(&tokens) {
            match token.parse::<i32>() {
                Ok(v) => *slot = v,
                Err(_) => {
                    warn!("Convolver tuning token '{}' is not an integer", token);
                    return (
                        Self::from_array(ADV_BAD_TOKEN),
                        Some(ConvolverErrorCode::AdvParamsInvalid),
                    );
                }
            }
        }
        (Self::from_array(values), None)
    }

    /// Thresholds non-positive and delays within 0..=4800
    pub fn is_valid(&self) -> bool {
        let delay_ok = |d: i32| (0..=MAX_DELAY_SAMPLES).contains(&d);
        self.tail_threshold_db <= 0
            && self.head_threshold_db <= 0
            && delay_ok(self.left_delay)
            && delay_ok(self.right_delay)
    }

    fn is_neutral_levels(&self) -> bool {
        self.left_gain == 0 && self.right_gain == 0 && self.left_delay == 0 && self.right_delay == 0
    }
}

impl Default for AdvancedTuning {
    fn default() -> Self {
        Self::from_array(ADV_DEFAULT)
    }
}

/// Decode a WAV file
///
/// Integer samples are scaled by `1 / 2^(bits - 1)`.
///
/// # Errors
/// `EmptyImpulse` for a file without frames, `UnsupportedChannels` for
/// layouts other than 1, 2 or 4 channels, `Wav` for undecodable data.
pub fn decode_wav(bytes: &[u8]) -> Result<ImpulseResponse> {
    let reader = WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<_, _>>()?,
        SampleFormat::Int => {
            let scale = 1.0 / (1_i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<std::result::Result<_, _>>()?
        }
    };

    if samples.is_empty() {
        return Err(AudioError::EmptyImpulse);
    }
    debug!(
        "Decoded impulse response: {} ch, {} Hz, {} samples",
        spec.channels,
        spec.sample_rate,
        samples.len()
    );
    ImpulseResponse::new(usize::from(spec.channels), spec.sample_rate as f32, samples)
}

/// Resample to `target_rate`; unchanged when the rates already match
///
/// # Errors
/// `Resampling` when rubato rejects the ratio or the data.
pub fn resample(ir: &ImpulseResponse, target_rate: f32) -> Result<ImpulseResponse> {
    if (ir.sample_rate() - target_rate).abs() < f32::EPSILON {
        return Ok(ir.clone());
    }
    if target_rate <= 0.0 || ir.sample_rate() <= 0.0 {
        return Err(AudioError::Resampling(format!(
            "invalid rates {} -> {}",
            ir.sample_rate(),
            target_rate
        )));
    }

    let input = ir.split_channels();
    let frames = ir.frames();
    let ratio = f64::from(target_rate) / f64::from(ir.sample_rate());

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Cubic,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, frames, input.len())
        .map_err(|e| AudioError::Resampling(format!("resampler creation failed: {e}")))?;

    let delay = resampler.output_delay();
    let expected = (frames as f64 * ratio - 1e-6).ceil().max(1.0) as usize;

    let mut output = resampler
        .process(&input, None)
        .map_err(|e| AudioError::Resampling(format!("resampling failed: {e}")))?;

    // flush the filter delay with silence
    let mut flushes = 0;
    while output.first().map_or(0, Vec::len) < delay + expected && flushes < 8 {
        let tail = resampler
            .process_partial::<Vec<f32>>(None, None)
            .map_err(|e| AudioError::Resampling(format!("resampler flush failed: {e}")))?;
        for (channel, rest) in output.iter_mut().zip(tail) {
            channel.extend(rest);
        }
        flushes += 1;
    }

    let channels: Vec<Vec<f32>> = output
        .into_iter()
        .map(|channel| {
            let end = (delay + expected).min(channel.len());
            channel[delay.min(end)..end].to_vec()
        })
        .collect();

    debug!(
        "Resampled impulse response {} -> {} Hz ({} -> {} frames)",
        ir.sample_rate(),
        target_rate,
        frames,
        expected
    );
    ImpulseResponse::from_channels(target_rate, &channels)
}

/// Apply the optimization mode and tuning
pub fn apply_tuning(
    ir: &ImpulseResponse,
    tuning: &AdvancedTuning,
    mode: ConvolverMode,
) -> Result<ImpulseResponse> {
    let mut channels = ir.split_channels();

    if mode == ConvolverMode::MinimumPhaseShrink {
        channels = channels.iter().map(|c| minimum_phase(c)).collect();
    }

    let peak = channels
        .iter()
        .flat_map(|c| c.iter())
        .fold(0.0f32, |m, s| m.max(s.abs()));

    if peak > 0.0 {
        if tuning.head_threshold_db > TRIM_DISABLED_DB {
            let level = peak * threshold_linear(tuning.head_threshold_db);
            let start = first_above(&channels, level).unwrap_or(0);
            for channel in &mut channels {
                channel.drain(..start);
            }
        }
        if mode != ConvolverMode::Original && tuning.tail_threshold_db > TRIM_DISABLED_DB {
            let level = peak * threshold_linear(tuning.tail_threshold_db);
            if let Some(last) = last_above(&channels, level) {
                for channel in &mut channels {
                    channel.truncate(last + 1);
                }
            }
        }
    }

    if !tuning.is_neutral_levels() {
        // a mono response cannot carry different sides
        if channels.len() == 1
            && (tuning.left_gain != tuning.right_gain || tuning.left_delay != tuning.right_delay)
        {
            let mono = channels[0].clone();
            channels.push(mono);
        }

        let count = channels.len();
        for (index, channel) in channels.iter_mut().enumerate() {
            let right_side = count > 1 && index % 2 == 1;
            let (gain, delay) = if right_side {
                (tuning.right_gain, tuning.right_delay)
            } else {
                (tuning.left_gain, tuning.left_delay)
            };
            let linear = 10.0_f32.powf(gain as f32 / 200.0);
            channel.iter_mut().for_each(|s| *s *= linear);
            let delay = delay.clamp(0, MAX_DELAY_SAMPLES) as usize;
            if delay > 0 {
                channel.splice(0..0, std::iter::repeat(0.0).take(delay));
            }
        }

        let longest = channels.iter().map(Vec::len).max().unwrap_or(0);
        for channel in &mut channels {
            channel.resize(longest, 0.0);
        }
    }

    ImpulseResponse::from_channels(ir.sample_rate(), &channels)
}

/// Decode, resample and tune in one go
pub fn prepare_impulse(
    bytes: &[u8],
    sample_rate: f32,
    mode: ConvolverMode,
    tuning: &AdvancedTuning,
) -> Result<ImpulseResponse> {
    let decoded = decode_wav(bytes)?;
    let resampled = resample(&decoded, sample_rate)?;
    apply_tuning(&resampled, tuning, mode)
}

/// Error code reported for a failed preparation
pub fn error_code(error: &AudioError) -> ConvolverErrorCode {
    match error {
        AudioError::EmptyImpulse => ConvolverErrorCode::NoFrames,
        _ => ConvolverErrorCode::Corrupted,
    }
}

fn threshold_linear(db: i32) -> f32 {
    10.0_f32.powf(db as f32 / 20.0)
}

fn first_above(channels: &[Vec<f32>], level: f32) -> Option<usize> {
    let frames = channels.first().map_or(0, Vec::len);
    (0..frames).find(|&i| channels.iter().any(|c| c[i].abs() >= level))
}

fn last_above(channels: &[Vec<f32>], level: f32) -> Option<usize> {
    let frames = channels.first().map_or(0, Vec::len);
    (0..frames)
        .rev()
        .find(|&i| channels.iter().any(|c| c[i].abs() >= level))
}
