//! Effect modules
//!
//! Every pipeline stage implements [`AudioEffect`] and processes interleaved
//! stereo `f32` frames in place.
//!
//! Available effects, in processing order:
//! - **OutputControl**: post gain and peak limiter
//! - **MultiEqualizer**: 15-band FIR or IIR equalizer
//! - **GraphicEq**: free-form node list realized as a minimum phase FIR
//! - **Ddc**: biquad cascade loaded from a DDC file
//! - **Compander**: seven-band dynamic EQ
//! - **BassBoost**: level-dependent low shelf
//! - **StereoWidener**: mid/side width
//! - **Crossfeed**: Bauer stereophonic-to-binaural filter
//! - **VacuumTube**: asymmetric saturation
//! - **Convolver**: impulse response convolution
//! - **Reverb**: Freeverb style room simulation
//! - **Liveprog**: user script

mod bass_boost;
mod biquad;
mod compander;
mod convolution;
mod convolver;
mod crossfeed;
mod ddc;
mod effect;
mod eq;
mod fir;
mod graphic_eq;
mod impulse;
mod liveprog;
mod output;
mod reverb;
mod stereo;
mod tube;

pub use bass_boost::BassBoost;
pub use biquad::{Biquad, Coefficients};
pub use compander::{Compander, CompanderDesign, CompanderSettings, Detector, COMPANDER_BANDS};
pub use convolution::{convolve_reference, ImpulseResponse, StereoConvolver, TIME_DOMAIN_THRESHOLD};
pub use convolver::Convolver;
pub use crossfeed::{Crossfeed, CrossfeedPreset, CrossfeedSettings, CROSSFEED_MODE_CUSTOM};
pub use ddc::{Ddc, DdcDesign};
pub use effect::AudioEffect;
pub use eq::{EqDesign, EqFilterType, EqSettings, MultiEqualizer, EQ_BAND_COUNT};
pub use fir::{design_fir, minimum_phase, response_db, Curve, Interpolation};
pub use graphic_eq::{
    has_prefix as has_graphic_eq_prefix, prepare_graphic_eq, GraphicEq, GraphicEqNode,
    GraphicEqNodeList,
};
pub use impulse::{
    apply_tuning, decode_wav, error_code as impulse_error_code, prepare_impulse, resample,
    AdvancedTuning, ConvolverMode, ADV_BAD_TOKEN, ADV_DEFAULT, ADV_WRONG_COUNT,
};
pub use liveprog::Liveprog;
pub use output::{OutputControl, OutputSettings};
pub use reverb::{Reverb, ReverbPreset, REVERB_PRESETS};
pub use stereo::StereoWidener;
pub use tube::VacuumTube;

use crate::error::{AudioError, Result};

/// Parse a `;`-separated list of up to `len` numbers, zero-filling the rest
///
/// The whole list is rejected on the first bad token or when it holds more
/// than `len` numbers.
pub(crate) fn parse_number_list(text: &str, len: usize) -> Result<Vec<f64>> {
    let mut values = text
        .split(';')
        .map(|token| {
            let token = token.trim();
            token
                .parse::<f64>()
                .map_err(|_| AudioError::invalid_parameter(format!("'{token}' is not a number")))
        })
        .collect::<Result<Vec<f64>>>()?;

    if values.len() > len {
        return Err(AudioError::invalid_parameter(format!(
            "expected at most {len} values, got {}",
            values.len()
        )));
    }
    values.resize(len, 0.0);
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_list_zero_fills_short_input() {
        assert_eq!(parse_number_list("1; 2.5;-3", 3).unwrap(), vec![1.0, 2.5, -3.0]);
        assert_eq!(parse_number_list("1;2", 4).unwrap(), vec![1.0, 2.0, 0.0, 0.0]);
    }

    #[test]
    fn number_list_rejects_bad_or_extra_tokens() {
        assert!(parse_number_list("1;2;3;4", 3).is_err());
        assert!(parse_number_list("1;2;3;", 3).is_err());
        assert!(parse_number_list("1;two;3", 3).is_err());
        assert!(parse_number_list("", 3).is_err());
    }
}
