/// Effect module interface
///
/// Every stage of the processing pipeline implements [`AudioEffect`]. All
/// effects operate in place on interleaved stereo `f32` frames.

/// Trait implemented by every effect module
///
/// # Safety
/// - Must NOT allocate memory in `process()` (real-time constraint)
/// - Must be Send so the pipeline can move to the audio thread
pub trait AudioEffect: Send {
    /// Process audio buffer in-place
    ///
    /// # Arguments
    /// * `buffer` - Interleaved stereo samples (L, R, L, R, ...), even length
    ///
    /// # Real-Time Constraints
    /// - No allocations
    /// - No blocking operations
    /// - Deterministic execution time
    fn process(&mut self, buffer: &mut [f32]);

    /// Recompute everything that depends on the sampling rate
    ///
    /// Called by the pipeline before the next `process` whenever the host
    /// rate changes.
    fn set_sample_rate(&mut self, sample_rate: f32);

    /// Clear filter and envelope state
    fn reset(&mut self);

    /// Enable/disable the effect
    fn set_enabled(&mut self, enabled: bool);

    /// Check if effect is enabled
    fn is_enabled(&self) -> bool;

    /// Get effect name (for logging)
    fn name(&self) -> &str;
}

/// Convert dB to linear gain
#[inline]
pub(crate) fn db_to_linear(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}

/// Convert linear gain to dB, floored at -120 dB
#[inline]
pub(crate) fn linear_to_db(linear: f32) -> f32 {
    if linear <= 1e-6 {
        -120.0
    } else {
        20.0 * linear.log10()
    }
}

/// One-pole smoothing coefficient for a time constant in seconds
#[inline]
pub(crate) fn time_constant_coeff(seconds: f32, sample_rate: f32) -> f32 {
    let samples = seconds * sample_rate;
    if samples <= 0.0 {
        0.0
    } else {
        (-1.0 / samples).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_conversions() {
        assert!((db_to_linear(0.0) - 1.0).abs() < 1e-6);
        assert!((db_to_linear(-6.0206) - 0.5).abs() < 1e-4);
        assert!((linear_to_db(0.5) + 6.0206).abs() < 1e-3);
        assert_eq!(linear_to_db(0.0), -120.0);
    }

    #[test]
    fn zero_time_constant_is_instant() {
        assert_eq!(time_constant_coeff(0.0, 48000.0), 0.0);
        let c = time_constant_coeff(0.01, 48000.0);
        assert!(c > 0.99 && c < 1.0);
    }
}
