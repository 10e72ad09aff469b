//! Buffer codec
//!
//! Converts host sample buffers (interleaved `i16`, `i32` or `f32`) into the
//! engine's internal `f32` representation and back. Samples and channels keep
//! their positions; output length always equals input length.

/// A host sample representation
pub trait Sample: Copy + Send + 'static {
    /// Convert to the internal float representation
    fn to_f32(self) -> f32;

    /// Convert back, rounding and saturating where the format requires it
    fn from_f32(value: f32) -> Self;
}

impl Sample for i16 {
    #[inline]
    fn to_f32(self) -> f32 {
        f32::from(self) / 32768.0
    }

    #[inline]
    fn from_f32(value: f32) -> Self {
        // `as` saturates and maps NaN to 0
        (value * 32768.0).round() as i16
    }
}

impl Sample for i32 {
    #[inline]
    fn to_f32(self) -> f32 {
        (f64::from(self) / 2_147_483_648.0) as f32
    }

    #[inline]
    fn from_f32(value: f32) -> Self {
        (f64::from(value) * 2_147_483_648.0).round() as i32
    }
}

impl Sample for f32 {
    #[inline]
    fn to_f32(self) -> f32 {
        self
    }

    #[inline]
    fn from_f32(value: f32) -> Self {
        value
    }
}

/// Reusable conversion scratch space
///
/// The scratch buffer only grows, so steady-state processing with a fixed
/// host buffer size does not allocate.
#[derive(Debug, Default)]
pub struct Codec {
    scratch: Vec<f32>,
}

impl Codec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-size the scratch buffer
    pub fn with_capacity(samples: usize) -> Self {
        Self {
            scratch: Vec::with_capacity(samples),
        }
    }

    /// Decode `input` into the scratch buffer, run `f` on it and encode the
    /// result into `output`
    ///
    /// Only `min(input.len(), output.len())` samples are touched.
    pub fn run<T: Sample>(&mut self, input: &[T], output: &mut [T], f: impl FnOnce(&mut [f32])) {
        let len = input.len().min(output.len());
        if self.scratch.len() < len {
            self.scratch.resize(len, 0.0);
        }

        let scratch = &mut self.scratch[..len];
        for (dst, src) in scratch.iter_mut().zip(input) {
            *dst = src.to_f32();
        }

        f(scratch);

        for (dst, src) in output.iter_mut().zip(scratch.iter()) {
            *dst = T::from_f32(*src);
        }
    }

    /// Current scratch size in samples
    pub fn capacity(&self) -> usize {
        self.scratch.len()
    }
}

/// Copy `input` to `output` unchanged (bypass and closed-handle path)
#[inline]
pub fn pass_through<T: Sample>(input: &[T], output: &mut [T]) {
    let len = input.len().min(output.len());
    output[..len].copy_from_slice(&input[..len]);
}
