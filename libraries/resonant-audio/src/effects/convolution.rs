//! Stereo convolution engine
//!
//! Short kernels (≤ [`TIME_DOMAIN_THRESHOLD`] frames) run as direct
//! convolution with no added latency. Longer kernels use uniformly
//! partitioned FFT convolution (overlap-save with a frequency-domain delay
//! line), which adds one partition of latency but keeps the per-buffer cost
//! independent of the host buffer size.
//!
//! Channel layouts follow the impulse response:
//! - 1 channel: the same kernel on both sides
//! - 2 channels: left kernel on left, right kernel on right
//! - 4 channels: true stereo (LL, LR, RL, RR)

use crate::error::{AudioError, Result};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// IRs at or below this length use direct convolution
pub const TIME_DOMAIN_THRESHOLD: usize = 64;

/// Smallest partition used by the FFT path
const MIN_PARTITION: usize = 64;

/// Largest partition used by the FFT path
const MAX_PARTITION: usize = 1024;

/// Decoded impulse response, interleaved by channel
#[derive(Debug, Clone, PartialEq)]
pub struct ImpulseResponse {
    channels: usize,
    sample_rate: f32,
    samples: Vec<f32>,
}

impl ImpulseResponse {
    /// Wrap interleaved samples
    ///
    /// # Errors
    /// Fails for layouts other than 1, 2 or 4 channels, for a sample count
    /// that is not a whole number of frames, and for empty data.
    pub fn new(channels: usize, sample_rate: f32, samples: Vec<f32>) -> Result<Self> {
        if !matches!(channels, 1 | 2 | 4) {
            return Err(AudioError::UnsupportedChannels(channels));
        }
        if samples.is_empty() {
            return Err(AudioError::EmptyImpulse);
        }
        if samples.len() % channels != 0 {
            return Err(AudioError::CorruptedImpulse(format!(
                "{} samples do not form whole {}-channel frames",
                samples.len(),
                channels
            )));
        }
        Ok(Self {
            channels,
            sample_rate,
            samples,
        })
    }

    /// Build from separate channel vectors of equal length
    pub fn from_channels(sample_rate: f32, channels: &[Vec<f32>]) -> Result<Self> {
        let frames = channels.first().map_or(0, Vec::len);
        if channels.iter().any(|c| c.len() != frames) {
            return Err(AudioError::CorruptedImpulse(
                "channel lengths differ".to_string(),
            ));
        }

        let mut samples = Vec::with_capacity(frames * channels.len());
        for frame in 0..frames {
            samples.extend(channels.iter().map(|c| c[frame]));
        }
        Self::new(channels.len(), sample_rate, samples)
    }

    /// Unit impulse (identity kernel)
    pub fn dirac(channels: usize, sample_rate: f32) -> Self {
        Self {
            channels,
            sample_rate,
            samples: vec![1.0; channels],
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Interleaved samples
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// De-interleave into one vector per channel
    pub fn split_channels(&self) -> Vec<Vec<f32>> {
        (0..self.channels)
            .map(|ch| {
                self.samples
                    .iter()
                    .skip(ch)
                    .step_by(self.channels)
                    .copied()
                    .collect()
            })
            .collect()
    }

    /// (input channel, output channel, kernel) routes for a stereo stream
    fn routes(&self) -> Vec<(usize, usize, Vec<f32>)> {
        let channels = self.split_channels();
        match channels.as_slice() {
            [mono] => vec![(0, 0, mono.clone()), (1, 1, mono.clone())],
            [left, right] => vec![(0, 0, left.clone()), (1, 1, right.clone())],
            [ll, lr, rl, rr] => vec![
                (0, 0, ll.clone()),
                (0, 1, lr.clone()),
                (1, 0, rl.clone()),
                (1, 1, rr.clone()),
            ],
            _ => Vec::new(),
        }
    }
}

/// Partition size for a kernel length
fn partition_size(frames: usize) -> usize {
    (frames / 64)
        .next_power_of_two()
        .clamp(MIN_PARTITION, MAX_PARTITION)
}

/// Stereo convolver over interleaved frames
pub struct StereoConvolver {
    kernel: Kernel,
    frames: usize,
}

enum Kernel {
    Direct(DirectConvolver),
    Partitioned(Box<PartitionedConvolver>),
}

impl StereoConvolver {
    /// Prepare a convolver for `ir`, picking the partition size from its length
    ///
    /// This allocates and plans FFTs; call it off the audio thread.
    pub fn new(ir: &ImpulseResponse) -> Self {
        Self::with_partition(ir, partition_size(ir.frames()))
    }

    /// Prepare a convolver with an explicit FFT partition size
    pub fn with_partition(ir: &ImpulseResponse, partition: usize) -> Self {
        let frames = ir.frames();
        let routes = ir.routes();
        let kernel = if frames <= TIME_DOMAIN_THRESHOLD {
            Kernel::Direct(DirectConvolver::new(routes, frames))
        } else {
            let partition = partition.max(1).next_power_of_two();
            Kernel::Partitioned(Box::new(PartitionedConvolver::new(
                routes, frames, partition,
            )))
        };
        Self { kernel, frames }
    }

    /// Kernel length in frames
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Added delay in frames
    pub fn latency(&self) -> usize {
        match &self.kernel {
            Kernel::Direct(_) => 0,
            Kernel::Partitioned(p) => p.block,
        }
    }

    /// Convolve an interleaved stereo buffer in place
    pub fn process(&mut self, buffer: &mut [f32]) {
        match &mut self.kernel {
            Kernel::Direct(direct) => {
                for frame in buffer.chunks_exact_mut(2) {
                    let (l, r) = direct.process_frame(frame[0], frame[1]);
                    frame[0] = l;
                    frame[1] = r;
                }
            }
            Kernel::Partitioned(partitioned) => {
                for frame in buffer.chunks_exact_mut(2) {
                    let (l, r) = partitioned.process_frame(frame[0], frame[1]);
                    frame[0] = l;
                    frame[1] = r;
                }
            }
        }
    }

    /// Clear history, keep the kernel
    pub fn reset(&mut self) {
        match &mut self.kernel {
            Kernel::Direct(direct) => direct.reset(),
            Kernel::Partitioned(partitioned) => partitioned.reset(),
        }
    }
}

/// Direct-form convolution with per-channel history
struct DirectConvolver {
    /// Kernels stored reversed so the history window lines up oldest-first
    routes: Vec<(usize, usize, Vec<f32>)>,
    len: usize,
    /// Doubled ring buffers so the last `len` inputs are always contiguous
    history: [Vec<f32>; 2],
    pos: usize,
}

impl DirectConvolver {
    fn new(routes: Vec<(usize, usize, Vec<f32>)>, len: usize) -> Self {
        let routes = routes
            .into_iter()
            .map(|(input, output, mut taps)| {
                taps.reverse();
                (input, output, taps)
            })
            .collect();
        Self {
            routes,
            len,
            history: [vec![0.0; 2 * len], vec![0.0; 2 * len]],
            pos: 0,
        }
    }

    #[inline]
    fn process_frame(&mut self, left: f32, right: f32) -> (f32, f32) {
        let len = self.len;
        for (history, x) in self.history.iter_mut().zip([left, right]) {
            history[self.pos] = x;
            history[self.pos + len] = x;
        }

        let start = self.pos + 1;
        let mut out = [0.0f32; 2];
        for (input, output, taps) in &self.routes {
            let window = &self.history[*input][start..start + len];
            out[*output] += window.iter().zip(taps).map(|(x, h)| x * h).sum::<f32>();
        }

        self.pos = (self.pos + 1) % len;
        (out[0], out[1])
    }

    fn reset(&mut self) {
        self.history.iter_mut().for_each(|h| h.fill(0.0));
        self.pos = 0;
    }
}

/// One route's kernel split into partition spectra
struct Route {
    input: usize,
    output: usize,
    spectra: Vec<Vec<Complex<f32>>>,
}

/// Uniformly partitioned overlap-save convolution
struct PartitionedConvolver {
    block: usize,
    fft_size: usize,
    partitions: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    routes: Vec<Route>,
    /// Frequency-domain delay line per input channel
    fdl: [Vec<Vec<Complex<f32>>>; 2],
    fdl_head: usize,
    /// Previous block followed by the block being filled
    input: [Vec<f32>; 2],
    /// Output block being played out
    output: [Vec<f32>; 2],
    fill: usize,
    work: Vec<Complex<f32>>,
    accum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl PartitionedConvolver {
    fn new(routes: Vec<(usize, usize, Vec<f32>)>, frames: usize, block: usize) -> Self {
        let fft_size = block * 2;
        let partitions = frames.div_ceil(block).max(1);

        let mut planner = FftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(fft_size);
        let inverse = planner.plan_fft_inverse(fft_size);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());
        let mut scratch = vec![Complex::new(0.0, 0.0); scratch_len];

        let routes = routes
            .into_iter()
            .map(|(input, output, taps)| {
                let spectra = taps
                    .chunks(block)
                    .map(|part| {
                        let mut spectrum = vec![Complex::new(0.0, 0.0); fft_size];
                        for (bin, tap) in spectrum.iter_mut().zip(part) {
                            bin.re = *tap;
                        }
                        forward.process_with_scratch(&mut spectrum, &mut scratch);
                        spectrum
                    })
                    .collect();
                Route {
                    input,
                    output,
                    spectra,
                }
            })
            .collect();

        let empty_line = || vec![vec![Complex::new(0.0, 0.0); fft_size]; partitions];

        Self {
            block,
            fft_size,
            partitions,
            forward,
            inverse,
            routes,
            fdl: [empty_line(), empty_line()],
            fdl_head: 0,
            input: [vec![0.0; fft_size], vec![0.0; fft_size]],
            output: [vec![0.0; block], vec![0.0; block]],
            fill: 0,
            work: vec![Complex::new(0.0, 0.0); fft_size],
            accum: vec![Complex::new(0.0, 0.0); fft_size],
            scratch,
        }
    }

    #[inline]
    fn process_frame(&mut self, left: f32, right: f32) -> (f32, f32) {
        let i = self.fill;
        let out = (self.output[0][i], self.output[1][i]);
        self.input[0][self.block + i] = left;
        self.input[1][self.block + i] = right;

        self.fill += 1;
        if self.fill == self.block {
            self.run_block();
            self.fill = 0;
        }
        out
    }

    fn run_block(&mut self) {
        let block = self.block;

        for ch in 0..2 {
            for (w, x) in self.work.iter_mut().zip(&self.input[ch]) {
                *w = Complex::new(*x, 0.0);
            }
            self.forward
                .process_with_scratch(&mut self.work, &mut self.scratch);
            self.fdl[ch][self.fdl_head].copy_from_slice(&self.work);
            self.input[ch].copy_within(block.., 0);
        }

        let scale = 1.0 / self.fft_size as f32;
        for out in 0..2 {
            self.accum.fill(Complex::new(0.0, 0.0));
            for route in self.routes.iter().filter(|r| r.output == out) {
                for (k, h) in route.spectra.iter().enumerate() {
                    let slot = (self.fdl_head + self.partitions - k) % self.partitions;
                    let x = &self.fdl[route.input][slot];
                    for ((acc, xv), hv) in self.accum.iter_mut().zip(x).zip(h) {
                        *acc += xv * hv;
                    }
                }
            }
            self.inverse
                .process_with_scratch(&mut self.accum, &mut self.scratch);
            for (o, a) in self.output[out].iter_mut().zip(&self.accum[block..]) {
                *o = a.re * scale;
            }
        }

        self.fdl_head = (self.fdl_head + 1) % self.partitions;
    }

    fn reset(&mut self) {
        for line in &mut self.fdl {
            for spectrum in line.iter_mut() {
                spectrum.fill(Complex::new(0.0, 0.0));
            }
        }
        self.input.iter_mut().for_each(|b| b.fill(0.0));
        self.output.iter_mut().for_each(|b| b.fill(0.0));
        self.fdl_head = 0;
        self.fill = 0;
    }
}

/// Reference linear convolution of one channel (tests and offline tools)
pub fn convolve_reference(signal: &[f32], kernel: &[f32]) -> Vec<f32> {
    if signal.is_empty() || kernel.is_empty() {
        return Vec::new();
    }
    let mut out = vec![0.0f32; signal.len() + kernel.len() - 1];
    for (i, x) in signal.iter().enumerate() {
        for (j, h) in kernel.iter().enumerate() {
            out[i + j] += x * h;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // TEST UTILITIES
    // ========================================================================

    fn noise(len: usize, seed: u32) -> Vec<f32> {
        let mut state = seed;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state >> 8) as f32 / (1u32 << 24) as f32 - 0.5
            })
            .collect()
    }

    fn interleave(left: &[f32], right: &[f32]) -> Vec<f32> {
        left.iter().zip(right).flat_map(|(l, r)| [*l, *r]).collect()
    }

    fn channel(buffer: &[f32], ch: usize) -> Vec<f32> {
        buffer.iter().skip(ch).step_by(2).copied().collect()
    }

    fn assert_close(actual: &[f32], expected: &[f32], tolerance: f32) {
        assert_eq!(actual.len(), expected.len());
        for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
            assert!((a - e).abs() <= tolerance, "sample {i}: {a} vs {e}");
        }
    }

    // ========================================================================
    // IMPULSE RESPONSE
    // ========================================================================

    #[test]
    fn test_rejects_unsupported_layouts() {
        assert!(matches!(
            ImpulseResponse::new(3, 48000.0, vec![0.0; 6]),
            Err(AudioError::UnsupportedChannels(3))
        ));
        assert!(matches!(
            ImpulseResponse::new(2, 48000.0, vec![]),
            Err(AudioError::EmptyImpulse)
        ));
        assert!(ImpulseResponse::new(2, 48000.0, vec![0.0; 3]).is_err());
    }

    #[test]
    fn test_split_channels() {
        let ir = ImpulseResponse::new(2, 48000.0, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(ir.frames(), 2);
        assert_eq!(ir.split_channels(), vec![vec![1.0, 3.0], vec![2.0, 4.0]]);
    }

    // ========================================================================
    // DIRECT PATH
    // ========================================================================

    #[test]
    fn test_direct_matches_reference_across_buffers() {
        let kernel = noise(48, 1);
        let ir = ImpulseResponse::new(1, 48000.0, kernel.clone()).unwrap();
        let mut conv = StereoConvolver::new(&ir);
        assert_eq!(conv.latency(), 0);

        let left = noise(500, 2);
        let right = noise(500, 3);
        let mut buffer = interleave(&left, &right);
        // uneven host buffers must not break continuity
        let (a, b) = buffer.split_at_mut(2 * 37);
        conv.process(a);
        conv.process(b);

        let expected = convolve_reference(&left, &kernel);
        assert_close(&channel(&buffer, 0), &expected[..500], 1e-5);
    }

    // ========================================================================
    // PARTITIONED PATH
    // ========================================================================

    #[test]
    fn test_partitioned_matches_reference_with_latency() {
        let kernel = noise(700, 4);
        let ir = ImpulseResponse::new(1, 48000.0, kernel.clone()).unwrap();
        let mut conv = StereoConvolver::with_partition(&ir, 128);
        let latency = conv.latency();
        assert_eq!(latency, 128);

        let left = noise(3000, 5);
        let mut buffer = interleave(&left, &left);
        for chunk in buffer.chunks_mut(2 * 100) {
            conv.process(chunk);
        }

        let expected = convolve_reference(&left, &kernel);
        let out = channel(&buffer, 0);
        assert_close(&out[latency..], &expected[..3000 - latency], 1e-3);
        assert!(out[..latency].iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_true_stereo_routing() {
        // LL = delta, LR = 0.5 delta, RL = 0, RR = delta (100 frames long)
        let frames = 100;
        let mut ll = vec![0.0; frames];
        let mut lr = vec![0.0; frames];
        let rl = vec![0.0; frames];
        let mut rr = vec![0.0; frames];
        ll[0] = 1.0;
        lr[0] = 0.5;
        rr[0] = 1.0;
        let ir = ImpulseResponse::from_channels(48000.0, &[ll, lr, rl, rr]).unwrap();
        let mut conv = StereoConvolver::with_partition(&ir, 64);

        let mut buffer = vec![0.0f32; 2 * 256];
        buffer[0] = 1.0; // left impulse
        conv.process(&mut buffer);

        let latency = conv.latency();
        assert!((buffer[2 * latency] - 1.0).abs() < 1e-4);
        assert!((buffer[2 * latency + 1] - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_reset_clears_tail() {
        let ir = ImpulseResponse::new(1, 48000.0, noise(300, 6)).unwrap();
        let mut conv = StereoConvolver::new(&ir);

        let mut loud = noise(2 * 1000, 7);
        conv.process(&mut loud);
        conv.reset();

        let mut silence = vec![0.0f32; 2 * 1000];
        conv.process(&mut silence);
        assert!(silence.iter().all(|s| *s == 0.0));
    }
}
