//! FIR design from magnitude curves
//!
//! Equalizer curves are defined by control points on a log-frequency axis,
//! interpolated, sampled onto an FFT grid and turned into a minimum phase
//! kernel with the real-cepstrum method.

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// Curve interpolation between control points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    /// Monotone cubic Hermite (no overshoot between points)
    #[default]
    MonotoneHermite,
    /// Akima spline
    Akima,
    /// Straight segments
    Linear,
}

impl Interpolation {
    /// Map the equalizer's interpolation setting (0 = Hermite, 1 = Akima)
    pub fn from_setting(value: i32) -> Self {
        match value {
            1 => Interpolation::Akima,
            _ => Interpolation::MonotoneHermite,
        }
    }
}

/// Interpolated curve through sorted control points
#[derive(Debug, Clone)]
pub struct Curve {
    xs: Vec<f64>,
    ys: Vec<f64>,
    slopes: Vec<f64>,
    mode: Interpolation,
}

impl Curve {
    /// Build a curve; points are sorted and duplicate x positions dropped
    pub fn new(points: &[(f64, f64)], mode: Interpolation) -> Self {
        let mut sorted: Vec<(f64, f64)> = points
            .iter()
            .copied()
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .collect();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
        sorted.dedup_by(|a, b| (a.0 - b.0).abs() < 1e-12);

        let xs: Vec<f64> = sorted.iter().map(|p| p.0).collect();
        let ys: Vec<f64> = sorted.iter().map(|p| p.1).collect();
        let slopes = match mode {
            Interpolation::MonotoneHermite => monotone_slopes(&xs, &ys),
            Interpolation::Akima => akima_slopes(&xs, &ys),
            Interpolation::Linear => Vec::new(),
        };

        Self {
            xs,
            ys,
            slopes,
            mode,
        }
    }

    /// Curve on a log10 frequency axis
    pub fn log_frequency(points: &[(f64, f64)], mode: Interpolation) -> Self {
        let mapped: Vec<(f64, f64)> = points
            .iter()
            .filter(|(f, _)| *f > 0.0)
            .map(|(f, g)| (f.log10(), *g))
            .collect();
        Self::new(&mapped, mode)
    }

    /// Evaluate at `x`, holding the end values outside the point range
    pub fn eval(&self, x: f64) -> f64 {
        let n = self.xs.len();
        match n {
            0 => return 0.0,
            1 => return self.ys[0],
            _ => {}
        }
        if x <= self.xs[0] {
            return self.ys[0];
        }
        if x >= self.xs[n - 1] {
            return self.ys[n - 1];
        }

        let i = self.xs.partition_point(|p| *p <= x).saturating_sub(1).min(n - 2);
        let (x0, x1) = (self.xs[i], self.xs[i + 1]);
        let (y0, y1) = (self.ys[i], self.ys[i + 1]);
        let h = x1 - x0;
        let t = (x - x0) / h;

        if self.mode == Interpolation::Linear {
            return y0 + t * (y1 - y0);
        }

        let (m0, m1) = (self.slopes[i], self.slopes[i + 1]);
        let t2 = t * t;
        let t3 = t2 * t;
        (2.0 * t3 - 3.0 * t2 + 1.0) * y0
            + (t3 - 2.0 * t2 + t) * h * m0
            + (-2.0 * t3 + 3.0 * t2) * y1
            + (t3 - t2) * h * m1
    }

    /// Evaluate a log-frequency curve at `frequency` Hz
    pub fn eval_frequency(&self, frequency: f64) -> f64 {
        self.eval(frequency.max(1e-3).log10())
    }
}

fn secants(xs: &[f64], ys: &[f64]) -> Vec<f64> {
    xs.windows(2)
        .zip(ys.windows(2))
        .map(|(x, y)| (y[1] - y[0]) / (x[1] - x[0]))
        .collect()
}

/// Fritsch-Butland slopes, monotone between points
fn monotone_slopes(xs: &[f64], ys: &[f64]) -> Vec<f64> {
    let n = xs.len();
    if n < 2 {
        return vec![0.0; n];
    }
    let d = secants(xs, ys);
    let mut m = vec![0.0; n];
    m[0] = d[0];
    m[n - 1] = d[n - 2];

    for k in 1..n - 1 {
        let (d0, d1) = (d[k - 1], d[k]);
        if d0 * d1 <= 0.0 {
            m[k] = 0.0;
        } else {
            let h0 = xs[k] - xs[k - 1];
            let h1 = xs[k + 1] - xs[k];
            m[k] = 3.0 * (h0 + h1) / ((2.0 * h1 + h0) / d0 + (h1 + 2.0 * h0) / d1);
        }
    }
    m
}

/// Akima slopes with linearly extrapolated end secants
fn akima_slopes(xs: &[f64], ys: &[f64]) -> Vec<f64> {
    let n = xs.len();
    if n < 2 {
        return vec![0.0; n];
    }
    let d = secants(xs, ys);
    if n == 2 {
        return vec![d[0]; 2];
    }

    // extended[i + 2] == d[i]
    let mut extended = Vec::with_capacity(d.len() + 4);
    let first = d[0];
    let second = d.get(1).copied().unwrap_or(first);
    extended.push(3.0 * first - 2.0 * second);
    extended.push(2.0 * first - second);
    extended.extend_from_slice(&d);
    let last = d[d.len() - 1];
    let before = d.get(d.len().wrapping_sub(2)).copied().unwrap_or(last);
    extended.push(2.0 * last - before);
    extended.push(3.0 * last - 2.0 * before);

    (0..n)
        .map(|i| {
            let (m0, m1, m2, m3) = (
                extended[i],
                extended[i + 1],
                extended[i + 2],
                extended[i + 3],
            );
            let w1 = (m3 - m2).abs();
            let w2 = (m1 - m0).abs();
            if w1 + w2 < 1e-12 {
                (m1 + m2) / 2.0
            } else {
                (w1 * m1 + w2 * m2) / (w1 + w2)
            }
        })
        .collect()
}

/// Minimum phase kernel with magnitude `magnitude` (bins 0..=N/2 of an
/// N-point FFT grid), truncated to `taps` with a half-Hann fade on the tail
pub fn minimum_phase_from_magnitude(magnitude: &[f64], taps: usize) -> Vec<f32> {
    let half = magnitude.len().saturating_sub(1);
    if half == 0 || taps == 0 {
        return Vec::new();
    }
    let n = half * 2;

    let mut planner = FftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(n);
    let inverse = planner.plan_fft_inverse(n);

    // log magnitude on the full symmetric grid
    let mut buf: Vec<Complex<f64>> = (0..n)
        .map(|k| {
            let bin = if k <= half { k } else { n - k };
            Complex::new(magnitude[bin].max(1e-10).ln(), 0.0)
        })
        .collect();

    inverse.process(&mut buf);
    let scale = 1.0 / n as f64;

    // fold the real cepstrum onto positive quefrencies
    for (k, c) in buf.iter_mut().enumerate() {
        let value = c.re * scale;
        *c = if k == 0 || k == half {
            Complex::new(value, 0.0)
        } else if k < half {
            Complex::new(2.0 * value, 0.0)
        } else {
            Complex::new(0.0, 0.0)
        };
    }

    forward.process(&mut buf);
    for c in &mut buf {
        *c = c.exp();
    }
    inverse.process(&mut buf);

    let len = taps.min(n);
    let fade = len / 8;
    (0..len)
        .map(|i| {
            let sample = buf[i].re * scale;
            let from_end = len - i;
            let window = if fade > 0 && from_end <= fade {
                let t = from_end as f64 / (fade + 1) as f64;
                0.5 - 0.5 * (std::f64::consts::PI * t).cos()
            } else {
                1.0
            };
            (sample * window) as f32
        })
        .collect()
}

/// Design a minimum phase FIR whose response follows `gain_db(frequency)`
pub fn design_fir(gain_db: impl Fn(f64) -> f64, taps: usize, sample_rate: f64) -> Vec<f32> {
    // oversample the grid to keep cepstral aliasing below the truncation point
    let n = (taps * 4).next_power_of_two().max(64);
    let half = n / 2;
    let magnitude: Vec<f64> = (0..=half)
        .map(|k| {
            let frequency = k as f64 * sample_rate / n as f64;
            10.0_f64.powf(gain_db(frequency) / 20.0)
        })
        .collect();
    minimum_phase_from_magnitude(&magnitude, taps)
}

/// Convert an existing kernel to minimum phase, keeping its length
pub fn minimum_phase(kernel: &[f32]) -> Vec<f32> {
    if kernel.is_empty() {
        return Vec::new();
    }
    let n = (kernel.len() * 4).next_power_of_two().max(64);
    let mut planner = FftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(n);

    let mut buf = vec![Complex::new(0.0, 0.0); n];
    for (b, k) in buf.iter_mut().zip(kernel) {
        b.re = f64::from(*k);
    }
    forward.process(&mut buf);

    let magnitude: Vec<f64> = buf[..=n / 2].iter().map(|c| c.norm()).collect();
    minimum_phase_from_magnitude(&magnitude, kernel.len())
}

/// Magnitude response of a kernel in dB at `frequency`
pub fn response_db(kernel: &[f32], frequency: f64, sample_rate: f64) -> f64 {
    let w = 2.0 * std::f64::consts::PI * frequency / sample_rate;
    let (re, im) = kernel
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(re, im), (i, h)| {
            let phase = w * i as f64;
            (
                re + f64::from(*h) * phase.cos(),
                im - f64::from(*h) * phase.sin(),
            )
        });
    10.0 * (re * re + im * im).max(1e-300).log10()
}
