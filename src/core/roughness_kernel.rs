//! Roughness response as a function of partial separation.
//!
//! The kernel is sampled once per parameter change at integer separations
//! `0..=resolution` (one sample per cent with the default parameters):
//!
//!   ramp(i)  = (1 - cos(π·i/r)) / 2          rising edge, 0 at i = 0
//!   decay(i) = exp(-(i - r) / t)              tail beyond the peak
//!   blend(i) = sigmoid(i - r)                 crossfade ramp → decay around r
//!   g(i)     = clamp((ramp·(1-blend) + decay·blend) · v, 0, 1)

use serde::{Deserialize, Serialize};

/// Parameters of the blended ramp/decay envelope.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct KernelParams {
    /// Separation (in samples) where the ramp peaks and the decay starts.
    pub r: f32,
    /// Gain applied before clamping.
    pub v: f32,
    /// Decay time constant in samples.
    pub t: f32,
    /// Range bound kept with the kernel; does not affect sampling.
    pub rm: f32,
    /// Highest sample index; the kernel has `resolution + 1` samples.
    pub resolution: usize,
}

impl Default for KernelParams {
    fn default() -> Self {
        Self {
            r: 50.0,
            v: 1.0,
            t: 100.0,
            rm: 1200.0,
            resolution: 1200,
        }
    }
}

#[inline]
fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn sample_envelope(params: &KernelParams, i: usize) -> f32 {
    let x = i as f64;
    let r = params.r as f64;
    let ramp = (1.0 - (x / r * std::f64::consts::PI).cos()) / 2.0;
    let decay = (-(x - r) / params.t as f64).exp();
    let blend = sigmoid(x - r);
    let y = (ramp * (1.0 - blend) + decay * blend) * params.v as f64;
    // NaN (e.g. r = 0 at i = 0) counts as no roughness
    if y.is_nan() { 0.0 } else { y.clamp(0.0, 1.0) as f32 }
}

/// Sampled roughness kernel, values in [0, 1].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoughnessKernel {
    params: KernelParams,
    samples: Vec<f32>,
}

impl RoughnessKernel {
    pub fn new(params: KernelParams) -> Self {
        let samples = (0..=params.resolution)
            .map(|i| sample_envelope(&params, i))
            .collect();
        Self { params, samples }
    }

    /// Wrap externally produced samples; values are clamped to [0, 1].
    pub fn from_samples(samples: Vec<f32>) -> Self {
        let samples: Vec<f32> = samples
            .into_iter()
            .map(|s| if s.is_nan() { 0.0 } else { s.clamp(0.0, 1.0) })
            .collect();
        let params = KernelParams {
            resolution: samples.len().saturating_sub(1),
            ..KernelParams::default()
        };
        Self { params, samples }
    }

    #[inline]
    pub fn params(&self) -> &KernelParams {
        &self.params
    }

    #[inline]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Response at a separation, nearest sample; zero outside the kernel.
    #[inline]
    pub fn response(&self, separation: f32) -> f32 {
        lookup(&self.samples, separation)
    }

    /// Index of the largest sample.
    pub fn peak_index(&self) -> Option<usize> {
        self.samples
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
    }
}

/// Nearest-sample lookup of `|separation|`; out-of-range or non-finite → 0.
#[inline]
pub(crate) fn lookup(samples: &[f32], separation: f32) -> f32 {
    let d = separation.abs();
    if !d.is_finite() {
        return 0.0;
    }
    samples.get(d.round() as usize).copied().unwrap_or(0.0)
}
