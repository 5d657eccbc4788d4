//! Roughness curve over a swept cent offset.
//!
//! `SweepEngine::compute` marshals one spectrum, the fixed reference offsets
//! and the kernel into fixed-capacity buffers, dispatches the evaluation on a
//! parallel backend, and decodes one `(x, y)` sample per integer offset.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::backend::{
    BackendError, ComputeBackend, ComputeBuffers, ComputeParams, RayonBackend, decode_results,
};
use crate::core::notes::{NoteSet, SweepMode};
use crate::core::roughness_kernel::RoughnessKernel;
use crate::core::spectrum::PartialSpectrum;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ComputeError {
    /// `from > to`; nothing was computed.
    #[error("invalid sweep range: from {from} > to {to}")]
    InvalidRange { from: i32, to: i32 },
    /// No parallel compute capability could be obtained.
    #[error("no parallel compute backend available: {0}")]
    NoBackend(String),
    /// Dispatch or readback failed.
    #[error("compute backend failure: {0}")]
    BackendFailure(BackendError),
}

impl From<BackendError> for ComputeError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Unavailable(reason) => Self::NoBackend(reason),
            other => Self::BackendFailure(other),
        }
    }
}

/// Inclusive integer sweep bounds, `from <= to`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SweepRange {
    pub from: i32,
    pub to: i32,
}

impl SweepRange {
    pub fn new(from: i32, to: i32) -> Result<Self, ComputeError> {
        let range = Self { from, to };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<(), ComputeError> {
        if self.from > self.to {
            return Err(ComputeError::InvalidRange {
                from: self.from,
                to: self.to,
            });
        }
        Ok(())
    }

    /// Number of integer offsets covered.
    #[inline]
    pub fn len(&self) -> usize {
        (self.to as i64 - self.from as i64 + 1).max(0) as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mirror image `[-to, -from]`; `InvalidRange` if a bound is `i32::MIN`.
    #[inline]
    pub fn mirrored(&self) -> Result<Self, ComputeError> {
        let invalid = || ComputeError::InvalidRange {
            from: self.from,
            to: self.to,
        };
        Ok(Self {
            from: self.to.checked_neg().ok_or_else(invalid)?,
            to: self.from.checked_neg().ok_or_else(invalid)?,
        })
    }

    #[inline]
    pub fn contains_open(&self, x: i32) -> bool {
        x > self.from && x < self.to
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub x: i32,
    pub y: f32,
}

/// One roughness sample per integer offset, `x` ascending by 1.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    points: Vec<CurvePoint>,
}

impl Curve {
    /// Build from y values starting at `from`.
    pub fn from_values(from: i32, ys: &[f32]) -> Self {
        let points = ys
            .iter()
            .enumerate()
            .map(|(i, &y)| CurvePoint {
                x: from + i as i32,
                y,
            })
            .collect();
        Self { points }
    }

    #[inline]
    pub fn points(&self) -> &[CurvePoint] {
        &self.points
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn ys(&self) -> Vec<f32> {
        self.points.iter().map(|p| p.y).collect()
    }

    pub fn first_x(&self) -> Option<i32> {
        self.points.first().map(|p| p.x)
    }

    pub fn y_at(&self, x: i32) -> Option<f32> {
        let first = self.first_x()?;
        let idx = usize::try_from(x as i64 - first as i64).ok()?;
        self.points.get(idx).map(|p| p.y)
    }

    /// y of the sample closest to a fractional position.
    pub fn y_near(&self, x: f32) -> Option<f32> {
        let first = self.first_x()? as f32;
        let last = self.points.last()?.x as f32;
        let clamped = x.clamp(first, last);
        self.y_at(clamped.round() as i32)
    }

    /// Negate every x and reverse, so a curve over `[-to, -from]` reads over `[from, to]`.
    pub fn reflected(&self) -> Result<Self, ComputeError> {
        let points = self
            .points
            .iter()
            .rev()
            .map(|p| {
                p.x.checked_neg()
                    .map(|x| CurvePoint { x, y: p.y })
                    .ok_or(ComputeError::InvalidRange { from: p.x, to: p.x })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { points })
    }

    /// `(min y, 0.95-quantile y)` for display scaling; `(0, 1)` when empty.
    pub fn display_bounds(&self) -> (f32, f32) {
        if self.points.is_empty() {
            return (0.0, 1.0);
        }
        let mut ys = self.ys();
        ys.sort_by(f32::total_cmp);
        (ys[0], quantile_sorted(&ys, 0.95))
    }
}

/// Linear-interpolated quantile of sorted values.
fn quantile_sorted(sorted: &[f32], p: f32) -> f32 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let pos = (n - 1) as f32 * p.clamp(0.0, 1.0);
    let lo = pos.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = pos - lo as f32;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Owns the compute backend; one in-flight compute at a time per engine.
#[derive(Clone)]
pub struct SweepEngine {
    backend: Arc<dyn ComputeBackend>,
}

impl std::fmt::Debug for SweepEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SweepEngine")
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl SweepEngine {
    /// Build the rayon backend; fails with `NoBackend` if no pool can be created.
    pub fn new(threads: Option<usize>) -> Result<Self, ComputeError> {
        let backend = RayonBackend::new(threads)?;
        Ok(Self::with_backend(Arc::new(backend)))
    }

    pub fn with_backend(backend: Arc<dyn ComputeBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Total roughness of `spectrum` swept over `range` against `fixed_offsets`.
    pub fn compute(
        &self,
        spectrum: &PartialSpectrum,
        fixed_offsets: &[i32],
        kernel: &RoughnessKernel,
        range: SweepRange,
    ) -> Result<Curve, ComputeError> {
        range.validate()?;
        let started = Instant::now();

        let buffers = ComputeBuffers::marshal(spectrum, fixed_offsets, kernel, range);
        let params = ComputeParams::from_bytes(&buffers.params)?;
        let raw = self.backend.dispatch(&buffers)?;
        let decoded = decode_results(&raw, &params)?;

        let points = decoded
            .into_iter()
            .map(|(x, y)| CurvePoint { x, y })
            .collect::<Vec<_>>();
        debug!(
            backend = self.backend.name(),
            samples = points.len(),
            elapsed_ms = started.elapsed().as_secs_f64() * 1e3,
            "roughness sweep computed"
        );
        Ok(Curve { points })
    }

    /// Run a prepared job, applying the conchord reflection when requested.
    pub fn run(&self, job: &SweepJob) -> Result<Curve, ComputeError> {
        let curve = self.compute(&job.spectrum, &job.fixed_offsets, &job.kernel, job.range)?;
        if job.reflect {
            curve.reflected()
        } else {
            Ok(curve)
        }
    }
}

/// Everything one compute needs, shared read-only.
#[derive(Clone, Debug)]
pub struct SweepJob {
    pub spectrum: Arc<PartialSpectrum>,
    pub kernel: Arc<RoughnessKernel>,
    pub fixed_offsets: Vec<i32>,
    /// Range handed to the backend (already mirrored for conchord).
    pub range: SweepRange,
    /// Negate and reverse the result.
    pub reflect: bool,
}

impl SweepJob {
    /// Derive note set and backend range for a mode over the visible domain `view`.
    ///
    /// - interval: offsets `[0]`
    /// - chord: offsets `[0, added..]`
    /// - conchord: offsets `[0, added..]`, computed over the mirrored range and reflected
    ///
    /// Fails with `InvalidRange` when the conchord view cannot be mirrored.
    pub fn for_mode(
        mode: SweepMode,
        spectrum: Arc<PartialSpectrum>,
        kernel: Arc<RoughnessKernel>,
        added_notes: &[i32],
        view: SweepRange,
    ) -> Result<Self, ComputeError> {
        let fixed_offsets = match mode {
            SweepMode::Interval => vec![0],
            SweepMode::Chord | SweepMode::Conchord => NoteSet::new(added_notes).offsets().to_vec(),
        };
        let (range, reflect) = match mode {
            SweepMode::Conchord => (view.mirrored()?, true),
            _ => (view, false),
        };
        Ok(Self {
            spectrum,
            kernel,
            fixed_offsets,
            range,
            reflect,
        })
    }
}
