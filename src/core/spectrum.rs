//! Overtone spectrum of a single note.
//!
//! A spectrum is a list of partials positioned in cents relative to the note's
//! fundamental. Generated spectra are energy-normalized: Σ intensity² = 1.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::formula::{Formula, FormulaEngine, FormulaError};

pub const CENTS_PER_OCTAVE: f64 = 1200.0;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Partial {
    pub offset_cents: f32,
    pub intensity: f32,
}

impl Partial {
    pub const fn new(offset_cents: f32, intensity: f32) -> Self {
        Self {
            offset_cents,
            intensity,
        }
    }
}

/// Ordered partials of one note. Immutable once built.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialSpectrum {
    partials: Vec<Partial>,
}

impl PartialSpectrum {
    /// Take partials as given (no clamping, no normalization).
    pub fn new(partials: Vec<Partial>) -> Self {
        Self { partials }
    }

    /// Clamp negative intensities to zero and normalize to unit energy.
    /// An all-zero spectrum is left as is.
    pub fn normalized(mut partials: Vec<Partial>) -> Self {
        for p in &mut partials {
            if !(p.intensity > 0.0) {
                p.intensity = 0.0;
            }
        }
        let energy: f64 = partials
            .iter()
            .map(|p| (p.intensity as f64).powi(2))
            .sum();
        if energy > 0.0 {
            let norm = energy.sqrt();
            for p in &mut partials {
                p.intensity = (p.intensity as f64 / norm) as f32;
            }
        }
        Self { partials }
    }

    #[inline]
    pub fn partials(&self) -> &[Partial] {
        &self.partials
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.partials.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.partials.is_empty()
    }

    /// Σ intensity².
    pub fn energy(&self) -> f32 {
        self.partials.iter().map(|p| p.intensity * p.intensity).sum()
    }

    /// Intensities in partial order (oscillator partial amplitudes).
    pub fn intensities(&self) -> Vec<f32> {
        self.partials.iter().map(|p| p.intensity).collect()
    }
}

/// Evaluate `formula_cent` (in octaves) and `formula_intensity` for `i = 1..=max_i`.
///
/// A term that fails to parse or evaluate contributes `0` for that partial only.
pub fn generate(
    engine: &FormulaEngine,
    formula_cent: &str,
    formula_intensity: &str,
    max_i: u32,
) -> PartialSpectrum {
    let cent = engine.compile(formula_cent);
    let intensity = engine.compile(formula_intensity);

    let mut failures = 0usize;
    let mut first_failure: Option<FormulaError> = None;
    let mut eval = |formula: &Formula, i: u32| -> f64 {
        match engine.eval(formula, i) {
            Ok(v) => v,
            Err(err) => {
                failures += 1;
                first_failure.get_or_insert(err);
                0.0
            }
        }
    };

    let mut raw = Vec::with_capacity(max_i as usize);
    for i in 1..=max_i {
        let offset_cents = eval(&cent, i) * CENTS_PER_OCTAVE;
        let level = eval(&intensity, i);
        raw.push(Partial::new(offset_cents as f32, level.max(0.0) as f32));
    }

    if let Some(err) = first_failure {
        debug!(
            failures,
            cent = cent.source(),
            intensity = intensity.source(),
            "spectrum terms fell back to zero: {err}"
        );
    }

    PartialSpectrum::normalized(raw)
}
