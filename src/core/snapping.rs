//! Snap-point set for the cursor.
//!
//! Contributions (all in cents):
//! - valleys / peaks of the curve
//! - added notes strictly inside the sweep
//! - the two sweep endpoints
//! - the EDO grid `k · 1200/edo` for `k = 0..=floor(to / 1200 · edo)`
//!
//! `auto` picks a mode-dependent subset. The final set is sorted and deduplicated.

use serde::{Deserialize, Serialize};

use crate::core::notes::SweepMode;
use crate::core::peak_extraction::Extrema;
use crate::core::sweep::SweepRange;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SnapOption {
    Auto,
    Valley,
    Peak,
    Added,
    Endpoints,
    Edo,
}

/// Inputs of snap-point assembly besides the extrema.
#[derive(Clone, Copy, Debug)]
pub struct SnapRequest<'a> {
    pub range: SweepRange,
    pub mode: SweepMode,
    pub added_notes: &'a [i32],
    pub options: &'a [SnapOption],
    pub edo: u32,
}

/// Sorted, deduplicated snap positions.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapPointSet {
    points: Vec<f32>,
}

impl SnapPointSet {
    /// Sort ascending and drop duplicates.
    pub fn from_unsorted(mut points: Vec<f32>) -> Self {
        points.retain(|p| !p.is_nan());
        points.sort_by(f32::total_cmp);
        points.dedup();
        Self { points }
    }

    #[inline]
    pub fn points(&self) -> &[f32] {
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

    /// Member closest to `query` (first one on ties).
    pub fn nearest(&self, query: f32) -> Option<f32> {
        let idx = self.points.partition_point(|&p| p < query);
        let below = idx.checked_sub(1).and_then(|i| self.points.get(i));
        let above = self.points.get(idx);
        match (below, above) {
            (Some(&b), Some(&a)) => Some(if query - b <= a - query { b } else { a }),
            (Some(&b), None) => Some(b),
            (None, Some(&a)) => Some(a),
            (None, None) => None,
        }
    }

    /// Nearest member if strictly closer than `max_distance`, else `query`.
    pub fn snap(&self, query: f32, max_distance: f32) -> f32 {
        match self.nearest(query) {
            Some(p) if (p - query).abs() < max_distance => p,
            _ => query,
        }
    }
}

/// EDO grid from 0 up to the last step not beyond `to`.
pub fn edo_grid(to: i32, edo: u32) -> Vec<f32> {
    if edo == 0 {
        return Vec::new();
    }
    let step = 1200.0 / edo as f64;
    let last = (to as f64 / 1200.0 * edo as f64).floor();
    if last < 0.0 {
        return Vec::new();
    }
    (0..=last as i64).map(|k| (k as f64 * step) as f32).collect()
}

pub fn snap_points(extrema: &Extrema, req: &SnapRequest<'_>) -> SnapPointSet {
    let valleys = extrema.valleys.iter().map(|&x| x as f32);
    let peaks = extrema.peaks.iter().map(|&x| x as f32);
    let endpoints = [req.range.from as f32, req.range.to as f32];
    let added: Vec<f32> = req
        .added_notes
        .iter()
        .copied()
        .filter(|&n| req.range.contains_open(n))
        .map(|n| n as f32)
        .collect();

    let mut out: Vec<f32> = Vec::new();
    if req.options.contains(&SnapOption::Auto) {
        out.extend(valleys.clone());
        match req.mode {
            SweepMode::Interval | SweepMode::Chord => out.extend(added.iter().copied()),
            SweepMode::Conchord => out.extend(peaks.clone()),
        }
        out.extend(endpoints);
    }

    for option in req.options {
        match option {
            SnapOption::Auto => {}
            SnapOption::Valley => out.extend(valleys.clone()),
            SnapOption::Peak => out.extend(peaks.clone()),
            // added notes are a moving chord shape in conchord mode, not fixed points
            SnapOption::Added if req.mode != SweepMode::Conchord => {
                out.extend(added.iter().copied())
            }
            SnapOption::Added => {}
            SnapOption::Endpoints => out.extend(endpoints),
            SnapOption::Edo => out.extend(edo_grid(req.range.to, req.edo)),
        }
    }

    SnapPointSet::from_unsorted(out)
}
