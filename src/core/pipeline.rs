//! Recompute-on-change dataflow for the sweep.
//!
//! Nodes and their inputs:
//!
//!   spectrum  ← overtone formulas, max_i
//!   kernel    ← kernel params
//!   curve     ← spectrum, kernel, mode, added notes, visible range
//!   snaps     ← curve, mode, added notes, snapping options, edo
//!
//! Setters mark the affected nodes dirty; `refresh` recomputes only dirty
//! nodes, in dependency order. A failed compute keeps the previous curve.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::{AppConfig, OvertoneConfig, SweepConfig};
use crate::core::formula::FormulaEngine;
use crate::core::notes::{self, SweepMode};
use crate::core::peak_extraction::{Extrema, find_extrema};
use crate::core::roughness_kernel::{KernelParams, RoughnessKernel};
use crate::core::snapping::{SnapPointSet, SnapRequest, snap_points};
use crate::core::spectrum::{self, PartialSpectrum};
use crate::core::sweep::{ComputeError, Curve, SweepEngine, SweepJob};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Dirty {
    spectrum: bool,
    kernel: bool,
    curve: bool,
    snaps: bool,
}

impl Dirty {
    fn all() -> Self {
        Self {
            spectrum: true,
            kernel: true,
            curve: true,
            snaps: true,
        }
    }
}

pub struct SweepPipeline {
    engine: SweepEngine,
    formulas: FormulaEngine,
    config: AppConfig,
    spectrum: Arc<PartialSpectrum>,
    kernel: Arc<RoughnessKernel>,
    curve: Option<Arc<Curve>>,
    extrema: Extrema,
    snaps: SnapPointSet,
    dirty: Dirty,
}

impl SweepPipeline {
    pub fn new(engine: SweepEngine, config: AppConfig) -> Self {
        Self {
            engine,
            formulas: FormulaEngine::new(),
            config,
            spectrum: Arc::new(PartialSpectrum::default()),
            kernel: Arc::new(RoughnessKernel::from_samples(Vec::new())),
            curve: None,
            extrema: Extrema::default(),
            snaps: SnapPointSet::default(),
            dirty: Dirty::all(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn set_overtone(&mut self, overtone: OvertoneConfig) {
        if overtone != self.config.overtone {
            self.config.overtone = overtone;
            self.dirty.spectrum = true;
        }
    }

    pub fn set_kernel(&mut self, params: KernelParams) {
        if params != self.config.kernel.params() {
            self.config.kernel.r = params.r;
            self.config.kernel.v = params.v;
            self.config.kernel.t = params.t;
            self.config.kernel.rm = params.rm;
            self.config.kernel.resolution = params.resolution;
            self.dirty.kernel = true;
        }
    }

    /// Replace sweep settings, invalidating only what they feed.
    pub fn set_sweep(&mut self, sweep: SweepConfig) {
        let old = &self.config.sweep;
        let curve_inputs_changed = old.mode != sweep.mode
            || old.max_x != sweep.max_x
            || old.negative_x != sweep.negative_x
            || (sweep.mode != SweepMode::Interval
                && old.added_notes != sweep.added_notes);
        let snap_inputs_changed = curve_inputs_changed
            || old.added_notes != sweep.added_notes
            || old.snapping != sweep.snapping
            || old.edo != sweep.edo;
        self.dirty.curve |= curve_inputs_changed;
        self.dirty.snaps |= snap_inputs_changed;
        self.config.sweep = sweep;
    }

    /// Toggle an added note at the cursor. Returns `true` when the note was added.
    ///
    /// In conchord mode the added notes are the swept chord shape; nothing changes
    /// and `false` is returned (use [`Self::save_conchord`] there).
    pub fn toggle_added_note(&mut self, cents: f32) -> bool {
        if self.config.sweep.mode == SweepMode::Conchord {
            return false;
        }
        let mut sweep = self.config.sweep.clone();
        let added = notes::toggle_added_note(&mut sweep.added_notes, cents.round() as i32);
        self.set_sweep(sweep);
        added
    }

    /// Save the chord shape at the cursor (conchord mode).
    pub fn save_conchord(&mut self, cursor: f32) -> Vec<i32> {
        let chord = notes::conchord_at(cursor, &self.config.sweep.added_notes);
        self.config.sweep.saved_chords.push(chord.clone());
        chord
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty != Dirty::default()
    }

    /// Recompute dirty nodes. On compute failure the previous curve stays
    /// and the curve node stays dirty.
    pub fn refresh(&mut self) -> Result<(), ComputeError> {
        if self.dirty.spectrum {
            let o = &self.config.overtone;
            self.spectrum = Arc::new(spectrum::generate(
                &self.formulas,
                &o.formula_cent,
                &o.formula_intensity,
                o.max_i,
            ));
            self.dirty.spectrum = false;
            self.dirty.curve = true;
            debug!(partials = self.spectrum.len(), "spectrum regenerated");
        }

        if self.dirty.kernel {
            self.kernel = Arc::new(RoughnessKernel::new(self.config.kernel.params()));
            self.dirty.kernel = false;
            self.dirty.curve = true;
            debug!(samples = self.kernel.len(), "kernel resampled");
        }

        if self.dirty.curve {
            match self.job().and_then(|job| self.engine.run(&job)) {
                Ok(curve) => {
                    self.curve = Some(Arc::new(curve));
                    self.dirty.curve = false;
                    self.dirty.snaps = true;
                }
                Err(err) => {
                    warn!("roughness sweep failed: {err}");
                    return Err(err);
                }
            }
        }

        if self.dirty.snaps {
            self.rederive_snaps();
            self.dirty.snaps = false;
        }
        Ok(())
    }

    /// Job for the current spectrum, kernel and sweep settings.
    pub fn job(&self) -> Result<SweepJob, ComputeError> {
        let sweep = &self.config.sweep;
        SweepJob::for_mode(
            sweep.mode,
            Arc::clone(&self.spectrum),
            Arc::clone(&self.kernel),
            &sweep.added_notes,
            sweep.view(),
        )
    }

    /// Install a curve computed elsewhere (e.g. by a sweep worker).
    pub fn install_curve(&mut self, curve: Curve) {
        self.curve = Some(Arc::new(curve));
        self.dirty.curve = false;
        self.rederive_snaps();
        self.dirty.snaps = false;
    }

    fn rederive_snaps(&mut self) {
        let Some(curve) = &self.curve else {
            self.extrema = Extrema::default();
            self.snaps = SnapPointSet::default();
            return;
        };
        let sweep = &self.config.sweep;
        let view = sweep.view();
        self.extrema = find_extrema(&curve.ys(), view.from);
        self.snaps = snap_points(
            &self.extrema,
            &SnapRequest {
                range: view,
                mode: sweep.mode,
                added_notes: &sweep.added_notes,
                options: &sweep.snapping,
                edo: sweep.edo,
            },
        );
    }

    pub fn spectrum(&self) -> &Arc<PartialSpectrum> {
        &self.spectrum
    }

    pub fn kernel(&self) -> &Arc<RoughnessKernel> {
        &self.kernel
    }

    pub fn curve(&self) -> Option<&Arc<Curve>> {
        self.curve.as_ref()
    }

    pub fn extrema(&self) -> &Extrema {
        &self.extrema
    }

    pub fn snaps(&self) -> &SnapPointSet {
        &self.snaps
    }

    /// Cursor position after snapping with the configured distance.
    pub fn snapped(&self, cursor: f32) -> f32 {
        if self.config.sweep.snapping.is_empty() {
            return cursor;
        }
        self.snaps.snap(cursor, self.config.sweep.snapping_distance)
    }
}
