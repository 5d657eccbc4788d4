// Entry point: loads config, runs the roughness sweep and prints the curve.
mod cli;

use std::io::{self, BufWriter, Write};

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde::Serialize;
use tracing::info;

use consonance_sweep::config::AppConfig;
use consonance_sweep::core::grid::{GridLine, grid_lines, note_name};
use consonance_sweep::core::notes::{self, NoteSet, SweepMode};
use consonance_sweep::core::peak_extraction::Extrema;
use consonance_sweep::core::pipeline::SweepPipeline;
use consonance_sweep::core::sweep::{ComputeError, Curve, SweepEngine};
use consonance_sweep::telemetry;

use crate::cli::{Args, OutputFormat};

#[derive(Serialize)]
struct CursorReport {
    cursor: f32,
    snapped: f32,
    note: &'static str,
    roughness: Option<f32>,
    /// `(cents, hz)` for every sounding note.
    preview: Vec<(f32, f32)>,
    voice_level: f32,
}

#[derive(Serialize)]
struct SweepReport<'a> {
    mode: SweepMode,
    curve: &'a Curve,
    display_bounds: (f32, f32),
    extrema: &'a Extrema,
    snaps: &'a [f32],
    grid: Vec<GridLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cursor: Option<CursorReport>,
}

fn apply_overrides(cfg: &mut AppConfig, args: &Args) {
    if let Some(mode) = args.mode {
        cfg.sweep.mode = mode.into();
    }
    if let Some(added) = &args.add {
        let mut added = added.clone();
        added.sort_unstable();
        added.dedup();
        cfg.sweep.added_notes = added;
    }
    if let Some(max_x) = args.max_x {
        cfg.sweep.max_x = max_x;
    }
    if let Some(negative_x) = args.negative_x {
        cfg.sweep.negative_x = negative_x;
    }
}

fn cursor_report(pipeline: &SweepPipeline, cursor: f32) -> CursorReport {
    let sweep = &pipeline.config().sweep;
    let snapped = pipeline.snapped(cursor);
    let sounding: Vec<f32> = match sweep.mode {
        SweepMode::Interval | SweepMode::Chord => notes::preview_notes(snapped, &sweep.added_notes),
        SweepMode::Conchord => {
            // the chord shape rides the cursor
            let shifted = NoteSet::new(&sweep.added_notes).shifted_added(snapped.round() as i32);
            let mut out = vec![0.0, snapped];
            out.extend(shifted.into_iter().map(|n| n as f32));
            out
        }
    };
    CursorReport {
        cursor,
        snapped,
        note: note_name(snapped),
        roughness: pipeline.curve().and_then(|c| c.y_near(snapped)),
        voice_level: notes::voice_level(sweep.volume, sounding.len()),
        preview: sounding
            .into_iter()
            .map(|c| (c, notes::cents_to_hz(sweep.main_frequency, c)))
            .collect(),
    }
}

fn main() -> Result<()> {
    telemetry::init();
    let args = Args::parse();

    let mut cfg = AppConfig::load_or_default(&args.config);
    apply_overrides(&mut cfg, &args);

    let engine = match SweepEngine::new(args.threads) {
        Ok(engine) => engine,
        Err(ComputeError::NoBackend(reason)) => {
            bail!("no parallel compute backend available ({reason})")
        }
        Err(err) => return Err(err.into()),
    };
    info!(backend = engine.backend_name(), "compute backend ready");

    let mut pipeline = SweepPipeline::new(engine, cfg);
    pipeline.refresh().context("roughness sweep failed")?;

    let curve = pipeline
        .curve()
        .context("sweep produced no curve")?
        .clone();
    info!(
        samples = curve.len(),
        valleys = pipeline.extrema().valleys.len(),
        peaks = pipeline.extrema().peaks.len(),
        "sweep complete"
    );

    let cursor = args.cursor.map(|c| cursor_report(&pipeline, c));
    let sweep = &pipeline.config().sweep;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    match args.format {
        OutputFormat::Csv => {
            writeln!(out, "x,y")?;
            for p in curve.points() {
                writeln!(out, "{},{}", p.x, p.y)?;
            }
            if let Some(c) = cursor {
                writeln!(out, "# cursor {} -> {} ({})", c.cursor, c.snapped, c.note)?;
            }
        }
        OutputFormat::Json => {
            let report = SweepReport {
                mode: sweep.mode,
                curve: &curve,
                display_bounds: curve.display_bounds(),
                extrema: pipeline.extrema(),
                snaps: pipeline.snaps().points(),
                grid: grid_lines(sweep.max_x, sweep.edo, sweep.negative_x),
                cursor,
            };
            serde_json::to_writer_pretty(&mut out, &report)?;
            writeln!(out)?;
        }
        OutputFormat::Summary => {
            let ex = pipeline.extrema();
            writeln!(out, "mode: {:?}", sweep.mode)?;
            writeln!(out, "valleys: {:?}", ex.valleys)?;
            writeln!(out, "peaks: {:?}", ex.peaks)?;
            writeln!(out, "snaps: {:?}", pipeline.snaps().points())?;
            if let Some(c) = cursor {
                writeln!(
                    out,
                    "cursor: {} -> {} ({}), roughness {:?}",
                    c.cursor, c.snapped, c.note, c.roughness
                )?;
                for (cents, hz) in &c.preview {
                    writeln!(out, "  {cents:>8.1} cents  {hz:>9.2} Hz")?;
                }
                writeln!(out, "  voice level {:.2}", c.voice_level)?;
            }
        }
    }
    out.flush()?;
    Ok(())
}
