//! EDO grid lines and 12-EDO note labels for the sweep axis.

use serde::Serialize;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GridLine {
    pub cents: f32,
    /// Falls on a whole octave.
    pub octave: bool,
    /// Note name, only for 12-EDO.
    pub label: Option<&'static str>,
}

/// Grid lines covering `[0, max_x]` (one step past it), mirrored below zero when `negative_x`.
pub fn grid_lines(max_x: i32, edo: u32, negative_x: bool) -> Vec<GridLine> {
    if edo == 0 {
        return Vec::new();
    }
    let step = 1200.0 / edo as f64;
    let count = (max_x.max(0) as f64 / step).floor() as i64 + 2;
    let mut steps: Vec<i64> = (0..count).collect();
    if negative_x {
        let mirrored: Vec<i64> = steps.iter().rev().map(|&k| -k).collect();
        steps = mirrored.into_iter().chain(steps).collect();
        steps.sort_unstable();
        steps.dedup();
    }
    steps
        .into_iter()
        .map(|k| {
            let cents = k as f64 * step;
            GridLine {
                cents: cents as f32,
                octave: k.rem_euclid(edo as i64) == 0,
                label: (edo == 12).then(|| NOTE_NAMES[k.rem_euclid(12) as usize]),
            }
        })
        .collect()
}

/// Name of the 12-EDO step nearest to `cents`.
pub fn note_name(cents: f32) -> &'static str {
    let step = (cents / 100.0).round() as i64;
    NOTE_NAMES[step.rem_euclid(12) as usize]
}
