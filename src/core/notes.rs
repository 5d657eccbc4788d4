//! Reference notes, sweep modes and note bookkeeping.

use serde::{Deserialize, Serialize};

/// How the swept note relates to the added notes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SweepMode {
    /// Sweep one note against the reference at 0.
    #[default]
    Interval,
    /// Sweep one note against the reference plus every added note.
    Chord,
    /// Sweep the whole added-note chord shape against the reference.
    Conchord,
}

/// Fixed reference offsets: always `0` first, then the added notes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteSet {
    offsets: Vec<i32>,
}

impl NoteSet {
    pub fn new(added: &[i32]) -> Self {
        let mut offsets = Vec::with_capacity(added.len() + 1);
        offsets.push(0);
        offsets.extend_from_slice(added);
        Self { offsets }
    }

    #[inline]
    pub fn offsets(&self) -> &[i32] {
        &self.offsets
    }

    /// Added notes moved by a swept offset (conchord: the chord shape rides the cursor).
    pub fn shifted_added(&self, by: i32) -> Vec<i32> {
        self.offsets[1..].iter().map(|&n| n + by).collect()
    }
}

impl Default for NoteSet {
    fn default() -> Self {
        Self::new(&[])
    }
}

/// Add `cents` if absent, remove it if present; keeps `notes` sorted.
/// Returns `true` when the note was added.
pub fn toggle_added_note(notes: &mut Vec<i32>, cents: i32) -> bool {
    let added = match notes.iter().position(|&n| n == cents) {
        Some(_) => {
            notes.retain(|&n| n != cents);
            false
        }
        None => {
            notes.push(cents);
            true
        }
    };
    notes.sort_unstable();
    added
}

/// Chord captured in conchord mode at cursor `x`: `[x, added + x ..]`.
pub fn conchord_at(x: f32, added: &[i32]) -> Vec<i32> {
    let root = x.round() as i32;
    std::iter::once(root)
        .chain(added.iter().map(|&n| n + root))
        .collect()
}

/// Frequency of a cent offset above `main_hz`.
#[inline]
pub fn cents_to_hz(main_hz: f32, cents: f32) -> f32 {
    main_hz * 2f32.powf(cents / 1200.0)
}

/// Per-voice level so a chord of `voices` notes stays near `volume`.
#[inline]
pub fn voice_level(volume: f32, voices: usize) -> f32 {
    volume - (voices.max(1) as f32).log2()
}

/// Notes sounded for a preview: reference, cursor, then added notes.
pub fn preview_notes(cursor: f32, added: &[i32]) -> Vec<f32> {
    let mut notes = Vec::with_capacity(added.len() + 2);
    notes.push(0.0);
    notes.push(cursor);
    notes.extend(added.iter().map(|&n| n as f32));
    notes
}
