//! The editable drum score.
//!
//! A pattern holds the measure count, the per-beat subdivision layout and a
//! sparse map from (row, tick) to note. All mutation goes through methods
//! that validate against the current layout, so the notation writer can
//! assume a valid grid.

use super::kit::{row_by_id, ROW_COUNT};
use super::note::{NoteData, NoteType};
use super::{
    clamp_measures, ticks_per_subdivision, total_ticks, BEATS_PER_MEASURE, DEFAULT_MEASURES,
    DEFAULT_SUBDIVISIONS, SUBDIVISION_OPTIONS, TICKS_PER_BEAT,
};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised when an edit does not fit the current score layout.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("row {row} is outside the drum kit (0..{count})", count = ROW_COUNT)]
    RowOutOfRange { row: usize },

    #[error("tick {tick} is outside the score (0..{total})")]
    TickOutOfRange { tick: u32, total: u32 },

    #[error("note duration must be greater than zero")]
    ZeroDuration,

    #[error("tick {tick} does not fall on a 16th, 8th or triplet column")]
    OffGrid { tick: u32 },

    #[error("column {col} is outside a beat of {subdivisions} columns")]
    ColumnOutOfRange { col: u32, subdivisions: u32 },

    #[error("beat {beat} is outside the score (0..{total})")]
    BeatOutOfRange { beat: usize, total: usize },

    #[error("unsupported beat subdivision {0} (expected 2, 3 or 4)")]
    InvalidSubdivision(u8),
}

/// Composite key of a grid cell. Ordered by row, then tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GridKey {
    pub row: usize,
    pub tick: u32,
}

impl GridKey {
    pub fn new(row: usize, tick: u32) -> Self {
        Self { row, tick }
    }
}

/// What a toggle did to the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// The cell was empty and now holds a note.
    Added,
    /// The cell held a note of the same type and is now empty.
    Removed,
    /// The cell held a note of another type; its type was replaced.
    Retyped,
}

/// Built-in starting grooves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Rock,
    Pop,
    Shuffle,
}

impl Preset {
    /// Parses a preset name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "rock" => Some(Preset::Rock),
            "pop" => Some(Preset::Pop),
            "shuffle" => Some(Preset::Shuffle),
            _ => None,
        }
    }
}

/// Borrowed view of a score handed to the notation writer.
#[derive(Debug, Clone, Copy)]
pub struct ScoreLayout<'a> {
    pub measures: u32,
    pub beats_per_measure: u32,
    pub ticks_per_beat: u32,
    pub notes: &'a BTreeMap<GridKey, NoteData>,
    pub subdivisions_by_beat: &'a [u8],
}

/// An editable drum score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    /// Number of measures, always in `[MIN_MEASURES, MAX_MEASURES]`.
    measures: u32,

    /// Subdivision count per global beat index; length is measures * 4.
    subdivisions_by_beat: Vec<u8>,

    /// Sparse note grid.
    notes: BTreeMap<GridKey, NoteData>,
}

impl Pattern {
    /// Creates an empty pattern with every beat in straight 16ths.
    ///
    /// # Arguments
    ///
    /// * `measures` - Requested measure count (clamped to 1..=32)
    pub fn new(measures: u32) -> Self {
        let measures = clamp_measures(measures as i64);
        Self {
            measures,
            subdivisions_by_beat: vec![DEFAULT_SUBDIVISIONS; (measures * BEATS_PER_MEASURE) as usize],
            notes: BTreeMap::new(),
        }
    }

    /// Builds a pattern from already validated parts.
    ///
    /// The subdivision array is resized to the measure count, and notes
    /// that do not fit are dropped.
    pub(crate) fn from_parts(
        measures: u32,
        subdivisions_by_beat: Vec<u8>,
        notes: impl IntoIterator<Item = (GridKey, NoteData)>,
    ) -> Self {
        let mut pattern = Self::new(measures);
        for (beat, value) in subdivisions_by_beat.into_iter().enumerate() {
            if beat >= pattern.subdivisions_by_beat.len() {
                break;
            }
            if SUBDIVISION_OPTIONS.contains(&value) {
                pattern.subdivisions_by_beat[beat] = value;
            }
        }
        for (key, note) in notes {
            // Out-of-range entries are dropped; callers report the count.
            let _ = pattern.insert_note(key.row, key.tick, note);
        }
        pattern
    }

    /// Creates a pattern filled with one of the built-in grooves.
    pub fn with_preset(preset: Preset, measures: u32) -> Self {
        let mut pattern = Self::new(measures);
        pattern.apply_preset(preset);
        pattern
    }

    /// Replaces all notes with a built-in groove.
    ///
    /// Every beat is reset to the preset's feel: triplets for the shuffle,
    /// straight 16ths for rock and pop.
    pub fn apply_preset(&mut self, preset: Preset) {
        self.notes.clear();
        let feel = match preset {
            Preset::Shuffle => 3,
            Preset::Rock | Preset::Pop => DEFAULT_SUBDIVISIONS,
        };
        self.subdivisions_by_beat.fill(feel);
        let (Some(hihat), Some(snare), Some(kick)) =
            (row_by_id("hihat"), row_by_id("snare"), row_by_id("kick"))
        else {
            return;
        };
        let eighth = TICKS_PER_BEAT / 2;

        for beat in 0..self.total_beats() as u32 {
            let start = beat * TICKS_PER_BEAT;
            let beat_in_measure = beat % BEATS_PER_MEASURE;
            let backbeat = beat_in_measure == 1 || beat_in_measure == 3;

            match preset {
                Preset::Rock | Preset::Pop => {
                    self.put(hihat, start, NoteData::normal(eighth));
                    self.put(hihat, start + eighth, NoteData::normal(eighth));
                    if backbeat {
                        self.put(snare, start, NoteData::normal(TICKS_PER_BEAT));
                    }
                    match (preset, beat_in_measure) {
                        (Preset::Rock, 0 | 2) | (Preset::Pop, 0) => {
                            self.put(kick, start, NoteData::normal(TICKS_PER_BEAT));
                        }
                        (Preset::Pop, 2) => {
                            self.put(kick, start + eighth, NoteData::normal(eighth));
                        }
                        _ => {}
                    }
                }
                Preset::Shuffle => {
                    self.put(hihat, start, NoteData::normal(4));
                    self.put(hihat, start + 8, NoteData::normal(4));
                    if backbeat {
                        self.put(snare, start, NoteData::normal(4));
                    } else {
                        self.put(kick, start, NoteData::normal(4));
                    }
                }
            }
        }
    }

    fn put(&mut self, row: usize, tick: u32, note: NoteData) {
        self.notes.insert(GridKey::new(row, tick), note);
    }

    /// Returns the number of measures.
    pub fn measures(&self) -> u32 {
        self.measures
    }

    /// Returns the number of beats in the score.
    pub fn total_beats(&self) -> usize {
        self.subdivisions_by_beat.len()
    }

    /// Returns the number of ticks in the score.
    pub fn total_ticks(&self) -> u32 {
        total_ticks(self.measures)
    }

    /// Returns the per-beat subdivision layout.
    pub fn subdivisions_by_beat(&self) -> &[u8] {
        &self.subdivisions_by_beat
    }

    /// Returns the subdivision count of a global beat (4 when unknown).
    pub fn subdivisions_for_beat(&self, beat: usize) -> u8 {
        self.subdivisions_by_beat
            .get(beat)
            .copied()
            .unwrap_or(DEFAULT_SUBDIVISIONS)
    }

    /// Returns the note grid.
    pub fn notes(&self) -> &BTreeMap<GridKey, NoteData> {
        &self.notes
    }

    /// Returns the number of notes in the grid.
    pub fn note_count(&self) -> usize {
        self.notes.len()
    }

    /// Returns the note starting at (row, tick).
    pub fn note_at(&self, row: usize, tick: u32) -> Option<&NoteData> {
        self.notes.get(&GridKey::new(row, tick))
    }

    /// Returns the notes whose start tick lies in `[start, end)`, ordered by
    /// row then tick.
    pub fn notes_in_range(
        &self,
        start: u32,
        end: u32,
    ) -> impl Iterator<Item = (&GridKey, &NoteData)> {
        self.notes
            .iter()
            .filter(move |(key, _)| key.tick >= start && key.tick < end)
    }

    fn check_cell(&self, row: usize, tick: u32) -> Result<(), GridError> {
        if row >= ROW_COUNT {
            return Err(GridError::RowOutOfRange { row });
        }
        let total = self.total_ticks();
        if tick >= total {
            return Err(GridError::TickOutOfRange { tick, total });
        }
        Ok(())
    }

    /// A tick is on the grid when its offset in the beat is a column of
    /// some subdivision option: 0, 3, 4, 6, 8 or 9 at 12 ticks per beat.
    fn check_on_grid(tick: u32) -> Result<(), GridError> {
        let offset = tick % TICKS_PER_BEAT;
        let on_grid = SUBDIVISION_OPTIONS
            .iter()
            .any(|&option| offset % ticks_per_subdivision(option as u32) == 0);
        if on_grid {
            Ok(())
        } else {
            Err(GridError::OffGrid { tick })
        }
    }

    fn check_beat(&self, beat: usize) -> Result<(), GridError> {
        if beat >= self.total_beats() {
            return Err(GridError::BeatOutOfRange {
                beat,
                total: self.total_beats(),
            });
        }
        Ok(())
    }

    /// Stores a note, replacing whatever started on the same cell.
    ///
    /// # Returns
    ///
    /// The replaced note, if any
    ///
    /// # Errors
    ///
    /// Returns error if the cell is outside the score, the tick is not on a
    /// subdivision column, or the duration is zero
    pub fn insert_note(
        &mut self,
        row: usize,
        tick: u32,
        note: NoteData,
    ) -> Result<Option<NoteData>, GridError> {
        self.check_cell(row, tick)?;
        Self::check_on_grid(tick)?;
        if note.duration == 0 {
            return Err(GridError::ZeroDuration);
        }
        Ok(self.notes.insert(GridKey::new(row, tick), note))
    }

    /// Removes the note starting at (row, tick).
    pub fn remove_note(&mut self, row: usize, tick: u32) -> Option<NoteData> {
        self.notes.remove(&GridKey::new(row, tick))
    }

    /// Toggles the note under a grid column, the way a click in the editor does.
    ///
    /// # Arguments
    ///
    /// * `row` - Instrument row
    /// * `beat` - Global beat index
    /// * `col_in_beat` - Column within the beat, counted in that beat's subdivisions
    /// * `note_type` - Articulation currently selected in the editor
    pub fn toggle_note(
        &mut self,
        row: usize,
        beat: usize,
        col_in_beat: u32,
        note_type: NoteType,
    ) -> Result<ToggleOutcome, GridError> {
        self.check_beat(beat)?;
        let subdivisions = self.subdivisions_for_beat(beat) as u32;
        if col_in_beat >= subdivisions {
            return Err(GridError::ColumnOutOfRange {
                col: col_in_beat,
                subdivisions,
            });
        }
        let step = ticks_per_subdivision(subdivisions);
        let tick = beat as u32 * TICKS_PER_BEAT + col_in_beat * step;
        self.check_cell(row, tick)?;

        let key = GridKey::new(row, tick);
        match self.notes.get(&key).map(|existing| existing.note_type) {
            Some(existing_type) if existing_type == note_type => {
                self.notes.remove(&key);
                Ok(ToggleOutcome::Removed)
            }
            Some(_) => {
                if let Some(existing) = self.notes.get_mut(&key) {
                    existing.note_type = note_type;
                }
                Ok(ToggleOutcome::Retyped)
            }
            None => {
                self.notes.insert(key, NoteData::new(step, note_type));
                Ok(ToggleOutcome::Added)
            }
        }
    }

    /// Changes the measure count.
    ///
    /// The beat layout is truncated or extended with straight 16ths, and
    /// notes past the new end are dropped.
    pub fn set_measures(&mut self, measures: i64) {
        let measures = clamp_measures(measures);
        self.measures = measures;
        self.subdivisions_by_beat
            .resize((measures * BEATS_PER_MEASURE) as usize, DEFAULT_SUBDIVISIONS);
        let total = self.total_ticks();
        self.notes.retain(|key, _| key.tick < total);
    }

    /// Sets the subdivision count of one beat.
    pub fn set_beat_subdivision(&mut self, beat: usize, subdivisions: u8) -> Result<(), GridError> {
        self.check_beat(beat)?;
        if !SUBDIVISION_OPTIONS.contains(&subdivisions) {
            return Err(GridError::InvalidSubdivision(subdivisions));
        }
        self.subdivisions_by_beat[beat] = subdivisions;
        Ok(())
    }

    /// Advances a beat to the next subdivision option (16th -> 8th -> triplet -> 16th).
    ///
    /// # Returns
    ///
    /// The new subdivision count
    pub fn cycle_beat_subdivision(&mut self, beat: usize) -> Result<u8, GridError> {
        self.check_beat(beat)?;
        let current = self.subdivisions_by_beat[beat];
        let index = SUBDIVISION_OPTIONS
            .iter()
            .position(|&option| option == current)
            .unwrap_or(0);
        let next = SUBDIVISION_OPTIONS[(index + 1) % SUBDIVISION_OPTIONS.len()];
        self.subdivisions_by_beat[beat] = next;
        Ok(next)
    }

    /// Removes every note. The beat layout is kept.
    pub fn clear(&mut self) {
        self.notes.clear();
    }

    /// Returns the borrowed view used by the notation writer.
    pub fn layout(&self) -> ScoreLayout<'_> {
        ScoreLayout {
            measures: self.measures,
            beats_per_measure: BEATS_PER_MEASURE,
            ticks_per_beat: TICKS_PER_BEAT,
            notes: &self.notes,
            subdivisions_by_beat: &self.subdivisions_by_beat,
        }
    }
}

impl Default for Pattern {
    fn default() -> Self {
        Self::with_preset(Preset::Rock, DEFAULT_MEASURES)
    }
}
