//! Drum grid data structures and tick geometry.
//!
//! This module provides the sparse note grid that the editor mutates, the
//! fixed instrument catalog, and the integer arithmetic that converts between
//! ticks, beats, measures and per-beat subdivisions.

mod kit;
mod note;
mod pattern;
mod snapshot;

pub use kit::{
    gm_key, instrument_by_id, instrument_by_row, part_instrument_id, row_by_id, staff_pitch,
    Instrument, NoteHead, StaffPitch, DRUM_KIT, FALLBACK_GM_KEY, ROW_COUNT,
};
pub use note::{NoteData, NoteType};
pub use pattern::{GridError, GridKey, Pattern, Preset, ScoreLayout, ToggleOutcome};
pub use snapshot::{
    EntryGrid, KeyedGrid, SavedGrid, SavedNote, SavedNotes, SnapshotError, VersionedSnapshot,
    CURRENT_VERSION,
};

/// Ticks per beat (quarter note).
/// 12 is divisible by 2, 3 and 4, so straight and triplet subdivisions share
/// one grid without rounding.
pub const TICKS_PER_BEAT: u32 = 12;

/// Beats per measure. The editor only writes 4/4.
pub const BEATS_PER_MEASURE: u32 = 4;

/// Smallest number of measures a score may have.
pub const MIN_MEASURES: u32 = 1;

/// Largest number of measures a score may have.
pub const MAX_MEASURES: u32 = 32;

/// Number of measures in a fresh score.
pub const DEFAULT_MEASURES: u32 = 2;

/// Subdivisions of a beat when nothing else is known (straight 16ths).
pub const DEFAULT_SUBDIVISIONS: u8 = 4;

/// Subdivision counts a beat may use: straight 8th, 16th triplet, straight 16th.
pub const SUBDIVISION_OPTIONS: [u8; 3] = [4, 2, 3];

/// Default tempo in beats per minute.
pub const DEFAULT_BPM: u32 = 100;

/// Divides `numerator` by `denominator` rounding half away from zero.
fn div_round(numerator: u32, denominator: u32) -> u32 {
    let numerator = numerator as u64;
    let denominator = denominator.max(1) as u64;
    ((2 * numerator + denominator) / (2 * denominator)) as u32
}

/// Returns the tick length of one grid column for a beat split into
/// `subdivisions` columns.
///
/// # Examples
///
/// ```
/// use drumscore::grid::ticks_per_subdivision;
///
/// assert_eq!(ticks_per_subdivision(4), 3);
/// assert_eq!(ticks_per_subdivision(3), 4);
/// assert_eq!(ticks_per_subdivision(2), 6);
/// ```
pub fn ticks_per_subdivision(subdivisions: u32) -> u32 {
    div_round(TICKS_PER_BEAT, subdivisions)
}

/// Converts a column of a fixed-subdivision grid to an absolute tick.
///
/// Used when reading the oldest saved scores, which stored notes by column
/// index instead of by tick.
///
/// # Arguments
///
/// * `col` - Column index counted from the start of the score
/// * `subdivisions` - Columns per beat in that grid
pub fn col_to_tick(col: u32, subdivisions: u32) -> u32 {
    div_round(col.saturating_mul(TICKS_PER_BEAT), subdivisions)
}

/// Clamps a requested measure count into `[MIN_MEASURES, MAX_MEASURES]`.
pub fn clamp_measures(value: i64) -> u32 {
    value.clamp(MIN_MEASURES as i64, MAX_MEASURES as i64) as u32
}

/// Returns the number of ticks in one measure.
pub fn ticks_per_measure(beats_per_measure: u32, ticks_per_beat: u32) -> u32 {
    beats_per_measure * ticks_per_beat
}

/// Returns the number of ticks in a 4/4 score of `measures` measures.
pub fn total_ticks(measures: u32) -> u32 {
    measures * ticks_per_measure(BEATS_PER_MEASURE, TICKS_PER_BEAT)
}

/// Returns the global beat index a tick falls in.
pub fn beat_of_tick(tick: u32) -> u32 {
    tick / TICKS_PER_BEAT
}

/// Calculates the measure and beat for a given tick position.
///
/// # Returns
///
/// Tuple of (measure, beat, tick_within_beat); measure and beat are 1-indexed
pub fn tick_to_position(tick: u32) -> (u32, u32, u32) {
    let measure_ticks = ticks_per_measure(BEATS_PER_MEASURE, TICKS_PER_BEAT);
    let measure = tick / measure_ticks + 1;
    let tick_in_measure = tick % measure_ticks;
    let beat = tick_in_measure / TICKS_PER_BEAT + 1;
    (measure, beat, tick_in_measure % TICKS_PER_BEAT)
}
