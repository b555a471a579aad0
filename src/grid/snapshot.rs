//! Versioned save format.
//!
//! Scores are persisted as a JSON object tagged with a schema version. Eight
//! versions exist in the wild:
//!
//! - v1 stored notes as `"row:col"` keys of a fixed-subdivision grid
//! - v2 stored notes as `"row:tick"` keys
//! - v3 to v8 store `{row, tick, duration, type?}` objects, with optional
//!   per-measure or per-beat subdivision arrays
//!
//! Loading parses the wire shape into a [`VersionedSnapshot`] and walks the
//! upgrade chain one version at a time until it reaches the current one.
//! Entries that do not fit the loaded layout are dropped silently.

use super::note::{NoteData, NoteType};
use super::pattern::{GridKey, Pattern};
use super::{
    clamp_measures, col_to_tick, ticks_per_subdivision, BEATS_PER_MEASURE, DEFAULT_MEASURES,
    DEFAULT_SUBDIVISIONS,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Version written by [`Pattern::to_snapshot`].
pub const CURRENT_VERSION: u64 = 8;

/// Errors that can occur while loading or saving a score.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("invalid score JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported score version {0}")]
    UnsupportedVersion(u64),
}

/// A note entry as stored by v3 and later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedNote {
    pub row: i64,
    pub tick: i64,
    pub duration: i64,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub note_type: Option<NoteType>,
}

/// The `notes` array, either legacy string keys or note objects.
///
/// Note objects are read one at a time; an entry with a missing, null or
/// non-integer field is skipped without failing the load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SavedNotes {
    Keys(Vec<String>),
    Entries(#[serde(deserialize_with = "lenient_entries")] Vec<SavedNote>),
}

fn lenient_entries<'de, D>(deserializer: D) -> Result<Vec<SavedNote>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Vec::<serde_json::Value>::deserialize(deserializer)?;
    let stored = values.len();
    let entries: Vec<SavedNote> = values
        .into_iter()
        .filter_map(|value| serde_json::from_value(value).ok())
        .collect();
    if entries.len() < stored {
        tracing::debug!(skipped = stored - entries.len(), "skipped malformed note entries");
    }
    Ok(entries)
}

impl Default for SavedNotes {
    fn default() -> Self {
        SavedNotes::Entries(Vec::new())
    }
}

/// Wire shape of a saved score, shared by every version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedGrid {
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measures: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beats_per_measure: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdivisions: Option<u32>,
    #[serde(default)]
    pub notes: SavedNotes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdivisions_per_measure: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdivisions_per_beat: Option<Vec<u8>>,
    /// Written by some old builds; carries no information the layout arrays lack.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triplet_beats: Option<Vec<String>>,
}

/// Score body of v1 and v2: notes as (row, position) pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedGrid {
    pub measures: u32,
    pub subdivisions: u32,
    pub layout: Vec<u8>,
    pub keys: Vec<(i64, i64)>,
}

/// Score body of v3 and later: notes as full entries.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryGrid {
    pub measures: u32,
    pub layout: Vec<u8>,
    pub notes: Vec<SavedNote>,
}

/// A saved score tagged with the schema it was written in.
#[derive(Debug, Clone, PartialEq)]
pub enum VersionedSnapshot {
    /// Keys are (row, column) in a grid of `subdivisions` columns per beat.
    V1(KeyedGrid),
    /// Keys are (row, tick).
    V2(KeyedGrid),
    V3(EntryGrid),
    V4(EntryGrid),
    V5(EntryGrid),
    V6(EntryGrid),
    V7(EntryGrid),
    V8(EntryGrid),
}

impl VersionedSnapshot {
    /// Tags a wire snapshot with its version.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedVersion` for versions outside 1..=8
    pub fn from_saved(saved: SavedGrid) -> Result<Self, SnapshotError> {
        let measures = clamp_measures(saved.measures.unwrap_or(DEFAULT_MEASURES as i64));
        let subdivisions = saved.subdivisions.unwrap_or(DEFAULT_SUBDIVISIONS as u32);
        let layout = resolve_layout(&saved, measures, subdivisions);

        let keyed = |notes: SavedNotes| KeyedGrid {
            measures,
            subdivisions,
            layout: layout.clone(),
            keys: match notes {
                SavedNotes::Keys(keys) => keys.iter().filter_map(|k| parse_key(k)).collect(),
                SavedNotes::Entries(_) => Vec::new(),
            },
        };
        let entries = |notes: SavedNotes| EntryGrid {
            measures,
            layout: layout.clone(),
            notes: match notes {
                SavedNotes::Entries(entries) => entries,
                SavedNotes::Keys(_) => Vec::new(),
            },
        };

        Ok(match saved.version {
            1 => VersionedSnapshot::V1(keyed(saved.notes)),
            2 => VersionedSnapshot::V2(keyed(saved.notes)),
            3 => VersionedSnapshot::V3(entries(saved.notes)),
            4 => VersionedSnapshot::V4(entries(saved.notes)),
            5 => VersionedSnapshot::V5(entries(saved.notes)),
            6 => VersionedSnapshot::V6(entries(saved.notes)),
            7 => VersionedSnapshot::V7(entries(saved.notes)),
            8 => VersionedSnapshot::V8(entries(saved.notes)),
            other => return Err(SnapshotError::UnsupportedVersion(other)),
        })
    }

    /// Returns the schema version number.
    pub fn version(&self) -> u64 {
        match self {
            VersionedSnapshot::V1(_) => 1,
            VersionedSnapshot::V2(_) => 2,
            VersionedSnapshot::V3(_) => 3,
            VersionedSnapshot::V4(_) => 4,
            VersionedSnapshot::V5(_) => 5,
            VersionedSnapshot::V6(_) => 6,
            VersionedSnapshot::V7(_) => 7,
            VersionedSnapshot::V8(_) => 8,
        }
    }

    /// Upgrades by exactly one version. The current version upgrades to itself.
    pub fn upgrade(self) -> Self {
        match self {
            VersionedSnapshot::V1(grid) => VersionedSnapshot::V2(columns_to_ticks(grid)),
            VersionedSnapshot::V2(grid) => VersionedSnapshot::V3(keys_to_entries(grid)),
            VersionedSnapshot::V3(grid) => VersionedSnapshot::V4(grid),
            VersionedSnapshot::V4(grid) => VersionedSnapshot::V5(grid),
            VersionedSnapshot::V5(grid) => VersionedSnapshot::V6(grid),
            VersionedSnapshot::V6(grid) => VersionedSnapshot::V7(grid),
            VersionedSnapshot::V7(grid) => VersionedSnapshot::V8(grid),
            current @ VersionedSnapshot::V8(_) => current,
        }
    }

    /// Runs the upgrade chain to the current version.
    pub fn into_current(self) -> EntryGrid {
        let mut snapshot = self;
        loop {
            match snapshot {
                VersionedSnapshot::V8(grid) => return grid,
                older => snapshot = older.upgrade(),
            }
        }
    }
}

/// Picks the per-beat layout: per-beat array if it matches the beat count,
/// else a per-measure array expanded to beats, else uniform.
fn resolve_layout(saved: &SavedGrid, measures: u32, subdivisions: u32) -> Vec<u8> {
    let total_beats = (measures * BEATS_PER_MEASURE) as usize;
    if let Some(per_beat) = &saved.subdivisions_per_beat {
        if per_beat.len() == total_beats {
            return per_beat.clone();
        }
    }
    if let Some(per_measure) = &saved.subdivisions_per_measure {
        if per_measure.len() == measures as usize {
            return (0..total_beats)
                .map(|beat| per_measure[beat / BEATS_PER_MEASURE as usize])
                .collect();
        }
    }
    let uniform = u8::try_from(subdivisions).unwrap_or(DEFAULT_SUBDIVISIONS);
    vec![uniform; total_beats]
}

fn parse_key(key: &str) -> Option<(i64, i64)> {
    let (row, position) = key.split_once(':')?;
    Some((row.trim().parse().ok()?, position.trim().parse().ok()?))
}

fn columns_to_ticks(grid: KeyedGrid) -> KeyedGrid {
    let subdivisions = grid.subdivisions;
    let keys = grid
        .keys
        .into_iter()
        .filter_map(|(row, col)| {
            let col = u32::try_from(col).ok()?;
            Some((row, col_to_tick(col, subdivisions) as i64))
        })
        .collect();
    KeyedGrid { keys, ..grid }
}

fn keys_to_entries(grid: KeyedGrid) -> EntryGrid {
    let duration = ticks_per_subdivision(grid.subdivisions) as i64;
    EntryGrid {
        measures: grid.measures,
        layout: grid.layout,
        notes: grid
            .keys
            .into_iter()
            .map(|(row, tick)| SavedNote {
                row,
                tick,
                duration,
                note_type: None,
            })
            .collect(),
    }
}

impl Pattern {
    /// Builds the current-version save payload.
    pub fn to_snapshot(&self) -> SavedGrid {
        let notes = self
            .notes()
            .iter()
            .map(|(key, note)| SavedNote {
                row: key.row as i64,
                tick: key.tick as i64,
                duration: note.duration as i64,
                note_type: Some(note.note_type),
            })
            .collect();

        SavedGrid {
            version: CURRENT_VERSION,
            measures: Some(self.measures() as i64),
            beats_per_measure: Some(BEATS_PER_MEASURE),
            subdivisions: Some(DEFAULT_SUBDIVISIONS as u32),
            notes: SavedNotes::Entries(notes),
            subdivisions_per_measure: None,
            subdivisions_per_beat: Some(self.subdivisions_by_beat().to_vec()),
            triplet_beats: None,
        }
    }

    /// Restores a pattern from a save payload of any supported version.
    ///
    /// # Errors
    ///
    /// Returns error if the version is unknown
    pub fn from_snapshot(saved: SavedGrid) -> Result<Self, SnapshotError> {
        let version = saved.version;
        let grid = VersionedSnapshot::from_saved(saved)?.into_current();
        let stored = grid.notes.len();

        let notes = grid.notes.into_iter().filter_map(|entry| {
            let row = usize::try_from(entry.row).ok()?;
            let tick = u32::try_from(entry.tick).ok()?;
            let duration = u32::try_from(entry.duration).ok().filter(|&d| d > 0)?;
            Some((
                GridKey::new(row, tick),
                NoteData::new(duration, entry.note_type.unwrap_or_default()),
            ))
        });
        let pattern = Pattern::from_parts(grid.measures, grid.layout, notes);

        let dropped = stored - pattern.note_count();
        if dropped > 0 {
            tracing::debug!(version, dropped, "dropped saved notes outside the score");
        }
        Ok(pattern)
    }

    /// Serializes the pattern to a pretty-printed JSON snapshot.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(&self.to_snapshot())?)
    }

    /// Loads a pattern from a JSON snapshot.
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let saved: SavedGrid = serde_json::from_str(json)?;
        Self::from_snapshot(saved)
    }

    /// Saves the pattern to a JSON file.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or file writing fails
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), SnapshotError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Loads a pattern from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns error if file reading or parsing fails
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, SnapshotError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Preset, TICKS_PER_BEAT};

    #[test]
    fn test_serialization() {
        let mut pattern = Pattern::with_preset(Preset::Pop, 2);
        pattern.set_beat_subdivision(5, 3).unwrap();
        pattern
            .insert_note(7, 20, NoteData::new(4, NoteType::Ghost))
            .unwrap();

        let json = pattern.to_json().unwrap();
        assert!(json.contains("\"version\": 8"));
        assert!(json.contains("\"subdivisionsPerBeat\""));
        let loaded = Pattern::from_json(&json).unwrap();
        assert_eq!(loaded, pattern);
    }

    #[test]
    fn test_v1_columns_are_converted() {
        let json = r#"{
            "version": 1,
            "measures": 1,
            "beatsPerMeasure": 4,
            "subdivisions": 2,
            "notes": ["9:0", "7:2", "3:7", "3:8", "bogus", "12:0"]
        }"#;
        let pattern = Pattern::from_json(json).unwrap();
        assert_eq!(pattern.note_at(9, 0), Some(&NoteData::normal(6)));
        assert_eq!(pattern.note_at(7, 12), Some(&NoteData::normal(6)));
        assert_eq!(pattern.note_at(3, 42), Some(&NoteData::normal(6)));
        // column 8 of an 8th grid is tick 48: past the single measure
        assert_eq!(pattern.note_count(), 3);
        assert!(pattern.subdivisions_by_beat().iter().all(|&s| s == 2));
    }

    #[test]
    fn test_v2_keys_are_ticks() {
        let json = r#"{
            "version": 2,
            "measures": 1,
            "beatsPerMeasure": 4,
            "subdivisions": 4,
            "notes": ["9:0", "7:15"]
        }"#;
        let pattern = Pattern::from_json(json).unwrap();
        assert_eq!(pattern.note_at(7, 15), Some(&NoteData::normal(3)));
        assert_eq!(pattern.note_count(), 2);
    }

    #[test]
    fn test_v5_entries_without_type() {
        let json = r#"{
            "version": 5,
            "measures": 2,
            "beatsPerMeasure": 4,
            "subdivisions": 4,
            "subdivisionsPerMeasure": [4, 3],
            "notes": [
                {"row": 9, "tick": 0, "duration": 12},
                {"row": 7, "tick": 52, "duration": 4, "type": "accent"},
                {"row": -1, "tick": 0, "duration": 3},
                {"row": 3, "tick": 96, "duration": 3},
                {"row": 3, "tick": 3, "duration": 0}
            ]
        }"#;
        let pattern = Pattern::from_json(json).unwrap();
        assert_eq!(pattern.note_count(), 2);
        assert_eq!(pattern.note_at(9, 0), Some(&NoteData::normal(12)));
        assert_eq!(
            pattern.note_at(7, 52),
            Some(&NoteData::new(4, NoteType::Accent))
        );
        assert_eq!(pattern.subdivisions_by_beat(), &[4, 4, 4, 4, 3, 3, 3, 3]);
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let json = r#"{
            "version": 8,
            "measures": 1,
            "subdivisions": 4,
            "notes": [
                {"row": 9, "tick": 0, "duration": 12},
                {"row": 9, "tick": 12},
                {"row": null, "tick": 24, "duration": 3},
                {"row": 3, "tick": 1.5, "duration": 3},
                "7:12",
                {"row": 7, "tick": 12, "duration": 12, "type": "ghost"}
            ]
        }"#;
        let pattern = Pattern::from_json(json).unwrap();
        assert_eq!(pattern.note_count(), 2);
        assert_eq!(pattern.note_at(9, 0), Some(&NoteData::normal(12)));
        assert_eq!(
            pattern.note_at(7, 12),
            Some(&NoteData::new(12, NoteType::Ghost))
        );
    }

    #[test]
    fn test_off_grid_keys_are_dropped() {
        let json = r#"{
            "version": 2,
            "measures": 1,
            "subdivisions": 4,
            "notes": ["9:0", "9:5", "3:8", "3:11"]
        }"#;
        let pattern = Pattern::from_json(json).unwrap();
        assert_eq!(pattern.note_count(), 2);
        assert!(pattern.note_at(9, 5).is_none());
        assert!(pattern.note_at(3, 11).is_none());
        assert_eq!(pattern.note_at(3, 8), Some(&NoteData::normal(3)));
    }

    #[test]
    fn test_layout_fallbacks() {
        // per-beat array of the wrong length falls back to uniform subdivisions
        let json = r#"{
            "version": 8,
            "measures": 1,
            "beatsPerMeasure": 4,
            "subdivisions": 2,
            "subdivisionsPerBeat": [3, 3],
            "notes": []
        }"#;
        let pattern = Pattern::from_json(json).unwrap();
        assert_eq!(pattern.subdivisions_by_beat(), &[2, 2, 2, 2]);

        let json = r#"{"version": 7, "notes": []}"#;
        let pattern = Pattern::from_json(json).unwrap();
        assert_eq!(pattern.measures(), 2);
        assert_eq!(pattern.total_beats(), 8);
    }

    #[test]
    fn test_measures_are_clamped() {
        let json = r#"{"version": 8, "measures": 99, "subdivisions": 4, "notes": []}"#;
        let pattern = Pattern::from_json(json).unwrap();
        assert_eq!(pattern.measures(), 32);
        assert_eq!(pattern.total_ticks(), 32 * 4 * TICKS_PER_BEAT);
    }

    #[test]
    fn test_unsupported_version() {
        let json = r#"{"version": 9, "measures": 1, "notes": []}"#;
        assert!(matches!(
            Pattern::from_json(json),
            Err(SnapshotError::UnsupportedVersion(9))
        ));
        assert!(matches!(
            Pattern::from_json("not json"),
            Err(SnapshotError::Json(_))
        ));
    }

    #[test]
    fn test_upgrade_chain_steps_one_version() {
        let saved: SavedGrid = serde_json::from_str(
            r#"{"version": 1, "measures": 1, "subdivisions": 4, "notes": ["9:1"]}"#,
        )
        .unwrap();
        let v1 = VersionedSnapshot::from_saved(saved).unwrap();
        assert_eq!(v1.version(), 1);
        let v2 = v1.upgrade();
        assert_eq!(v2.version(), 2);
        let v3 = v2.upgrade();
        assert_eq!(v3.version(), 3);
        let current = v3.into_current();
        assert_eq!(current.notes.len(), 1);
        assert_eq!(current.notes[0].tick, 3);
        assert_eq!(current.notes[0].duration, 3);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("score.json");
        let pattern = Pattern::with_preset(Preset::Shuffle, 3);
        pattern.save_to_file(&path).unwrap();
        let loaded = Pattern::load_from_file(&path).unwrap();
        assert_eq!(loaded, pattern);
    }
}
