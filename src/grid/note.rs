//! Grid note representation.
//!
//! A note is stored against one (row, tick) cell of the grid and carries a
//! duration class plus an articulation.

use serde::{Deserialize, Serialize};

/// Articulation of a grid note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteType {
    /// Plain stroke.
    #[default]
    Normal,
    /// Quiet stroke, drawn with a parenthesized notehead.
    Ghost,
    /// Accented stroke.
    Accent,
    /// Stroke preceded by a grace note.
    Flam,
}

impl NoteType {
    /// Returns the lowercase name used in saved scores.
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteType::Normal => "normal",
            NoteType::Ghost => "ghost",
            NoteType::Accent => "accent",
            NoteType::Flam => "flam",
        }
    }
}

/// A note stored in the grid.
///
/// The duration is advisory: the notation writer derives the spacing from the
/// next onset and the beat boundary, and only uses the stored value when the
/// grid is saved or reloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteData {
    /// Duration in ticks (always > 0 once inside a grid).
    pub duration: u32,

    /// Articulation.
    #[serde(rename = "type", default)]
    pub note_type: NoteType,
}

impl NoteData {
    /// Creates a note with the given duration and articulation.
    pub fn new(duration: u32, note_type: NoteType) -> Self {
        Self {
            duration,
            note_type,
        }
    }

    /// Creates a plain note.
    pub fn normal(duration: u32) -> Self {
        Self::new(duration, NoteType::Normal)
    }
}
