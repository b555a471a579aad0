//! MusicXML decoding and Standard MIDI File conversion.
//!
//! The decoder walks a MusicXML document and produces a flat list of
//! [`PlaybackNote`]s on the document's tick grid. The encoder turns that
//! list into a format 0 MIDI file on the GM percussion channel, and the
//! importer reads MIDI files back into the same representation.

mod midi_export;
mod midi_import;
mod musicxml_read;

pub use midi_export::{build_midi_from_musicxml, export_midi_to_file, notes_to_midi};
pub use midi_import::{import_midi_file, import_midi_notes, ImportedMidi};
pub use musicxml_read::parse_midi_notes_from_musicxml;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// MIDI channel used for percussion (channel 10, zero-based).
pub const DRUM_CHANNEL: u8 = 9;

/// Velocity given to every decoded note.
pub const DEFAULT_VELOCITY: u8 = 100;

/// Release velocity written on note-off events.
pub const NOTE_OFF_VELOCITY: u8 = 64;

/// Divisions per quarter note assumed when a document does not declare any.
pub const DEFAULT_DIVISIONS: u32 = 12;

/// One sounding percussion hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackNote {
    /// Start in divisions from the beginning of the score.
    pub start_tick: u32,
    /// Length in divisions.
    pub duration: u32,
    /// GM percussion key.
    pub midi: u8,
    pub velocity: u8,
}

impl PlaybackNote {
    /// Returns the tick where the note ends, saturating at `u32::MAX`.
    pub fn end_tick(&self) -> u32 {
        self.start_tick.saturating_add(self.duration)
    }
}

/// Notes decoded from a score, with the resolution they are expressed in.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParsedScore {
    /// Ticks per quarter note.
    pub divisions: u32,
    pub notes: Vec<PlaybackNote>,
}

/// Errors that can occur while decoding or encoding scores.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid tempo {0} BPM")]
    InvalidTempo(u32),

    #[error("unsupported MIDI file: {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
