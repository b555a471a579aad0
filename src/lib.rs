//! drumscore - drum grid scores, MusicXML notation and MIDI conversion.
//!
//! This library provides the score model behind a drum notation editor:
//! an editable grid of percussion hits, a MusicXML writer for engraving,
//! and a MusicXML to MIDI converter for playback and export.

pub mod grid;
pub mod midi;
pub mod notation;
pub mod playback;

// Re-export commonly used types
pub use grid::{NoteData, NoteType, Pattern, Preset, TICKS_PER_BEAT};
pub use midi::{
    build_midi_from_musicxml, parse_midi_notes_from_musicxml, CodecError, ParsedScore,
    PlaybackNote,
};
pub use notation::build_musicxml;
pub use playback::PlaybackSchedule;
