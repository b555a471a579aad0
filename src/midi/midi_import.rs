//! Standard MIDI File (SMF) import.
//!
//! Reads .mid files back into [`PlaybackNote`]s. Used to check exported
//! files and to inspect files produced elsewhere.
//!
//! # Limitations
//!
//! - Only note on/off pairs and the first tempo event are read
//! - Notes keep the file's own resolution; nothing is rescaled
//! - Notes still sounding at the end of a track get a one-beat duration

use super::{CodecError, ParsedScore, PlaybackNote};
use midly::{Format, MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Tempo assumed when a file carries no tempo event (the SMF default).
const DEFAULT_FILE_BPM: u32 = 120;

/// A MIDI file read back as playback notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedMidi {
    pub score: ParsedScore,
    /// Tempo of the first tempo event, rounded to whole BPM.
    pub bpm: u32,
}

/// Notes waiting for their release.
/// Key is (channel, pitch), value is (start_tick, velocity).
type ActiveNotes = HashMap<(u8, u8), (u32, u8)>;

/// Parses a Standard MIDI File held in memory.
///
/// # Returns
///
/// The notes of all tracks, ordered by start tick then key
///
/// # Errors
///
/// Returns error if the data is not a MIDI file, uses SMPTE timing, or is
/// format 2
pub fn import_midi_notes(data: &[u8]) -> Result<ImportedMidi, CodecError> {
    let smf = Smf::parse(data).map_err(|e| CodecError::Parse(e.to_string()))?;

    let divisions = match smf.header.timing {
        Timing::Metrical(tpb) => tpb.as_int() as u32,
        Timing::Timecode(_, _) => {
            return Err(CodecError::Unsupported(
                "SMPTE timecode timing not supported".to_string(),
            ))
        }
    };
    if smf.header.format == Format::Sequential {
        return Err(CodecError::Unsupported(
            "Format 2 (sequential) MIDI files not supported".to_string(),
        ));
    }

    let mut notes = Vec::new();
    let mut tempo: Option<u32> = None;
    for track in &smf.tracks {
        let track_tempo = parse_track(track, divisions, &mut notes);
        tempo = tempo.or(track_tempo);
    }
    notes.sort_by_key(|n: &PlaybackNote| (n.start_tick, n.midi));

    let bpm = tempo
        .filter(|&usec| usec > 0)
        .map(|usec| (60_000_000 + usec / 2) / usec)
        .unwrap_or(DEFAULT_FILE_BPM);

    tracing::debug!(
        tracks = smf.tracks.len(),
        notes = notes.len(),
        divisions,
        bpm,
        "imported MIDI"
    );

    Ok(ImportedMidi {
        score: ParsedScore { divisions, notes },
        bpm,
    })
}

/// Reads and parses a MIDI file from disk.
///
/// # Errors
///
/// Returns error if the file cannot be read or parsed
pub fn import_midi_file<P: AsRef<Path>>(path: P) -> Result<ImportedMidi, CodecError> {
    let data = fs::read(path)?;
    import_midi_notes(&data)
}

/// Collects the notes of one track.
///
/// # Returns
///
/// The first tempo event of the track, in microseconds per quarter note
fn parse_track(
    track: &[midly::TrackEvent],
    divisions: u32,
    notes: &mut Vec<PlaybackNote>,
) -> Option<u32> {
    let mut active_notes: ActiveNotes = HashMap::new();
    let mut tempo: Option<u32> = None;
    let mut current_tick: u32 = 0;

    let mut release = |active: &mut ActiveNotes, ch: u8, pitch: u8, tick: u32| {
        if let Some((start_tick, velocity)) = active.remove(&(ch, pitch)) {
            notes.push(PlaybackNote {
                start_tick,
                duration: tick.saturating_sub(start_tick),
                midi: pitch,
                velocity,
            });
        }
    };

    for event in track {
        current_tick = current_tick.saturating_add(event.delta.as_int());

        match event.kind {
            TrackEventKind::Meta(MetaMessage::Tempo(usec)) => {
                tempo = tempo.or(Some(usec.as_int()));
            }
            TrackEventKind::Midi { channel, message } => {
                let ch = channel.as_int();
                match message {
                    MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                        // A retrigger without release closes the earlier note
                        release(&mut active_notes, ch, key.as_int(), current_tick);
                        active_notes.insert((ch, key.as_int()), (current_tick, vel.as_int()));
                    }
                    // Note on with velocity 0 = note off
                    MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                        release(&mut active_notes, ch, key.as_int(), current_tick);
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }

    for ((_, pitch), (start_tick, velocity)) in active_notes {
        notes.push(PlaybackNote {
            start_tick,
            duration: divisions,
            midi: pitch,
            velocity,
        });
    }

    tempo
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::notes_to_midi;

    #[test]
    fn test_import_exported_notes() {
        let score = ParsedScore {
            divisions: 12,
            notes: vec![
                PlaybackNote {
                    start_tick: 0,
                    duration: 6,
                    midi: 42,
                    velocity: 100,
                },
                PlaybackNote {
                    start_tick: 0,
                    duration: 12,
                    midi: 36,
                    velocity: 100,
                },
                PlaybackNote {
                    start_tick: 6,
                    duration: 6,
                    midi: 42,
                    velocity: 100,
                },
            ],
        };
        let bytes = notes_to_midi(&score, 90).unwrap();
        let imported = import_midi_notes(&bytes).unwrap();
        assert_eq!(imported.bpm, 90);
        assert_eq!(imported.score.divisions, 12);
        let starts: Vec<(u32, u8, u32)> = imported
            .score
            .notes
            .iter()
            .map(|n| (n.start_tick, n.midi, n.duration))
            .collect();
        assert_eq!(starts, vec![(0, 36, 12), (0, 42, 6), (6, 42, 6)]);
    }

    #[test]
    fn test_long_timeline_saturates() {
        // 17 retriggers at the largest delta run past u32::MAX ticks
        let mut track = Vec::new();
        for _ in 0..17 {
            track.extend_from_slice(&[0xFF, 0xFF, 0xFF, 0x7F, 0x99, 36, 100]);
        }
        track.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);

        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"MThd");
        bytes.extend_from_slice(&[0, 0, 0, 6, 0, 0, 0, 1, 0, 12]);
        bytes.extend_from_slice(b"MTrk");
        bytes.extend_from_slice(&(track.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&track);

        let imported = import_midi_notes(&bytes).unwrap();
        assert_eq!(imported.score.notes.len(), 17);
        assert!(imported
            .score
            .notes
            .iter()
            .any(|n| n.start_tick == u32::MAX));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            import_midi_notes(b"not a midi file"),
            Err(CodecError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = import_midi_file(dir.path().join("missing.mid"));
        assert!(matches!(result, Err(CodecError::Io(_))));
    }
}
