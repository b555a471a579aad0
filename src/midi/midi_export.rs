//! Standard MIDI File (SMF) export.
//!
//! Writes decoded scores as SMF format 0: one track holding the tempo and
//! every percussion hit on channel 10.
//!
//! # Format Details
//!
//! - Header division = the score's divisions per quarter note
//! - Tempo meta event at tick 0
//! - Note-off events sort before note-on events on the same tick, so a
//!   retriggered drum is released before it sounds again
//! - End-of-track meta event directly after the last event

use super::{
    parse_midi_notes_from_musicxml, CodecError, ParsedScore, DRUM_CHANNEL, NOTE_OFF_VELOCITY,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes a variable-length quantity (VLQ) used for delta times in MIDI.
///
/// VLQ encodes values using 7 bits per byte, with the MSB indicating
/// whether more bytes follow (1 = more bytes, 0 = last byte).
///
/// # Arguments
///
/// * `value` - The value to encode (max 0x0FFFFFFF for MIDI)
/// * `buffer` - Output buffer to write to
fn write_vlq(value: u32, buffer: &mut Vec<u8>) {
    if value == 0 {
        buffer.push(0);
        return;
    }

    let mut temp = value;
    let mut bytes = Vec::with_capacity(4);

    while temp > 0 {
        bytes.push((temp & 0x7F) as u8);
        temp >>= 7;
    }

    // Most significant group first, continuation bit on all but the last
    for (i, &byte) in bytes.iter().rev().enumerate() {
        if i < bytes.len() - 1 {
            buffer.push(byte | 0x80);
        } else {
            buffer.push(byte);
        }
    }
}

/// MIDI event types for track data.
enum MidiEvent {
    NoteOn {
        channel: u8,
        pitch: u8,
        velocity: u8,
    },
    NoteOff {
        channel: u8,
        pitch: u8,
        velocity: u8,
    },
    /// Set tempo: microseconds per quarter note
    SetTempo { microseconds_per_beat: u32 },
    EndOfTrack,
}

/// Represents a timed MIDI event for sorting and writing.
struct TimedEvent {
    /// Absolute tick position
    tick: u32,
    /// The MIDI event
    event: MidiEvent,
    /// Order among events on the same tick (lower = first)
    priority: u8,
}

impl TimedEvent {
    fn new(tick: u32, event: MidiEvent, priority: u8) -> Self {
        Self {
            tick,
            event,
            priority,
        }
    }
}

const PRIORITY_RELEASE: u8 = 0;
const PRIORITY_ATTACK: u8 = 1;

/// Writes a single MIDI event to the buffer (without delta time).
fn write_event(event: &MidiEvent, buffer: &mut Vec<u8>) {
    match event {
        MidiEvent::NoteOn {
            channel,
            pitch,
            velocity,
        } => {
            buffer.push(0x90 | (channel & 0x0F));
            buffer.push(*pitch);
            buffer.push(*velocity);
        }
        MidiEvent::NoteOff {
            channel,
            pitch,
            velocity,
        } => {
            buffer.push(0x80 | (channel & 0x0F));
            buffer.push(*pitch);
            buffer.push(*velocity);
        }
        MidiEvent::SetTempo {
            microseconds_per_beat,
        } => {
            // Meta event: FF 51 03 tt tt tt
            buffer.push(0xFF);
            buffer.push(0x51);
            buffer.push(0x03);
            buffer.push((microseconds_per_beat >> 16) as u8);
            buffer.push((microseconds_per_beat >> 8) as u8);
            buffer.push(*microseconds_per_beat as u8);
        }
        MidiEvent::EndOfTrack => {
            buffer.push(0xFF);
            buffer.push(0x2F);
            buffer.push(0x00);
        }
    }
}

/// Builds the track chunk data from a list of timed events.
///
/// Events are stably sorted by (tick, priority) and converted to delta
/// times; the end-of-track marker follows the last event with delta 0.
fn build_track_data(events: &mut [TimedEvent]) -> Vec<u8> {
    let mut buffer = Vec::new();
    events.sort_by(|a, b| a.tick.cmp(&b.tick).then(a.priority.cmp(&b.priority)));

    let mut last_tick = 0u32;
    for timed_event in events.iter() {
        let delta = timed_event.tick.saturating_sub(last_tick);
        write_vlq(delta, &mut buffer);
        write_event(&timed_event.event, &mut buffer);
        last_tick = timed_event.tick;
    }
    write_vlq(0, &mut buffer);
    write_event(&MidiEvent::EndOfTrack, &mut buffer);

    buffer
}

/// Writes a track chunk to the output.
fn write_track_chunk<W: Write>(writer: &mut W, track_data: &[u8]) -> std::io::Result<()> {
    writer.write_all(b"MTrk")?;
    let length = track_data.len() as u32;
    writer.write_all(&length.to_be_bytes())?;
    writer.write_all(track_data)?;
    Ok(())
}

/// Converts a tempo to microseconds per quarter note, rounded to nearest.
fn microseconds_per_beat(bpm: u32) -> u32 {
    ((60_000_000u64 + bpm as u64 / 2) / bpm as u64).min(0xFF_FFFF) as u32
}

/// Encodes decoded notes as a format 0 Standard MIDI File.
///
/// Zero-length notes (flam grace strokes) have no sounding interval in a
/// MIDI file and are left out.
///
/// # Arguments
///
/// * `score` - Notes and the division they are expressed in
/// * `bpm` - Tempo written at tick 0
///
/// # Errors
///
/// Returns `CodecError::InvalidTempo` if `bpm` is zero
pub fn notes_to_midi(score: &ParsedScore, bpm: u32) -> Result<Vec<u8>, CodecError> {
    if bpm == 0 {
        return Err(CodecError::InvalidTempo(bpm));
    }

    let mut events = Vec::with_capacity(score.notes.len() * 2 + 1);
    events.push(TimedEvent::new(
        0,
        MidiEvent::SetTempo {
            microseconds_per_beat: microseconds_per_beat(bpm),
        },
        PRIORITY_RELEASE,
    ));

    for note in score.notes.iter().filter(|note| note.duration > 0) {
        events.push(TimedEvent::new(
            note.start_tick,
            MidiEvent::NoteOn {
                channel: DRUM_CHANNEL,
                pitch: note.midi,
                velocity: note.velocity,
            },
            PRIORITY_ATTACK,
        ));
        events.push(TimedEvent::new(
            note.end_tick(),
            MidiEvent::NoteOff {
                channel: DRUM_CHANNEL,
                pitch: note.midi,
                velocity: NOTE_OFF_VELOCITY,
            },
            PRIORITY_RELEASE,
        ));
    }

    let track_data = build_track_data(&mut events);

    let mut bytes = Vec::with_capacity(14 + 8 + track_data.len());
    bytes.extend_from_slice(b"MThd");
    bytes.extend_from_slice(&6u32.to_be_bytes()); // Header length (always 6)
    bytes.extend_from_slice(&0u16.to_be_bytes()); // Format 0
    bytes.extend_from_slice(&1u16.to_be_bytes()); // One track
    bytes.extend_from_slice(&(score.divisions.min(0x7FFF) as u16).to_be_bytes());
    write_track_chunk(&mut bytes, &track_data)?;

    tracing::debug!(
        notes = score.notes.len(),
        bpm,
        bytes = bytes.len(),
        "encoded MIDI"
    );
    Ok(bytes)
}

/// Converts a MusicXML document to a Standard MIDI File.
///
/// The document is decoded with [`parse_midi_notes_from_musicxml`], so the
/// MIDI file holds exactly the notes the decoder reports.
///
/// # Errors
///
/// Returns error if the XML is malformed or `bpm` is zero
pub fn build_midi_from_musicxml(xml: &str, bpm: u32) -> Result<Vec<u8>, CodecError> {
    if bpm == 0 {
        return Err(CodecError::InvalidTempo(bpm));
    }
    let score = parse_midi_notes_from_musicxml(xml)?;
    notes_to_midi(&score, bpm)
}

/// Converts a MusicXML document and writes the MIDI file to disk.
///
/// # Errors
///
/// Returns error if conversion, file creation or writing fails
pub fn export_midi_to_file<P: AsRef<Path>>(xml: &str, bpm: u32, path: P) -> Result<(), CodecError> {
    let bytes = build_midi_from_musicxml(xml, bpm)?;
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::PlaybackNote;

    #[test]
    fn test_vlq_encoding() {
        let mut buffer = Vec::new();

        write_vlq(0, &mut buffer);
        assert_eq!(buffer, vec![0x00]);
        buffer.clear();

        write_vlq(127, &mut buffer);
        assert_eq!(buffer, vec![0x7F]);
        buffer.clear();

        write_vlq(128, &mut buffer);
        assert_eq!(buffer, vec![0x81, 0x00]);
        buffer.clear();

        write_vlq(0x3FFF, &mut buffer);
        assert_eq!(buffer, vec![0xFF, 0x7F]);
        buffer.clear();

        write_vlq(0x4000, &mut buffer);
        assert_eq!(buffer, vec![0x81, 0x80, 0x00]);
    }

    #[test]
    fn test_tempo_rounding() {
        assert_eq!(microseconds_per_beat(120), 500_000);
        assert_eq!(microseconds_per_beat(100), 600_000);
        // 60e6 / 70 = 857142.857...
        assert_eq!(microseconds_per_beat(70), 857_143);
    }

    #[test]
    fn test_single_note_bytes() {
        let score = ParsedScore {
            divisions: 12,
            notes: vec![PlaybackNote {
                start_tick: 0,
                duration: 12,
                midi: 36,
                velocity: 100,
            }],
        };
        let bytes = notes_to_midi(&score, 120).unwrap();
        let expected_track: Vec<u8> = vec![
            0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20, // tempo 500000
            0x00, 0x99, 36, 100, // note on
            0x0C, 0x89, 36, 64, // note off after 12 ticks
            0x00, 0xFF, 0x2F, 0x00, // end of track
        ];
        assert_eq!(&bytes[0..4], b"MThd");
        assert_eq!(&bytes[8..14], &[0, 0, 0, 1, 0, 12]);
        assert_eq!(&bytes[14..18], b"MTrk");
        assert_eq!(&bytes[18..22], &(expected_track.len() as u32).to_be_bytes());
        assert_eq!(&bytes[22..], expected_track.as_slice());
    }

    #[test]
    fn test_release_precedes_retrigger() {
        let note = |start_tick| PlaybackNote {
            start_tick,
            duration: 6,
            midi: 42,
            velocity: 100,
        };
        let score = ParsedScore {
            divisions: 12,
            notes: vec![note(0), note(6)],
        };
        let bytes = notes_to_midi(&score, 100).unwrap();
        let track = &bytes[22..];
        // tempo(7) + on(4), then at tick 6: off before on
        assert_eq!(&track[11..15], &[0x06, 0x89, 42, 64]);
        assert_eq!(&track[15..19], &[0x00, 0x99, 42, 100]);
    }

    #[test]
    fn test_zero_length_notes_are_skipped() {
        let score = ParsedScore {
            divisions: 12,
            notes: vec![
                PlaybackNote {
                    start_tick: 0,
                    duration: 0,
                    midi: 38,
                    velocity: 100,
                },
                PlaybackNote {
                    start_tick: 0,
                    duration: 12,
                    midi: 38,
                    velocity: 100,
                },
            ],
        };
        let bytes = notes_to_midi(&score, 120).unwrap();
        let track = &bytes[22..];
        // tempo(7), one note on, one note off, end of track
        assert_eq!(track.len(), 7 + 4 + 4 + 4);
        assert_eq!(&track[7..11], &[0x00, 0x99, 38, 100]);
        assert_eq!(&track[11..15], &[0x0C, 0x89, 38, 64]);
    }

    #[test]
    fn test_zero_bpm_is_rejected() {
        let score = ParsedScore::default();
        assert!(matches!(
            notes_to_midi(&score, 0),
            Err(CodecError::InvalidTempo(0))
        ));
        assert!(matches!(
            build_midi_from_musicxml("<score-partwise/>", 0),
            Err(CodecError::InvalidTempo(0))
        ));
    }
}
