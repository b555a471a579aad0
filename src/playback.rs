//! Playback scheduling.
//!
//! Converts decoded notes into timed sample triggers for a drum sample
//! player. Timing follows the score's own division: one tick lasts
//! `60 / bpm / divisions` seconds.

use crate::midi::{CodecError, ParsedScore};
use serde::Serialize;

/// Loudness applied at full velocity, leaving headroom for stacked hits.
const MAX_GAIN: f64 = 0.9;

/// Reference velocity that maps to [`MAX_GAIN`].
const REFERENCE_VELOCITY: f64 = 100.0;

/// The sample slots of the playback kit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DrumSample {
    Kick,
    Snare,
    HatClosed,
    HatOpen,
    TomLow,
    TomMid,
    TomHigh,
    Ride,
    Crash,
}

/// Returns the sample that plays a GM percussion key.
///
/// Pedal hi-hat shares the closed hi-hat sample, cross-stick the snare,
/// and acoustic bass drum the kick.
pub fn sample_for_midi(midi: u8) -> Option<DrumSample> {
    match midi {
        49 => Some(DrumSample::Crash),
        51 => Some(DrumSample::Ride),
        42 | 44 => Some(DrumSample::HatClosed),
        46 => Some(DrumSample::HatOpen),
        48 => Some(DrumSample::TomHigh),
        45 => Some(DrumSample::TomMid),
        43 => Some(DrumSample::TomLow),
        38 | 37 => Some(DrumSample::Snare),
        36 | 35 => Some(DrumSample::Kick),
        _ => None,
    }
}

/// Converts ticks to seconds.
///
/// # Arguments
///
/// * `ticks` - Number of ticks
/// * `bpm` - Tempo in beats per minute
/// * `divisions` - Ticks per quarter note
///
/// # Returns
///
/// Duration in seconds
pub fn ticks_to_seconds(ticks: u32, bpm: u32, divisions: u32) -> f64 {
    let beats = ticks as f64 / divisions.max(1) as f64;
    beats * 60.0 / bpm.max(1) as f64
}

/// Converts seconds to (fractional) ticks; used to place a play cursor.
pub fn seconds_to_ticks(seconds: f64, bpm: u32, divisions: u32) -> f64 {
    seconds * bpm.max(1) as f64 / 60.0 * divisions.max(1) as f64
}

/// One sample trigger.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledHit {
    pub start_secs: f64,
    pub end_secs: f64,
    pub midi: u8,
    pub sample: DrumSample,
    /// Linear gain at the attack.
    pub gain: f64,
}

/// Time-ordered sample triggers for one score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackSchedule {
    pub bpm: u32,
    pub divisions: u32,
    pub hits: Vec<ScheduledHit>,
}

impl PlaybackSchedule {
    /// Builds the schedule. Notes without a sample are left out.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::InvalidTempo` if `bpm` is zero
    pub fn new(score: &ParsedScore, bpm: u32) -> Result<Self, CodecError> {
        if bpm == 0 {
            return Err(CodecError::InvalidTempo(bpm));
        }
        let divisions = score.divisions.max(1);

        let mut hits: Vec<ScheduledHit> = score
            .notes
            .iter()
            .filter_map(|note| {
                let sample = sample_for_midi(note.midi)?;
                Some(ScheduledHit {
                    start_secs: ticks_to_seconds(note.start_tick, bpm, divisions),
                    end_secs: ticks_to_seconds(note.end_tick(), bpm, divisions),
                    midi: note.midi,
                    sample,
                    gain: note.velocity as f64 / REFERENCE_VELOCITY * MAX_GAIN,
                })
            })
            .collect();
        hits.sort_by(|a, b| a.start_secs.total_cmp(&b.start_secs));

        let skipped = score.notes.len() - hits.len();
        if skipped > 0 {
            tracing::debug!(skipped, "notes without a playback sample");
        }

        Ok(Self {
            bpm,
            divisions,
            hits,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Returns the time at which the last hit ends.
    pub fn total_secs(&self) -> f64 {
        self.hits.iter().map(|hit| hit.end_secs).fold(0.0, f64::max)
    }

    /// Returns the hits starting in `[from, to)` seconds.
    pub fn hits_between(&self, from: f64, to: f64) -> impl Iterator<Item = &ScheduledHit> {
        self.hits
            .iter()
            .filter(move |hit| hit.start_secs >= from && hit.start_secs < to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::PlaybackNote;

    fn note(start_tick: u32, duration: u32, midi: u8) -> PlaybackNote {
        PlaybackNote {
            start_tick,
            duration,
            midi,
            velocity: 100,
        }
    }

    #[test]
    fn test_tick_time_conversion() {
        // 120 BPM, 12 divisions: one beat is half a second
        assert!((ticks_to_seconds(12, 120, 12) - 0.5).abs() < 1e-9);
        assert!((ticks_to_seconds(6, 60, 12) - 0.5).abs() < 1e-9);
        assert!((seconds_to_ticks(0.5, 120, 12) - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_sample_mapping() {
        assert_eq!(sample_for_midi(44), Some(DrumSample::HatClosed));
        assert_eq!(sample_for_midi(37), Some(DrumSample::Snare));
        assert_eq!(sample_for_midi(35), Some(DrumSample::Kick));
        assert_eq!(sample_for_midi(60), None);
    }

    #[test]
    fn test_schedule() {
        let score = ParsedScore {
            divisions: 12,
            notes: vec![note(12, 12, 38), note(0, 12, 36), note(0, 6, 60)],
        };
        let schedule = PlaybackSchedule::new(&score, 60).unwrap();
        assert_eq!(schedule.hits.len(), 2);
        assert_eq!(schedule.hits[0].sample, DrumSample::Kick);
        assert!((schedule.hits[1].start_secs - 1.0).abs() < 1e-9);
        assert!((schedule.hits[0].gain - 0.9).abs() < 1e-9);
        assert!((schedule.total_secs() - 2.0).abs() < 1e-9);
        assert_eq!(schedule.hits_between(0.5, 1.5).count(), 1);
    }

    #[test]
    fn test_zero_bpm() {
        let score = ParsedScore::default();
        assert!(PlaybackSchedule::new(&score, 0).is_err());
        assert!(PlaybackSchedule::new(&score, 100).unwrap().is_empty());
    }
}
