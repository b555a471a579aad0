//! Per-measure rhythmic analysis.
//!
//! Everything the XML writer needs to know about one measure is computed
//! here up front: the distinct onsets, which beats are triplet beats, the
//! beam state of every onset and the sounding length of each chord.

use crate::grid::ScoreLayout;

/// Position of a note inside a beam group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeamState {
    Begin,
    Continue,
    End,
}

impl BeamState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BeamState::Begin => "begin",
            BeamState::Continue => "continue",
            BeamState::End => "end",
        }
    }
}

/// Written note value of a tick duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteValue {
    /// MusicXML `<type>` name.
    pub type_name: &'static str,
    pub dotted: bool,
    /// Member of a 3:2 tuplet.
    pub triplet: bool,
}

/// Maps a tick duration (at 12 ticks per beat) to its written value.
pub fn note_value(duration: u32) -> NoteValue {
    let (type_name, dotted, triplet) = match duration {
        d if d >= 12 => ("quarter", false, false),
        9 => ("eighth", true, false),
        6 => ("eighth", false, false),
        4 => ("eighth", false, true),
        _ => ("16th", false, false),
    };
    NoteValue {
        type_name,
        dotted,
        triplet,
    }
}

const STRAIGHT_CHUNKS: [u32; 5] = [12, 9, 6, 4, 3];
const TRIPLET_CHUNK: u32 = 4;

/// Splits a rest of `duration` ticks into writable chunks that sum to
/// `duration` exactly.
///
/// Straight beats take the largest chunks first; triplet beats use triplet
/// 8ths. Either way a remainder below the smallest chunk is kept as is.
pub fn split_gap(duration: u32, triplet: bool) -> Vec<u32> {
    let mut chunks = Vec::new();
    let mut remaining = duration;

    if triplet {
        while remaining >= TRIPLET_CHUNK {
            chunks.push(TRIPLET_CHUNK);
            remaining -= TRIPLET_CHUNK;
        }
        if remaining > 0 {
            chunks.push(remaining);
        }
        return chunks;
    }

    for chunk in STRAIGHT_CHUNKS {
        while remaining >= chunk {
            chunks.push(chunk);
            remaining -= chunk;
        }
    }
    if remaining > 0 {
        tracing::warn!(
            gap = duration,
            remainder = remaining,
            "rest has no exact written value"
        );
        chunks.push(remaining);
    }
    chunks
}

/// Tuplet bracket marks carried by one note or rest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TupletMarks {
    pub start: bool,
    pub stop: bool,
}

impl TupletMarks {
    pub fn is_empty(&self) -> bool {
        !self.start && !self.stop
    }
}

/// Analysis of one measure of a score.
#[derive(Debug, Clone)]
pub struct MeasureLayout {
    /// First tick of the measure.
    pub offset: u32,
    /// First tick after the measure.
    pub end: u32,
    pub ticks_per_beat: u32,
    /// Distinct onset ticks in `[offset, end)`, ascending.
    pub onsets: Vec<u32>,
    /// Triplet flag per beat of the measure.
    pub triplet_beats: Vec<bool>,
    /// Primary (8th) beam per onset.
    pub primary_beams: Vec<Option<BeamState>>,
    /// Secondary (16th) beam per onset.
    pub secondary_beams: Vec<Option<BeamState>>,
}

impl MeasureLayout {
    /// Analyzes measure `index` (0-based) of a score.
    pub fn analyze(score: &ScoreLayout<'_>, index: u32) -> Self {
        let ticks_per_beat = score.ticks_per_beat.max(1);
        let beats = score.beats_per_measure as usize;
        let offset = index * score.beats_per_measure * ticks_per_beat;
        let end = offset + score.beats_per_measure * ticks_per_beat;

        let mut onsets: Vec<u32> = score
            .notes
            .keys()
            .map(|key| key.tick)
            .filter(|&tick| tick >= offset && tick < end)
            .collect();
        onsets.sort_unstable();
        onsets.dedup();

        // Onset indices per beat, already in ascending order.
        let mut beat_onsets: Vec<Vec<usize>> = vec![Vec::new(); beats];
        let mut triplet_beats = vec![false; beats];
        for (i, &tick) in onsets.iter().enumerate() {
            let onset = tick - offset;
            let beat = (onset / ticks_per_beat) as usize;
            let sub_tick = onset % ticks_per_beat;
            if beat < beats {
                beat_onsets[beat].push(i);
                if sub_tick % 4 == 0 && sub_tick % 3 != 0 {
                    triplet_beats[beat] = true;
                }
            }
        }
        if score.subdivisions_by_beat.len() >= beats {
            let base = index as usize * beats;
            for (beat, triplet) in triplet_beats.iter_mut().enumerate() {
                if score.subdivisions_by_beat.get(base + beat) == Some(&3) {
                    *triplet = true;
                }
            }
        }

        let mut primary_beams = vec![None; onsets.len()];
        let mut secondary_beams = vec![None; onsets.len()];
        for (indices, &triplet) in beat_onsets.iter().zip(&triplet_beats) {
            let primary_gap = if triplet { 4 } else { 6 };
            apply_beams(&onsets, indices, primary_gap, &mut primary_beams);
            if !triplet {
                apply_beams(&onsets, indices, 3, &mut secondary_beams);
            }
        }

        Self {
            offset,
            end,
            ticks_per_beat,
            onsets,
            triplet_beats,
            primary_beams,
            secondary_beams,
        }
    }

    /// Beat of the measure containing an absolute tick.
    pub fn beat_of(&self, tick: u32) -> usize {
        (tick.saturating_sub(self.offset) / self.ticks_per_beat) as usize
    }

    /// First tick after the beat containing `tick`, bounded by the measure end.
    pub fn beat_end(&self, tick: u32) -> u32 {
        let beat = self.beat_of(tick) as u32;
        (self.offset + (beat + 1) * self.ticks_per_beat).min(self.end)
    }

    pub fn is_triplet_at(&self, tick: u32) -> bool {
        self.triplet_beats
            .get(self.beat_of(tick))
            .copied()
            .unwrap_or(false)
    }

    /// Tick of the onset after onset `index`, or the measure end.
    pub fn next_onset(&self, index: usize) -> u32 {
        self.onsets.get(index + 1).copied().unwrap_or(self.end)
    }

    /// Written duration of the chord at onset `index`: up to the next onset
    /// or the end of the beat, at most a triplet 8th inside triplet beats.
    pub fn chord_duration(&self, index: usize) -> u32 {
        let tick = self.onsets[index];
        let limit = self.next_onset(index).min(self.beat_end(tick));
        let duration = limit.saturating_sub(tick).max(1);
        if self.is_triplet_at(tick) {
            duration.min(TRIPLET_CHUNK)
        } else {
            duration
        }
    }

    /// Tuplet brackets for an element at `tick` lasting `duration` ticks.
    pub fn tuplet_marks(&self, tick: u32, duration: u32) -> TupletMarks {
        if tick < self.offset || tick >= self.end || !self.is_triplet_at(tick) {
            return TupletMarks::default();
        }
        let onset_in_beat = (tick - self.offset) % self.ticks_per_beat;
        let end_in_beat = (onset_in_beat + duration).min(self.ticks_per_beat);
        TupletMarks {
            start: onset_in_beat == 0,
            stop: end_in_beat >= self.ticks_per_beat,
        }
    }

    /// Rest chunks filling `[from, to)`, split at beat boundaries.
    ///
    /// # Returns
    ///
    /// (start tick, duration) per chunk
    pub fn rests_between(&self, from: u32, to: u32) -> Vec<(u32, u32)> {
        let mut rests = Vec::new();
        let mut cursor = from;
        while cursor < to {
            let gap = self.beat_end(cursor).min(to) - cursor;
            for chunk in split_gap(gap, self.is_triplet_at(cursor)) {
                rests.push((cursor, chunk));
                cursor += chunk;
            }
        }
        rests
    }
}

/// Beams runs of onsets whose spacing stays within `max_gap` ticks.
fn apply_beams(
    onsets: &[u32],
    indices: &[usize],
    max_gap: u32,
    target: &mut [Option<BeamState>],
) {
    if indices.len() < 2 {
        return;
    }
    let mut run_start = 0;
    for i in 1..indices.len() {
        let gap = onsets[indices[i]] - onsets[indices[i - 1]];
        if gap > max_gap {
            mark_run(&indices[run_start..i], target);
            run_start = i;
        }
    }
    mark_run(&indices[run_start..], target);
}

fn mark_run(run: &[usize], target: &mut [Option<BeamState>]) {
    if run.len() < 2 {
        return;
    }
    let last = run.len() - 1;
    for (position, &index) in run.iter().enumerate() {
        target[index] = Some(match position {
            0 => BeamState::Begin,
            p if p == last => BeamState::End,
            _ => BeamState::Continue,
        });
    }
}
