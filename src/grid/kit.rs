//! The fixed drum kit catalog.
//!
//! Each instrument owns one grid row (its position in the input grid) and a
//! staff row (its position on the percussion staff). Several grid rows may
//! share one staff row, e.g. open and closed hi-hat. Rows are stable
//! identifiers and are never reassigned.

/// Notehead shape drawn for an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteHead {
    /// Regular filled notehead (drums).
    Filled,
    /// Cross notehead (cymbals, cross-stick, pedal).
    X,
}

/// A catalog entry of the drum kit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instrument {
    /// Stable identifier, also used in MusicXML instrument ids.
    pub id: &'static str,
    /// Human-readable name.
    pub label: &'static str,
    /// Row in the input grid.
    pub grid_row: usize,
    /// Vertical position on the staff (0 = above line 5).
    pub staff_row: usize,
    /// Notehead shape.
    pub note_head: NoteHead,
}

const fn instrument(
    id: &'static str,
    label: &'static str,
    grid_row: usize,
    staff_row: usize,
    note_head: NoteHead,
) -> Instrument {
    Instrument {
        id,
        label,
        grid_row,
        staff_row,
        note_head,
    }
}

/// The drum kit in grid-row order.
pub const DRUM_KIT: [Instrument; 12] = [
    instrument("crash", "Crash", 0, 0, NoteHead::X),
    instrument("ride", "Ride", 1, 1, NoteHead::X),
    instrument("open-hihat", "Open Hi-Hat", 2, 2, NoteHead::X),
    instrument("hihat", "Hi-Hat", 3, 2, NoteHead::X),
    instrument("tom1", "Tom 1", 4, 3, NoteHead::Filled),
    instrument("tom2", "Tom 2", 5, 4, NoteHead::Filled),
    instrument("tom3", "Tom 3", 6, 5, NoteHead::Filled),
    instrument("snare", "Snare", 7, 6, NoteHead::Filled),
    instrument("cross-stick", "Cross Stick", 8, 6, NoteHead::X),
    instrument("kick", "Kick", 9, 8, NoteHead::Filled),
    instrument("kick2", "Kick 2", 10, 8, NoteHead::Filled),
    instrument("hh-pedal", "HH Pedal", 11, 7, NoteHead::X),
];

/// Number of grid rows (highest grid row + 1).
pub const ROW_COUNT: usize = 12;

/// GM key declared for instruments without a mapping (acoustic bass drum).
pub const FALLBACK_GM_KEY: u8 = 35;

/// Returns the instrument on a grid row.
pub fn instrument_by_row(row: usize) -> Option<&'static Instrument> {
    DRUM_KIT.iter().find(|instrument| instrument.grid_row == row)
}

/// Returns the instrument with the given id.
pub fn instrument_by_id(id: &str) -> Option<&'static Instrument> {
    DRUM_KIT.iter().find(|instrument| instrument.id == id)
}

/// Returns the grid row of the instrument with the given id.
pub fn row_by_id(id: &str) -> Option<usize> {
    instrument_by_id(id).map(|instrument| instrument.grid_row)
}

/// Returns the General MIDI percussion key of an instrument id.
///
/// `kick2` has no dedicated key and returns `None`.
pub fn gm_key(id: &str) -> Option<u8> {
    match id {
        "crash" => Some(49),
        "ride" => Some(51),
        "hihat" => Some(42),
        "open-hihat" => Some(46),
        "hh-pedal" => Some(44),
        "tom1" => Some(48),
        "tom2" => Some(45),
        "tom3" => Some(43),
        "snare" => Some(38),
        "cross-stick" => Some(37),
        "kick" => Some(36),
        _ => None,
    }
}

/// MusicXML id of an instrument inside part `P1`.
pub fn part_instrument_id(instrument: &Instrument) -> String {
    format!("P1-{}", instrument.id)
}

/// Display position of an unpitched note on the five-line staff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaffPitch {
    pub step: char,
    pub octave: u8,
}

const STAFF_PITCHES: [StaffPitch; 11] = [
    StaffPitch { step: 'G', octave: 5 }, // above line 5
    StaffPitch { step: 'F', octave: 5 }, // line 5
    StaffPitch { step: 'E', octave: 5 }, // space 4
    StaffPitch { step: 'D', octave: 5 }, // line 4
    StaffPitch { step: 'C', octave: 5 }, // space 3
    StaffPitch { step: 'B', octave: 4 }, // line 3
    StaffPitch { step: 'A', octave: 4 }, // space 2
    StaffPitch { step: 'G', octave: 4 }, // line 2
    StaffPitch { step: 'F', octave: 4 }, // space 1
    StaffPitch { step: 'E', octave: 4 }, // line 1
    StaffPitch { step: 'D', octave: 4 }, // below line 1
];

/// Returns the display pitch for a staff row, falling back to the middle
/// space (C5) for rows outside the staff.
pub fn staff_pitch(staff_row: usize) -> StaffPitch {
    STAFF_PITCHES
        .get(staff_row)
        .copied()
        .unwrap_or(STAFF_PITCHES[4])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_are_dense_and_ordered() {
        for (index, instrument) in DRUM_KIT.iter().enumerate() {
            assert_eq!(instrument.grid_row, index);
        }
        let max_row = DRUM_KIT.iter().map(|i| i.grid_row).max().unwrap_or(0);
        assert_eq!(ROW_COUNT, max_row + 1);
    }

    #[test]
    fn test_lookup() {
        assert_eq!(row_by_id("kick"), Some(9));
        assert_eq!(row_by_id("snare"), Some(7));
        assert_eq!(instrument_by_row(3).map(|i| i.id), Some("hihat"));
        assert!(instrument_by_row(ROW_COUNT).is_none());
        assert!(instrument_by_id("cowbell").is_none());
    }

    #[test]
    fn test_gm_keys() {
        assert_eq!(gm_key("kick"), Some(36));
        assert_eq!(gm_key("cross-stick"), Some(37));
        assert_eq!(gm_key("snare"), Some(38));
        assert_eq!(gm_key("hh-pedal"), Some(44));
        assert_eq!(gm_key("hihat"), Some(42));
        assert_eq!(gm_key("open-hihat"), Some(46));
        assert_eq!(gm_key("tom3"), Some(43));
        assert_eq!(gm_key("tom2"), Some(45));
        assert_eq!(gm_key("tom1"), Some(48));
        assert_eq!(gm_key("ride"), Some(51));
        assert_eq!(gm_key("crash"), Some(49));
        assert_eq!(gm_key("kick2"), None);
    }

    #[test]
    fn test_staff_pitch() {
        assert_eq!(staff_pitch(0), StaffPitch { step: 'G', octave: 5 });
        assert_eq!(staff_pitch(8), StaffPitch { step: 'F', octave: 4 });
        assert_eq!(staff_pitch(99), StaffPitch { step: 'C', octave: 5 });
    }

    #[test]
    fn test_hihats_share_staff_row() {
        let open = instrument_by_id("open-hihat").map(|i| i.staff_row);
        let closed = instrument_by_id("hihat").map(|i| i.staff_row);
        assert_eq!(open, closed);
    }
}
