//! MusicXML notation output.
//!
//! Turns a [`ScoreLayout`](crate::grid::ScoreLayout) into a MusicXML 3.1
//! document with one percussion part. The rhythmic analysis of each measure
//! lives in [`layout`]; [`build_musicxml`] only writes the elements.

pub mod layout;
mod musicxml;

pub use layout::{note_value, split_gap, BeamState, MeasureLayout, NoteValue, TupletMarks};
pub use musicxml::{build_musicxml, escape_xml};
