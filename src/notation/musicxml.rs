use super::layout::{note_value, MeasureLayout, TupletMarks};
use crate::grid::{
    gm_key, part_instrument_id, staff_pitch, GridKey, Instrument, NoteData, NoteHead, NoteType,
    ScoreLayout, DRUM_KIT, FALLBACK_GM_KEY,
};

/// Convert a drum score to a MusicXML 3.1 partwise document.
///
/// The output is a single percussion part in one voice. Simultaneous notes
/// become chords, flams become slashed grace notes before their chord, and
/// every gap is filled with rests so each measure adds up to its length.
pub fn build_musicxml(score: &ScoreLayout<'_>) -> String {
    let mut xml = String::new();

    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push('\n');
    xml.push_str(r#"<!DOCTYPE score-partwise PUBLIC "-//Recordare//DTD MusicXML 3.1 Partwise//EN" "http://www.musicxml.org/dtds/partwise.dtd">"#);
    xml.push('\n');
    xml.push_str(r#"<score-partwise version="3.1">"#);
    xml.push('\n');

    xml.push_str("  <part-list>\n");
    xml.push_str("    <score-part id=\"P1\">\n");
    xml.push_str("      <part-name>Drumset</part-name>\n");
    for instrument in DRUM_KIT.iter() {
        xml.push_str(&instrument_to_xml(instrument));
    }
    xml.push_str("    </score-part>\n");
    xml.push_str("  </part-list>\n");

    xml.push_str("  <part id=\"P1\">\n");
    for index in 0..score.measures {
        xml.push_str(&measure_to_xml(score, index));
    }
    xml.push_str("  </part>\n");
    xml.push_str("</score-partwise>\n");

    tracing::debug!(
        measures = score.measures,
        notes = score.notes.len(),
        bytes = xml.len(),
        "built MusicXML"
    );
    xml
}

fn instrument_to_xml(instrument: &Instrument) -> String {
    let id = part_instrument_id(instrument);
    let key = gm_key(instrument.id).unwrap_or(FALLBACK_GM_KEY);
    let mut xml = String::new();
    xml.push_str(&format!("      <score-instrument id=\"{}\">\n", id));
    xml.push_str(&format!(
        "        <instrument-name>{}</instrument-name>\n",
        escape_xml(instrument.label)
    ));
    xml.push_str("      </score-instrument>\n");
    xml.push_str(&format!("      <midi-instrument id=\"{}\">\n", id));
    xml.push_str("        <midi-channel>10</midi-channel>\n");
    xml.push_str(&format!("        <midi-unpitched>{}</midi-unpitched>\n", key));
    xml.push_str("        <midi-program>1</midi-program>\n");
    xml.push_str("      </midi-instrument>\n");
    xml
}

fn attributes_to_xml(score: &ScoreLayout<'_>) -> String {
    let mut xml = String::new();
    xml.push_str("      <attributes>\n");
    xml.push_str(&format!(
        "        <divisions>{}</divisions>\n",
        score.ticks_per_beat
    ));
    xml.push_str("        <key><fifths>0</fifths></key>\n");
    xml.push_str("        <time>\n");
    xml.push_str(&format!(
        "          <beats>{}</beats>\n",
        score.beats_per_measure
    ));
    xml.push_str("          <beat-type>4</beat-type>\n");
    xml.push_str("        </time>\n");
    xml.push_str("        <clef>\n");
    xml.push_str("          <sign>percussion</sign>\n");
    xml.push_str("          <line>2</line>\n");
    xml.push_str("        </clef>\n");
    xml.push_str("        <staff-details>\n");
    xml.push_str("          <staff-lines>5</staff-lines>\n");
    xml.push_str("        </staff-details>\n");
    xml.push_str("      </attributes>\n");
    xml
}

fn measure_to_xml(score: &ScoreLayout<'_>, index: u32) -> String {
    let measure = MeasureLayout::analyze(score, index);
    let mut xml = String::new();

    xml.push_str(&format!("    <measure number=\"{}\">\n", index + 1));
    if index == 0 {
        xml.push_str(&attributes_to_xml(score));
    }

    let mut cursor = measure.offset;
    for (i, &tick) in measure.onsets.iter().enumerate() {
        if tick > cursor {
            push_rests(&mut xml, &measure, cursor, tick);
        }

        let duration = measure.chord_duration(i);
        let chord: Vec<(&Instrument, &NoteData)> = DRUM_KIT
            .iter()
            .filter_map(|instrument| {
                score
                    .notes
                    .get(&GridKey::new(instrument.grid_row, tick))
                    .map(|note| (instrument, note))
            })
            .collect();

        if chord.is_empty() {
            // Rows outside the kit still hold their place in time.
            push_rests(&mut xml, &measure, tick, tick + duration);
        } else {
            push_chord(&mut xml, &measure, i, duration, &chord);
        }
        cursor = tick + duration;
    }
    if cursor < measure.end {
        push_rests(&mut xml, &measure, cursor, measure.end);
    }

    xml.push_str("    </measure>\n");
    xml
}

fn push_rests(xml: &mut String, measure: &MeasureLayout, from: u32, to: u32) {
    for (tick, duration) in measure.rests_between(from, to) {
        let value = note_value(duration);
        xml.push_str("      <note>\n");
        xml.push_str("        <rest/>\n");
        xml.push_str(&format!("        <duration>{}</duration>\n", duration));
        xml.push_str("        <voice>1</voice>\n");
        xml.push_str(&format!("        <type>{}</type>\n", value.type_name));
        push_value_modifiers(xml, value.dotted, value.triplet);
        xml.push_str(&notations_to_xml(measure.tuplet_marks(tick, duration), false));
        xml.push_str("      </note>\n");
    }
}

/// Writes the notes of one onset: grace notes for flams, then the chord
/// with flammed instruments first.
fn push_chord(
    xml: &mut String,
    measure: &MeasureLayout,
    index: usize,
    duration: u32,
    chord: &[(&Instrument, &NoteData)],
) {
    let tick = measure.onsets[index];
    let (flams, plain): (Vec<_>, Vec<_>) = chord
        .iter()
        .partition(|(_, note)| note.note_type == NoteType::Flam);

    for (position, (instrument, _)) in flams.iter().enumerate() {
        let pitch = staff_pitch(instrument.staff_row);
        xml.push_str("      <note>\n");
        if position > 0 {
            xml.push_str("        <chord/>\n");
        }
        xml.push_str("        <grace slash=\"yes\"/>\n");
        push_unpitched(xml, pitch.step, pitch.octave);
        xml.push_str(&format!(
            "        <instrument id=\"{}\"/>\n",
            part_instrument_id(instrument)
        ));
        xml.push_str("        <voice>1</voice>\n");
        xml.push_str("        <type>eighth</type>\n");
        xml.push_str("        <stem>up</stem>\n");
        if instrument.note_head == NoteHead::X {
            xml.push_str("        <notehead>x</notehead>\n");
        }
        xml.push_str("        <staff>1</staff>\n");
        xml.push_str("      </note>\n");
    }

    let value = note_value(duration);
    let tuplet = measure.tuplet_marks(tick, duration);
    for (position, (instrument, note)) in flams.iter().chain(plain.iter()).enumerate() {
        let pitch = staff_pitch(instrument.staff_row);
        let ghost = note.note_type == NoteType::Ghost;

        xml.push_str("      <note>\n");
        if position > 0 {
            xml.push_str("        <chord/>\n");
        }
        push_unpitched(xml, pitch.step, pitch.octave);
        xml.push_str(&format!("        <duration>{}</duration>\n", duration));
        xml.push_str(&format!(
            "        <instrument id=\"{}\"/>\n",
            part_instrument_id(instrument)
        ));
        xml.push_str("        <voice>1</voice>\n");
        xml.push_str(&format!("        <type>{}</type>\n", value.type_name));
        push_value_modifiers(xml, value.dotted, value.triplet);
        xml.push_str("        <stem>up</stem>\n");
        match (instrument.note_head, ghost) {
            (NoteHead::X, false) => xml.push_str("        <notehead>x</notehead>\n"),
            (NoteHead::X, true) => {
                xml.push_str("        <notehead parentheses=\"yes\">x</notehead>\n")
            }
            (NoteHead::Filled, true) => {
                xml.push_str("        <notehead parentheses=\"yes\">normal</notehead>\n")
            }
            (NoteHead::Filled, false) => {}
        }
        xml.push_str("        <staff>1</staff>\n");

        // Beams belong to the chord, so only its first note carries them.
        if position == 0 {
            if let Some(beam) = measure.primary_beams[index] {
                xml.push_str(&format!(
                    "        <beam number=\"1\">{}</beam>\n",
                    beam.as_str()
                ));
            }
            if let Some(beam) = measure.secondary_beams[index] {
                xml.push_str(&format!(
                    "        <beam number=\"2\">{}</beam>\n",
                    beam.as_str()
                ));
            }
        }

        xml.push_str(&notations_to_xml(tuplet, note.note_type == NoteType::Accent));
        xml.push_str("      </note>\n");
    }
}

fn push_unpitched(xml: &mut String, step: char, octave: u8) {
    xml.push_str("        <unpitched>\n");
    xml.push_str(&format!("          <display-step>{}</display-step>\n", step));
    xml.push_str(&format!(
        "          <display-octave>{}</display-octave>\n",
        octave
    ));
    xml.push_str("        </unpitched>\n");
}

fn push_value_modifiers(xml: &mut String, dotted: bool, triplet: bool) {
    if dotted {
        xml.push_str("        <dot/>\n");
    }
    if triplet {
        xml.push_str("        <time-modification>\n");
        xml.push_str("          <actual-notes>3</actual-notes>\n");
        xml.push_str("          <normal-notes>2</normal-notes>\n");
        xml.push_str("        </time-modification>\n");
    }
}

fn notations_to_xml(tuplet: TupletMarks, accent: bool) -> String {
    if tuplet.is_empty() && !accent {
        return String::new();
    }
    let mut xml = String::new();
    xml.push_str("        <notations>\n");
    if tuplet.start {
        xml.push_str("          <tuplet type=\"start\" bracket=\"yes\" number=\"1\"/>\n");
    }
    if tuplet.stop {
        xml.push_str("          <tuplet type=\"stop\" bracket=\"yes\" number=\"1\"/>\n");
    }
    if accent {
        xml.push_str("          <articulations><accent/></articulations>\n");
    }
    xml.push_str("        </notations>\n");
    xml
}

/// Escape special XML characters
pub fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
