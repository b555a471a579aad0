//! MusicXML to playback notes.
//!
//! Reads the instrument table and walks every `part > measure > note` in
//! document order. Time advances lazily: a note that is not a chord member
//! first commits the duration of the previous such note, then becomes the
//! pending advance itself. Each measure end commits whatever is pending.

use super::{CodecError, ParsedScore, PlaybackNote, DEFAULT_DIVISIONS, DEFAULT_VELOCITY};
use roxmltree::{Document, Node, ParsingOptions};
use std::collections::HashMap;

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.has_tag_name(name))
}

fn has_child(node: Node<'_, '_>, name: &str) -> bool {
    child(node, name).is_some()
}

fn parse_number(node: Option<Node<'_, '_>>) -> Option<u32> {
    node.and_then(|n| n.text()).and_then(|t| t.trim().parse().ok())
}

/// Parses a MusicXML document, accepting the DOCTYPE the encoder writes.
pub(crate) fn parse_document(xml: &str) -> Result<Document<'_>, CodecError> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    Document::parse_with_options(xml, options).map_err(|e| CodecError::Parse(e.to_string()))
}

/// Maps `<midi-instrument id>` to its `<midi-unpitched>` key.
fn instrument_keys<'a>(doc: &'a Document<'_>) -> HashMap<&'a str, u8> {
    let mut keys = HashMap::new();
    for node in doc.descendants().filter(|n| n.has_tag_name("midi-instrument")) {
        let Some(id) = node.attribute("id") else {
            continue;
        };
        let unpitched = node
            .descendants()
            .find(|n| n.has_tag_name("midi-unpitched"));
        match parse_number(unpitched) {
            Some(key @ 1..=127) => {
                keys.insert(id, key as u8);
            }
            Some(key) => tracing::warn!(id, key, "ignoring out-of-range MIDI key"),
            None => {}
        }
    }
    keys
}

/// Advances the cursor, rejecting documents whose timeline overflows a tick.
fn advance(tick: u32, by: u32) -> Result<u32, CodecError> {
    tick.checked_add(by)
        .ok_or_else(|| CodecError::Parse(format!("timeline overflows at tick {}", tick)))
}

/// Extracts playback notes from a MusicXML document.
///
/// `divisions` is taken from the first `<divisions>` element (12 when
/// absent). Rests and notes whose instrument has no MIDI key produce
/// nothing. Grace notes carry no duration and come out as zero-length
/// notes at the tick of the note they ornament. Every emitted note has
/// velocity 100.
///
/// # Errors
///
/// Returns `CodecError::Parse` if the document is not well-formed XML or
/// its durations run past the largest representable tick
pub fn parse_midi_notes_from_musicxml(xml: &str) -> Result<ParsedScore, CodecError> {
    let doc = parse_document(xml)?;

    let divisions = parse_number(doc.descendants().find(|n| n.has_tag_name("divisions")))
        .filter(|&d| d > 0)
        .unwrap_or(DEFAULT_DIVISIONS);
    let keys = instrument_keys(&doc);

    let mut notes = Vec::new();
    let mut unmapped = 0usize;
    let mut current_tick = 0u32;
    let mut pending = 0u32;

    let measures = doc
        .descendants()
        .filter(|n| n.has_tag_name("part"))
        .flat_map(|part| part.children().filter(|n| n.has_tag_name("measure")));

    for measure in measures {
        for note in measure.children().filter(|n| n.has_tag_name("note")) {
            let duration = parse_number(child(note, "duration")).unwrap_or(0);

            if !has_child(note, "chord") {
                current_tick = advance(current_tick, pending)?;
                pending = duration;
            }

            if has_child(note, "rest") {
                continue;
            }

            let key = child(note, "instrument")
                .and_then(|n| n.attribute("id"))
                .and_then(|id| keys.get(id).copied());
            let Some(midi) = key else {
                unmapped += 1;
                continue;
            };

            notes.push(PlaybackNote {
                start_tick: current_tick,
                duration,
                midi,
                velocity: DEFAULT_VELOCITY,
            });
        }

        current_tick = advance(current_tick, pending)?;
        pending = 0;
    }

    if unmapped > 0 {
        tracing::warn!(unmapped, "skipped notes without a MIDI instrument");
    }
    tracing::debug!(
        divisions,
        notes = notes.len(),
        ticks = current_tick,
        "decoded MusicXML"
    );

    Ok(ParsedScore { divisions, notes })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE score-partwise PUBLIC "-//Recordare//DTD MusicXML 3.1 Partwise//EN" "http://www.musicxml.org/dtds/partwise.dtd">
<score-partwise version="3.1">
  <part-list>
    <score-part id="P1">
      <part-name>Drumset</part-name>
      <midi-instrument id="P1-kick"><midi-unpitched>36</midi-unpitched></midi-instrument>
      <midi-instrument id="P1-snare"><midi-unpitched>38</midi-unpitched></midi-instrument>
      <midi-instrument id="P1-none"><midi-unpitched>0</midi-unpitched></midi-instrument>
    </score-part>
  </part-list>"#;

    fn document(body: &str) -> String {
        format!("{}\n  <part id=\"P1\">{}</part>\n</score-partwise>", HEADER, body)
    }

    #[test]
    fn test_chord_and_rest_cursor() {
        let xml = document(
            r#"<measure number="1">
                <attributes><divisions>12</divisions></attributes>
                <note><unpitched/><duration>6</duration><instrument id="P1-kick"/></note>
                <note><chord/><unpitched/><duration>6</duration><instrument id="P1-snare"/></note>
                <note><rest/><duration>6</duration></note>
                <note><unpitched/><duration>12</duration><instrument id="P1-snare"/></note>
              </measure>
              <measure number="2">
                <note><unpitched/><duration>3</duration><instrument id="P1-kick"/></note>
              </measure>"#,
        );
        let parsed = parse_midi_notes_from_musicxml(&xml).unwrap();
        assert_eq!(parsed.divisions, 12);
        let starts: Vec<(u32, u8)> = parsed.notes.iter().map(|n| (n.start_tick, n.midi)).collect();
        assert_eq!(starts, vec![(0, 36), (0, 38), (12, 38), (24, 36)]);
        assert!(parsed.notes.iter().all(|n| n.velocity == 100));
    }

    #[test]
    fn test_flam_decodes_to_two_hits() {
        let xml = document(
            r#"<measure number="1">
                <note><unpitched/><duration>12</duration><instrument id="P1-kick"/></note>
                <note><grace slash="yes"/><unpitched/><instrument id="P1-snare"/></note>
                <note><unpitched/><duration>12</duration><instrument id="P1-snare"/></note>
                <note><unpitched/><duration>12</duration><instrument id="P1-kick"/></note>
              </measure>"#,
        );
        let parsed = parse_midi_notes_from_musicxml(&xml).unwrap();
        assert_eq!(parsed.divisions, DEFAULT_DIVISIONS);
        let hits: Vec<(u32, u32, u8)> = parsed
            .notes
            .iter()
            .map(|n| (n.start_tick, n.duration, n.midi))
            .collect();
        assert_eq!(
            hits,
            vec![(0, 12, 36), (12, 0, 38), (12, 12, 38), (24, 12, 36)]
        );
    }

    #[test]
    fn test_timeline_overflow_is_an_error() {
        let xml = document(
            r#"<measure number="1">
                <note><unpitched/><duration>4294967295</duration><instrument id="P1-kick"/></note>
                <note><unpitched/><duration>4294967295</duration><instrument id="P1-kick"/></note>
              </measure>"#,
        );
        assert!(matches!(
            parse_midi_notes_from_musicxml(&xml),
            Err(CodecError::Parse(_))
        ));
    }

    #[test]
    fn test_unmapped_instruments_are_skipped() {
        let xml = document(
            r#"<measure number="1">
                <note><unpitched/><duration>12</duration><instrument id="P1-none"/></note>
                <note><unpitched/><duration>12</duration></note>
                <note><unpitched/><duration>12</duration><instrument id="P1-kick"/></note>
              </measure>"#,
        );
        let parsed = parse_midi_notes_from_musicxml(&xml).unwrap();
        assert_eq!(parsed.notes.len(), 1);
        assert_eq!(parsed.notes[0].start_tick, 24);
    }

    #[test]
    fn test_malformed_xml() {
        let result = parse_midi_notes_from_musicxml("<score-partwise><part>");
        assert!(matches!(result, Err(CodecError::Parse(_))));
    }
}
