// Note names - "C4" style rendering and parsing (60 = C4)

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Get the note name (e.g., "C4", "A#5")
pub fn note_name(note: u8) -> String {
    let octave = (note / 12) as i32 - 1;
    let note_index = (note % 12) as usize;

    format!("{}{}", NOTE_NAMES[note_index], octave)
}

/// Parse a note name or a bare note number.
///
/// Accepted: letter `A`-`G` (any case), any number of `#` or `b`
/// accidentals, then an octave from -1 to 9. A plain integer 0..=127 is
/// taken as the note number itself. Anything outside 0..=127 is rejected.
pub fn parse_note_name(text: &str) -> Option<u8> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(number) = text.parse::<u8>() {
        return (number <= 127).then_some(number);
    }

    let mut chars = text.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    let base: i32 = match letter {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };

    let rest = chars.as_str();
    let accidentals_len = rest
        .find(|c: char| c != '#' && c != 'b')
        .unwrap_or(rest.len());
    let (accidentals, octave_text) = rest.split_at(accidentals_len);
    let shift: i32 = accidentals
        .chars()
        .map(|c| if c == '#' { 1 } else { -1 })
        .sum();

    let octave: i32 = octave_text.parse().ok()?;
    if !(-1..=9).contains(&octave) {
        return None;
    }

    let number = (octave + 1) * 12 + base + shift;
    u8::try_from(number).ok().filter(|n| *n <= 127)
}
