// Edit validators - keep user input inside what the sequence can hold

use crate::sequence::note_name::parse_note_name;

/// Why an edit was refused. The caller reverts the field it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditRejection {
    InvalidNoteName,
    NotANumber,
    VelocityOutOfRange,
    TimestampOutOfOrder,
    UnknownRow,
}

impl std::fmt::Display for EditRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            EditRejection::InvalidNoteName => "not a note name",
            EditRejection::NotANumber => "not a number",
            EditRejection::VelocityOutOfRange => "velocity must be between 0 and 127",
            EditRejection::TimestampOutOfOrder => "timestamp would cross a neighbouring note",
            EditRejection::UnknownRow => "no such row",
        };
        f.write_str(text)
    }
}

/// Check moving `timestamps[index]` by `delta` seconds.
///
/// `timestamps` must be sorted. The new time may not go below zero, may not
/// cross the previous timestamp (unless both were equal, then only the zero
/// floor applies) and may not cross the next one.
pub fn is_valid_timestamp_delta(timestamps: &[f64], index: usize, delta: f64) -> bool {
    let Some(&current) = timestamps.get(index) else {
        return false;
    };
    let proposed = current + delta;
    if !proposed.is_finite() || proposed < 0.0 {
        return false;
    }

    if index > 0 {
        let previous = timestamps[index - 1];
        if previous != current && proposed < previous {
            return false;
        }
    }

    match timestamps.get(index + 1) {
        Some(&next) => proposed <= next,
        None => true,
    }
}

pub fn parse_note_number(text: &str) -> Result<u8, EditRejection> {
    parse_note_name(text).ok_or(EditRejection::InvalidNoteName)
}

pub fn validate_velocity(value: i64) -> Result<u8, EditRejection> {
    u8::try_from(value)
        .ok()
        .filter(|v| *v <= 127)
        .ok_or(EditRejection::VelocityOutOfRange)
}

pub fn parse_velocity(text: &str) -> Result<u8, EditRejection> {
    let value: i64 = text.trim().parse().map_err(|_| EditRejection::NotANumber)?;
    validate_velocity(value)
}

pub fn parse_timestamp(text: &str) -> Result<f64, EditRejection> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|t| t.is_finite())
        .ok_or(EditRejection::NotANumber)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_floor() {
        let times = [0.5, 1.0];
        assert!(is_valid_timestamp_delta(&times, 0, -0.5));
        assert!(!is_valid_timestamp_delta(&times, 0, -0.6));
    }

    #[test]
    fn test_cannot_cross_neighbours() {
        let times = [1.0, 2.0, 3.0];
        assert!(is_valid_timestamp_delta(&times, 1, 0.9));
        assert!(is_valid_timestamp_delta(&times, 1, 1.0));
        assert!(!is_valid_timestamp_delta(&times, 1, 1.1));
        assert!(is_valid_timestamp_delta(&times, 1, -1.0));
        assert!(!is_valid_timestamp_delta(&times, 1, -1.1));
    }

    #[test]
    fn test_shared_timestamp_only_checks_floor_behind() {
        let times = [1.0, 1.0, 3.0];
        assert!(is_valid_timestamp_delta(&times, 1, -1.0));
        assert!(!is_valid_timestamp_delta(&times, 1, -1.5));
        assert!(!is_valid_timestamp_delta(&times, 1, 2.5));
    }

    #[test]
    fn test_last_event_is_free_forward() {
        let times = [1.0, 2.0];
        assert!(is_valid_timestamp_delta(&times, 1, 100.0));
        assert!(!is_valid_timestamp_delta(&times, 2, 0.0));
    }

    #[test]
    fn test_velocity_range() {
        assert_eq!(validate_velocity(0), Ok(0));
        assert_eq!(validate_velocity(127), Ok(127));
        assert_eq!(validate_velocity(128), Err(EditRejection::VelocityOutOfRange));
        assert_eq!(validate_velocity(-1), Err(EditRejection::VelocityOutOfRange));
        assert_eq!(parse_velocity("abc"), Err(EditRejection::NotANumber));
        assert_eq!(parse_velocity(" 64 "), Ok(64));
    }

    #[test]
    fn test_note_number_text() {
        assert_eq!(parse_note_number("A4"), Ok(69));
        assert_eq!(parse_note_number("X9"), Err(EditRejection::InvalidNoteName));
    }
}
