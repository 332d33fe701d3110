// ETWSpy - core/event_ids.rs
//
// Event-id range expressions: the "1,3-5,10" syntax used by the event-id
// filter field and the OS-side provider filter.
//
// Grammar: comma-separated fragments, each either a single decimal id or an
// inclusive `start-end` range. Whitespace around fragments is ignored.
// The empty string parses to the empty set, which everywhere means
// "no event-id restriction" (all events).

use std::collections::BTreeSet;

use crate::util::constants::MAX_EVENT_ID;
use crate::util::error::ValidationError;

/// Parse a range expression into the set of event ids it names.
///
/// `""` (or all-whitespace) yields the empty set. `"5-1"` is rejected:
/// an inverted range is always a typo, not an empty selection.
pub fn parse_event_ids(input: &str) -> Result<BTreeSet<u16>, ValidationError> {
    let mut ids = BTreeSet::new();

    for fragment in input.split(',') {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            // Tolerate trailing/doubled commas ("1,,3," parses as {1,3}).
            continue;
        }

        match fragment.split_once('-') {
            Some((start_str, end_str)) => {
                let start = parse_id(start_str.trim(), fragment)?;
                let end = parse_id(end_str.trim(), fragment)?;
                if start > end {
                    return Err(ValidationError::InvertedRange {
                        start: u32::from(start),
                        end: u32::from(end),
                    });
                }
                ids.extend(start..=end);
            }
            None => {
                ids.insert(parse_id(fragment, fragment)?);
            }
        }
    }

    Ok(ids)
}

/// Format a set of event ids back into the compact range syntax, collapsing
/// consecutive runs ("{1,3,4,5,10}" -> "1,3-5,10"). The empty set formats
/// as the empty string.
pub fn format_event_ids(ids: &BTreeSet<u16>) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut iter = ids.iter().copied();

    let Some(first) = iter.next() else {
        return String::new();
    };

    let mut run_start = first;
    let mut run_end = first;

    for id in iter {
        if id == run_end + 1 {
            run_end = id;
        } else {
            parts.push(format_run(run_start, run_end));
            run_start = id;
            run_end = id;
        }
    }
    parts.push(format_run(run_start, run_end));

    parts.join(",")
}

fn format_run(start: u16, end: u16) -> String {
    if start == end {
        format!("{start}")
    } else {
        format!("{start}-{end}")
    }
}

fn parse_id(text: &str, fragment: &str) -> Result<u16, ValidationError> {
    let value: u64 = text
        .parse()
        .map_err(|_| ValidationError::MalformedEventId {
            fragment: fragment.to_string(),
        })?;
    if value > u64::from(MAX_EVENT_ID) {
        return Err(ValidationError::EventIdOutOfRange { value });
    }
    Ok(value as u16)
}

// =============================================================================
// Unit tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[u16]) -> BTreeSet<u16> {
        ids.iter().copied().collect()
    }

    #[test]
    fn test_parse_mixed_singles_and_ranges() {
        assert_eq!(parse_event_ids("1,3-5,10").unwrap(), set(&[1, 3, 4, 5, 10]));
    }

    #[test]
    fn test_parse_empty_means_all_events() {
        assert!(parse_event_ids("").unwrap().is_empty());
        assert!(parse_event_ids("   ").unwrap().is_empty());
    }

    #[test]
    fn test_parse_inverted_range_rejected() {
        let err = parse_event_ids("5-1").unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InvertedRange { start: 5, end: 1 }
        ));
    }

    #[test]
    fn test_parse_tolerates_whitespace_and_stray_commas() {
        assert_eq!(
            parse_event_ids(" 1 , 3 - 5 ,, 10 ,").unwrap(),
            set(&[1, 3, 4, 5, 10])
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_event_ids("1,abc").unwrap_err(),
            ValidationError::MalformedEventId { .. }
        ));
        assert!(matches!(
            parse_event_ids("1-x").unwrap_err(),
            ValidationError::MalformedEventId { .. }
        ));
    }

    #[test]
    fn test_parse_rejects_out_of_range() {
        assert!(matches!(
            parse_event_ids("65536").unwrap_err(),
            ValidationError::EventIdOutOfRange { value: 65_536 }
        ));
        // Boundary value is accepted.
        assert_eq!(parse_event_ids("65535").unwrap(), set(&[65_535]));
    }

    #[test]
    fn test_parse_overlapping_ranges_deduplicate() {
        assert_eq!(parse_event_ids("1-4,3-6").unwrap(), set(&[1, 2, 3, 4, 5, 6]));
    }

    #[test]
    fn test_format_collapses_runs() {
        assert_eq!(format_event_ids(&set(&[1, 3, 4, 5, 10])), "1,3-5,10");
        assert_eq!(format_event_ids(&set(&[7])), "7");
        assert_eq!(format_event_ids(&BTreeSet::new()), "");
    }

    #[test]
    fn test_format_parse_round_trip() {
        let original = set(&[0, 2, 3, 4, 100, 65_534, 65_535]);
        let text = format_event_ids(&original);
        assert_eq!(parse_event_ids(&text).unwrap(), original);
    }
}
