//! Ticket code layout: `point prefix ++ priority prefix ++ zero-padded sequence`.

use super::TicketFormatError;

/// Length of the combined prefix in codes issued with one-character prefixes.
pub const DEFAULT_PREFIX_LENGTH: usize = 2;

/// Build a ticket code.
///
/// The sequence is left-padded with `'0'` to `digit_width`. A sequence wider
/// than that is kept whole, so codes grow rather than wrap.
pub fn format_ticket_code(
    point_prefix: &str,
    priority_prefix: &str,
    sequence: u32,
    digit_width: usize,
) -> String {
    format!("{point_prefix}{priority_prefix}{sequence:0digit_width$}")
}

/// Whether `sequence` no longer fits in `digit_width` digits.
pub fn exceeds_width(sequence: u32, digit_width: usize) -> bool {
    sequence.to_string().len() > digit_width
}

/// Recover the sequence from a code built by [`format_ticket_code`].
///
/// Reads the digits after the first `prefix_length` characters. At least
/// `digit_width` of them must be present; any extra trailing digits belong to
/// a sequence that outgrew the width and are read too.
pub fn extract_numeric_suffix(
    code: &str,
    prefix_length: usize,
    digit_width: usize,
) -> Result<u32, TicketFormatError> {
    let expected = prefix_length + digit_width;
    let digits = code
        .char_indices()
        .nth(prefix_length)
        .map(|(idx, _)| &code[idx..])
        .filter(|digits| digits.len() >= digit_width)
        .ok_or_else(|| TicketFormatError::TooShort {
            code: code.to_string(),
            expected,
        })?;

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TicketFormatError::NotNumeric {
            code: code.to_string(),
        });
    }

    digits.parse().map_err(|_| TicketFormatError::NotNumeric {
        code: code.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_zero_padding() {
        assert_eq!(format_ticket_code("T", "M", 7, 3), "TM007");
        assert_eq!(format_ticket_code("M", "P", 42, 3), "MP042");
        assert_eq!(format_ticket_code("M", "P", 7, 5), "MP00007");
    }

    #[test]
    fn test_default_prefixes() {
        assert_eq!(format_ticket_code("T", "T", 1, 3), "TT001");
    }

    #[test]
    fn test_wide_sequence_not_truncated() {
        assert_eq!(format_ticket_code("M", "P", 999, 3), "MP999");
        assert_eq!(format_ticket_code("M", "P", 1000, 3), "MP1000");
        assert!(!exceeds_width(999, 3));
        assert!(exceeds_width(1000, 3));
    }

    #[test]
    fn test_extract_numeric_suffix() {
        assert_eq!(extract_numeric_suffix("TM007", 2, 3), Ok(7));
        assert_eq!(extract_numeric_suffix("MP001", DEFAULT_PREFIX_LENGTH, 3), Ok(1));
        assert_eq!(extract_numeric_suffix("MP1000", 2, 3), Ok(1000));
    }

    #[test]
    fn test_extract_rejects_short_codes() {
        assert!(matches!(
            extract_numeric_suffix("MP01", 2, 3),
            Err(TicketFormatError::TooShort { expected: 5, .. })
        ));
        assert!(matches!(
            extract_numeric_suffix("M", 2, 3),
            Err(TicketFormatError::TooShort { .. })
        ));
    }

    #[test]
    fn test_extract_rejects_non_numeric() {
        assert!(matches!(
            extract_numeric_suffix("MPA01", 2, 3),
            Err(TicketFormatError::NotNumeric { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_suffix_round_trip(sequence in 1u32..100_000, width in 1usize..7) {
            let code = format_ticket_code("M", "P", sequence, width);
            let decoded = extract_numeric_suffix(&code, 2, width).unwrap();
            prop_assert_eq!(decoded, sequence);
            prop_assert_eq!(format_ticket_code("M", "P", decoded, width), code);
        }

        #[test]
        fn prop_code_length(sequence in 1u32..100_000, width in 1usize..7) {
            let code = format_ticket_code("T", "T", sequence, width);
            let digits = sequence.to_string().len();
            prop_assert_eq!(code.len(), 2 + width.max(digits));
        }
    }
}
