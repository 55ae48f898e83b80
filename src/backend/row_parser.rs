//! Row parsing for CSV data lines
//!
//! A row is parsed atomically: either every field coerces to a number and the
//! row yields exactly `arity` values, or the whole row is rejected with a
//! [`RowError`]. Nothing is ever partially applied.
//!
//! Accepted numeric forms are integers and decimals with an optional sign and
//! an optional exponent (`42`, `-1.5`, `.5`, `3.`, `1e-3`). Words such as
//! `inf` or `NaN` are rejected even though [`f64::from_str`] accepts them.

use crate::error::RowError;

/// Coerce a single trimmed token to a number.
///
/// Returns `None` for anything that is not a plain decimal literal.
pub fn parse_number(token: &str) -> Option<f64> {
    let token = token.trim();
    if !is_decimal_literal(token) {
        return None;
    }
    token.parse::<f64>().ok()
}

/// Parse one data line into `arity` values.
pub fn parse_row(line: &str, arity: usize) -> Result<Vec<f64>, RowError> {
    if line.trim().is_empty() {
        return Err(RowError::Empty);
    }

    let tokens: Vec<&str> = line.split(',').collect();
    if tokens.len() != arity {
        return Err(RowError::Arity {
            expected: arity,
            actual: tokens.len(),
        });
    }

    tokens
        .iter()
        .enumerate()
        .map(|(column, token)| {
            parse_number(token).ok_or_else(|| RowError::NotNumeric {
                column,
                token: token.trim().to_string(),
            })
        })
        .collect()
}

fn is_decimal_literal(token: &str) -> bool {
    let bytes = token.as_bytes();
    let mut i = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        i += 1;
    }

    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let int_digits = i - int_start;

    let mut frac_digits = 0;
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        let frac_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        frac_digits = i - frac_start;
    }

    if int_digits == 0 && frac_digits == 0 {
        return false;
    }

    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        i += 1;
        if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
            i += 1;
        }
        let exp_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == exp_start {
            return false;
        }
    }

    i == bytes.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_number_forms() {
        assert_eq!(parse_number("42"), Some(42.0));
        assert_eq!(parse_number("-1.5"), Some(-1.5));
        assert_eq!(parse_number("+7"), Some(7.0));
        assert_eq!(parse_number(".5"), Some(0.5));
        assert_eq!(parse_number("3."), Some(3.0));
        assert_eq!(parse_number("1e3"), Some(1000.0));
        assert_eq!(parse_number("2.5E-1"), Some(0.25));
        assert_eq!(parse_number("  25 "), Some(25.0));
    }

    #[test]
    fn test_parse_number_rejects_words() {
        for token in [
            "", "-", ".", "e5", "1e", "1e+", "inf", "NaN", "infinity", "0x10", "1,0", "abc",
            "1.2.3", "--1",
        ] {
            assert_eq!(parse_number(token), None, "token {:?} should be rejected", token);
        }
    }

    #[test]
    fn test_parse_row_valid() {
        assert_eq!(parse_row("1.0,2.0,25", 3), Ok(vec![1.0, 2.0, 25.0]));
        assert_eq!(parse_row(" 1 , -2 ,3e1", 3), Ok(vec![1.0, -2.0, 30.0]));
    }

    #[test]
    fn test_parse_row_wrong_arity() {
        assert_eq!(
            parse_row("bad,line", 3),
            Err(RowError::Arity {
                expected: 3,
                actual: 2
            })
        );
        assert_eq!(
            parse_row("1,2,3,4", 3),
            Err(RowError::Arity {
                expected: 3,
                actual: 4
            })
        );
    }

    #[test]
    fn test_parse_row_non_numeric_field() {
        assert_eq!(
            parse_row("1.0,ERR,25", 3),
            Err(RowError::NotNumeric {
                column: 1,
                token: "ERR".into()
            })
        );
        // Trailing comma produces an empty last field
        assert_eq!(
            parse_row("1,2,", 3),
            Err(RowError::NotNumeric {
                column: 2,
                token: String::new()
            })
        );
    }

    #[test]
    fn test_parse_row_empty() {
        assert_eq!(parse_row("   ", 1), Err(RowError::Empty));
    }

    proptest! {
        #[test]
        fn test_formatted_floats_parse_back(
            values in prop::collection::vec(-1.0e6f64..1.0e6, 1..16)
        ) {
            let line = values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",");
            let parsed = parse_row(&line, values.len()).unwrap();
            prop_assert_eq!(parsed, values);
        }

        #[test]
        fn test_wrong_arity_always_rejected(
            values in prop::collection::vec(-1000i64..1000, 1..12),
            extra in 1usize..4
        ) {
            let line = values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",");
            let is_arity_error = matches!(
                parse_row(&line, values.len() + extra),
                Err(RowError::Arity { .. })
            );
            prop_assert!(is_arity_error);
        }

        #[test]
        fn test_parse_row_never_panics(line in "\\PC*", arity in 0usize..8) {
            let _ = parse_row(&line, arity);
        }
    }
}
