//! Text normalization and numeric cell coercion.

use rust_decimal::Decimal;
use std::fmt::Display;
use std::str::FromStr;

use crate::error::ParseError;

/// Thai letters, vowels, tone marks and digits (`ก` through `๙`).
/// Unassigned code points and the `๚` `๛` marks are excluded.
pub(crate) fn is_thai(c: char) -> bool {
    ('\u{0E01}'..='\u{0E59}').contains(&c)
}

/// Keep ASCII letters, ASCII digits and Thai script; lowercase the result.
///
/// Total and idempotent: `normalize(&normalize(x)) == normalize(x)`.
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_alphanumeric() || is_thai(*c))
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Normalize any displayable value (numbers, codes read as integers).
pub fn normalize_value<T: Display>(value: T) -> String {
    normalize(&value.to_string())
}

/// Normalize an optional value; `None` behaves like an empty cell.
pub fn normalize_opt<T: Display>(value: Option<T>) -> String {
    value.map(normalize_value).unwrap_or_default()
}

/// Parse a comma-formatted sheet cell (`"12,500.50"`) as a decimal.
pub fn parse_numeric(cell: &str) -> Result<Decimal, ParseError> {
    let cleaned: String = cell
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    let err = || ParseError {
        value: cell.to_string(),
    };

    let value = Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .map_err(|_| err())?;
    if value.is_sign_negative() && !value.is_zero() {
        return Err(err());
    }
    Ok(value)
}

/// Parse a stock count. Fractional counts are truncated.
pub fn parse_quantity(cell: &str) -> Result<u64, ParseError> {
    use rust_decimal::prelude::ToPrimitive;

    parse_numeric(cell)?.trunc().to_u64().ok_or_else(|| ParseError {
        value: cell.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_punctuation_and_lowercases() {
        assert_eq!(normalize("RT20-ABC"), "rt20abc");
        assert_eq!(normalize("  Model: X/200 "), "modelx200");
    }

    #[test]
    fn keeps_thai_script() {
        assert_eq!(normalize("ตู้เย็น 2 ประตู"), "ตู้เย็น2ประตู");
        assert_eq!(normalize("แอร์ 12,000 BTU"), "แอร์12000btu");
        assert_eq!(normalize("รุ่น ๒๕๖๗"), "รุ่น๒๕๖๗");
    }

    #[test]
    fn drops_thai_punctuation_and_unassigned_points() {
        assert_eq!(normalize("ก๚๛"), "ก");
        assert_eq!(normalize("\u{0E00}ข\u{0E7F}"), "ข");
        assert!(!is_thai('\u{0E5B}'));
        assert!(is_thai('๙'));
    }

    #[test]
    fn drops_other_scripts_and_symbols() {
        assert_eq!(normalize("Café™ №5"), "caf5");
        assert_eq!(normalize("🔥🔥"), "");
    }

    #[test]
    fn total_on_empty_and_null_like_inputs() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize_opt::<&str>(None), "");
        assert_eq!(normalize_value(12000), "12000");
        assert_eq!(normalize_value(12.5), "125");
    }

    #[test]
    fn idempotent() {
        for input in ["RT20-ABC", "ตู้เย็น 2 ประตู", "", "a.b.c", "Ñandú 42", "   "] {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", input);
        }
    }

    #[test]
    fn parses_comma_formatted_numbers() {
        assert_eq!(parse_numeric("12,500").unwrap(), Decimal::new(12500, 0));
        assert_eq!(parse_numeric(" 1,234.50 ").unwrap(), Decimal::new(123450, 2));
        assert_eq!(parse_numeric("0").unwrap(), Decimal::ZERO);
    }

    #[test]
    fn rejects_garbage_and_negatives() {
        assert!(parse_numeric("").is_err());
        assert!(parse_numeric("n/a").is_err());
        assert!(parse_numeric("-5").is_err());
    }

    #[test]
    fn parses_quantities() {
        assert_eq!(parse_quantity("1,200").unwrap(), 1200);
        assert_eq!(parse_quantity("3.0").unwrap(), 3);
        assert!(parse_quantity("many").is_err());
    }
}
