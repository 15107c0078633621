//! Display price parsing.

use std::sync::LazyLock;

use regex::Regex;

static PRICE_TOKEN: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\d[\d.,]*").ok());

/// Parse a display price into minor currency units (cents).
///
/// Accepts both `1.299,99 €` and `€1,299.99` styles. Returns `None` when no
/// number can be found.
pub fn parse_price_cents(text: &str) -> Option<i64> {
    let token = (*PRICE_TOKEN)
        .as_ref()?
        .find(text)?
        .as_str()
        .trim_end_matches(['.', ',']);

    // A trailing separator followed by one or two digits is the decimal point.
    let (integer_part, fraction) = match token.rfind(['.', ',']) {
        Some(idx) if token.len() - idx - 1 <= 2 => (&token[..idx], &token[idx + 1..]),
        _ => (token, ""),
    };

    let digits: String = integer_part.chars().filter(char::is_ascii_digit).collect();
    let units: i64 = if digits.is_empty() { 0 } else { digits.parse().ok()? };
    let cents: i64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().ok()? * 10,
        _ => fraction.parse().ok()?,
    };

    units.checked_mul(100)?.checked_add(cents)
}

/// Convert whole currency units to cents, saturating on overflow.
pub fn units_to_cents(units: i64) -> i64 {
    units.saturating_mul(100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_european_format() {
        assert_eq!(parse_price_cents("29,99 €"), Some(2999));
        assert_eq!(parse_price_cents("1.299,99€"), Some(129_999));
        assert_eq!(parse_price_cents("€ 5,9"), Some(590));
    }

    #[test]
    fn test_english_format() {
        assert_eq!(parse_price_cents("€1,299.00"), Some(129_900));
        assert_eq!(parse_price_cents("$19.99"), Some(1999));
    }

    #[test]
    fn test_thousands_without_decimals() {
        assert_eq!(parse_price_cents("1.299 €"), Some(129_900));
        assert_eq!(parse_price_cents("12 €"), Some(1200));
    }

    #[test]
    fn test_range_takes_first_price() {
        assert_eq!(parse_price_cents("Da 19,99 € a 29,99 €"), Some(1999));
    }

    #[test]
    fn test_unparsable() {
        assert_eq!(parse_price_cents("Gratis"), None);
        assert_eq!(parse_price_cents(""), None);
        assert_eq!(parse_price_cents("99999999999999999999 €"), None);
    }

    #[test]
    fn test_price_pattern_compiles() {
        assert!(PRICE_TOKEN.is_some());
    }

    #[test]
    fn test_units_to_cents() {
        assert_eq!(units_to_cents(29), 2900);
        assert_eq!(units_to_cents(i64::MAX), i64::MAX);
    }
}
