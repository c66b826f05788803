//! Price and percentage cleaning for catalogue columns
//!
//! Values like `"₹1,099"` or `"64%"` are reduced to plain numbers. Anything
//! that still fails to parse degrades to `None` instead of failing the batch.

/// Parse a currency amount. Symbols, spaces and thousands separators are
/// dropped; only digits, `.` and `-` are kept.
pub fn clean_currency(raw: &str) -> Option<f64> {
    parse_finite(&numeric_chars(raw))
}

/// Parse a percentage such as `"64%"` into `64.0`
pub fn clean_percentage(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let without_sign = trimmed.strip_suffix('%').unwrap_or(trimmed);
    parse_finite(&numeric_chars(without_sign))
}

fn numeric_chars(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '-'))
        .collect()
}

fn parse_finite(s: &str) -> Option<f64> {
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_currency() {
        assert_eq!(clean_currency("₹1,099"), Some(1099.0));
        assert_eq!(clean_currency("₹ 399.50"), Some(399.5));
        assert_eq!(clean_currency("$-12"), Some(-12.0));
        assert_eq!(clean_currency("free"), None);
        assert_eq!(clean_currency("1.2.3"), None);
    }

    #[test]
    fn test_clean_percentage() {
        assert_eq!(clean_percentage("64%"), Some(64.0));
        assert_eq!(clean_percentage(" 12.5 % "), Some(12.5));
        assert_eq!(clean_percentage("%"), None);
    }
}
