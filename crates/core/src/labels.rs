//! Decoders for label-encoded interactive form values
//!
//! WhatsApp flow dropdowns and radio groups come back as `"<index>_<value>"`
//! (e.g. `"0_Male"`) and star ratings embed the score as `"(4/5)"`. These
//! helpers keep that convention at the boundary.

use crate::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static RATING_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\((\d)/5\)").expect("rating pattern is valid"));

/// Token after the first underscore of an indexed label
///
/// Values without an underscore are returned trimmed as-is.
pub fn label_value(raw: &str) -> &str {
    let raw = raw.trim();
    match raw.split_once('_') {
        Some((_, value)) => value.trim(),
        None => raw,
    }
}

/// Star rating embedded as `(<digit>/5)`
pub fn parse_rating(raw: &str) -> Result<u8> {
    let caps = RATING_PATTERN
        .captures(raw)
        .ok_or_else(|| Error::InvalidLabel(format!("no rating in '{}'", raw)))?;
    let score: u8 = caps[1]
        .parse()
        .map_err(|_| Error::InvalidLabel(format!("bad rating digit in '{}'", raw)))?;
    if score > 5 {
        return Err(Error::InvalidLabel(format!("rating out of range in '{}'", raw)));
    }
    Ok(score)
}

/// Yes/no radio value, e.g. `"0_Yes"` or `"1_No"`
pub fn parse_yes_no(raw: &str) -> Option<bool> {
    match label_value(raw).to_ascii_lowercase().as_str() {
        "yes" | "y" | "true" => Some(true),
        "no" | "n" | "false" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_value() {
        assert_eq!(label_value("0_Male"), "Male");
        assert_eq!(label_value("2_Billing_Query"), "Billing_Query");
        assert_eq!(label_value(" High "), "High");
    }

    #[test]
    fn test_parse_rating() {
        assert_eq!(parse_rating("0_★★★★☆ Good (4/5)").unwrap(), 4);
        assert_eq!(parse_rating("(5/5)").unwrap(), 5);
        assert!(parse_rating("Excellent").is_err());
        assert!(parse_rating("(7/5)").is_err());
    }

    #[test]
    fn test_parse_yes_no() {
        assert_eq!(parse_yes_no("0_Yes"), Some(true));
        assert_eq!(parse_yes_no("1_No"), Some(false));
        assert_eq!(parse_yes_no("2_Maybe"), None);
    }
}
