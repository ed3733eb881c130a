//! Postcode classification against UK postcode grammar.
//!
//! The classification decides which providers run and in what order, so it
//! has to be total: any string, including empty and unicode input, maps to
//! exactly one class and nothing here ever touches the network.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Full postcode: outward code (letters + digit, optional trailing
/// letter/digit) followed by the three-character inward code.
static FULL_POSTCODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[A-Z]{1,2}[0-9][A-Z0-9]? ?[0-9][A-Z]{2}$").unwrap());

/// Outward-code prefix, e.g. "SW1" or "G3"
static OUTWARD_PREFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^[A-Z]{1,2}[0-9]").unwrap());

/// Bare inward code, e.g. "1AA"
static INWARD_ONLY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^[0-9][A-Z]{2}$").unwrap());

/// Full postcode embedded anywhere in a longer string
static EMBEDDED_POSTCODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b[A-Z]{1,2}[0-9][A-Z0-9]? ?[0-9][A-Z]{2}\b").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostcodeClass {
    FullPostcode,
    PartialPostcode,
    PostcodeLikeToken,
    FreeText,
}

impl PostcodeClass {
    /// Postcode-shaped queries go down the licensed-data-first cascade
    pub fn is_postcode_shaped(&self) -> bool {
        !matches!(self, PostcodeClass::FreeText)
    }
}

/// Classify an input string. Pure and total: never errors, never allocates
/// beyond whitespace normalization.
pub fn classify(raw: &str) -> PostcodeClass {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return PostcodeClass::FreeText;
    }

    // Internal runs of whitespace collapse to a single space before the
    // full-postcode comparison ("SW1A  1AA" is still a full postcode).
    let squeezed = trimmed.split_whitespace().collect::<Vec<_>>().join(" ");
    if FULL_POSTCODE_RE.is_match(&squeezed) {
        return PostcodeClass::FullPostcode;
    }

    let len = trimmed.chars().count();
    if OUTWARD_PREFIX_RE.is_match(trimmed) && len >= 3 {
        return PostcodeClass::PartialPostcode;
    }

    if OUTWARD_PREFIX_RE.is_match(trimmed) || INWARD_ONLY_RE.is_match(trimmed) {
        return PostcodeClass::PostcodeLikeToken;
    }

    PostcodeClass::FreeText
}

/// Uppercase and strip all whitespace: "sw1a 1aa" -> "SW1A1AA".
/// This is the form used for equality and prefix comparisons.
pub fn normalize_postcode(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

/// Canonical display form: uppercase with a single space before the inward
/// code for full postcodes ("sw1a1aa" -> "SW1A 1AA"), uppercase/trimmed
/// otherwise.
pub fn format_postcode(raw: &str) -> String {
    let compact = normalize_postcode(raw);
    if classify(&compact) == PostcodeClass::FullPostcode && compact.len() > 3 {
        let (outward, inward) = compact.split_at(compact.len() - 3);
        format!("{outward} {inward}")
    } else {
        raw.trim()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_uppercase()
    }
}

/// Outward code of a full postcode: everything before the inward code
/// ("SW1A 1AA" -> "SW1A"). Inputs shorter than a full postcode come back
/// normalized but unsplit.
pub fn outward_code(postcode: &str) -> String {
    let compact = normalize_postcode(postcode);
    let chars: Vec<char> = compact.chars().collect();
    if chars.len() > 4 {
        chars[..chars.len() - 3].iter().collect()
    } else {
        compact
    }
}

/// Pull the first full postcode out of a formatted address, if any
pub fn find_postcode(text: &str) -> Option<String> {
    EMBEDDED_POSTCODE_RE
        .find(text)
        .map(|m| format_postcode(m.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_postcodes_classify_as_full() {
        for input in ["SW1A 1AA", "sw1a 1aa", "G1 1DZ", "EC1A1BB", "M1 1AE", "B33 8TH"] {
            assert_eq!(classify(input), PostcodeClass::FullPostcode, "{input}");
        }
    }

    #[test]
    fn test_partial_postcodes() {
        for input in ["SW1", "SW1A", "G31", "EC1A"] {
            assert_eq!(classify(input), PostcodeClass::PartialPostcode, "{input}");
        }
    }

    #[test]
    fn test_postcode_like_tokens() {
        // Outward-shaped but too short, or a bare inward code
        assert_eq!(classify("G1"), PostcodeClass::PostcodeLikeToken);
        assert_eq!(classify("1AA"), PostcodeClass::PostcodeLikeToken);
    }

    #[test]
    fn test_free_text() {
        for input in ["10 Downing Street", "High Street Glasgow", "flat 3"] {
            assert_eq!(classify(input), PostcodeClass::FreeText, "{input}");
        }
    }

    #[test]
    fn test_classify_is_total() {
        // Never panics, always returns a class
        let long = "x".repeat(500);
        let inputs = [
            "",
            " ",
            "日本語の住所",
            "𝔘𝔫𝔦𝔠𝔬𝔡𝔢",
            "\u{0000}",
            long.as_str(),
            "!!!???",
            "123",
        ];
        for input in inputs {
            let _ = classify(input);
        }
    }

    #[test]
    fn test_internal_whitespace_normalized() {
        assert_eq!(classify("SW1A    1AA"), PostcodeClass::FullPostcode);
        assert_eq!(classify("  ec1a 1bb  "), PostcodeClass::FullPostcode);
    }

    #[test]
    fn test_normalize_and_format() {
        assert_eq!(normalize_postcode("sw1a 1aa"), "SW1A1AA");
        assert_eq!(format_postcode("sw1a1aa"), "SW1A 1AA");
        assert_eq!(format_postcode("g1 1dz"), "G1 1DZ");
        assert_eq!(format_postcode("sw1a"), "SW1A");
    }

    #[test]
    fn test_find_postcode_in_formatted_address() {
        assert_eq!(
            find_postcode("10 Downing Street, London SW1A 2AA, UK"),
            Some("SW1A 2AA".to_string())
        );
        assert_eq!(find_postcode("no postcode here"), None);
    }

    #[test]
    fn test_outward_code() {
        assert_eq!(outward_code("SW1A 1AA"), "SW1A");
        assert_eq!(outward_code("G1 1DZ"), "G1");
        assert_eq!(outward_code("SW1A"), "SW1A");
        assert_eq!(outward_code("G31"), "G31");
    }
}
