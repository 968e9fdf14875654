//! Tracking number grammars.

use std::sync::LazyLock;

use regex::Regex;

use crate::{domain::Carrier, errors::Error, Result};

/// Chat intake grammars, tried in order. First match wins.
static GENERIC_FORMATS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^YT\d{10,20}$",             // Temu, AliExpress
        r"^LB\d{9}CN$",               // Shein
        r"^LP\d{9}CN$",               // Alibaba
        r"^[A-Z]{2}\d{9}[A-Z]{2}$",   // UPU S10
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

/// Stricter per-carrier grammars used by form submission.
static CARRIER_FORMATS: LazyLock<Vec<(Carrier, Regex)>> = LazyLock::new(|| {
    [
        (Carrier::Temu, r"^[A-Z0-9]{10,20}$"),
        (Carrier::Shein, r"^[A-Z0-9]{10,25}$"),
        (Carrier::AliExpress, r"^[A-Z]{2}[0-9]{9}[A-Z]{2}$"),
        (Carrier::Dhl, r"^[0-9]{10,11}$"),
        (Carrier::Fedex, r"^[0-9]{12,14}$"),
        (Carrier::Ups, r"^1Z[A-Z0-9]{16}$"),
        (Carrier::Usps, r"^[0-9]{20,22}$"),
        (Carrier::Amazon, r"^TBA[0-9]{12}$"),
        (Carrier::ChinaPost, r"^[A-Z]{2}[0-9]{9}[A-Z]{2}$"),
        (Carrier::SingaporePost, r"^[A-Z]{2}[0-9]{9}[A-Z]{2}$"),
    ]
    .into_iter()
    .map(|(c, p)| (c, Regex::new(p).expect("valid regex")))
    .collect()
});

const MIN_UNLISTED_CARRIER_LEN: usize = 6;

/// Trim + uppercase.
pub fn normalize_number(candidate: &str) -> String {
    candidate.trim().to_uppercase()
}

pub fn is_valid_format(candidate: &str) -> bool {
    let n = normalize_number(candidate);
    GENERIC_FORMATS.iter().any(|re| re.is_match(&n))
}

/// Split free text on whitespace/commas/newlines into normalized tokens.
pub fn split_tracking_input(text: &str) -> Vec<String> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .map(normalize_number)
        .filter(|t| !t.is_empty())
        .collect()
}

/// Heuristic used when no dialog state is active: does the first token look
/// like a tracking number?
pub fn looks_like_tracking_input(text: &str) -> bool {
    split_tracking_input(text)
        .first()
        .is_some_and(|t| is_valid_format(t))
}

/// Per-carrier check for form submissions. A mismatch is user-correctable.
pub fn validate_for_carrier(carrier: Carrier, number: &str) -> Result<()> {
    let n = normalize_number(number);
    let ok = match CARRIER_FORMATS.iter().find(|(c, _)| *c == carrier) {
        Some((_, re)) => re.is_match(&n),
        None => n.chars().count() >= MIN_UNLISTED_CARRIER_LEN,
    };

    if ok {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "invalid tracking number format for {carrier}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_known_generic_formats() {
        assert!(is_valid_format("YT1234567890"));
        assert!(is_valid_format("  yt12345678901234567890 "));
        assert!(is_valid_format("LB123456789CN"));
        assert!(is_valid_format("lp123456789cn"));
        assert!(is_valid_format("RR123456789DE"));
    }

    #[test]
    fn rejects_junk() {
        assert!(!is_valid_format("XX999"));
        assert!(!is_valid_format("banana"));
        assert!(!is_valid_format("YT123"));
        assert!(!is_valid_format("YT123456789012345678901"));
        assert!(!is_valid_format(""));
    }

    #[test]
    fn splits_batch_input() {
        let tokens = split_tracking_input("YT12345678901  , lb123456789cn\nXX999");
        assert_eq!(tokens, vec!["YT12345678901", "LB123456789CN", "XX999"]);
        assert!(is_valid_format(&tokens[0]));
        assert!(is_valid_format(&tokens[1]));
        assert!(!is_valid_format(&tokens[2]));
    }

    #[test]
    fn split_drops_empty_tokens() {
        assert!(split_tracking_input(" ,, \n\t ").is_empty());
    }

    #[test]
    fn heuristic_only_looks_at_first_token() {
        assert!(looks_like_tracking_input("lb123456789cn please track"));
        assert!(!looks_like_tracking_input("please track LB123456789CN"));
        assert!(!looks_like_tracking_input("banana"));
        assert!(!looks_like_tracking_input(""));
    }

    #[test]
    fn carrier_specific_formats() {
        assert!(validate_for_carrier(Carrier::Ups, "1z999aa10123456784").is_ok());
        assert!(validate_for_carrier(Carrier::Ups, "1Z999").is_err());
        assert!(validate_for_carrier(Carrier::Dhl, "1234567890").is_ok());
        assert!(validate_for_carrier(Carrier::Dhl, "12345678901234").is_err());
        assert!(validate_for_carrier(Carrier::Amazon, "TBA123456789012").is_ok());
        assert!(validate_for_carrier(Carrier::AliExpress, "LB123456789CN").is_ok());
    }

    #[test]
    fn unlisted_carrier_needs_six_chars() {
        assert!(validate_for_carrier(Carrier::Alibaba, "ABC123").is_ok());
        assert!(validate_for_carrier(Carrier::Unknown, "ABC12").is_err());
    }

    #[test]
    fn carrier_mismatch_is_a_validation_error() {
        let err = validate_for_carrier(Carrier::Fedex, "abc").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
