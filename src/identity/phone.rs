//! Phone-identifier normalization.
//!
//! Identifiers coming out of the message store are a mix of phone numbers
//! in arbitrary formatting, email addresses, and opaque group tokens. The
//! canonical form is digits-only with a leading country code; a 10-digit
//! number is assumed domestic and prefixed with `1`. Other digit counts
//! pass through unchanged: international numbers are not normalized
//! further (known limitation, see DESIGN.md).

use once_cell::sync::Lazy;
use regex::Regex;

static NON_DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\D").expect("static regex"));
static PHONE_PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s()\-]").expect("static regex"));

/// Canonical digit form of an identifier. Empty when the input carries no
/// digits at all (emails, group tokens).
pub fn normalize_digits(identifier: &str) -> String {
    let digits = NON_DIGIT.replace_all(identifier, "").into_owned();
    if digits.len() == 10 {
        format!("1{digits}")
    } else {
        digits
    }
}

/// The four lookup variants every mapping probe must try, in order: the
/// raw input, the canonical digits, the `+`-prefixed canonical digits,
/// and the last 10 digits alone. Duplicates are collapsed so callers can
/// probe the list front to back.
pub fn lookup_variants(identifier: &str) -> Vec<String> {
    let mut variants = vec![identifier.to_string()];
    let digits = normalize_digits(identifier);
    if !digits.is_empty() {
        variants.push(digits.clone());
        variants.push(format!("+{digits}"));
        if digits.len() >= 10 {
            variants.push(digits[digits.len() - 10..].to_string());
        }
    }
    let mut seen = std::collections::HashSet::new();
    variants.retain(|v| seen.insert(v.clone()));
    variants
}

/// Display form of a phone identifier: `+` followed by the canonical
/// digits, or the input untouched when it holds no digits.
pub fn clean_phone_number(identifier: &str) -> String {
    let digits = normalize_digits(identifier);
    if digits.is_empty() {
        identifier.to_string()
    } else {
        format!("+{digits}")
    }
}

/// Whether an identifier reads as a phone number (as opposed to an email
/// address or a group token): a leading `+`, or digits once common phone
/// punctuation is stripped.
pub fn looks_like_phone(identifier: &str) -> bool {
    if identifier.starts_with('+') {
        return true;
    }
    let stripped = PHONE_PUNCTUATION.replace_all(identifier, "");
    !stripped.is_empty() && stripped.chars().all(|c| c.is_ascii_digit())
}
