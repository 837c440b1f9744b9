use std::sync::LazyLock;

use regex::Regex;

use crate::errors::ValidationError;

/// Characters accepted between two phone numbers.
const PHONE_DELIMITERS: &[char] = &[';', ',', '|'];

static PHONES_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+?\d{10,11}([;|,]+\+?\d{10,11})*[;|,]*$").expect("valid phone list regex")
});

static PHONE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?\d{10,11}$").expect("valid phone regex"));

pub fn is_valid_phone(phone: &str) -> bool {
    PHONE_PATTERN.is_match(phone)
}

/// Strips all whitespace from a raw phone list, checks it and splits it into
/// individual numbers, keeping the original order.
pub fn parse_phone_list(raw: &str) -> Result<Vec<String>, ValidationError> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();

    if compact.is_empty() {
        return Err(ValidationError::EmptyPhoneList);
    }
    if !PHONES_PATTERN.is_match(&compact) {
        return Err(ValidationError::InvalidPhones);
    }

    let phones: Vec<String> = compact
        .split(PHONE_DELIMITERS)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();

    tracing::debug!(
        count = phones.len(),
        "mailing list (first 10): {}",
        phones.iter().take(10).cloned().collect::<Vec<_>>().join("; ")
    );

    Ok(phones)
}
