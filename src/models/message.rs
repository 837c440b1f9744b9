use std::ops::RangeInclusive;

use serde::Serialize;

use crate::errors::ValidationError;
use crate::services::phones::is_valid_phone;

pub const MIN_TEXT_LEN: usize = 5;
pub const VALID_HOURS: RangeInclusive<u8> = 1..=24;

/// A send request that passed validation and can go to the gateway.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SmsMessage {
    pub phones: Vec<String>,
    pub text: String,
    pub valid_hours: u8,
}

impl SmsMessage {
    pub fn new(phones: Vec<String>, text: &str, valid_hours: i64) -> Result<Self, ValidationError> {
        if phones.is_empty() {
            return Err(ValidationError::EmptyPhoneList);
        }
        if !phones.iter().all(|p| is_valid_phone(p)) {
            return Err(ValidationError::InvalidPhones);
        }

        if text.chars().count() < MIN_TEXT_LEN {
            return Err(ValidationError::TextTooShort { min: MIN_TEXT_LEN });
        }

        let valid_hours = u8::try_from(valid_hours)
            .ok()
            .filter(|h| VALID_HOURS.contains(h))
            .ok_or_else(|| invalid_validity(valid_hours.to_string()))?;

        Ok(Self {
            phones,
            text: text.to_string(),
            valid_hours,
        })
    }

    /// Phones joined the way the gateway expects them.
    pub fn joined_phones(&self) -> String {
        self.phones.join(",")
    }
}

/// Parses a validity window typed by a user, in whole hours.
pub fn parse_valid_hours(raw: &str) -> Result<i64, ValidationError> {
    raw.trim()
        .parse()
        .map_err(|_| invalid_validity(raw.to_string()))
}

fn invalid_validity(got: String) -> ValidationError {
    ValidationError::InvalidValidity {
        min: *VALID_HOURS.start(),
        max: *VALID_HOURS.end(),
        got,
    }
}
