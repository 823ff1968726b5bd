//! The user profile fed into the form flows.

use serde::Deserialize;

use crate::error::{Result, WatchError};

/// Immutable personal record consumed read-only by the site flows.
///
/// Birth date parts are kept as the raw strings the portals expect: day
/// and year are free-text inputs, month is a `<select>` value. `cellphone`
/// and `email` are only required when auto-booking is enabled; see
/// [`PersonalInfo::require_booking_contact`].
#[derive(Debug, Clone, Deserialize)]
pub struct PersonalInfo {
    pub first_name: String,
    pub last_name: String,
    /// Health-insurance number as printed on the card, spaces allowed.
    pub nam: String,
    pub card_seq_number: String,
    pub birth_day: String,
    pub birth_month: String,
    pub birth_year: String,
    pub postal_code: String,
    #[serde(default)]
    pub cellphone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl PersonalInfo {
    /// The health-insurance number with all whitespace removed, the shape
    /// the hub widget validates against.
    pub fn nam_compact(&self) -> String {
        self.nam.split_whitespace().collect()
    }

    /// Validates that the contact fields the booking sub-flow fills are
    /// present and well-formed. Called at automaton construction when
    /// auto-booking is enabled, so a bad profile fails before any browser
    /// is launched.
    pub fn require_booking_contact(&self) -> Result<()> {
        let cellphone = self
            .cellphone
            .as_deref()
            .ok_or_else(|| WatchError::InvalidInput("cellphone is required for auto-booking".into()))?;
        format_phone_number(cellphone)?;
        match self.email.as_deref() {
            Some(email) if !email.trim().is_empty() => Ok(()),
            _ => Err(WatchError::InvalidInput(
                "email is required for auto-booking".into(),
            )),
        }
    }
}

/// Formats a bare ten-digit number as `(514) 555-1234`.
///
/// Anything that is not exactly ten ASCII digits is rejected with
/// [`WatchError::InvalidInput`].
pub fn format_phone_number(number: &str) -> Result<String> {
    if number.len() == 10 && number.bytes().all(|b| b.is_ascii_digit()) {
        Ok(format!(
            "({}) {}-{}",
            &number[..3],
            &number[3..6],
            &number[6..]
        ))
    } else {
        Err(WatchError::InvalidInput(format!(
            "phone number must be exactly ten digits, got {:?}",
            number
        )))
    }
}
