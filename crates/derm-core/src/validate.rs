//! Caller-fixable input checks.
//!
//! These run before any store access: a request that fails here is
//! malformed and must be corrected by the caller, never retried as-is.

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use thiserror::Error;

use crate::slot::{AM_CLOSE, AM_OPEN, PM_CLOSE, PM_OPEN};

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9+_.-]+@.+$").expect("email regex is valid"));
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^09\d{9}$").expect("phone regex is valid"));
static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z\s.'-]+$").expect("name regex is valid"));

/// A malformed or out-of-range input field.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    /// The offending field.
    pub field: &'static str,
    /// Why it was rejected.
    pub reason: String,
}

impl ValidationError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Checks basic email shape.
///
/// # Errors
///
/// Returns [`ValidationError`] when the address is malformed.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if EMAIL_RE.is_match(email) {
        Ok(())
    } else {
        Err(ValidationError::new("email", "not a valid email address"))
    }
}

/// Checks a PH mobile number (`09` followed by nine digits).
///
/// # Errors
///
/// Returns [`ValidationError`] when the number is malformed.
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if PHONE_RE.is_match(phone) {
        Ok(())
    } else {
        Err(ValidationError::new(
            "phone",
            "expected an 11-digit mobile number starting with 09",
        ))
    }
}

/// Checks a person name: letters, spaces, `.'-`, at least two chars.
///
/// # Errors
///
/// Returns [`ValidationError`] when the name is malformed.
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.len() >= 2 && NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(ValidationError::new(
            "name",
            "must be at least two characters of letters, spaces, or .'-",
        ))
    }
}

/// Checks password length (minimum eight characters).
///
/// # Errors
///
/// Returns [`ValidationError`] when the password is too short.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.len() >= 8 {
        Ok(())
    } else {
        Err(ValidationError::new(
            "password",
            "must be at least 8 characters",
        ))
    }
}

/// Checks an age in years, exclusive bounds (0, 150).
///
/// # Errors
///
/// Returns [`ValidationError`] when the age is out of range.
pub fn validate_age(age: u16) -> Result<(), ValidationError> {
    if age > 0 && age < 150 {
        Ok(())
    } else {
        Err(ValidationError::new("age", "must be between 1 and 149"))
    }
}

/// Rejects dates before `today`.
///
/// # Errors
///
/// Returns [`ValidationError`] when the date is in the past.
pub fn validate_date_not_past(date: NaiveDate, today: NaiveDate) -> Result<(), ValidationError> {
    if date < today {
        Err(ValidationError::new("date", "must not be in the past"))
    } else {
        Ok(())
    }
}

/// Checks that a requested visit time is not in the past and falls
/// inside a bookable window (08:00-12:00 or 13:00-17:00).
///
/// # Errors
///
/// Returns [`ValidationError`] for past dates and out-of-window times
/// (including the unbookable noon hour).
pub fn validate_schedule(when: NaiveDateTime, today: NaiveDate) -> Result<(), ValidationError> {
    validate_date_not_past(when.date(), today)?;
    let time = when.time();
    let in_am = time >= AM_OPEN && time < AM_CLOSE;
    let in_pm = time >= PM_OPEN && time < PM_CLOSE;
    if in_am || in_pm {
        Ok(())
    } else {
        Err(ValidationError::new(
            "scheduled_at",
            "outside clinic hours (08:00-12:00, 13:00-17:00)",
        ))
    }
}
