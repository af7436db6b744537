//! Client-side validation run before any request leaves the console.
//!
//! Recipient forms collect every field error at once so an operator sees
//! them together; settings validation stops at the first problem.

use std::{collections::BTreeMap, fmt, ops::RangeInclusive};

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::models::{RecipientForm, UserSettingsUpdate};
use crate::notifications::parse_clock;

// ---

/// Accepted refresh interval for notification polling, in seconds.
pub const REFRESH_INTERVAL_RANGE: RangeInclusive<u32> = 5..=60;

/// Indonesian mobile numbers in local (08…) or international (62…) form.
static PHONE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(08|62)\d+$").unwrap_or_else(|_| unreachable!()));

static EMAIL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap_or_else(|_| unreachable!()));

/// Recipient form field an error is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FormField {
    Name,
    Contact,
    Phone,
    Email,
}

/// Field errors collected from one form submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<FormField, &'static str>);

impl FieldErrors {
    pub fn get(&self, field: FormField) -> Option<&'static str> {
        self.0.get(&field).copied()
    }

    pub fn contains(&self, field: FormField) -> bool {
        self.0.contains_key(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    fn insert(&mut self, field: FormField, message: &'static str) {
        self.0.insert(field, message);
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        let mut first = true;
        for message in self.0.values() {
            if !first {
                f.write_str("; ")?;
            }
            f.write_str(message)?;
            first = false;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0}")]
    Form(FieldErrors),

    #[error("Refresh interval must be between 5 and 60 seconds (got {0})")]
    RefreshInterval(u32),

    #[error("Quiet hours {field} must be HH:MM (got {value:?})")]
    QuietHours { field: &'static str, value: String },
}

/// Validate a recipient form before create/update.
pub fn validate_recipient(form: &RecipientForm) -> Result<(), ValidationError> {
    // ---
    let mut errors = FieldErrors::default();

    if form.name.chars().count() < 2 {
        errors.insert(FormField::Name, "Name is required (min 2 chars)");
    }

    if form.phone.is_empty() && form.email.is_empty() {
        errors.insert(FormField::Contact, "Either Phone or Email is required");
    }

    if !form.phone.is_empty() && !PHONE_REGEX.is_match(&form.phone) {
        errors.insert(
            FormField::Phone,
            "Phone must start with 08 or 62 and contain only digits",
        );
    }

    if !form.email.is_empty() && !EMAIL_REGEX.is_match(&form.email) {
        errors.insert(FormField::Email, "Invalid email format");
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::Form(errors))
    }
}

/// Validate a settings update before it is sent.
pub fn validate_settings_update(update: &UserSettingsUpdate) -> Result<(), ValidationError> {
    // ---
    if let Some(secs) = update.refresh_interval_seconds {
        if !REFRESH_INTERVAL_RANGE.contains(&secs) {
            return Err(ValidationError::RefreshInterval(secs));
        }
    }

    let bounds = [
        ("start", &update.quiet_hours_start),
        ("end", &update.quiet_hours_end),
    ];
    for (field, value) in bounds {
        if let Some(Some(value)) = value {
            if parse_clock(value).is_none() {
                return Err(ValidationError::QuietHours {
                    field,
                    value: value.clone(),
                });
            }
        }
    }

    Ok(())
}

pub fn is_valid_phone(phone: &str) -> bool {
    PHONE_REGEX.is_match(phone)
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}
