//! Typed form inputs and their validation.
//!
//! Every HTML form posted to the server deserializes into a plain struct of
//! strings. Implementing [`Validate`] turns it into the cleaned value the
//! operation needs, or into [`FieldErrors`] keyed by field name so the form can
//! be re-rendered with the submitted values and the messages next to each field.

use chrono::NaiveDate;
use email_address::EmailAddress;
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_EMAIL: &str = "Enter a valid email address.";
pub const INVALID_DATE: &str = "Enter a valid date.";
pub const PASSWORD_MISMATCH: &str = "The two password fields didn't match.";
pub const PASSWORD_TOO_SHORT: &str =
    "This password is too short. It must contain at least 8 characters.";
pub const PASSWORD_TOO_COMMON: &str = "This password is too common.";
pub const PASSWORD_ENTIRELY_NUMERIC: &str = "This password is entirely numeric.";
pub const PASSWORD_TOO_SIMILAR: &str = "The password is too similar to the email.";

pub const MAX_EMAIL_LENGTH: usize = 254;
pub const MIN_PASSWORD_LENGTH: usize = 8;

const COMMON_PASSWORDS: &[&str] = &[
    "123456789",
    "12345678",
    "1234567890",
    "password",
    "password1",
    "password123",
    "passw0rd",
    "qwertyuiop",
    "qwerty123",
    "iloveyou",
    "11111111",
    "00000000",
    "abcd1234",
    "1q2w3e4r",
    "sunshine",
    "princess",
    "football",
    "baseball",
    "welcome1",
    "trustno1",
    "superman",
    "starwars",
    "whatever",
    "letmein1",
];

/// Validation messages keyed by field name.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

/// Either the cleaned value of a form or the reasons it was rejected.
pub type Validated<T> = Result<T, FieldErrors>;

pub trait Validate {
    type Output;

    fn validate(&self) -> Validated<Self::Output>;
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn extend(&mut self, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn contains(&self, field: &str) -> bool {
        !self.get(field).is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Merges the errors of two independently validated forms.
pub fn validate_both<A, B>(first: Validated<A>, second: Validated<B>) -> Validated<(A, B)> {
    match (first, second) {
        (Ok(a), Ok(b)) => Ok((a, b)),
        (first, second) => {
            let mut errors = FieldErrors::new();
            if let Err(e) = first {
                errors.extend(e);
            }
            if let Err(e) = second {
                errors.extend(e);
            }
            Err(errors)
        }
    }
}

/// Lowercases the domain part, leaving the local part as typed.
pub fn normalize_email(email: &str) -> String {
    match email.trim().rsplit_once('@') {
        Some((local, domain)) => format!("{local}@{}", domain.to_lowercase()),
        None => email.trim().to_string(),
    }
}

pub fn clean_email(errors: &mut FieldErrors, field: &str, value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        errors.add(field, REQUIRED);
        return None;
    }
    if value.chars().count() > MAX_EMAIL_LENGTH {
        errors.add(field, max_length_message(MAX_EMAIL_LENGTH, value));
        return None;
    }
    if !EmailAddress::is_valid(value) {
        errors.add(field, INVALID_EMAIL);
        return None;
    }
    Some(normalize_email(value))
}

/// Trims `value` and enforces `max_length` characters. Empty input is an
/// error only when `required`.
pub fn clean_text(
    errors: &mut FieldErrors,
    field: &str,
    value: &str,
    max_length: usize,
    required: bool,
) -> Option<String> {
    let value = value.trim();
    if value.is_empty() && required {
        errors.add(field, REQUIRED);
        return None;
    }
    if value.chars().count() > max_length {
        errors.add(field, max_length_message(max_length, value));
        return None;
    }
    Some(value.to_string())
}

/// Like [`clean_text`] for optional columns: empty input becomes `None`.
pub fn clean_optional_text(
    errors: &mut FieldErrors,
    field: &str,
    value: &str,
    max_length: usize,
) -> Option<Option<String>> {
    clean_text(errors, field, value, max_length, false)
        .map(|value| Some(value).filter(|v| !v.is_empty()))
}

/// Parses an ISO `YYYY-MM-DD` date, as sent by `<input type="date">`.
pub fn clean_date(
    errors: &mut FieldErrors,
    field: &str,
    value: &str,
    required: bool,
) -> Option<Option<NaiveDate>> {
    let value = value.trim();
    if value.is_empty() {
        if required {
            errors.add(field, REQUIRED);
            return None;
        }
        return Some(None);
    }
    match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        Ok(date) => Some(Some(date)),
        Err(_) => {
            errors.add(field, INVALID_DATE);
            None
        }
    }
}

pub fn clean_choice<T: FromStr>(errors: &mut FieldErrors, field: &str, value: &str) -> Option<T> {
    let value = value.trim();
    if value.is_empty() {
        errors.add(field, REQUIRED);
        return None;
    }
    match value.parse::<T>() {
        Ok(choice) => Some(choice),
        Err(_) => {
            errors.add(
                field,
                format!("Select a valid choice. {value} is not one of the available choices."),
            );
            None
        }
    }
}

/// Checks a new password typed twice. Mismatch and strength errors are
/// reported on `confirm_field`.
pub fn clean_new_password(
    errors: &mut FieldErrors,
    (password_field, password): (&str, &str),
    (confirm_field, confirmation): (&str, &str),
    email: Option<&str>,
) -> Option<String> {
    let mut valid = true;
    if password.is_empty() {
        errors.add(password_field, REQUIRED);
        valid = false;
    }
    if confirmation.is_empty() {
        errors.add(confirm_field, REQUIRED);
        valid = false;
    }
    if !valid {
        return None;
    }

    if password != confirmation {
        errors.add(confirm_field, PASSWORD_MISMATCH);
        return None;
    }

    let problems = password_problems(password, email);
    if !problems.is_empty() {
        for problem in problems {
            errors.add(confirm_field, problem);
        }
        return None;
    }

    Some(password.to_string())
}

/// Every strength rule `password` breaks, in a stable order.
pub fn password_problems(password: &str, email: Option<&str>) -> Vec<&'static str> {
    let mut problems = Vec::new();

    if let Some(email) = email {
        if is_too_similar(password, email) {
            problems.push(PASSWORD_TOO_SIMILAR);
        }
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        problems.push(PASSWORD_TOO_SHORT);
    }
    if COMMON_PASSWORDS.contains(&password.to_lowercase().trim()) {
        problems.push(PASSWORD_TOO_COMMON);
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        problems.push(PASSWORD_ENTIRELY_NUMERIC);
    }

    problems
}

// Compares against the local part of the email; very short local parts are ignored.
fn is_too_similar(password: &str, email: &str) -> bool {
    let local = email
        .split('@')
        .next()
        .unwrap_or_default()
        .to_lowercase();
    if local.chars().count() < 3 {
        return false;
    }
    let password = password.to_lowercase();
    password == email.to_lowercase() || password.contains(&local) || local.contains(&password)
}

fn max_length_message(max_length: usize, value: &str) -> String {
    format!(
        "Ensure this value has at most {max_length} characters (it has {}).",
        value.chars().count()
    )
}
