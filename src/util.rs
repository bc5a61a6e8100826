//! Extra utilities for use elsewhere in the site.

use std::sync::OnceLock;

use anyhow::Context;
use regex::Regex;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

use crate::error::{AppError, AppResult};

pub const MIN_PASSWORD_LENGTH: usize = 8;

pub fn current_time() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

pub fn current_year() -> i64 {
    current_time().year() as i64
}

/// Emails are the natural key for members, so they are always stored and
/// compared trimmed and lower-cased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"))
        .is_match(email)
}

pub fn validate_email(email: &str) -> AppResult<String> {
    let email = normalize_email(email);
    if is_valid_email(&email) {
        Ok(email)
    } else {
        Err(AppError::bad_request(format!("{email:?} is not a valid email address")))
    }
}

/// Checks a new password and its confirmation.
pub fn validate_new_password(password: &str, confirmation: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::bad_request(format!(
            "The password must be at least {MIN_PASSWORD_LENGTH} characters long"
        )));
    }
    if password != confirmation {
        return Err(AppError::bad_request("The passwords don't match"));
    }

    Ok(())
}

/// Hashes a password off the async runtime, bcrypt being deliberately slow.
pub async fn hash_password(password: &str, cost: u32) -> AppResult<String> {
    let password = password.to_owned();
    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .context("password hashing task failed")??;

    Ok(hash)
}

pub async fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let (password, hash) = (password.to_owned(), hash.to_owned());
    let valid = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .context("password verification task failed")??;

    Ok(valid)
}

/// Compares secrets without returning early at the first differing byte.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Parses a date from an HTML date input (`YYYY-MM-DD`).
pub fn parse_date(field: &str, value: &str) -> AppResult<Date> {
    Date::parse(value.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|_| AppError::bad_request(format!("{field} must be a date like 2024-06-21")))
}

/// Form inputs arrive as strings; an empty one means the field was left out.
pub fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == value.len() {
        Some(value)
    } else {
        Some(trimmed.to_owned())
    }
}

pub fn require(field: &str, value: String) -> AppResult<String> {
    non_empty(value).ok_or_else(|| AppError::bad_request(format!("{field} is required")))
}

/// Parses an optional whole number from a form input.
pub fn parse_optional_number(field: &str, value: &str) -> AppResult<Option<i64>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }

    value
        .parse()
        .map(Some)
        .map_err(|_| AppError::bad_request(format!("{field} must be a whole number")))
}
