use chrono::{NaiveDate, NaiveTime};
use std::fmt;

pub const MIN_TICKETS_PER_BOOKING: i64 = 1;
pub const MAX_TICKETS_PER_BOOKING: i64 = 10;
pub const CUSTOMER_NAME_MAX_LEN: usize = 120;
pub const CUSTOMER_EMAIL_MAX_LEN: usize = 254;
pub const CUSTOMER_MOBILE_MAX_LEN: usize = 32;
pub const DATE_KEY_LEN: usize = 10;
pub const SHOW_TIME_LEN: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.chars().count() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

/// `YYYY-MM-DD`, zero padded, so lexicographic order is chronological.
pub fn validate_date_key(field: &'static str, value: &str) -> ValidationResult {
    if value.len() != DATE_KEY_LEN || NaiveDate::parse_from_str(value, "%Y-%m-%d").is_err() {
        return Err(ValidationError::new(field, "must be a YYYY-MM-DD date"));
    }

    Ok(())
}

/// `HH:MM`, zero padded 24h clock.
pub fn validate_show_time(field: &'static str, value: &str) -> ValidationResult {
    if value.len() != SHOW_TIME_LEN || NaiveTime::parse_from_str(value, "%H:%M").is_err() {
        return Err(ValidationError::new(field, "must be an HH:MM time"));
    }

    Ok(())
}

pub fn validate_quantity(quantity: i64) -> ValidationResult {
    if !(MIN_TICKETS_PER_BOOKING..=MAX_TICKETS_PER_BOOKING).contains(&quantity) {
        return Err(ValidationError::new(
            "quantity",
            format!(
                "must be between {} and {}",
                MIN_TICKETS_PER_BOOKING, MAX_TICKETS_PER_BOOKING
            ),
        ));
    }

    Ok(())
}

/// Advisory only: callers log a mismatch but still accept the value.
pub fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}

/// Advisory only. Accepts an optional leading `+`, spaces and dashes.
pub fn looks_like_mobile(value: &str) -> bool {
    let digits = value
        .trim_start_matches('+')
        .chars()
        .filter(|ch| *ch != ' ' && *ch != '-')
        .collect::<String>();

    (8..=15).contains(&digits.len()) && digits.chars().all(|ch| ch.is_ascii_digit())
}
