//! Input validation helpers
//!
//! Shared by the console forms and the admin endpoints so both reject the
//! same inputs before anything reaches the backend.

use crate::error::{AppError, ErrorCode};

/// Entity names: product, rack, category, user
pub const MAX_NAME_LEN: usize = 200;

/// Descriptions and free-text details
pub const MAX_NOTE_LEN: usize = 500;

/// Short identifiers: product code, rack line, manufacturer
pub const MAX_SHORT_TEXT_LEN: usize = 100;

/// Email addresses (RFC 5321)
pub const MAX_EMAIL_LEN: usize = 254;

/// Minimum password length accepted by the auth provider
pub const MIN_PASSWORD_LEN: usize = 6;

pub const MAX_PASSWORD_LEN: usize = 128;

/// Validate that a required string is non-empty and within the length limit.
pub fn validate_required_text(value: &str, field: &str, max_len: usize) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::required(field));
    }
    check_max_chars(value, field, max_len)
}

/// Validate that an optional string, if present, is within the length limit.
pub fn validate_optional_text(
    value: &Option<String>,
    field: &str,
    max_len: usize,
) -> Result<(), AppError> {
    match value {
        Some(v) => check_max_chars(v, field, max_len),
        None => Ok(()),
    }
}

/// Limits count characters, not bytes
fn check_max_chars(value: &str, field: &str, max_len: usize) -> Result<(), AppError> {
    let chars = value.chars().count();
    if chars > max_len {
        return Err(AppError::validation(format!(
            "{field} is too long ({chars} chars, max {max_len})"
        ))
        .with_detail("field", field));
    }
    Ok(())
}

/// `local@domain.tld`: no whitespace, exactly one `@`, a dot inside the domain
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

pub fn validate_email(email: &str, field: &str) -> Result<(), AppError> {
    validate_required_text(email, field, MAX_EMAIL_LEN)?;
    if !is_valid_email(email) {
        return Err(
            AppError::with_message(ErrorCode::InvalidFormat, format!("{field} is not a valid email"))
                .with_detail("field", field),
        );
    }
    Ok(())
}

pub fn validate_password(password: &str, field: &str) -> Result<(), AppError> {
    if password.is_empty() {
        return Err(AppError::required(field));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::new(ErrorCode::PasswordTooShort).with_detail("field", field));
    }
    check_max_chars(password, field, MAX_PASSWORD_LEN)
}
