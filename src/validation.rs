use thiserror::Error;

pub const MIN_TITLE_LEN: usize = 5;
pub const MAX_TITLE_LEN: usize = 200;
pub const MIN_DESCRIPTION_LEN: usize = 20;
pub const MAX_DESCRIPTION_LEN: usize = 5_000;
pub const MAX_COMMENT_LEN: usize = 2_000;
pub const MIN_USERNAME_LEN: usize = 3;
pub const MAX_USERNAME_LEN: usize = 32;
pub const MAX_DISPLAY_NAME_LEN: usize = 64;
pub const MAX_EMAIL_LEN: usize = 254;

const _: [(); MAX_TITLE_LEN - MIN_TITLE_LEN] = [(); MAX_TITLE_LEN - MIN_TITLE_LEN];
const _: [(); MAX_DESCRIPTION_LEN - MIN_DESCRIPTION_LEN] =
    [(); MAX_DESCRIPTION_LEN - MIN_DESCRIPTION_LEN];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },
    #[error("{field} must be at least {min} characters")]
    TooShort { field: &'static str, min: usize },
    #[error("{field} exceeds {max} character limit")]
    TooLong { field: &'static str, max: usize },
    #[error("username may only contain letters, digits, '_' and '-'")]
    InvalidUsername,
    #[error("email address is malformed")]
    InvalidEmail,
    #[error("{field} must be a positive identifier")]
    InvalidIdentifier { field: &'static str },
}

fn bounded(
    value: &str,
    field: &'static str,
    min: usize,
    max: usize,
) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    let length = trimmed.chars().count();
    if length < min {
        return Err(ValidationError::TooShort { field, min });
    }
    if length > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(trimmed.to_string())
}

pub fn canonicalize_title(value: &str) -> Result<String, ValidationError> {
    bounded(value, "title", MIN_TITLE_LEN, MAX_TITLE_LEN)
}

pub fn canonicalize_description(value: &str) -> Result<String, ValidationError> {
    bounded(value, "description", MIN_DESCRIPTION_LEN, MAX_DESCRIPTION_LEN)
}

pub fn canonicalize_comment(value: &str) -> Result<String, ValidationError> {
    bounded(value, "content", 1, MAX_COMMENT_LEN)
}

pub fn sanitize_username(value: &str) -> Result<String, ValidationError> {
    let username = bounded(value, "username", MIN_USERNAME_LEN, MAX_USERNAME_LEN)?;
    let allowed = username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !allowed {
        return Err(ValidationError::InvalidUsername);
    }
    Ok(username)
}

pub fn normalize_email(value: &str) -> Result<String, ValidationError> {
    let email = bounded(value, "email", 3, MAX_EMAIL_LEN)?.to_ascii_lowercase();
    let Some((local, domain)) = email.split_once('@') else {
        return Err(ValidationError::InvalidEmail);
    };
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(ValidationError::InvalidEmail);
    }
    if email.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(email)
}

pub fn canonicalize_display_name(value: &str) -> Result<Option<String>, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > MAX_DISPLAY_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "display_name",
            max: MAX_DISPLAY_NAME_LEN,
        });
    }
    Ok(Some(trimmed.to_string()))
}

pub fn require_id(value: i64, field: &'static str) -> Result<i64, ValidationError> {
    if value <= 0 {
        return Err(ValidationError::InvalidIdentifier { field });
    }
    Ok(value)
}
