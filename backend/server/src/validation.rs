//! Field checks applied before any write reaches the store.
//!
//! Every check trims its input and reports the field by name in an [`AppError::Validation`].

use crate::{error::AppError, utils::is_username_text};

pub const USERNAME_CHARS: (usize, usize) = (3, 30);
pub const BIO_MAX: usize = 500;
pub const AVATAR_URL_MAX: usize = 500;
pub const SCHOOL_NAME_CHARS: (usize, usize) = (2, 100);
pub const LOCATION_MAX: usize = 100;
pub const TITLE_CHARS: (usize, usize) = (3, 200);
pub const POST_CONTENT_CHARS: (usize, usize) = (1, 10_000);
pub const COMMENT_CHARS: (usize, usize) = (1, 2_000);
pub const PASSWORD_MIN: usize = 6;

fn invalid(message: String) -> AppError {
    AppError::Validation(message)
}

/// Trimmed text whose length in characters lies within `(min, max)`.
pub fn text(field: &str, value: &str, (min, max): (usize, usize)) -> Result<String, AppError> {
    let value = value.trim();
    let len = value.chars().count();

    if len < min {
        return Err(invalid(match min {
            1 => format!("{field} is required"),
            _ => format!("{field} must be at least {min} characters"),
        }));
    }
    if len > max {
        return Err(invalid(format!("{field} must be at most {max} characters")));
    }

    Ok(value.to_string())
}

/// Like [`text`] for optional fields; blank input becomes `None`.
pub fn optional_text(
    field: &str,
    value: Option<String>,
    max: usize,
) -> Result<Option<String>, AppError> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => text(field, value, (1, max)).map(Some),
    }
}

pub fn username(value: &str) -> Result<String, AppError> {
    let value = text("Username", value, USERNAME_CHARS)?;

    if !is_username_text(&value) {
        return Err(invalid(
            "Username may only contain letters, digits, '_', '.' and '-'".to_string(),
        ));
    }

    Ok(value)
}

pub fn email(value: &str) -> Result<String, AppError> {
    let value = value.trim().to_lowercase();

    let well_formed = matches!(
        value.split_once('@'),
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@')
    );

    if !well_formed {
        return Err(invalid("Email address is not valid".to_string()));
    }

    Ok(value)
}

pub fn password(value: &str) -> Result<(), AppError> {
    if value.chars().count() < PASSWORD_MIN {
        return Err(invalid(format!(
            "Password must be at least {PASSWORD_MIN} characters"
        )));
    }

    Ok(())
}

pub fn avatar_url(value: Option<String>) -> Result<Option<String>, AppError> {
    let value = optional_text("Avatar URL", value, AVATAR_URL_MAX)?;

    match &value {
        Some(url) if !(url.starts_with("https://") || url.starts_with("http://")) => Err(invalid(
            "Avatar URL must start with http:// or https://".to_string(),
        )),
        _ => Ok(value),
    }
}

pub fn bio(value: Option<String>) -> Result<Option<String>, AppError> {
    optional_text("Bio", value, BIO_MAX)
}

pub fn school_name(value: &str) -> Result<String, AppError> {
    text("School name", value, SCHOOL_NAME_CHARS)
}

pub fn location(value: Option<String>) -> Result<Option<String>, AppError> {
    optional_text("Location", value, LOCATION_MAX)
}

pub fn post_title(value: &str) -> Result<String, AppError> {
    text("Title", value, TITLE_CHARS)
}

pub fn post_content(value: &str) -> Result<String, AppError> {
    text("Content", value, POST_CONTENT_CHARS)
}

pub fn comment(value: &str) -> Result<String, AppError> {
    text("Comment", value, COMMENT_CHARS)
}
