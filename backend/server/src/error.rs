use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::{ErrorCode, ffi};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("Not signed in")]
    Unauthenticated,

    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Deliberately carries no detail so a rejection never reveals which rows exist.
    #[error("Not permitted")]
    Forbidden,

    #[error("Not found")]
    NotFound,

    #[error("{0}")]
    Conflict(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(rusqlite::Error),

    #[error("Internal error: {0}")]
    InternalError(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl AppError {
    pub fn internal(message: impl Into<String>) -> Self {
        AppError::InternalError(message.into().into())
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Config(_) | AppError::Database(_) | AppError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::QueryReturnedNoRows => AppError::NotFound,
            rusqlite::Error::SqliteFailure(failure, message)
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                let message = message.as_deref().unwrap_or_default();

                match failure.extended_code {
                    ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                        AppError::Conflict(describe_unique(message))
                    }
                    ffi::SQLITE_CONSTRAINT_FOREIGNKEY => AppError::NotFound,
                    ffi::SQLITE_CONSTRAINT_CHECK | ffi::SQLITE_CONSTRAINT_NOTNULL => {
                        AppError::Validation(format!("Rejected by constraint: {message}"))
                    }
                    _ => AppError::Database(e),
                }
            }
            _ => AppError::Database(e),
        }
    }
}

/// Maps SQLite's "UNIQUE constraint failed: table.column" text onto a user-facing message.
fn describe_unique(message: &str) -> String {
    let columns = message
        .strip_prefix("UNIQUE constraint failed: ")
        .unwrap_or(message);

    match columns {
        "schools.name" => "A school with this name already exists".to_string(),
        "profiles.username" => "Username is already taken".to_string(),
        "auth_users.email" => "Email is already registered".to_string(),
        "votes.post_id, votes.user_id" => "You have already voted on this post".to_string(),
        "user_schools.user_id, user_schools.school_id, user_schools.status" => {
            "You already have this school with that status".to_string()
        }
        _ => "Record already exists".to_string(),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("{self}");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
