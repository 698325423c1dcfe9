//! # Rows
//!
//! Row types for every table plus the three enumerated column types. Enum columns are
//! stored as lowercase text and guarded by CHECK constraints in the schema, so a value that
//! slips past [`FromStr`] is still rejected by the store.

use std::{fmt, str::FromStr};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{
    Row,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Stored timestamp format, matching the `strftime` pattern used by the SQL triggers.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn now() -> String {
    timestamp(Utc::now())
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

macro_rules! text_enum {
    ($name:ident, $what:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = AppError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(AppError::Validation(format!(
                        concat!("Invalid ", $what, " '{}'"),
                        other
                    ))),
                }
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: AppError| FromSqlError::Other(e.to_string().into()))
            }
        }
    };
}

text_enum!(PostType, "post type", {
    Pro => "pro",
    Con => "con",
    General => "general",
});

text_enum!(SchoolStatus, "school status", {
    Current => "current",
    Past => "past",
});

text_enum!(VoteType, "vote type", {
    Upvote => "upvote",
    Downvote => "downvote",
});

#[derive(Debug, Clone, Serialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Identity {
    pub const COLUMNS: &'static str = "id, email, metadata, created_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let metadata: String = row.get("metadata")?;

        Ok(Self {
            id: row.get("id")?,
            email: row.get("email")?,
            metadata: serde_json::from_str(&metadata).unwrap_or(serde_json::Value::Null),
            created_at: row.get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct School {
    pub id: String,
    pub name: String,
    pub location: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl School {
    pub const COLUMNS: &'static str = "id, name, location, created_by, created_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            location: row.get("location")?,
            created_by: row.get("created_by")?,
            created_at: row.get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    pub id: String,
    pub username: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub const COLUMNS: &'static str = "id, username, bio, avatar_url, created_at, updated_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            username: row.get("username")?,
            bio: row.get("bio")?,
            avatar_url: row.get("avatar_url")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSchool {
    pub id: String,
    pub user_id: String,
    pub school_id: String,
    pub status: SchoolStatus,
    pub added_at: DateTime<Utc>,
}

impl UserSchool {
    pub const COLUMNS: &'static str = "id, user_id, school_id, status, added_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            school_id: row.get("school_id")?,
            status: row.get("status")?,
            added_at: row.get("added_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Post {
    pub id: String,
    pub user_id: String,
    pub school_id: String,
    pub title: String,
    pub content: String,
    pub post_type: PostType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    pub const COLUMNS: &'static str =
        "id, user_id, school_id, title, content, post_type, created_at, updated_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            school_id: row.get("school_id")?,
            title: row.get("title")?,
            content: row.get("content")?,
            post_type: row.get("post_type")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub const COLUMNS: &'static str = "id, post_id, user_id, content, created_at, updated_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            post_id: row.get("post_id")?,
            user_id: row.get("user_id")?,
            content: row.get("content")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Vote {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub vote_type: VoteType,
    pub created_at: DateTime<Utc>,
}

impl Vote {
    pub const COLUMNS: &'static str = "id, post_id, user_id, vote_type, created_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            post_id: row.get("post_id")?,
            user_id: row.get("user_id")?,
            vote_type: row.get("vote_type")?,
            created_at: row.get("created_at")?,
        })
    }
}
