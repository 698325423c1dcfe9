//! # Row-level policies
//!
//! Every read or write names the [`Caller`] explicitly. The allow-list below decides per
//! table and action whether anyone, only the row's owner, or nobody may act. The
//! [`Caller::Service`] role bypasses the list entirely, which is how schools get updated or
//! deleted and how the signup hook creates profiles.
//!
//! A rejection is always the same [`AppError::Forbidden`], whether the row is missing or
//! belongs to somebody else.

use serde::Serialize;

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    Anonymous,
    User(String),
    Service,
}

impl Caller {
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Caller::User(id) => Some(id),
            Caller::Anonymous | Caller::Service => None,
        }
    }

    pub fn require_user(&self) -> Result<&str, AppError> {
        self.user_id().ok_or(AppError::Unauthenticated)
    }

    pub fn is_signed_in(&self) -> bool {
        !matches!(self, Caller::Anonymous)
    }

    /// Owner for a new row: an explicit value from the request, else the caller.
    pub fn owner_for(&self, explicit: Option<String>) -> Result<String, AppError> {
        explicit
            .or_else(|| self.user_id().map(str::to_string))
            .ok_or(AppError::Unauthenticated)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Schools,
    Profiles,
    UserSchools,
    Posts,
    Comments,
    Votes,
}

impl Table {
    pub const ALL: [Table; 6] = [
        Table::Schools,
        Table::Profiles,
        Table::UserSchools,
        Table::Posts,
        Table::Comments,
        Table::Votes,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Table::Schools => "schools",
            Table::Profiles => "profiles",
            Table::UserSchools => "user_schools",
            Table::Posts => "posts",
            Table::Comments => "comments",
            Table::Votes => "votes",
        }
    }

    /// Column compared against the caller for [`Rule::Owner`].
    pub fn owner_column(&self) -> &'static str {
        match self {
            Table::Schools => "created_by",
            Table::Profiles => "id",
            Table::UserSchools | Table::Posts | Table::Comments | Table::Votes => "user_id",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Select,
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    Anyone,
    Owner,
    Nobody,
}

pub fn rule(table: Table, action: Action) -> Rule {
    match (table, action) {
        (_, Action::Select) => Rule::Anyone,
        (Table::Schools, Action::Update | Action::Delete) => Rule::Nobody,
        (Table::Profiles, Action::Delete) => Rule::Nobody,
        _ => Rule::Owner,
    }
}

pub fn authorize(
    caller: &Caller,
    table: Table,
    action: Action,
    owner: Option<&str>,
) -> Result<(), AppError> {
    if *caller == Caller::Service {
        return Ok(());
    }

    let allowed = match rule(table, action) {
        Rule::Anyone => true,
        Rule::Nobody => false,
        Rule::Owner => matches!((caller.user_id(), owner), (Some(me), Some(owner)) if me == owner),
    };

    if allowed {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}
