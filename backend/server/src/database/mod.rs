//! # SQLite
//!
//! Relational store for identities, sessions and forum rows.
//!
//! ## Implementation
//!
//! - One connection behind a mutex, WAL journal, foreign keys enforced
//! - Each table module takes a plain [`Connection`] so callers choose the transaction scope
//! - Writes run the policy check for the caller before touching any row
//!
//! ## Tables
//!
//! - `auth_users`, `sessions`: authentication provider
//! - `schools`, `profiles`, `user_schools`, `posts`, `comments`, `votes`: forum data

pub mod comments;
pub mod identities;
pub mod posts;
pub mod profiles;
pub mod schema;
pub mod schools;
pub mod user_schools;
pub mod votes;

use std::{path::Path, sync::Mutex};

use rusqlite::{Connection, OptionalExtension, Transaction, params_from_iter};
use tracing::{debug, info};

use crate::{
    error::AppError,
    policy::{Action, Caller, Table, authorize},
};

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self, AppError> {
        if path.as_os_str() == ":memory:" {
            return Self::open_in_memory();
        }

        info!("Opening SQLite database at {}", path.display());
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;

        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, AppError> {
        debug!("Opening in-memory SQLite database");

        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, AppError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        schema::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&Connection) -> Result<T, AppError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| AppError::internal(format!("Lock poisoned: {e}")))?;

        f(&conn)
    }

    /// Runs `f` in a transaction, committing only if it returns `Ok`.
    pub fn with_tx<F, T>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, AppError>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| AppError::internal(format!("Lock poisoned: {e}")))?;

        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;

        Ok(value)
    }
}

/// Checks `action` on an existing row.
///
/// A missing row is reported to users exactly like a row they do not own.
pub(crate) fn authorize_existing(
    conn: &Connection,
    caller: &Caller,
    table: Table,
    action: Action,
    id: &str,
) -> Result<(), AppError> {
    let sql = format!(
        "SELECT {} FROM {} WHERE id = ?1",
        table.owner_column(),
        table.name()
    );

    let owner: Option<Option<String>> = conn
        .query_row(&sql, [id], |row| row.get(0))
        .optional()?;

    match owner {
        Some(owner) => authorize(caller, table, action, owner.as_deref()),
        None if *caller == Caller::Service => Err(AppError::NotFound),
        None => Err(AppError::Forbidden),
    }
}

/// `?1, ?2, ...` for an `IN (...)` list of `n` values.
pub(crate) fn placeholders(n: usize) -> String {
    (1..=n)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Bound parameters per `IN (...)` query, well under SQLite's variable limit.
pub(crate) const IN_CHUNK: usize = 500;

/// Runs `SELECT {columns} FROM {table} WHERE {column} IN (...)` for `ids`, in chunks of
/// [`IN_CHUNK`]. Rows are ordered by `order` within each chunk.
pub(crate) fn select_in<T>(
    conn: &Connection,
    columns: &str,
    table: &str,
    column: &str,
    ids: &[String],
    order: &str,
    map: fn(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
) -> Result<Vec<T>, AppError> {
    let mut rows = Vec::new();

    for chunk in ids.chunks(IN_CHUNK) {
        let sql = format!(
            "SELECT {columns} FROM {table} WHERE {column} IN ({}) ORDER BY {order}",
            placeholders(chunk.len())
        );

        let mut stmt = conn.prepare_cached(&sql)?;
        for row in stmt.query_map(params_from_iter(chunk.iter()), map)? {
            rows.push(row?);
        }
    }

    Ok(rows)
}
