use std::collections::HashMap;

use rusqlite::{Connection, OptionalExtension, params};
use serde::Deserialize;

use super::{authorize_existing, select_in};
use crate::{
    error::AppError,
    models::{Profile, now},
    policy::{Action, Caller, Table, authorize},
};

pub struct NewProfile {
    pub id: String,
    pub username: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProfileChanges {
    pub username: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

pub fn get(conn: &Connection, id: &str) -> Result<Profile, AppError> {
    find(conn, id)?.ok_or(AppError::NotFound)
}

pub fn find(conn: &Connection, id: &str) -> Result<Option<Profile>, AppError> {
    let sql = format!("SELECT {} FROM profiles WHERE id = ?1", Profile::COLUMNS);

    Ok(conn.query_row(&sql, [id], Profile::from_row).optional()?)
}

pub fn username_taken(conn: &Connection, username: &str) -> Result<bool, AppError> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM profiles WHERE username = ?1", [username], |row| row.get(0))
        .optional()?;

    Ok(found.is_some())
}

pub fn by_ids(conn: &Connection, ids: &[String]) -> Result<HashMap<String, Profile>, AppError> {
    let profiles = select_in(
        conn,
        Profile::COLUMNS,
        "profiles",
        "id",
        ids,
        "username",
        Profile::from_row,
    )?;

    Ok(profiles.into_iter().map(|p| (p.id.clone(), p)).collect())
}

pub fn insert(conn: &Connection, caller: &Caller, new: NewProfile) -> Result<Profile, AppError> {
    authorize(caller, Table::Profiles, Action::Insert, Some(&new.id))?;

    let created_at = now();
    conn.execute(
        "INSERT INTO profiles (id, username, bio, avatar_url, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![new.id, new.username, new.bio, new.avatar_url, created_at],
    )?;

    get(conn, &new.id)
}

pub fn update(
    conn: &Connection,
    caller: &Caller,
    id: &str,
    changes: ProfileChanges,
) -> Result<Profile, AppError> {
    authorize_existing(conn, caller, Table::Profiles, Action::Update, id)?;

    conn.execute(
        "UPDATE profiles SET
             username = COALESCE(?2, username),
             bio = COALESCE(?3, bio),
             avatar_url = COALESCE(?4, avatar_url)
         WHERE id = ?1",
        params![id, changes.username, changes.bio, changes.avatar_url],
    )?;

    get(conn, id)
}

/// Only the service role passes; users lose their profile by deleting their identity.
pub fn delete(conn: &Connection, caller: &Caller, id: &str) -> Result<(), AppError> {
    authorize_existing(conn, caller, Table::Profiles, Action::Delete, id)?;

    conn.execute("DELETE FROM profiles WHERE id = ?1", [id])?;

    Ok(())
}
