use std::collections::HashMap;

use rusqlite::{Connection, params};
use serde::Deserialize;
use tracing::info;

use super::{authorize_existing, select_in};
use crate::{
    error::AppError,
    models::{School, new_id, now},
    policy::{Action, Caller, Table, authorize},
};

pub struct NewSchool {
    pub name: String,
    pub location: Option<String>,
    pub created_by: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SchoolChanges {
    pub name: Option<String>,
    pub location: Option<String>,
}

pub fn list(conn: &Connection, limit: Option<usize>) -> Result<Vec<School>, AppError> {
    let sql = format!(
        "SELECT {} FROM schools ORDER BY name COLLATE NOCASE LIMIT ?1",
        School::COLUMNS
    );
    let limit = limit.map_or(-1, |n| n as i64);

    let mut stmt = conn.prepare(&sql)?;
    let schools = stmt
        .query_map([limit], School::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(schools)
}

pub fn get(conn: &Connection, id: &str) -> Result<School, AppError> {
    let sql = format!("SELECT {} FROM schools WHERE id = ?1", School::COLUMNS);

    Ok(conn.query_row(&sql, [id], School::from_row)?)
}

pub fn by_ids(conn: &Connection, ids: &[String]) -> Result<HashMap<String, School>, AppError> {
    let schools = select_in(conn, School::COLUMNS, "schools", "id", ids, "name", School::from_row)?;

    Ok(schools.into_iter().map(|s| (s.id.clone(), s)).collect())
}

pub fn insert(conn: &Connection, caller: &Caller, new: NewSchool) -> Result<School, AppError> {
    authorize(caller, Table::Schools, Action::Insert, Some(&new.created_by))?;

    let id = new_id();
    conn.execute(
        "INSERT INTO schools (id, name, location, created_by, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, new.name, new.location, new.created_by, now()],
    )?;

    info!("School '{}' created by {}", new.name, new.created_by);
    get(conn, &id)
}

pub fn update(
    conn: &Connection,
    caller: &Caller,
    id: &str,
    changes: SchoolChanges,
) -> Result<School, AppError> {
    authorize_existing(conn, caller, Table::Schools, Action::Update, id)?;

    conn.execute(
        "UPDATE schools SET name = COALESCE(?2, name), location = COALESCE(?3, location) WHERE id = ?1",
        params![id, changes.name, changes.location],
    )?;

    get(conn, id)
}

/// Cascades to the school's posts and member links.
pub fn delete(conn: &Connection, caller: &Caller, id: &str) -> Result<(), AppError> {
    authorize_existing(conn, caller, Table::Schools, Action::Delete, id)?;

    conn.execute("DELETE FROM schools WHERE id = ?1", [id])?;
    info!("School {id} deleted");

    Ok(())
}
