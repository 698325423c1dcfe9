use rusqlite::{Connection, params};

use super::authorize_existing;
use crate::{
    error::AppError,
    models::{SchoolStatus, UserSchool, new_id, now},
    policy::{Action, Caller, Table, authorize},
};

pub struct NewUserSchool {
    pub user_id: String,
    pub school_id: String,
    pub status: SchoolStatus,
}

fn list_where(conn: &Connection, column: &str, value: &str) -> Result<Vec<UserSchool>, AppError> {
    let sql = format!(
        "SELECT {} FROM user_schools WHERE {column} = ?1 ORDER BY added_at DESC",
        UserSchool::COLUMNS
    );

    let mut stmt = conn.prepare(&sql)?;
    let links = stmt
        .query_map([value], UserSchool::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(links)
}

pub fn list_for_user(conn: &Connection, user_id: &str) -> Result<Vec<UserSchool>, AppError> {
    list_where(conn, "user_id", user_id)
}

pub fn list_for_school(conn: &Connection, school_id: &str) -> Result<Vec<UserSchool>, AppError> {
    list_where(conn, "school_id", school_id)
}

pub fn get(conn: &Connection, id: &str) -> Result<UserSchool, AppError> {
    let sql = format!("SELECT {} FROM user_schools WHERE id = ?1", UserSchool::COLUMNS);

    Ok(conn.query_row(&sql, [id], UserSchool::from_row)?)
}

pub fn insert(
    conn: &Connection,
    caller: &Caller,
    new: NewUserSchool,
) -> Result<UserSchool, AppError> {
    authorize(caller, Table::UserSchools, Action::Insert, Some(&new.user_id))?;

    let id = new_id();
    conn.execute(
        "INSERT INTO user_schools (id, user_id, school_id, status, added_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, new.user_id, new.school_id, new.status, now()],
    )?;

    get(conn, &id)
}

pub fn update(
    conn: &Connection,
    caller: &Caller,
    id: &str,
    status: SchoolStatus,
) -> Result<UserSchool, AppError> {
    authorize_existing(conn, caller, Table::UserSchools, Action::Update, id)?;

    conn.execute(
        "UPDATE user_schools SET status = ?2 WHERE id = ?1",
        params![id, status],
    )?;

    get(conn, id)
}

pub fn delete(conn: &Connection, caller: &Caller, id: &str) -> Result<(), AppError> {
    authorize_existing(conn, caller, Table::UserSchools, Action::Delete, id)?;

    conn.execute("DELETE FROM user_schools WHERE id = ?1", [id])?;

    Ok(())
}
