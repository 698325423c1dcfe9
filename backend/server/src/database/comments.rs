use rusqlite::{Connection, params};

use super::{authorize_existing, select_in};
use crate::{
    error::AppError,
    models::{Comment, new_id, now},
    policy::{Action, Caller, Table, authorize},
};

pub struct NewComment {
    pub post_id: String,
    pub user_id: String,
    pub content: String,
}

/// Oldest first, the order a thread is read in.
pub fn list_for_post(conn: &Connection, post_id: &str) -> Result<Vec<Comment>, AppError> {
    list_for_posts(conn, &[post_id.to_string()])
}

pub fn list_for_posts(conn: &Connection, post_ids: &[String]) -> Result<Vec<Comment>, AppError> {
    select_in(
        conn,
        Comment::COLUMNS,
        "comments",
        "post_id",
        post_ids,
        "created_at, rowid",
        Comment::from_row,
    )
}

pub fn get(conn: &Connection, id: &str) -> Result<Comment, AppError> {
    let sql = format!("SELECT {} FROM comments WHERE id = ?1", Comment::COLUMNS);

    Ok(conn.query_row(&sql, [id], Comment::from_row)?)
}

pub fn insert(conn: &Connection, caller: &Caller, new: NewComment) -> Result<Comment, AppError> {
    authorize(caller, Table::Comments, Action::Insert, Some(&new.user_id))?;

    let id = new_id();
    let created_at = now();
    conn.execute(
        "INSERT INTO comments (id, post_id, user_id, content, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![id, new.post_id, new.user_id, new.content, created_at],
    )?;

    get(conn, &id)
}

pub fn update(
    conn: &Connection,
    caller: &Caller,
    id: &str,
    content: &str,
) -> Result<Comment, AppError> {
    authorize_existing(conn, caller, Table::Comments, Action::Update, id)?;

    conn.execute("UPDATE comments SET content = ?2 WHERE id = ?1", params![id, content])?;

    get(conn, id)
}

pub fn delete(conn: &Connection, caller: &Caller, id: &str) -> Result<(), AppError> {
    authorize_existing(conn, caller, Table::Comments, Action::Delete, id)?;

    conn.execute("DELETE FROM comments WHERE id = ?1", [id])?;

    Ok(())
}
