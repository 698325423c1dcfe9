use rusqlite::{Connection, OptionalExtension, params};

use super::{authorize_existing, select_in};
use crate::{
    error::AppError,
    models::{Vote, VoteType, new_id, now},
    policy::{Action, Caller, Table, authorize},
};

pub struct NewVote {
    pub post_id: String,
    pub user_id: String,
    pub vote_type: VoteType,
}

pub fn list_for_post(conn: &Connection, post_id: &str) -> Result<Vec<Vote>, AppError> {
    list_for_posts(conn, &[post_id.to_string()])
}

pub fn list_for_posts(conn: &Connection, post_ids: &[String]) -> Result<Vec<Vote>, AppError> {
    select_in(
        conn,
        Vote::COLUMNS,
        "votes",
        "post_id",
        post_ids,
        "created_at, rowid",
        Vote::from_row,
    )
}

pub fn get(conn: &Connection, id: &str) -> Result<Vote, AppError> {
    let sql = format!("SELECT {} FROM votes WHERE id = ?1", Vote::COLUMNS);

    Ok(conn.query_row(&sql, [id], Vote::from_row)?)
}

pub fn find_for_user(
    conn: &Connection,
    post_id: &str,
    user_id: &str,
) -> Result<Option<Vote>, AppError> {
    let sql = format!(
        "SELECT {} FROM votes WHERE post_id = ?1 AND user_id = ?2",
        Vote::COLUMNS
    );

    Ok(conn
        .query_row(&sql, params![post_id, user_id], Vote::from_row)
        .optional()?)
}

/// Strict insert: a second vote on the same post is a conflict.
pub fn insert(conn: &Connection, caller: &Caller, new: NewVote) -> Result<Vote, AppError> {
    authorize(caller, Table::Votes, Action::Insert, Some(&new.user_id))?;

    let id = new_id();
    conn.execute(
        "INSERT INTO votes (id, post_id, user_id, vote_type, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, new.post_id, new.user_id, new.vote_type, now()],
    )?;

    get(conn, &id)
}

/// Records the caller's vote, updating their existing row instead of adding a second one.
pub fn cast(
    conn: &Connection,
    caller: &Caller,
    post_id: &str,
    vote_type: VoteType,
) -> Result<Vote, AppError> {
    let user_id = caller.require_user()?;

    match find_for_user(conn, post_id, user_id)? {
        Some(existing) if existing.vote_type == vote_type => Ok(existing),
        Some(existing) => update(conn, caller, &existing.id, vote_type),
        None => insert(
            conn,
            caller,
            NewVote {
                post_id: post_id.to_string(),
                user_id: user_id.to_string(),
                vote_type,
            },
        ),
    }
}

pub fn update(
    conn: &Connection,
    caller: &Caller,
    id: &str,
    vote_type: VoteType,
) -> Result<Vote, AppError> {
    authorize_existing(conn, caller, Table::Votes, Action::Update, id)?;

    conn.execute(
        "UPDATE votes SET vote_type = ?2 WHERE id = ?1",
        params![id, vote_type],
    )?;

    get(conn, id)
}

pub fn delete(conn: &Connection, caller: &Caller, id: &str) -> Result<(), AppError> {
    authorize_existing(conn, caller, Table::Votes, Action::Delete, id)?;

    conn.execute("DELETE FROM votes WHERE id = ?1", [id])?;

    Ok(())
}

/// Removes the caller's vote on a post, if any.
pub fn retract(conn: &Connection, caller: &Caller, post_id: &str) -> Result<bool, AppError> {
    let user_id = caller.require_user()?;

    match find_for_user(conn, post_id, user_id)? {
        Some(existing) => delete(conn, caller, &existing.id).map(|_| true),
        None => Ok(false),
    }
}
