use rusqlite::{Connection, ToSql, params};
use tracing::info;

use super::authorize_existing;
use crate::{
    error::AppError,
    models::{Post, PostType, new_id, now},
    policy::{Action, Caller, Table, authorize},
};

pub struct NewPost {
    pub user_id: String,
    pub school_id: String,
    pub title: String,
    pub content: String,
    pub post_type: PostType,
}

#[derive(Debug, Default)]
pub struct PostChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub post_type: Option<PostType>,
}

#[derive(Debug, Default)]
pub struct PostFilter {
    pub school_id: Option<String>,
    pub user_id: Option<String>,
    pub post_type: Option<PostType>,
    pub limit: Option<usize>,
}

/// Newest first.
pub fn list(conn: &Connection, filter: &PostFilter) -> Result<Vec<Post>, AppError> {
    let limit = filter.limit.map_or(-1, |n| n as i64);
    let mut clauses = Vec::new();
    let mut values: Vec<&dyn ToSql> = Vec::new();

    if let Some(school_id) = &filter.school_id {
        values.push(school_id);
        clauses.push(format!("school_id = ?{}", values.len()));
    }
    if let Some(user_id) = &filter.user_id {
        values.push(user_id);
        clauses.push(format!("user_id = ?{}", values.len()));
    }
    if let Some(post_type) = &filter.post_type {
        values.push(post_type);
        clauses.push(format!("post_type = ?{}", values.len()));
    }

    values.push(&limit);

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    let sql = format!(
        "SELECT {} FROM posts {where_clause} ORDER BY created_at DESC, rowid DESC LIMIT ?{}",
        Post::COLUMNS,
        values.len()
    );

    let mut stmt = conn.prepare(&sql)?;
    let posts = stmt
        .query_map(values.as_slice(), Post::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(posts)
}

pub fn get(conn: &Connection, id: &str) -> Result<Post, AppError> {
    let sql = format!("SELECT {} FROM posts WHERE id = ?1", Post::COLUMNS);

    Ok(conn.query_row(&sql, [id], Post::from_row)?)
}

pub fn insert(conn: &Connection, caller: &Caller, new: NewPost) -> Result<Post, AppError> {
    authorize(caller, Table::Posts, Action::Insert, Some(&new.user_id))?;

    let id = new_id();
    let created_at = now();
    conn.execute(
        "INSERT INTO posts (id, user_id, school_id, title, content, post_type, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![
            id,
            new.user_id,
            new.school_id,
            new.title,
            new.content,
            new.post_type,
            created_at
        ],
    )?;

    info!("Post {id} ({}) created on school {}", new.post_type, new.school_id);
    get(conn, &id)
}

pub fn update(
    conn: &Connection,
    caller: &Caller,
    id: &str,
    changes: PostChanges,
) -> Result<Post, AppError> {
    authorize_existing(conn, caller, Table::Posts, Action::Update, id)?;

    conn.execute(
        "UPDATE posts SET
             title = COALESCE(?2, title),
             content = COALESCE(?3, content),
             post_type = COALESCE(?4, post_type)
         WHERE id = ?1",
        params![id, changes.title, changes.content, changes.post_type],
    )?;

    get(conn, id)
}

/// Cascades to the post's comments and votes.
pub fn delete(conn: &Connection, caller: &Caller, id: &str) -> Result<(), AppError> {
    authorize_existing(conn, caller, Table::Posts, Action::Delete, id)?;

    conn.execute("DELETE FROM posts WHERE id = ?1", [id])?;
    info!("Post {id} deleted");

    Ok(())
}
