//! Authentication provider tables: `auth_users` and `sessions`.
//!
//! These sit outside the policy layer. Only [`crate::auth`] calls into them.

use rusqlite::{Connection, OptionalExtension, params};

use crate::{
    error::AppError,
    models::{Identity, new_id, now},
};

pub fn create(
    conn: &Connection,
    email: &str,
    password_hash: &str,
    metadata: &serde_json::Value,
) -> Result<Identity, AppError> {
    let id = new_id();
    let metadata =
        serde_json::to_string(metadata).map_err(|e| AppError::InternalError(Box::new(e)))?;

    conn.execute(
        "INSERT INTO auth_users (id, email, password_hash, metadata, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, email, password_hash, metadata, now()],
    )?;

    get(conn, &id)
}

pub fn get(conn: &Connection, id: &str) -> Result<Identity, AppError> {
    let sql = format!("SELECT {} FROM auth_users WHERE id = ?1", Identity::COLUMNS);

    Ok(conn.query_row(&sql, [id], Identity::from_row)?)
}

/// Identity and its password hash.
pub fn find_by_email(
    conn: &Connection,
    email: &str,
) -> Result<Option<(Identity, String)>, AppError> {
    let sql = format!(
        "SELECT {}, password_hash FROM auth_users WHERE email = ?1",
        Identity::COLUMNS
    );

    let found = conn
        .query_row(&sql, [email], |row| {
            Ok((Identity::from_row(row)?, row.get("password_hash")?))
        })
        .optional()?;

    Ok(found)
}

/// Deletes the identity; the profile and everything it owns cascade.
pub fn delete(conn: &Connection, id: &str) -> Result<(), AppError> {
    match conn.execute("DELETE FROM auth_users WHERE id = ?1", [id])? {
        0 => Err(AppError::NotFound),
        _ => Ok(()),
    }
}

pub fn create_session(
    conn: &Connection,
    token_hash: &str,
    user_id: &str,
    expires_at: &str,
) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO sessions (token_hash, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
        params![token_hash, user_id, now(), expires_at],
    )?;

    Ok(())
}

/// User owning an unexpired session.
pub fn session_user(conn: &Connection, token_hash: &str) -> Result<Option<String>, AppError> {
    let user_id = conn
        .query_row(
            "SELECT user_id FROM sessions WHERE token_hash = ?1 AND expires_at > ?2",
            params![token_hash, now()],
            |row| row.get(0),
        )
        .optional()?;

    Ok(user_id)
}

pub fn delete_session(conn: &Connection, token_hash: &str) -> Result<(), AppError> {
    conn.execute("DELETE FROM sessions WHERE token_hash = ?1", [token_hash])?;

    Ok(())
}

pub fn purge_expired_sessions(conn: &Connection) -> Result<usize, AppError> {
    Ok(conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", [now()])?)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::{database::test_support::db, models::timestamp};

    #[test]
    fn test_email_is_unique_ignoring_case() {
        let db = db();

        let result = db.with_conn(|conn| {
            create(conn, "jane@example.com", "h", &serde_json::json!({}))?;
            create(conn, "JANE@example.com", "h", &serde_json::json!({}))
        });

        assert!(matches!(result, Err(AppError::Conflict(m)) if m == "Email is already registered"));
    }

    #[test]
    fn test_find_by_email_returns_hash() {
        let db = db();

        db.with_conn(|conn| {
            let created = create(conn, "jane@example.com", "hash", &serde_json::json!({"username": "jd"}))?;
            let (found, hash) = find_by_email(conn, "jane@example.com")?.unwrap();

            assert_eq!(found.id, created.id);
            assert_eq!(found.metadata["username"], "jd");
            assert_eq!(hash, "hash");
            assert!(find_by_email(conn, "nobody@example.com")?.is_none());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_expired_sessions_are_ignored_and_purged() {
        let db = db();

        db.with_conn(|conn| {
            let identity = create(conn, "jane@example.com", "h", &serde_json::json!({}))?;
            let past = timestamp(Utc::now() - Duration::hours(1));
            let future = timestamp(Utc::now() + Duration::hours(1));

            create_session(conn, "old", &identity.id, &past)?;
            create_session(conn, "new", &identity.id, &future)?;

            assert_eq!(session_user(conn, "old")?, None);
            assert_eq!(session_user(conn, "new")?, Some(identity.id.clone()));
            assert_eq!(purge_expired_sessions(conn)?, 1);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_deleting_identity_drops_sessions() {
        let db = db();

        db.with_conn(|conn| {
            let identity = create(conn, "jane@example.com", "h", &serde_json::json!({}))?;
            let future = timestamp(Utc::now() + Duration::hours(1));
            create_session(conn, "token", &identity.id, &future)?;

            delete(conn, &identity.id)?;

            assert_eq!(session_user(conn, "token")?, None);
            assert!(matches!(delete(conn, &identity.id), Err(AppError::NotFound)));
            Ok(())
        })
        .unwrap();
    }
}
