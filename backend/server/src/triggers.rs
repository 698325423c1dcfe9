//! # Derived state
//!
//! ## Profile provisioning
//!
//! Runs after a new identity commits. The username comes from signup metadata when present,
//! otherwise from the local part of the email. Taken names get a numeric suffix, then fall
//! back to `user_<id prefix>`. Provisioning never undoes the identity; callers log the failure
//! and sign-in retries it.
//!
//! ## Timestamps
//!
//! `updated_at` on posts, comments and profiles is maintained by SQL triggers in
//! [`crate::database::schema`].

use rusqlite::Connection;

use crate::{
    database::profiles::{self, NewProfile},
    error::AppError,
    models::{Identity, Profile},
    policy::Caller,
    utils::{email_local_part, sanitize_username},
    validation::{self, USERNAME_CHARS},
};

/// Leaves room for a `_NN` suffix within the 30 character username limit.
pub const USERNAME_BASE_MAX: usize = 24;
const MAX_SUFFIX: u32 = 99;
const FALLBACK_BASE: &str = "user";

/// A valid `metadata.username` is used unchanged. Anything else is sanitised and capped at
/// [`USERNAME_BASE_MAX`], and must still reach the minimum username length.
pub fn derive_username(identity: &Identity) -> String {
    let requested = identity.metadata.get("username").and_then(|v| v.as_str());

    if let Some(username) = requested.and_then(|u| validation::username(u).ok()) {
        return username;
    }

    requested
        .into_iter()
        .chain(std::iter::once(email_local_part(&identity.email)))
        .map(|raw| sanitize_username(raw, USERNAME_BASE_MAX))
        .find(|u| u.chars().count() >= USERNAME_CHARS.0)
        .unwrap_or_else(|| FALLBACK_BASE.to_string())
}

fn candidates<'a>(base: &'a str, id: &'a str) -> impl Iterator<Item = String> + 'a {
    let stem: String = base.chars().take(USERNAME_BASE_MAX).collect();
    let fallback = format!("{FALLBACK_BASE}_{}", id.chars().take(8).collect::<String>());

    std::iter::once(base.to_string())
        .chain((2..=MAX_SUFFIX).map(move |n| format!("{stem}_{n}")))
        .chain(std::iter::once(fallback))
}

/// Creates the identity's profile unless one exists. Returns the new profile, if any.
pub fn provision_profile(
    conn: &Connection,
    identity: &Identity,
) -> Result<Option<Profile>, AppError> {
    if profiles::find(conn, &identity.id)?.is_some() {
        return Ok(None);
    }

    let base = derive_username(identity);

    for username in candidates(&base, &identity.id) {
        if profiles::username_taken(conn, &username)? {
            continue;
        }

        let profile = profiles::insert(
            conn,
            &Caller::Service,
            NewProfile {
                id: identity.id.clone(),
                username,
                bio: None,
                avatar_url: None,
            },
        )?;

        return Ok(Some(profile));
    }

    Err(AppError::Conflict(format!(
        "No free username derived from '{base}'"
    )))
}
