//! # Authentication
//!
//! Email and password identities with opaque session tokens.
//!
//! - Passwords are hashed with Argon2id, PHC strings stored in `auth_users`
//! - Tokens are random, only their SHA-256 is stored in `sessions`
//! - Clients send the token as `Authorization: Bearer <token>` or the `session` cookie
//! - The configured service key in the bearer position grants [`Caller::Service`]

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use subtle::ConstantTimeEq;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    config::Config,
    database::{Database, identities, profiles},
    error::AppError,
    models::{Identity, Profile, timestamp},
    policy::Caller,
    triggers::provision_profile,
    utils::sha256_hex,
    validation,
};

#[derive(Debug, Deserialize)]
pub struct SignUp {
    pub email: String,
    pub password: String,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct Session {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: Identity,
    pub profile: Option<Profile>,
}

/// Hashes a password with Argon2id using `memory_kib` of memory.
pub fn hash_password(password: &str, memory_kib: u32) -> Result<String, AppError> {
    let params = Params::new(memory_kib, 2, 1, None)
        .map_err(|e| AppError::Config(format!("Invalid Argon2 parameters: {e}")))?;
    let salt = SaltString::generate(&mut OsRng);

    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::internal(format!("Failed to hash password: {e}")))
}

/// Parameters are read back from the PHC string, so hashes made with any cost verify.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::internal(format!("Invalid password hash format: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub fn sign_up(db: &Database, config: &Config, request: SignUp) -> Result<Session, AppError> {
    let email = validation::email(&request.email)?;
    validation::password(&request.password)?;
    let username = request
        .username
        .as_deref()
        .map(validation::username)
        .transpose()?;

    if let Some(username) = &username {
        if db.with_conn(|conn| profiles::username_taken(conn, username))? {
            return Err(AppError::Conflict("Username is already taken".to_string()));
        }
    }

    let password_hash = hash_password(&request.password, config.password_memory_kib)?;
    let metadata = match &username {
        Some(username) => json!({ "username": username }),
        None => json!({}),
    };

    let identity = db.with_tx(|tx| identities::create(tx, &email, &password_hash, &metadata))?;
    info!("New identity {} signed up", identity.id);

    ensure_profile(db, &identity);
    issue_session(db, config, identity)
}

pub fn sign_in(db: &Database, config: &Config, credentials: Credentials) -> Result<Session, AppError> {
    let email = credentials.email.trim().to_lowercase();

    let Some((identity, hash)) = db.with_conn(|conn| identities::find_by_email(conn, &email))?
    else {
        return Err(AppError::InvalidCredentials);
    };

    match verify_password(&credentials.password, &hash) {
        Ok(true) => {}
        Ok(false) => return Err(AppError::InvalidCredentials),
        Err(e) => {
            warn!("Stored hash for {} is unusable: {e}", identity.id);
            return Err(AppError::InvalidCredentials);
        }
    }

    ensure_profile(db, &identity);
    issue_session(db, config, identity)
}

pub fn sign_out(db: &Database, token: &str) -> Result<(), AppError> {
    db.with_conn(|conn| identities::delete_session(conn, &sha256_hex(token)))
}

/// Deletes the caller's identity together with everything their profile owns.
pub fn delete_account(db: &Database, caller: &Caller) -> Result<(), AppError> {
    let id = caller.require_user()?;

    db.with_conn(|conn| identities::delete(conn, id))?;
    info!("Identity {id} deleted");

    Ok(())
}

/// Maps a presented token to a caller. Unknown or expired tokens are anonymous.
pub fn resolve_token(db: &Database, config: &Config, token: &str) -> Result<Caller, AppError> {
    if let Some(key) = &config.service_key {
        if bool::from(key.as_bytes().ct_eq(token.as_bytes())) {
            return Ok(Caller::Service);
        }
    }

    let user_id = db.with_conn(|conn| identities::session_user(conn, &sha256_hex(token)))?;

    Ok(user_id.map_or(Caller::Anonymous, Caller::User))
}

pub fn purge_expired_sessions(db: &Database) -> Result<usize, AppError> {
    db.with_conn(identities::purge_expired_sessions)
}

/// Post-commit profile hook. Failures are logged, never returned.
fn ensure_profile(db: &Database, identity: &Identity) {
    match db.with_tx(|tx| provision_profile(tx, identity)) {
        Ok(Some(profile)) => info!("Provisioned profile '{}' for {}", profile.username, identity.id),
        Ok(None) => {}
        Err(e) => warn!("Profile provisioning for {} failed: {e}", identity.id),
    }
}

fn issue_session(db: &Database, config: &Config, user: Identity) -> Result<Session, AppError> {
    let token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
    let expires_at = Utc::now() + Duration::hours(config.session_ttl_hours);

    let profile = db.with_conn(|conn| {
        identities::create_session(conn, &sha256_hex(&token), &user.id, &timestamp(expires_at))?;
        profiles::find(conn, &user.id)
    })?;

    Ok(Session {
        token,
        expires_at,
        user,
        profile,
    })
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        password_memory_kib: 64,
        service_key: Some("service-secret".to_string()),
        ..Config::default()
    }
}
