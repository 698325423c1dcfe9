//! Request-scoped caller identity and the page route guard.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request},
    http::{
        HeaderMap, HeaderValue,
        header::{AUTHORIZATION, COOKIE, SET_COOKIE},
        request::Parts,
    },
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::{auth, error::AppError, policy::Caller, state::AppState};

pub const SESSION_COOKIE: &str = "session";
pub const AUTH_PAGE: &str = "/auth";

/// Token from `Authorization: Bearer`, else from the session cookie.
pub fn presented_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

pub fn session_cookie(token: &str, max_age_secs: i64) -> Result<HeaderValue, AppError> {
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}"
    ))
    .map_err(|e| AppError::InternalError(Box::new(e)))
}

pub fn clear_session_cookie() -> (axum::http::HeaderName, HeaderValue) {
    (
        SET_COOKIE,
        HeaderValue::from_static("session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"),
    )
}

impl FromRequestParts<Arc<AppState>> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(caller) = parts.extensions.get::<Caller>() {
            return Ok(caller.clone());
        }

        let caller = match presented_token(&parts.headers) {
            Some(token) => auth::resolve_token(&state.db, &state.config, &token)?,
            None => Caller::Anonymous,
        };

        parts.extensions.insert(caller.clone());
        Ok(caller)
    }
}

/// Redirects anonymous visitors to the sign-in page.
pub async fn require_session(
    caller: Caller,
    mut request: Request,
    next: Next,
) -> Response {
    if !caller.is_signed_in() {
        return Redirect::to(AUTH_PAGE).into_response();
    }

    request.extensions_mut().insert(caller);
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(COOKIE, HeaderValue::from_static("session=def"));

        assert_eq!(presented_token(&headers).as_deref(), Some("abc"));
    }

    #[test]
    fn test_cookie_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; session=def; lang=en"));

        assert_eq!(presented_token(&headers).as_deref(), Some("def"));
    }

    #[test]
    fn test_no_credentials() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("session="));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));

        assert_eq!(presented_token(&headers), None);
    }
}
