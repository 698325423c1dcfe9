use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::{
    auth::{self, Credentials, Session, SignUp},
    database::profiles,
    error::AppError,
    policy::Caller,
    session::{clear_session_cookie, presented_token, session_cookie},
    state::AppState,
};

fn with_cookie(
    state: &AppState,
    status: StatusCode,
    session: Session,
) -> Result<Response, AppError> {
    let cookie = session_cookie(&session.token, state.config.session_ttl_hours * 3600)?;

    Ok((status, [(SET_COOKIE, cookie)], Json(session)).into_response())
}

pub async fn sign_up_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SignUp>,
) -> Result<impl IntoResponse, AppError> {
    let session = auth::sign_up(&state.db, &state.config, payload)?;

    with_cookie(&state, StatusCode::CREATED, session)
}

pub async fn sign_in_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Credentials>,
) -> Result<impl IntoResponse, AppError> {
    let session = auth::sign_in(&state.db, &state.config, payload)?;

    with_cookie(&state, StatusCode::OK, session)
}

pub async fn sign_out_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    if let Some(token) = presented_token(&headers) {
        auth::sign_out(&state.db, &token)?;
    }

    Ok((StatusCode::NO_CONTENT, [clear_session_cookie()]))
}

pub async fn session_handler(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> Result<impl IntoResponse, AppError> {
    match &caller {
        Caller::Anonymous => Err(AppError::Unauthenticated),
        Caller::Service => Ok(Json(json!({ "role": "service" }))),
        Caller::User(id) => {
            let profile = state.db.with_conn(|conn| profiles::find(conn, id))?;

            Ok(Json(json!({ "role": "user", "user_id": id, "profile": profile })))
        }
    }
}

pub async fn delete_account_handler(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> Result<impl IntoResponse, AppError> {
    auth::delete_account(&state.db, &caller)?;

    Ok((StatusCode::NO_CONTENT, [clear_session_cookie()]))
}
