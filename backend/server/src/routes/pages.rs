use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    error::AppError,
    models::PostType,
    policy::Caller,
    state::AppState,
    views::{self, CreatePostView, HomeView, ProfileView, SchoolView},
};

type Shared = State<Arc<AppState>>;

/// Sign-in page. Already signed-in visitors are sent home.
pub async fn auth_page_handler(caller: Caller) -> Response {
    if caller.is_signed_in() {
        return Redirect::to("/").into_response();
    }

    Json(json!({
        "page": "auth",
        "sign_in": "/api/auth/signin",
        "sign_up": "/api/auth/signup",
    }))
    .into_response()
}

pub async fn home_handler(
    State(state): Shared,
    caller: Caller,
) -> Result<Json<HomeView>, AppError> {
    Ok(Json(state.db.with_conn(|conn| views::home(conn, &caller))?))
}

pub async fn own_profile_handler(
    State(state): Shared,
    caller: Caller,
) -> Result<Json<ProfileView>, AppError> {
    // The service role has no profile of its own.
    let id = caller.user_id().ok_or(AppError::NotFound)?;

    Ok(Json(state.db.with_conn(|conn| views::profile(conn, &caller, id))?))
}

pub async fn profile_handler(
    State(state): Shared,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<ProfileView>, AppError> {
    Ok(Json(state.db.with_conn(|conn| views::profile(conn, &caller, &id))?))
}

pub async fn create_post_handler(
    State(state): Shared,
    caller: Caller,
) -> Result<Json<CreatePostView>, AppError> {
    if caller.user_id().is_none() {
        return Err(AppError::NotFound);
    }

    Ok(Json(state.db.with_conn(|conn| views::create_post(conn, &caller))?))
}

#[derive(Deserialize)]
pub struct SchoolPageQuery {
    #[serde(rename = "type")]
    post_type: Option<String>,
}

pub async fn school_handler(
    State(state): Shared,
    caller: Caller,
    Path(id): Path<String>,
    Query(query): Query<SchoolPageQuery>,
) -> Result<Json<SchoolView>, AppError> {
    // Empty or "all" means no filter.
    let selected = query
        .post_type
        .as_deref()
        .filter(|t| !t.is_empty() && *t != "all")
        .map(str::parse::<PostType>)
        .transpose()?;

    Ok(Json(
        state.db.with_conn(|conn| views::school(conn, &caller, &id, selected))?,
    ))
}

pub async fn not_found_handler() -> AppError {
    AppError::NotFound
}
