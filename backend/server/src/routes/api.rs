use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use crate::{
    database::{
        comments::{self, NewComment},
        posts::{self, NewPost, PostChanges, PostFilter},
        profiles::{self, NewProfile, ProfileChanges},
        schools::{self, NewSchool, SchoolChanges},
        user_schools::{self, NewUserSchool},
        votes::{self, NewVote},
    },
    error::AppError,
    models::{Comment, Post, Profile, School, UserSchool, Vote},
    policy::Caller,
    state::AppState,
    validation,
};

type Shared = State<Arc<AppState>>;
type Created<T> = Result<(StatusCode, Json<T>), AppError>;

fn created<T>(value: T) -> Created<T> {
    Ok((StatusCode::CREATED, Json(value)))
}

pub async fn not_found_handler() -> AppError {
    AppError::NotFound
}

// Schools

#[derive(Deserialize)]
pub struct SchoolQuery {
    limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct CreateSchool {
    name: String,
    location: Option<String>,
    created_by: Option<String>,
}

pub async fn list_schools_handler(
    State(state): Shared,
    Query(query): Query<SchoolQuery>,
) -> Result<Json<Vec<School>>, AppError> {
    let schools = state.db.with_conn(|conn| schools::list(conn, query.limit))?;

    Ok(Json(schools))
}

pub async fn get_school_handler(
    State(state): Shared,
    Path(id): Path<String>,
) -> Result<Json<School>, AppError> {
    Ok(Json(state.db.with_conn(|conn| schools::get(conn, &id))?))
}

pub async fn create_school_handler(
    State(state): Shared,
    caller: Caller,
    Json(payload): Json<CreateSchool>,
) -> Created<School> {
    let new = NewSchool {
        name: validation::school_name(&payload.name)?,
        location: validation::location(payload.location)?,
        created_by: caller.owner_for(payload.created_by)?,
    };

    created(state.db.with_tx(|tx| schools::insert(tx, &caller, new))?)
}

pub async fn update_school_handler(
    State(state): Shared,
    caller: Caller,
    Path(id): Path<String>,
    Json(payload): Json<SchoolChanges>,
) -> Result<Json<School>, AppError> {
    let changes = SchoolChanges {
        name: payload
            .name
            .as_deref()
            .map(validation::school_name)
            .transpose()?,
        location: validation::location(payload.location)?,
    };

    Ok(Json(state.db.with_tx(|tx| schools::update(tx, &caller, &id, changes))?))
}

pub async fn delete_school_handler(
    State(state): Shared,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.db.with_tx(|tx| schools::delete(tx, &caller, &id))?;

    Ok(StatusCode::NO_CONTENT)
}

// Profiles

#[derive(Deserialize)]
pub struct CreateProfile {
    id: Option<String>,
    username: String,
    bio: Option<String>,
    avatar_url: Option<String>,
}

pub async fn create_profile_handler(
    State(state): Shared,
    caller: Caller,
    Json(payload): Json<CreateProfile>,
) -> Created<Profile> {
    let new = NewProfile {
        id: caller.owner_for(payload.id)?,
        username: validation::username(&payload.username)?,
        bio: validation::bio(payload.bio)?,
        avatar_url: validation::avatar_url(payload.avatar_url)?,
    };

    created(state.db.with_tx(|tx| profiles::insert(tx, &caller, new))?)
}

pub async fn get_profile_handler(
    State(state): Shared,
    Path(id): Path<String>,
) -> Result<Json<Profile>, AppError> {
    Ok(Json(state.db.with_conn(|conn| profiles::get(conn, &id))?))
}

pub async fn update_profile_handler(
    State(state): Shared,
    caller: Caller,
    Path(id): Path<String>,
    Json(payload): Json<ProfileChanges>,
) -> Result<Json<Profile>, AppError> {
    let changes = ProfileChanges {
        username: payload
            .username
            .as_deref()
            .map(validation::username)
            .transpose()?,
        bio: validation::bio(payload.bio)?,
        avatar_url: validation::avatar_url(payload.avatar_url)?,
    };

    Ok(Json(state.db.with_tx(|tx| profiles::update(tx, &caller, &id, changes))?))
}

pub async fn profile_schools_handler(
    State(state): Shared,
    Path(id): Path<String>,
) -> Result<Json<Vec<UserSchool>>, AppError> {
    Ok(Json(state.db.with_conn(|conn| user_schools::list_for_user(conn, &id))?))
}

// User schools

#[derive(Deserialize)]
pub struct CreateUserSchool {
    school_id: String,
    status: String,
    user_id: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateUserSchool {
    status: String,
}

pub async fn create_user_school_handler(
    State(state): Shared,
    caller: Caller,
    Json(payload): Json<CreateUserSchool>,
) -> Created<UserSchool> {
    let new = NewUserSchool {
        user_id: caller.owner_for(payload.user_id)?,
        school_id: payload.school_id,
        status: payload.status.parse()?,
    };

    created(state.db.with_tx(|tx| user_schools::insert(tx, &caller, new))?)
}

pub async fn update_user_school_handler(
    State(state): Shared,
    caller: Caller,
    Path(id): Path<String>,
    Json(payload): Json<UpdateUserSchool>,
) -> Result<Json<UserSchool>, AppError> {
    let status = payload.status.parse()?;

    Ok(Json(state.db.with_tx(|tx| user_schools::update(tx, &caller, &id, status))?))
}

pub async fn delete_user_school_handler(
    State(state): Shared,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.db.with_tx(|tx| user_schools::delete(tx, &caller, &id))?;

    Ok(StatusCode::NO_CONTENT)
}

// Posts

#[derive(Deserialize)]
pub struct PostQuery {
    school_id: Option<String>,
    user_id: Option<String>,
    post_type: Option<String>,
    limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct CreatePost {
    school_id: String,
    title: String,
    content: String,
    post_type: String,
    user_id: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdatePost {
    title: Option<String>,
    content: Option<String>,
    post_type: Option<String>,
}

pub async fn list_posts_handler(
    State(state): Shared,
    Query(query): Query<PostQuery>,
) -> Result<Json<Vec<Post>>, AppError> {
    let filter = PostFilter {
        school_id: query.school_id,
        user_id: query.user_id,
        post_type: query.post_type.as_deref().map(str::parse).transpose()?,
        limit: query.limit,
    };

    Ok(Json(state.db.with_conn(|conn| posts::list(conn, &filter))?))
}

pub async fn get_post_handler(
    State(state): Shared,
    Path(id): Path<String>,
) -> Result<Json<Post>, AppError> {
    Ok(Json(state.db.with_conn(|conn| posts::get(conn, &id))?))
}

pub async fn create_post_handler(
    State(state): Shared,
    caller: Caller,
    Json(payload): Json<CreatePost>,
) -> Created<Post> {
    let new = NewPost {
        user_id: caller.owner_for(payload.user_id)?,
        school_id: payload.school_id,
        title: validation::post_title(&payload.title)?,
        content: validation::post_content(&payload.content)?,
        post_type: payload.post_type.parse()?,
    };

    created(state.db.with_tx(|tx| posts::insert(tx, &caller, new))?)
}

pub async fn update_post_handler(
    State(state): Shared,
    caller: Caller,
    Path(id): Path<String>,
    Json(payload): Json<UpdatePost>,
) -> Result<Json<Post>, AppError> {
    let changes = PostChanges {
        title: payload.title.as_deref().map(validation::post_title).transpose()?,
        content: payload
            .content
            .as_deref()
            .map(validation::post_content)
            .transpose()?,
        post_type: payload.post_type.as_deref().map(str::parse).transpose()?,
    };

    Ok(Json(state.db.with_tx(|tx| posts::update(tx, &caller, &id, changes))?))
}

pub async fn delete_post_handler(
    State(state): Shared,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.db.with_tx(|tx| posts::delete(tx, &caller, &id))?;

    Ok(StatusCode::NO_CONTENT)
}

// Comments

#[derive(Deserialize)]
pub struct CreateComment {
    content: String,
    user_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateComment {
    content: String,
}

pub async fn list_comments_handler(
    State(state): Shared,
    Path(post_id): Path<String>,
) -> Result<Json<Vec<Comment>>, AppError> {
    Ok(Json(state.db.with_conn(|conn| comments::list_for_post(conn, &post_id))?))
}

pub async fn create_comment_handler(
    State(state): Shared,
    caller: Caller,
    Path(post_id): Path<String>,
    Json(payload): Json<CreateComment>,
) -> Created<Comment> {
    let new = NewComment {
        post_id,
        user_id: caller.owner_for(payload.user_id)?,
        content: validation::comment(&payload.content)?,
    };

    created(state.db.with_tx(|tx| comments::insert(tx, &caller, new))?)
}

pub async fn update_comment_handler(
    State(state): Shared,
    caller: Caller,
    Path(id): Path<String>,
    Json(payload): Json<UpdateComment>,
) -> Result<Json<Comment>, AppError> {
    let content = validation::comment(&payload.content)?;

    Ok(Json(state.db.with_tx(|tx| comments::update(tx, &caller, &id, &content))?))
}

pub async fn delete_comment_handler(
    State(state): Shared,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.db.with_tx(|tx| comments::delete(tx, &caller, &id))?;

    Ok(StatusCode::NO_CONTENT)
}

// Votes

#[derive(Deserialize)]
pub struct VoteBody {
    vote_type: String,
    user_id: Option<String>,
}

pub async fn list_votes_handler(
    State(state): Shared,
    Path(post_id): Path<String>,
) -> Result<Json<Vec<Vote>>, AppError> {
    Ok(Json(state.db.with_conn(|conn| votes::list_for_post(conn, &post_id))?))
}

/// Strict insert; a repeat vote on the same post is a conflict.
pub async fn create_vote_handler(
    State(state): Shared,
    caller: Caller,
    Path(post_id): Path<String>,
    Json(payload): Json<VoteBody>,
) -> Created<Vote> {
    let new = NewVote {
        post_id,
        user_id: caller.owner_for(payload.user_id)?,
        vote_type: payload.vote_type.parse()?,
    };

    created(state.db.with_tx(|tx| votes::insert(tx, &caller, new))?)
}

/// Inserts the caller's vote or changes their existing one.
pub async fn cast_vote_handler(
    State(state): Shared,
    caller: Caller,
    Path(post_id): Path<String>,
    Json(payload): Json<VoteBody>,
) -> Result<Json<Vote>, AppError> {
    let vote_type = payload.vote_type.parse()?;

    Ok(Json(state.db.with_tx(|tx| votes::cast(tx, &caller, &post_id, vote_type))?))
}

pub async fn retract_vote_handler(
    State(state): Shared,
    caller: Caller,
    Path(post_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let removed = state.db.with_tx(|tx| votes::retract(tx, &caller, &post_id))?;

    Ok(if removed {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    })
}

pub async fn update_vote_handler(
    State(state): Shared,
    caller: Caller,
    Path(id): Path<String>,
    Json(payload): Json<VoteBody>,
) -> Result<Json<Vote>, AppError> {
    let vote_type = payload.vote_type.parse()?;

    Ok(Json(state.db.with_tx(|tx| votes::update(tx, &caller, &id, vote_type))?))
}

pub async fn delete_vote_handler(
    State(state): Shared,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.db.with_tx(|tx| votes::delete(tx, &caller, &id))?;

    Ok(StatusCode::NO_CONTENT)
}
