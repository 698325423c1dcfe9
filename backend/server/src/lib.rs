//! Documentation of a school review forum.
//!
//! Students list the schools they attend or attended, write pro/con/general posts about them,
//! comment and vote. Everything is stored in a single SQLite file.
//!
//!
//!
//! # General Infrastructure
//! - One binary serving both the JSON API under `/api` and the page view models
//! - SQLite holds identities, sessions and every forum table
//! - Row access is decided by [`policy`] for an explicit [`policy::Caller`] on every write
//! - Page routes are guarded, anonymous visitors are redirected to `/auth`
//!
//!
//!
//! # Sessions
//!
//! - Sign up / sign in returns an opaque token, also set as an `HttpOnly` cookie
//! - Only the sha256 of a token is stored, expired rows are purged hourly
//! - `Authorization: Bearer <token>` takes precedence over the cookie
//! - The service key (Docker secret `SCHOOLBOARD_SERVICE_KEY`) acts as the privileged role
//!
//!
//!
//! # Notes
//!
//! ## Profiles
//! Signing up creates the identity first. The profile is provisioned right after the identity
//! commits, so a provisioning failure never loses the account. Sign in provisions again for any
//! identity still missing one.
//!
//! ## Counts
//! Vote tallies, comment counts and per-type post counts are never stored. Views fetch the
//! rows and count them, which is plenty at forum scale.
//!
//!
//!
//! # Setup
//!
//! View current docs.
//! ```sh
//! cargo doc --open
//! ```
//!
//! Apply the schema without serving.
//! ```sh
//! cargo run -- migrate --database schoolboard.db
//! ```
//!
//! Serve.
//! ```sh
//! RUST_LOG=info cargo run -- --port 1111
//! ```

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    http::{
        HeaderValue, Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    middleware,
    routing::{delete, get, patch, post},
};
use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal, time::interval};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod policy;
pub mod routes;
pub mod session;
pub mod state;
pub mod triggers;
pub mod utils;
pub mod validation;
pub mod views;

use config::Config;
use database::Database;
use error::AppError;
use routes::{api, auth as auth_routes, pages};
use state::AppState;

const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

pub async fn start_server(config: Config) -> Result<(), AppError> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new(config)?;

    tokio::spawn(purge_sessions(state.clone()));

    info!("Starting server...");

    let app = app(state.clone())?;

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address)
        .await
        .map_err(|e| AppError::InternalError(Box::new(e)))?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::InternalError(Box::new(e)))?;

    info!("Server shut down");

    Ok(())
}

/// Applies the schema to the configured database and exits.
pub fn migrate(config: &Config) -> Result<(), AppError> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    Database::open(&config.database_path)?;
    info!("Schema up to date at {}", config.database_path.display());

    Ok(())
}

pub fn app(state: Arc<AppState>) -> Result<Router, AppError> {
    let origin: HeaderValue = state
        .config
        .cors_origin
        .parse()
        .map_err(|_| AppError::Config(format!("invalid CORS_ORIGIN '{}'", state.config.cors_origin)))?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    let guarded = Router::new()
        .route("/", get(pages::home_handler))
        .route("/profile", get(pages::own_profile_handler))
        .route("/profile/{id}", get(pages::profile_handler))
        .route("/create-post", get(pages::create_post_handler))
        .route("/school/{id}", get(pages::school_handler))
        .fallback(pages::not_found_handler)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session::require_session,
        ));

    Ok(Router::new()
        .route("/auth", get(pages::auth_page_handler))
        .nest("/api", api_routes())
        .merge(guarded)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state))
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/signup", post(auth_routes::sign_up_handler))
        .route("/auth/signin", post(auth_routes::sign_in_handler))
        .route("/auth/signout", post(auth_routes::sign_out_handler))
        .route("/auth/session", get(auth_routes::session_handler))
        .route("/auth/user", delete(auth_routes::delete_account_handler))
        .route(
            "/schools",
            get(api::list_schools_handler).post(api::create_school_handler),
        )
        .route(
            "/schools/{id}",
            get(api::get_school_handler)
                .patch(api::update_school_handler)
                .delete(api::delete_school_handler),
        )
        .route("/profiles", post(api::create_profile_handler))
        .route(
            "/profiles/{id}",
            get(api::get_profile_handler).patch(api::update_profile_handler),
        )
        .route("/profiles/{id}/schools", get(api::profile_schools_handler))
        .route("/user-schools", post(api::create_user_school_handler))
        .route(
            "/user-schools/{id}",
            patch(api::update_user_school_handler)
                .delete(api::delete_user_school_handler),
        )
        .route(
            "/posts",
            get(api::list_posts_handler).post(api::create_post_handler),
        )
        .route(
            "/posts/{id}",
            get(api::get_post_handler)
                .patch(api::update_post_handler)
                .delete(api::delete_post_handler),
        )
        .route(
            "/posts/{id}/comments",
            get(api::list_comments_handler).post(api::create_comment_handler),
        )
        .route(
            "/comments/{id}",
            patch(api::update_comment_handler).delete(api::delete_comment_handler),
        )
        .route(
            "/posts/{id}/votes",
            get(api::list_votes_handler)
                .post(api::create_vote_handler)
                .put(api::cast_vote_handler)
                .delete(api::retract_vote_handler),
        )
        .route(
            "/votes/{id}",
            patch(api::update_vote_handler).delete(api::delete_vote_handler),
        )
        .fallback(api::not_found_handler)
}

async fn purge_sessions(state: Arc<AppState>) {
    let mut ticker = interval(SESSION_PURGE_INTERVAL);

    loop {
        ticker.tick().await;

        match auth::purge_expired_sessions(&state.db) {
            Ok(0) => {}
            Ok(purged) => info!("Purged {purged} expired sessions"),
            Err(e) => error!("Session purge failed: {e}"),
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
