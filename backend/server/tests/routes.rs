use axum::{
    Router,
    body::Body,
    http::{
        HeaderMap, Request, StatusCode,
        header::{AUTHORIZATION, CONTENT_TYPE, LOCATION, SET_COOKIE},
    },
};
use http_body_util::BodyExt;
use schoolboard_server::{app, config::Config, database::Database, state::AppState};
use serde_json::{Value, json};
use tower::ServiceExt;

const SERVICE_KEY: &str = "service-secret";

fn server() -> Router {
    let config = Config {
        password_memory_kib: 64,
        service_key: Some(SERVICE_KEY.to_string()),
        ..Config::default()
    };
    let db = Database::open_in_memory().unwrap();

    app(AppState::with_database(config, db)).unwrap()
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, HeaderMap, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(AUTHORIZATION, format!("Bearer {token}"));
    }

    let request = match body {
        Some(body) => request
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    (status, headers, json)
}

/// Signs up and returns `(token, user id)`.
async fn sign_up(app: &Router, email: &str) -> (String, String) {
    let (status, _, body) = send(
        app,
        "POST",
        "/api/auth/signup",
        None,
        Some(json!({ "email": email, "password": "hunter22" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    (
        body["token"].as_str().unwrap().to_string(),
        body["user"]["id"].as_str().unwrap().to_string(),
    )
}

async fn create_school(app: &Router, token: &str, name: &str) -> String {
    let (status, _, body) = send(
        app,
        "POST",
        "/api/schools",
        Some(token),
        Some(json!({ "name": name, "location": "Springfield" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    body["id"].as_str().unwrap().to_string()
}

async fn create_post(app: &Router, token: &str, school_id: &str, post_type: &str) -> String {
    let (status, _, body) = send(
        app,
        "POST",
        "/api/posts",
        Some(token),
        Some(json!({
            "school_id": school_id,
            "title": format!("A {post_type} take"),
            "content": "Details here",
            "post_type": post_type,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_anonymous_pages_redirect_to_auth() {
    let app = server();

    for uri in ["/", "/profile", "/create-post", "/school/abc", "/no/such/page"] {
        let (status, headers, _) = send(&app, "GET", uri, None, None).await;

        assert_eq!(status, StatusCode::SEE_OTHER, "{uri}");
        assert_eq!(headers[LOCATION], "/auth", "{uri}");
    }

    let (status, _, _) = send(&app, "GET", "/auth", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_signed_in_pages() {
    let app = server();
    let (token, _) = sign_up(&app, "jane@example.com").await;

    let (status, headers, _) = send(&app, "GET", "/auth", Some(&token), None).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(headers[LOCATION], "/");

    let (status, _, body) = send(&app, "GET", "/", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["schools"], json!([]));
    assert_eq!(body["recent_posts"], json!([]));

    let (status, _, _) = send(&app, "GET", "/no/such/page", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_signup_provisions_profile_and_sets_cookie() {
    let app = server();

    let (status, headers, body) = send(
        &app,
        "POST",
        "/api/auth/signup",
        None,
        Some(json!({ "email": "jane.doe@example.com", "password": "hunter22" })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["profile"]["username"], "jane.doe");
    assert!(
        headers[SET_COOKIE]
            .to_str()
            .unwrap()
            .starts_with("session=")
    );

    let token = body["token"].as_str().unwrap();
    let (status, _, session) = send(&app, "GET", "/api/auth/session", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["profile"]["username"], "jane.doe");

    let (status, _, own) = send(&app, "GET", "/profile", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(own["is_own"], true);
}

#[tokio::test]
async fn test_sign_in_and_out() {
    let app = server();
    sign_up(&app, "jane@example.com").await;

    let (status, _, _) = send(
        &app,
        "POST",
        "/api/auth/signin",
        None,
        Some(json!({ "email": "jane@example.com", "password": "wrong-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, body) = send(
        &app,
        "POST",
        "/api/auth/signin",
        None,
        Some(json!({ "email": "JANE@example.com", "password": "hunter22" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap();

    let (status, _, _) = send(&app, "POST", "/api/auth/signout", Some(token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, headers, _) = send(&app, "GET", "/", Some(token), None).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(headers[LOCATION], "/auth");
}

#[tokio::test]
async fn test_policy_rejections_over_http() {
    let app = server();
    let (alice, _) = sign_up(&app, "alice@example.com").await;
    let (bob, _) = sign_up(&app, "bob@example.com").await;
    let school = create_school(&app, &alice, "Lincoln High").await;
    let post = create_post(&app, &alice, &school, "pro").await;

    let (status, _, body) = send(
        &app,
        "POST",
        "/api/posts",
        None,
        Some(json!({
            "school_id": school,
            "title": "Anonymous",
            "content": "Nope",
            "post_type": "general",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "{body}");

    let edit = json!({ "title": "Hijacked" });
    let (status, _, foreign) =
        send(&app, "PATCH", &format!("/api/posts/{post}"), Some(&bob), Some(edit.clone())).await;
    let (missing_status, _, missing) =
        send(&app, "PATCH", "/api/posts/does-not-exist", Some(&bob), Some(edit)).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(missing_status, StatusCode::FORBIDDEN);
    assert_eq!(foreign, missing);

    let (status, _, _) = send(&app, "DELETE", &format!("/api/schools/{school}"), Some(&alice), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, body) = send(&app, "GET", &format!("/api/posts/{post}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "A pro take");
}

#[tokio::test]
async fn test_service_key_bypasses_policies() {
    let app = server();
    let (alice, _) = sign_up(&app, "alice@example.com").await;
    let school = create_school(&app, &alice, "Lincoln High").await;
    create_post(&app, &alice, &school, "con").await;

    let (status, _, body) = send(
        &app,
        "PATCH",
        &format!("/api/schools/{school}"),
        Some(SERVICE_KEY),
        Some(json!({ "location": "Shelbyville" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["location"], "Shelbyville");

    let (status, _, _) =
        send(&app, "DELETE", &format!("/api/schools/{school}"), Some(SERVICE_KEY), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, _, posts) = send(&app, "GET", "/api/posts", None, None).await;
    assert_eq!(posts, json!([]));
}

#[tokio::test]
async fn test_votes_one_per_user() {
    let app = server();
    let (alice, _) = sign_up(&app, "alice@example.com").await;
    let school = create_school(&app, &alice, "Lincoln High").await;
    let post = create_post(&app, &alice, &school, "general").await;
    let votes = format!("/api/posts/{post}/votes");

    let upvote = json!({ "vote_type": "upvote" });
    let (status, _, _) = send(&app, "POST", &votes, Some(&alice), Some(upvote.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _, _) = send(&app, "POST", &votes, Some(&alice), Some(upvote)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _, body) = send(
        &app,
        "PUT",
        &votes,
        Some(&alice),
        Some(json!({ "vote_type": "downvote" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["vote_type"], "downvote");

    let (_, _, list) = send(&app, "GET", &votes, None, None).await;
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, _, _) = send(&app, "DELETE", &votes, Some(&alice), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _, _) = send(&app, "DELETE", &votes, Some(&alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_school_page_filters_by_type() {
    let app = server();
    let (alice, _) = sign_up(&app, "alice@example.com").await;
    let school = create_school(&app, &alice, "Lincoln High").await;
    create_post(&app, &alice, &school, "pro").await;
    create_post(&app, &alice, &school, "pro").await;
    create_post(&app, &alice, &school, "con").await;

    let (status, _, body) =
        send(&app, "GET", &format!("/school/{school}?type=pro"), Some(&alice), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["post_counts"], json!({ "pro": 2, "con": 1, "general": 0, "total": 3 }));
    assert_eq!(body["selected_type"], "pro");
    assert_eq!(body["posts"].as_array().unwrap().len(), 2);

    let (status, _, _) =
        send(&app, "GET", &format!("/school/{school}?type=rant"), Some(&alice), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_validation_and_unknown_api_path() {
    let app = server();
    let (alice, _) = sign_up(&app, "alice@example.com").await;

    let (status, _, body) = send(
        &app,
        "POST",
        "/api/schools",
        Some(&alice),
        Some(json!({ "name": "X" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    create_school(&app, &alice, "Lincoln High").await;
    let (status, _, _) = send(
        &app,
        "POST",
        "/api/schools",
        Some(&alice),
        Some(json!({ "name": "lincoln high" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _, body) = send(&app, "GET", "/api/nothing-here", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not found");
}

#[tokio::test]
async fn test_delete_account_cascades() {
    let app = server();
    let (alice, alice_id) = sign_up(&app, "alice@example.com").await;
    let school = create_school(&app, &alice, "Lincoln High").await;
    create_post(&app, &alice, &school, "pro").await;

    let (status, _, _) = send(&app, "DELETE", "/api/auth/user", Some(&alice), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _, _) = send(&app, "GET", &format!("/api/profiles/{alice_id}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, _, posts) = send(&app, "GET", "/api/posts", None, None).await;
    assert_eq!(posts, json!([]));

    let (status, _, body) = send(&app, "GET", &format!("/api/schools/{school}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["created_by"], Value::Null);
}

#[tokio::test]
async fn test_service_key_has_no_own_pages() {
    let app = server();

    for uri in ["/profile", "/create-post"] {
        let (status, _, _) = send(&app, "GET", uri, Some(SERVICE_KEY), None).await;

        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
    }

    let (status, _, _) = send(&app, "GET", "/", Some(SERVICE_KEY), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_comment_update_accepts_only_content() {
    let app = server();
    let (alice, _) = sign_up(&app, "alice@example.com").await;
    let (_, bob_id) = sign_up(&app, "bob@example.com").await;
    let school = create_school(&app, &alice, "Lincoln High").await;
    let post = create_post(&app, &alice, &school, "general").await;

    let (status, _, comment) = send(
        &app,
        "POST",
        &format!("/api/posts/{post}/comments"),
        Some(&alice),
        Some(json!({ "content": "First" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let uri = format!("/api/comments/{}", comment["id"].as_str().unwrap());

    let (status, _, _) = send(
        &app,
        "PATCH",
        &uri,
        Some(&alice),
        Some(json!({ "content": "Edited", "user_id": bob_id })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _, body) =
        send(&app, "PATCH", &uri, Some(&alice), Some(json!({ "content": "Edited" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "Edited");
    assert_eq!(body["user_id"], comment["user_id"]);
}
