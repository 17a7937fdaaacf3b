use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use flaskr_db::{ConnectionSettings, Resources};
use flaskr_server::{app, init_db, AppState};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

fn bundled_resources() -> Resources {
    Resources::new(std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("resources"))
}

fn seeded_state(dir: &tempfile::TempDir) -> AppState {
    let state = AppState {
        db_settings: Arc::new(ConnectionSettings::new(dir.path().join("flaskr.sqlite"))),
        resources: bundled_resources(),
    };
    init_db(&state).expect("failed to initialize database");

    let conn = rusqlite::Connection::open(&state.db_settings.path).unwrap();
    conn.execute_batch(
        "INSERT INTO user (username, password) VALUES ('alice', 'x'), ('bob', 'y');
         INSERT INTO post (author_id, created, title, body)
             VALUES (1, '2024-03-01 12:30:00', 'first', 'hello');
         INSERT INTO post (author_id, created, title, body)
             VALUES (2, '2024-03-02 08:00:00', 'second', 'world');",
    )
    .unwrap();

    state
}

async fn get_json(state: AppState, uri: &str) -> (StatusCode, Value) {
    let response = app(state)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn list_posts_returns_newest_first_with_decoded_timestamps() {
    let dir = tempfile::tempdir().unwrap();
    let (status, json) = get_json(seeded_state(&dir), "/api/posts").await;

    assert_eq!(status, StatusCode::OK);
    let posts = json.as_array().expect("expected an array");
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0]["title"], "second");
    assert_eq!(posts[0]["username"], "bob");
    assert_eq!(posts[0]["created"], "2024-03-02T08:00:00");
    assert_eq!(posts[1]["title"], "first");
    assert_eq!(posts[1]["author_id"], 1);
}

#[tokio::test]
async fn get_post_by_id() {
    let dir = tempfile::tempdir().unwrap();
    let (status, json) = get_json(seeded_state(&dir), "/api/posts/1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["body"], "hello");
    assert_eq!(json["created"], "2024-03-01T12:30:00");
}

#[tokio::test]
async fn offset_timestamps_keep_their_offset() {
    let dir = tempfile::tempdir().unwrap();
    let state = seeded_state(&dir);
    let conn = rusqlite::Connection::open(&state.db_settings.path).unwrap();
    conn.execute(
        "INSERT INTO post (author_id, created, title, body)
             VALUES (1, '2024-03-03T09:15:00+05:30', 'third', 'abroad')",
        [],
    )
    .unwrap();
    drop(conn);

    let (status, json) = get_json(state, "/api/posts/3").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["created"], "2024-03-03T09:15:00+05:30");
}

#[tokio::test]
async fn missing_post_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let (status, json) = get_json(seeded_state(&dir), "/api/posts/99").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("99"));
}

#[tokio::test]
async fn unopenable_database_is_an_internal_error() {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState {
        db_settings: Arc::new(ConnectionSettings::new(
            dir.path().join("missing").join("flaskr.sqlite"),
        )),
        resources: bundled_resources(),
    };

    let (status, json) = get_json(state, "/api/posts").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["error"].as_str().unwrap().contains("failed to open database"));
}

#[tokio::test]
async fn health_does_not_open_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState {
        db_settings: Arc::new(ConnectionSettings::new(
            dir.path().join("missing").join("flaskr.sqlite"),
        )),
        resources: bundled_resources(),
    };

    let (status, json) = get_json(state, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}
