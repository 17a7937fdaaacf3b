//! API handlers for the blog.

use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use flaskr_db::{DbError, Record, Value};
use serde::Serialize;
use thiserror::Error;

use crate::middleware::RequestDb;

const POST_COLUMNS: &str = "SELECT p.id, title, body, created, author_id, username \
     FROM post p JOIN user u ON p.author_id = u.id";

/// A blog post with its author's username.
///
/// `created` is the decoded timestamp, either naive or offset-aware as
/// stored; it serializes as ISO-8601 text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub created: Value,
    pub author_id: i64,
    pub username: String,
}

impl Post {
    fn from_record(record: &Record) -> Result<Self, ApiError> {
        let int = |name: &str| {
            record
                .get(name)
                .and_then(|v| v.as_i64())
                .ok_or_else(|| missing_column(name))
        };
        let text = |name: &str| {
            record
                .get(name)
                .and_then(|v| v.as_str())
                .map(str::to_owned)
                .ok_or_else(|| missing_column(name))
        };

        Ok(Self {
            id: int("id")?,
            title: text("title")?,
            body: text("body")?,
            created: record
                .get("created")
                .filter(|v| matches!(v, Value::DateTime(_) | Value::DateTimeOffset(_)))
                .cloned()
                .ok_or_else(|| missing_column("created"))?,
            author_id: int("author_id")?,
            username: text("username")?,
        })
    }
}

fn missing_column(name: &str) -> ApiError {
    ApiError::InternalServerError(format!("post row has no usable '{name}' column"))
}

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        tracing::error!("database error: {}", e);
        ApiError::InternalServerError(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

/// Handler for `GET /api/posts`. Newest first.
pub async fn list_posts_handler(
    Extension(db): Extension<RequestDb>,
) -> Result<Json<Vec<Post>>, ApiError> {
    let records = db
        .run(|db| db.query(&format!("{POST_COLUMNS} ORDER BY created DESC, p.id DESC"), []))
        .await?;

    let posts = records
        .iter()
        .map(Post::from_record)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(posts))
}

/// Handler for `GET /api/posts/{id}`.
pub async fn get_post_handler(
    Extension(db): Extension<RequestDb>,
    Path(id): Path<i64>,
) -> Result<Json<Post>, ApiError> {
    let record = db
        .run(move |db| db.query_one(&format!("{POST_COLUMNS} WHERE p.id = ?1"), [id]))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("post {id} does not exist")))?;

    Ok(Json(Post::from_record(&record)?))
}
