//! Per-request database scope.
//!
//! [`db_scope`] gives every request its own [`RequestDb`] slot and tears it
//! down after the handler responds. Handlers reach the connection through
//! [`RequestDb::run`], which moves the blocking SQLite work off the runtime.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use flaskr_db::{ConnectionSettings, ConnectionSlot, Db, DbError};
use std::error::Error;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::api::ApiError;
use crate::AppState;

/// The database handle slot for one request, stored in request extensions.
///
/// Clones share the same slot. The connection opens on first use and is
/// closed by [`db_scope`] once the response is produced, or when the last
/// clone is dropped if the request is abandoned.
#[derive(Clone, Debug)]
pub struct RequestDb {
    slot: Arc<Mutex<ConnectionSlot>>,
}

impl RequestDb {
    pub fn new(settings: Arc<ConnectionSettings>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(ConnectionSlot::new(settings))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ConnectionSlot> {
        match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                // A handler panicked while holding the slot. The slot itself
                // is still consistent: it either holds a connection or not.
                tracing::error!("request database slot lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Runs `f` against this request's connection, opening it if needed.
    ///
    /// Blocks the calling thread; async handlers should use [`run`](Self::run).
    pub fn with_db<T, F>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Db) -> Result<T, DbError>,
    {
        let mut slot = self.lock();
        let db = slot.acquire()?;
        f(db)
    }

    /// Runs `f` against this request's connection on the blocking pool.
    pub async fn run<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Db) -> Result<T, DbError> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || db.with_db(f))
            .await
            .map_err(|e| ApiError::InternalServerError(format!("task join error: {e}")))?
            .map_err(ApiError::from)
    }

    /// Whether a connection is currently open for this request.
    pub fn is_open(&self) -> bool {
        self.lock().is_open()
    }

    /// Closes this request's connection, if one was opened.
    pub fn teardown(&self, error: Option<&(dyn Error + 'static)>) {
        self.lock().release(error);
    }
}

/// Middleware giving every request its own [`RequestDb`].
///
/// The slot is inserted into request extensions before the inner service runs
/// and torn down after it responds, whether or not a connection was opened.
pub async fn db_scope(mut req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let settings = req
        .extensions()
        .get::<Arc<AppState>>()
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?
        .db_settings
        .clone();

    let db = RequestDb::new(settings);
    req.extensions_mut().insert(db.clone());

    let response = next.run(req).await;

    db.teardown(None);
    Ok(response)
}
