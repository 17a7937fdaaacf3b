//! The per-request handle slot.

use std::error::Error;
use std::sync::Arc;

use crate::connection::{ConnectionSettings, Db};
use crate::error::DbError;

/// Observable state of a [`ConnectionSlot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Empty,
    Open,
}

/// Holds at most one open [`Db`] for the lifetime of a single request.
///
/// The connection is opened lazily by [`acquire`](Self::acquire) and closed
/// by [`release`](Self::release). Dropping the slot releases it, so a request
/// that is abandoned mid-flight still closes its connection.
#[derive(Debug)]
pub struct ConnectionSlot {
    settings: Arc<ConnectionSettings>,
    db: Option<Db>,
}

impl ConnectionSlot {
    /// A new, empty slot.
    pub fn new(settings: Arc<ConnectionSettings>) -> Self {
        Self { settings, db: None }
    }

    pub fn state(&self) -> SlotState {
        if self.db.is_some() {
            SlotState::Open
        } else {
            SlotState::Empty
        }
    }

    pub fn is_open(&self) -> bool {
        self.state() == SlotState::Open
    }

    /// Returns the slot's connection, opening it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Open`] if the configured storage cannot be opened.
    /// The slot stays empty in that case.
    pub fn acquire(&mut self) -> Result<&Db, DbError> {
        let db = match self.db.take() {
            Some(db) => db,
            None => Db::open(&self.settings)?,
        };
        Ok(&*self.db.insert(db))
    }

    /// Closes and removes the slot's connection, if any.
    ///
    /// `error` is the failure that ended the request, when there was one. It
    /// is only logged. Close failures are logged and otherwise ignored; the
    /// slot is always empty afterwards.
    pub fn release(&mut self, error: Option<&(dyn Error + 'static)>) {
        if let Some(error) = error {
            tracing::debug!(%error, "releasing database connection after failed request");
        }

        let Some(db) = self.db.take() else {
            return;
        };

        if let Err(e) = db.close() {
            tracing::warn!(
                path = %self.settings.path.display(),
                "failed to close database connection: {}",
                e
            );
        }
    }
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.release(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_settings(dir: &tempfile::TempDir) -> Arc<ConnectionSettings> {
        Arc::new(ConnectionSettings::new(dir.path().join("flaskr.sqlite")))
    }

    #[test]
    fn acquire_returns_the_same_handle_until_release() {
        let dir = tempfile::tempdir().unwrap();
        let mut slot = ConnectionSlot::new(temp_settings(&dir));
        assert_eq!(slot.state(), SlotState::Empty);

        let first: *const Db = slot.acquire().unwrap();
        let second: *const Db = slot.acquire().unwrap();
        assert!(std::ptr::eq(first, second));
        assert_eq!(slot.state(), SlotState::Open);
    }

    #[test]
    fn release_then_acquire_opens_a_new_connection() {
        let dir = tempfile::tempdir().unwrap();
        let mut slot = ConnectionSlot::new(temp_settings(&dir));

        slot.acquire()
            .unwrap()
            .execute_script("CREATE TEMP TABLE marker (x INTEGER);")
            .unwrap();
        slot.release(None);
        assert_eq!(slot.state(), SlotState::Empty);

        // Temporary tables are private to the connection that created them.
        let db = slot.acquire().unwrap();
        let found = db
            .query_one(
                "SELECT name FROM sqlite_temp_master WHERE name = 'marker'",
                [],
            )
            .unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn release_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut slot = ConnectionSlot::new(temp_settings(&dir));

        slot.release(None);
        slot.release(None);
        slot.acquire().unwrap();
        slot.release(None);
        slot.release(None);
        assert_eq!(slot.state(), SlotState::Empty);
    }

    #[test]
    fn release_accepts_the_request_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut slot = ConnectionSlot::new(temp_settings(&dir));
        slot.acquire().unwrap();

        let error = std::io::Error::other("handler failed");
        slot.release(Some(&error));
        assert!(!slot.is_open());
    }

    #[test]
    fn acquire_fails_for_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("flaskr.sqlite");
        let mut slot = ConnectionSlot::new(Arc::new(ConnectionSettings::new(&path)));

        let err = slot.acquire().unwrap_err();
        match err {
            DbError::Open { path: failed, .. } => assert_eq!(failed, path),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(slot.state(), SlotState::Empty);
    }

    #[test]
    fn writes_are_visible_to_the_next_request() {
        let dir = tempfile::tempdir().unwrap();
        let settings = temp_settings(&dir);

        {
            let mut slot = ConnectionSlot::new(Arc::clone(&settings));
            slot.acquire()
                .unwrap()
                .execute_script("CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (42);")
                .unwrap();
        }

        let mut slot = ConnectionSlot::new(settings);
        let record = slot
            .acquire()
            .unwrap()
            .query_one("SELECT x FROM t", [])
            .unwrap()
            .unwrap();
        assert_eq!(record["x"].as_i64(), Some(42));
    }
}
