//! Schema bootstrap from the bundled `schema.sql` resource.

use std::path::{Path, PathBuf};

use crate::error::DbError;
use crate::slot::ConnectionSlot;

/// File name of the schema script under the resource root.
pub const SCHEMA_RESOURCE: &str = "schema.sql";

/// The application's resource directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resources {
    root: PathBuf,
}

impl Resources {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full path of the resource called `name`.
    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Reads a resource and decodes it as UTF-8.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::ResourceRead`] if the file is missing or
    /// unreadable, and [`DbError::ResourceDecode`] if it is not UTF-8.
    pub fn read_text(&self, name: &str) -> Result<String, DbError> {
        let path = self.path(name);
        let bytes = std::fs::read(&path).map_err(|source| DbError::ResourceRead {
            path: path.clone(),
            source,
        })?;
        String::from_utf8(bytes).map_err(|source| DbError::ResourceDecode { path, source })
    }
}

/// Acquires the slot's connection and runs the schema script against it.
///
/// The bundled script drops existing tables before recreating them, so any
/// stored data is lost. The script is not wrapped in a transaction; if a
/// statement fails, the statements before it remain applied.
///
/// # Errors
///
/// Propagates storage-open, resource-read, and script-execution failures
/// unchanged.
pub fn initialize_schema(slot: &mut ConnectionSlot, resources: &Resources) -> Result<(), DbError> {
    let db = slot.acquire()?;
    let script = resources.read_text(SCHEMA_RESOURCE)?;

    tracing::info!(
        path = %db.path().display(),
        resource = %resources.path(SCHEMA_RESOURCE).display(),
        "initializing database schema"
    );

    db.execute_script(&script)
}
