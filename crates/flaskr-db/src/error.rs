//! Error types for the database layer.

use std::path::PathBuf;
use std::string::FromUtf8Error;
use thiserror::Error;

use crate::convert::ConversionError;

/// Errors that can occur while opening, bootstrapping, or querying the
/// database.
#[derive(Debug, Error)]
pub enum DbError {
    /// The configured storage file could not be opened.
    #[error("failed to open database at '{}': {source}", path.display())]
    Open {
        /// The configured storage path.
        path: PathBuf,
        /// The underlying SQLite error.
        source: rusqlite::Error,
    },

    /// A bundled resource is missing or unreadable.
    #[error("failed to read resource '{}': {source}", path.display())]
    ResourceRead {
        /// Full path of the resource.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A bundled resource is not valid UTF-8.
    #[error("resource '{}' is not valid UTF-8: {source}", path.display())]
    ResourceDecode {
        /// Full path of the resource.
        path: PathBuf,
        /// The decoding error.
        source: FromUtf8Error,
    },

    /// A statement in a SQL script failed.
    #[error("script execution failed: {0}")]
    Script(rusqlite::Error),

    /// A statement or query failed.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A column value could not be converted to its declared type.
    #[error("failed to convert column '{column}' ({decl_type}): {source}")]
    Conversion {
        /// The result column name.
        column: String,
        /// The declared type of the column, or `?` when undeclared.
        decl_type: String,
        /// The conversion failure.
        source: ConversionError,
    },
}

impl DbError {
    /// Returns the underlying SQLite error, if this error carries one.
    pub fn sqlite_error(&self) -> Option<&rusqlite::Error> {
        match self {
            Self::Open { source, .. } => Some(source),
            Self::Script(e) | Self::Sqlite(e) => Some(e),
            _ => None,
        }
    }

    /// Whether this error is a `UNIQUE` constraint violation.
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self.sqlite_error(),
            Some(rusqlite::Error::SqliteFailure(err, _))
                if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        )
    }
}
