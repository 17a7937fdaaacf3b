//! Opening SQLite connections and decoding their results.

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, Params, Row};
use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::convert::{converter_input, Converter, Converters, Value};
use crate::error::DbError;
use crate::record::Record;

/// Read-write, create if missing. URI filenames are not interpreted.
const OPEN_FLAGS: OpenFlags = OpenFlags::SQLITE_OPEN_READ_WRITE
    .union(OpenFlags::SQLITE_OPEN_CREATE)
    .union(OpenFlags::SQLITE_OPEN_NO_MUTEX);

/// How connections are opened.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// Path to the SQLite database file. `:memory:` opens a private
    /// in-memory database.
    pub path: PathBuf,

    /// Whether declared column types select a converter.
    pub detect_types: bool,

    /// Declared-type converters consulted when `detect_types` is set.
    pub converters: Converters,
}

impl ConnectionSettings {
    /// Settings for `path` with declared-type detection and the default
    /// converters.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            detect_types: true,
            converters: Converters::with_defaults(),
        }
    }

    /// Disables declared-type detection; values decode to their raw storage
    /// class.
    pub fn without_type_detection(mut self) -> Self {
        self.detect_types = false;
        self
    }

    /// Replaces the converter table.
    pub fn with_converters(mut self, converters: Converters) -> Self {
        self.converters = converters;
        self
    }
}

/// SQLite treats any filename starting with `file:` as a URI when URI
/// support is compiled in. Relative paths of that shape get a `./` prefix so
/// they always name a file.
fn literal_filename(path: &Path) -> Cow<'_, Path> {
    if path.is_relative() && path.as_os_str().as_encoded_bytes().starts_with(b"file:") {
        Cow::Owned(Path::new(".").join(path))
    } else {
        Cow::Borrowed(path)
    }
}

/// An open database handle.
///
/// Query results decode to [`Record`]s. When type detection is enabled,
/// columns whose declared type has a registered converter are passed through
/// it; a converter failure aborts the query with [`DbError::Conversion`].
pub struct Db {
    conn: Connection,
    path: PathBuf,
    converters: Option<Converters>,
}

impl Db {
    /// Opens (creating if needed) the database described by `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Open`] if SQLite cannot open the file, e.g. when
    /// its directory does not exist.
    pub fn open(settings: &ConnectionSettings) -> Result<Self, DbError> {
        let conn = Connection::open_with_flags(literal_filename(&settings.path), OPEN_FLAGS)
            .map_err(|source| DbError::Open {
                path: settings.path.clone(),
                source,
            })?;

        tracing::debug!(path = %settings.path.display(), "opened database connection");

        Ok(Self {
            conn,
            path: settings.path.clone(),
            converters: settings
                .detect_types
                .then(|| settings.converters.clone()),
        })
    }

    /// The path this handle was opened against.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The underlying connection, for operations not covered here.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Executes `sql` as a batch of statements.
    ///
    /// No transaction is opened around the batch: statements that ran before
    /// a failing one stay applied.
    pub fn execute_script(&self, sql: &str) -> Result<(), DbError> {
        self.conn.execute_batch(sql).map_err(DbError::Script)
    }

    /// Executes one statement, returning the number of changed rows.
    pub fn execute<P: Params>(&self, sql: &str, params: P) -> Result<usize, DbError> {
        Ok(self.conn.execute(sql, params)?)
    }

    /// Runs a query and decodes every row.
    pub fn query<P: Params>(&self, sql: &str, params: P) -> Result<Vec<Record>, DbError> {
        let mut stmt = self.conn.prepare(sql)?;
        let decoder = RowDecoder::new(&stmt, self.converters.as_ref());

        let mut rows = stmt.query(params)?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(decoder.decode(row)?);
        }
        Ok(records)
    }

    /// Runs a query and decodes its first row, if any.
    pub fn query_one<P: Params>(&self, sql: &str, params: P) -> Result<Option<Record>, DbError> {
        let mut stmt = self.conn.prepare(sql)?;
        let decoder = RowDecoder::new(&stmt, self.converters.as_ref());

        let mut rows = stmt.query(params)?;
        match rows.next()? {
            Some(row) => Ok(Some(decoder.decode(row)?)),
            None => Ok(None),
        }
    }

    /// Closes the connection, reporting any error SQLite raises.
    pub fn close(self) -> Result<(), DbError> {
        let path = self.path;
        self.conn.close().map_err(|(_, e)| DbError::Sqlite(e))?;
        tracing::debug!(path = %path.display(), "closed database connection");
        Ok(())
    }
}

impl fmt::Debug for Db {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Db")
            .field("path", &self.path)
            .field("converters", &self.converters)
            .finish_non_exhaustive()
    }
}

struct ColumnDecoder {
    decl_type: Option<String>,
    converter: Option<Converter>,
}

/// Per-statement column metadata, resolved once before stepping rows.
struct RowDecoder {
    names: Arc<[String]>,
    columns: Vec<ColumnDecoder>,
}

impl RowDecoder {
    fn new(stmt: &rusqlite::Statement<'_>, converters: Option<&Converters>) -> Self {
        let mut names = Vec::new();
        let mut columns = Vec::new();
        for column in stmt.columns() {
            let decl_type = column.decl_type().map(str::to_owned);
            let converter = match (converters, decl_type.as_deref()) {
                (Some(converters), Some(decl)) => converters.lookup(decl).cloned(),
                _ => None,
            };
            names.push(column.name().to_owned());
            columns.push(ColumnDecoder {
                decl_type,
                converter,
            });
        }
        Self {
            names: names.into(),
            columns,
        }
    }

    fn decode(&self, row: &Row<'_>) -> Result<Record, DbError> {
        let mut values = Vec::with_capacity(self.columns.len());
        for (idx, column) in self.columns.iter().enumerate() {
            let raw = row.get_ref(idx)?;
            let decoded = match &column.converter {
                Some(_) if matches!(raw, ValueRef::Null) => Ok(Value::Null),
                Some(convert) => convert(&converter_input(raw)),
                None => Value::from_raw(raw),
            };
            let value = decoded.map_err(|source| DbError::Conversion {
                column: self.names[idx].clone(),
                decl_type: column.decl_type.clone().unwrap_or_else(|| "?".to_string()),
                source,
            })?;
            values.push(value);
        }
        Ok(Record::new(Arc::clone(&self.names), values))
    }
}
