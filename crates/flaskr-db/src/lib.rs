//! Database layer for the flaskr blog.
//!
//! Provides a request-scoped SQLite handle slot, declared-type value
//! conversion, name-addressable row decoding, and the `init-db` schema
//! bootstrap. Every table the blog uses is created by the bundled
//! `schema.sql` script.
//!
//! # Design decisions
//!
//! - **One connection per request**: a [`ConnectionSlot`] opens its
//!   connection lazily on first [`ConnectionSlot::acquire`] and closes it on
//!   [`ConnectionSlot::release`] (or drop). There is no pool.
//! - **Explicit converters**: declared-type parsers such as the `timestamp`
//!   rule travel inside [`ConnectionSettings`] instead of living in a
//!   process-wide registry.
//! - **Versionless schema**: `schema.sql` is read from the resource root at
//!   run time and executed as one batch. It drops and recreates its tables.

mod connection;
mod convert;
mod error;
mod record;
mod schema;
mod slot;

pub use connection::{ConnectionSettings, Db};
pub use convert::{parse_timestamp, ConversionError, Converter, Converters, Value, TIMESTAMP_TAG};
pub use error::DbError;
pub use record::Record;
pub use schema::{initialize_schema, Resources, SCHEMA_RESOURCE};
pub use slot::{ConnectionSlot, SlotState};
