//! Declared-type conversion for values read from SQLite.
//!
//! A [`Converters`] table maps the first word of a column's declared type
//! (case-insensitive) to a parser that receives the stored value's bytes.
//! The default table carries a single rule: `timestamp` parses ISO-8601 text
//! into a structured date/time.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use rusqlite::types::ValueRef;
use serde::{Serialize, Serializer};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Declared type tag handled by [`parse_timestamp`] in the default table.
pub const TIMESTAMP_TAG: &str = "timestamp";

/// A decoded column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    /// A date/time without offset information.
    DateTime(NaiveDateTime),
    /// A date/time carrying a UTC offset.
    DateTimeOffset(DateTime<FixedOffset>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Decodes a raw SQLite value without any declared-type conversion.
    pub(crate) fn from_raw(raw: ValueRef<'_>) -> Result<Self, ConversionError> {
        Ok(match raw {
            ValueRef::Null => Self::Null,
            ValueRef::Integer(v) => Self::Integer(v),
            ValueRef::Real(v) => Self::Real(v),
            ValueRef::Text(bytes) => Self::Text(std::str::from_utf8(bytes)?.to_owned()),
            ValueRef::Blob(bytes) => Self::Blob(bytes.to_vec()),
        })
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Integer(v) => serializer.serialize_i64(*v),
            Self::Real(v) => serializer.serialize_f64(*v),
            Self::Text(v) => serializer.serialize_str(v),
            Self::Blob(v) => serializer.serialize_bytes(v),
            Self::DateTime(v) => v.serialize(serializer),
            Self::DateTimeOffset(v) => v.serialize(serializer),
        }
    }
}

/// Errors produced by a declared-type converter.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("value is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("invalid ISO-8601 date/time: {0:?}")]
    InvalidTimestamp(String),
}

/// A parser for one declared column type.
pub type Converter = Arc<dyn Fn(&[u8]) -> Result<Value, ConversionError> + Send + Sync>;

/// Table of declared-type converters, keyed by lower-cased type tag.
#[derive(Clone, Default)]
pub struct Converters {
    by_tag: HashMap<String, Converter>,
}

impl Converters {
    /// An empty table. Every column decodes to its raw storage class.
    pub fn new() -> Self {
        Self::default()
    }

    /// The table used by the blog: `timestamp` → [`parse_timestamp`].
    pub fn with_defaults() -> Self {
        let mut converters = Self::new();
        converters.register(TIMESTAMP_TAG, |bytes| {
            parse_timestamp(std::str::from_utf8(bytes)?)
        });
        converters
    }

    /// Registers `converter` for `tag`, replacing any existing rule.
    pub fn register<F>(&mut self, tag: &str, converter: F)
    where
        F: Fn(&[u8]) -> Result<Value, ConversionError> + Send + Sync + 'static,
    {
        self.by_tag
            .insert(tag.to_ascii_lowercase(), Arc::new(converter));
    }

    /// Finds the converter for a column's full declared type, e.g.
    /// `TIMESTAMP NOT NULL` or `timestamp(6)`.
    pub fn lookup(&self, decl_type: &str) -> Option<&Converter> {
        let tag = decl_type_tag(decl_type);
        if tag.is_empty() {
            return None;
        }
        self.by_tag.get(&tag.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.by_tag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }
}

impl fmt::Debug for Converters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<&str> = self.by_tag.keys().map(String::as_str).collect();
        tags.sort_unstable();
        f.debug_struct("Converters").field("tags", &tags).finish()
    }
}

/// First word of a declared type, stopping at whitespace or `(`.
fn decl_type_tag(decl_type: &str) -> &str {
    decl_type
        .trim_start()
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or("")
}

/// Bytes handed to a converter for a non-null raw value.
pub(crate) fn converter_input(raw: ValueRef<'_>) -> Cow<'_, [u8]> {
    match raw {
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => Cow::Borrowed(bytes),
        ValueRef::Integer(v) => Cow::Owned(v.to_string().into_bytes()),
        ValueRef::Real(v) => Cow::Owned(v.to_string().into_bytes()),
        ValueRef::Null => Cow::Borrowed(&[]),
    }
}

/// Parses ISO-8601 date/time text.
///
/// The date is `YYYY-MM-DD` or `YYYYMMDD`. It may stand alone (midnight) or
/// be followed by `T` or a space and a time of `HH`, `HH:MM` or
/// `HH:MM:SS[.fraction]`, or the basic forms `HHMM` and `HHMMSS[.fraction]`.
/// The time may carry a `Z` suffix or an offset of `±HH`, `±HH:MM`,
/// `±HH:MM:SS` or their basic forms. Values with an offset become
/// [`Value::DateTimeOffset`], all others [`Value::DateTime`].
pub fn parse_timestamp(text: &str) -> Result<Value, ConversionError> {
    let text = text.trim();
    parse_iso8601(text).ok_or_else(|| ConversionError::InvalidTimestamp(text.to_string()))
}

fn parse_iso8601(text: &str) -> Option<Value> {
    let (date, time) = match text.find(|c: char| matches!(c, 'T' | 't' | ' ')) {
        Some(idx) => (&text[..idx], Some(&text[idx + 1..])),
        None => (text, None),
    };
    let date = parse_date(date)?;
    let Some(time) = time else {
        return Some(Value::DateTime(date.and_time(NaiveTime::MIN)));
    };

    let (clock, offset) = match time.find(|c: char| matches!(c, 'Z' | 'z' | '+' | '-')) {
        Some(idx) => (&time[..idx], Some(parse_offset(&time[idx..])?)),
        None => (time, None),
    };
    let local = date.and_time(parse_clock(clock)?);
    match offset {
        Some(offset) => offset
            .from_local_datetime(&local)
            .single()
            .map(Value::DateTimeOffset),
        None => Some(Value::DateTime(local)),
    }
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    let digits = match text.len() {
        10 if text.as_bytes()[4] == b'-' && text.as_bytes()[7] == b'-' => text.replace('-', ""),
        8 => text.to_string(),
        _ => return None,
    };
    if digits.len() != 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::from_ymd_opt(
        digits[..4].parse().ok()?,
        digits[4..6].parse().ok()?,
        digits[6..].parse().ok()?,
    )
}

fn parse_clock(text: &str) -> Option<NaiveTime> {
    let (hms, fraction) = match text.find(|c: char| c == '.' || c == ',') {
        Some(idx) => (&text[..idx], Some(&text[idx + 1..])),
        None => (text, None),
    };
    let (hour, minute, second, fields) = parse_hms(hms)?;

    let nanos = match fraction {
        None => 0,
        // A fraction only follows whole seconds.
        Some(fraction) if fields == 3 && !fraction.is_empty() => {
            if !fraction.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let mut padded: String = fraction.chars().take(9).collect();
            while padded.len() < 9 {
                padded.push('0');
            }
            padded.parse().ok()?
        }
        Some(_) => return None,
    };
    NaiveTime::from_hms_nano_opt(hour, minute, second, nanos)
}

fn parse_offset(text: &str) -> Option<FixedOffset> {
    if text.eq_ignore_ascii_case("z") {
        return FixedOffset::east_opt(0);
    }
    let sign = match text.as_bytes().first()? {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    let (hours, minutes, seconds, _) = parse_hms(&text[1..])?;
    if hours > 23 || minutes > 59 || seconds > 59 {
        return None;
    }
    let total = i32::try_from(hours * 3600 + minutes * 60 + seconds).ok()?;
    FixedOffset::east_opt(sign * total)
}

/// Splits `HH[:MM[:SS]]` or `HH[MM[SS]]` into its fields. Missing fields are
/// zero; the last element is how many fields were present.
fn parse_hms(text: &str) -> Option<(u32, u32, u32, usize)> {
    let digits = if text.contains(':') {
        let parts: Vec<&str> = text.split(':').collect();
        if parts.len() > 3 || parts.iter().any(|part| part.len() != 2) {
            return None;
        }
        parts.concat()
    } else {
        text.to_string()
    };
    if !matches!(digits.len(), 2 | 4 | 6) || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let field = |at: usize| -> Option<u32> {
        match digits.get(at..at + 2) {
            Some(pair) => pair.parse().ok(),
            None => Some(0),
        }
    };
    Some((field(0)?, field(2)?, field(4)?, digits.len() / 2))
}
