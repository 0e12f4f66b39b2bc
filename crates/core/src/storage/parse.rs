//! Database value parsing utilities
//!
//! Provides error-safe parsing of stored values.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::Error as SqlError;
use uuid::Uuid;

use crate::models::{BillKind, BillStatus, VoteValue};

fn conversion_error(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> SqlError {
    SqlError::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
struct UnknownValue {
    kind: &'static str,
    value: String,
}

/// Parse a UUID from a database string column
pub fn parse_uuid(s: &str) -> Result<Uuid, SqlError> {
    Uuid::parse_str(s).map_err(|e| conversion_error(0, e))
}

/// Parse a DateTime from an RFC3339 string
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, SqlError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(0, e))
}

/// Parse an optional DateTime from an RFC3339 string
pub fn parse_datetime_opt(s: Option<String>) -> Result<Option<DateTime<Utc>>, SqlError> {
    s.map(|s| parse_datetime(&s)).transpose()
}

/// Parse a calendar date (YYYY-MM-DD)
pub fn parse_date(s: &str) -> Result<NaiveDate, SqlError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| conversion_error(0, e))
}

pub fn parse_vote(s: &str) -> Result<VoteValue, SqlError> {
    VoteValue::parse(s).ok_or_else(|| {
        conversion_error(
            0,
            UnknownValue {
                kind: "vote",
                value: s.to_string(),
            },
        )
    })
}

pub fn parse_bill_status(s: &str) -> Result<BillStatus, SqlError> {
    BillStatus::parse(s).ok_or_else(|| {
        conversion_error(
            0,
            UnknownValue {
                kind: "bill status",
                value: s.to_string(),
            },
        )
    })
}

pub fn parse_bill_kind(s: &str) -> Result<BillKind, SqlError> {
    BillKind::parse(s).ok_or_else(|| {
        conversion_error(
            0,
            UnknownValue {
                kind: "bill type",
                value: s.to_string(),
            },
        )
    })
}

/// Decode a JSON text column
pub fn parse_json<T: serde::de::DeserializeOwned>(s: &str) -> Result<T, SqlError> {
    serde_json::from_str(s).map_err(|e| conversion_error(0, e))
}

/// Extension trait for converting rusqlite Results to Option
pub trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, SqlError>;
}

impl<T> OptionalExt<T> for Result<T, SqlError> {
    fn optional(self) -> Result<Option<T>, SqlError> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(SqlError::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
