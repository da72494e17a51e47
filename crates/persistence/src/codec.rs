//! Column encoding helpers shared by the Scylla stores

use crate::error::PersistenceError;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub(crate) fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub(crate) fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
}

pub(crate) fn encode_json<T: Serialize>(value: &T) -> Result<String, PersistenceError> {
    Ok(serde_json::to_string(value)?)
}

/// Missing or empty columns decode to the type's default
pub(crate) fn decode_json<T: DeserializeOwned + Default>(
    raw: Option<String>,
) -> Result<T, PersistenceError> {
    match raw {
        Some(text) if !text.trim().is_empty() => serde_json::from_str(&text)
            .map_err(|e| PersistenceError::InvalidData(format!("bad json column: {}", e))),
        _ => Ok(T::default()),
    }
}
