//! Flat key-value records used to persist fragments and machines between
//! the plan and apply phases

use crate::{FragmentsError, FragmentsResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// String-keyed record
pub type Record = serde_json::Map<String, Value>;

/// Serialize a value that maps to a JSON object into a [`Record`]
pub fn to_record<T: Serialize>(value: &T) -> FragmentsResult<Record> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(FragmentsError::Serialization(format!(
            "expected an object, got {}",
            other
        ))),
    }
}

/// Deserialize a value from a [`Record`]
pub fn from_record<T: DeserializeOwned>(record: &Record) -> FragmentsResult<T> {
    Ok(serde_json::from_value(Value::Object(record.clone()))?)
}
