use curriculum_core::model::UserId;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::repository::StorageError;

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn user_id_to_i64(user: UserId) -> Result<i64, StorageError> {
    i64::try_from(user.value()).map_err(|_| StorageError::Serialization("user_id overflow".into()))
}

/// Encode a document for a TEXT column.
pub(crate) fn to_document<T: Serialize>(value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(ser)
}

/// Decode a document read from a TEXT column.
pub(crate) fn from_document<T: DeserializeOwned>(raw: &str) -> Result<T, StorageError> {
    serde_json::from_str(raw).map_err(ser)
}
