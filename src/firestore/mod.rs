//! Writing profile documents into a managed document store.

mod rest;

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::google::GoogleError;

pub use rest::{FirestoreClient, DEFAULT_BASE_URL as DEFAULT_FIRESTORE_BASE_URL};

/// A single field within a document.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    String(String),
    /// Sentinel resolved by the store to its own clock at write time.
    ServerTimestamp,
}

impl FieldValue {
    /// A string field, or an explicit null when absent.
    pub fn optional(value: Option<&str>) -> Self {
        match value {
            Some(value) => FieldValue::String(value.to_string()),
            None => FieldValue::Null,
        }
    }

    #[cfg(test)]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(value) => Some(value),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

/// A document's fields, keyed by field name.
pub type Document = BTreeMap<String, FieldValue>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid collection {0:?}")]
    InvalidCollection(String),
    #[error("invalid document key {0:?}")]
    InvalidKey(String),
    #[error(transparent)]
    Google(#[from] GoogleError),
}

/// A single path segment: not empty, not `.`/`..`, and free of `/`.
fn is_segment(id: &str) -> bool {
    !(id.is_empty() || id == "." || id == ".." || id.contains('/'))
}

pub fn validate_key(key: &str) -> Result<(), StoreError> {
    if !is_segment(key) {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Only top-level collections are addressable, so `users/abc/shadow` is rejected
/// rather than treated as a subcollection.
pub fn validate_collection(collection: &str) -> Result<(), StoreError> {
    if !is_segment(collection) {
        return Err(StoreError::InvalidCollection(collection.to_string()));
    }
    Ok(())
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Writes `fields` as the entire document at `collection/key`.
    ///
    /// Anything previously stored at that key is replaced wholesale, not merged.
    async fn set_document(
        &self,
        collection: &str,
        key: &str,
        fields: &Document,
    ) -> Result<(), StoreError>;
}
