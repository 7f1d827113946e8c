use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use url::Url;

use super::{validate_collection, validate_key, Document, DocumentStore, FieldValue, StoreError};
use crate::google::{GoogleClient, GoogleError};

/// Cloud Firestore in production.
pub const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com/";

const DEFAULT_DATABASE: &str = "(default)";

#[derive(Serialize)]
struct CommitRequest {
    writes: Vec<Write>,
}

/// A single `update` write.
///
/// Without an `updateMask`, Firestore replaces the entire document.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Write {
    update: EncodedDocument,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    update_transforms: Vec<FieldTransform>,
}

#[derive(Serialize)]
struct EncodedDocument {
    name: String,
    fields: BTreeMap<String, Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FieldTransform {
    field_path: String,
    set_to_server_value: &'static str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitResponse {
    #[serde(default)]
    commit_time: Option<String>,
}

/// Writes documents through Firestore's REST `commit` endpoint.
///
/// We use `commit` rather than a plain `PATCH` on the document because
/// server timestamps are only expressible as field transforms.
pub struct FirestoreClient {
    google: Arc<GoogleClient>,
    base_url: Url,
    project_id: String,
}

impl FirestoreClient {
    pub fn new(google: Arc<GoogleClient>, base_url: Url, project_id: impl Into<String>) -> Self {
        Self {
            google,
            base_url,
            project_id: project_id.into(),
        }
    }

    fn database_path(&self) -> String {
        format!("projects/{}/databases/{DEFAULT_DATABASE}", self.project_id)
    }

    fn commit_endpoint(&self) -> Result<Url, GoogleError> {
        Ok(self
            .base_url
            .join(&format!("v1/{}/documents:commit", self.database_path()))?)
    }

    fn build_write(&self, collection: &str, key: &str, fields: &Document) -> Write {
        let mut encoded = BTreeMap::new();
        let mut update_transforms = Vec::new();

        for (name, value) in fields {
            match encode_value(value) {
                Some(encoded_value) => {
                    encoded.insert(name.clone(), encoded_value);
                }
                None => update_transforms.push(FieldTransform {
                    field_path: quote_field_path(name),
                    set_to_server_value: "REQUEST_TIME",
                }),
            }
        }

        Write {
            update: EncodedDocument {
                name: format!(
                    "{}/documents/{collection}/{key}",
                    self.database_path()
                ),
                fields: encoded,
            },
            update_transforms,
        }
    }
}

/// Encodes a field into Firestore's typed JSON representation.
/// Server timestamps have no literal encoding; they become transforms instead.
fn encode_value(value: &FieldValue) -> Option<Value> {
    match value {
        FieldValue::Null => Some(json!({ "nullValue": null })),
        FieldValue::String(value) => Some(json!({ "stringValue": value })),
        FieldValue::ServerTimestamp => None,
    }
}

/// Field paths need backticks unless they're plain identifiers.
fn quote_field_path(name: &str) -> String {
    let mut chars = name.chars();
    let simple = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        name.to_string()
    } else {
        format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

#[async_trait]
impl DocumentStore for FirestoreClient {
    async fn set_document(
        &self,
        collection: &str,
        key: &str,
        fields: &Document,
    ) -> Result<(), StoreError> {
        validate_collection(collection)?;
        validate_key(key)?;

        let request = CommitRequest {
            writes: vec![self.build_write(collection, key, fields)],
        };
        let response: CommitResponse = self
            .google
            .post_json(self.commit_endpoint()?, &request)
            .await?;

        tracing::debug!(
            collection,
            key,
            commit_time = response.commit_time.as_deref().unwrap_or("unknown"),
            "committed document"
        );
        Ok(())
    }
}
