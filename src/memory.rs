//! In-memory stand-ins for the identity service and document store.
//!
//! Both support fault injection, so the provisioner's failure paths can be
//! exercised without a network.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::firestore::{
    validate_collection, validate_key, Document, DocumentStore, FieldValue, StoreError,
};
use crate::google::GoogleError;
use crate::identity::{IdentityError, IdentityService, NewPrincipal, Principal};

/// How an injected fault behaves.
#[derive(Debug, Clone)]
pub enum Fault {
    /// Fail immediately with a 503 carrying this message.
    Unavailable(String),
    /// Never complete.
    Stall,
}

impl Fault {
    async fn trigger(&self) -> GoogleError {
        match self {
            Fault::Unavailable(message) => GoogleError::Api {
                status: StatusCode::SERVICE_UNAVAILABLE,
                message: message.clone(),
            },
            Fault::Stall => std::future::pending().await,
        }
    }
}

#[derive(Default)]
pub struct MemoryIdentityService {
    /// Principals keyed by uid.
    principals: Mutex<BTreeMap<String, NewPrincipal>>,
    create_fault: Option<Fault>,
    delete_fault: Option<Fault>,
    create_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl MemoryIdentityService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_create(mut self, fault: Fault) -> Self {
        self.create_fault = Some(fault);
        self
    }

    pub fn failing_delete(mut self, fault: Fault) -> Self {
        self.delete_fault = Some(fault);
        self
    }

    /// Seeds a principal directly, as though someone created it earlier.
    pub fn with_existing(self, new: NewPrincipal) -> Self {
        let uid = uuid::Uuid::new_v4().simple().to_string();
        self.principals.lock().unwrap().insert(uid, new);
        self
    }

    pub fn contains(&self, uid: &str) -> bool {
        self.principals.lock().unwrap().contains_key(uid)
    }

    pub fn len(&self) -> usize {
        self.principals.lock().unwrap().len()
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityService for MemoryIdentityService {
    async fn create_principal(&self, new: &NewPrincipal) -> Result<Principal, IdentityError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(fault) = &self.create_fault {
            return Err(fault.trigger().await.into());
        }

        let mut principals = self.principals.lock().unwrap();
        if principals.values().any(|existing| existing.email == new.email) {
            return Err(IdentityError::EmailExists(new.email.clone()));
        }

        let uid = uuid::Uuid::new_v4().simple().to_string();
        principals.insert(uid.clone(), new.clone());
        Ok(Principal {
            uid,
            email: new.email.clone(),
        })
    }

    async fn delete_principal(&self, uid: &str) -> Result<(), IdentityError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(fault) = &self.delete_fault {
            return Err(fault.trigger().await.into());
        }

        match self.principals.lock().unwrap().remove(uid) {
            Some(_) => Ok(()),
            None => Err(GoogleError::Api {
                status: StatusCode::BAD_REQUEST,
                message: "USER_NOT_FOUND".to_string(),
            }
            .into()),
        }
    }
}

/// A stored document, as written, alongside the store's clock at write time.
struct Stored {
    fields: Document,
    written_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct MemoryDocumentStore {
    /// Documents keyed by `(collection, key)`.
    documents: Mutex<BTreeMap<(String, String), Stored>>,
    fault: Option<Fault>,
    writes: AtomicUsize,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, fault: Fault) -> Self {
        self.fault = Some(fault);
        self
    }

    pub fn get(&self, collection: &str, key: &str) -> Option<Document> {
        self.documents
            .lock()
            .unwrap()
            .get(&(collection.to_string(), key.to_string()))
            .map(|stored| stored.fields.clone())
    }

    /// The time a server-timestamp field resolved to, the way the real store
    /// would report it back. `None` for literal fields and missing documents.
    pub fn server_time(
        &self,
        collection: &str,
        key: &str,
        field: &str,
    ) -> Option<DateTime<Utc>> {
        let documents = self.documents.lock().unwrap();
        let stored = documents.get(&(collection.to_string(), key.to_string()))?;
        match stored.fields.get(field)? {
            FieldValue::ServerTimestamp => Some(stored.written_at),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.documents.lock().unwrap().len()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn set_document(
        &self,
        collection: &str,
        key: &str,
        fields: &Document,
    ) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if let Some(fault) = &self.fault {
            return Err(fault.trigger().await.into());
        }
        validate_collection(collection)?;
        validate_key(key)?;

        // A full overwrite: whatever was at this key before is gone.
        self.documents.lock().unwrap().insert(
            (collection.to_string(), key.to_string()),
            Stored {
                fields: fields.clone(),
                written_at: Utc::now(),
            },
        );
        Ok(())
    }
}
