//! Provisioning of a single administrator account.
//!
//! The flow is strictly sequential:
//!
//! ```text
//! create principal ──ok──> write profile at users/{uid} ──ok──> Provisioned
//!        │                          │
//!   EmailExists                  failure
//!        │                          │
//!        v                          v
//! DuplicateIdentity         delete principal ──ok──> ExternalServiceFailure (rolled back)
//!                                   │
//!                                failure
//!                                   v
//!                            PartialFailure
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::firestore::{Document, DocumentStore, FieldValue};
use crate::identity::{IdentityError, IdentityService, NewPrincipal, Principal};

/// Where profiles live unless configured otherwise.
pub const DEFAULT_COLLECTION: &str = "users";

/// Application-level attributes written alongside a new principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileTemplate {
    pub role: String,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
    pub user_name: String,
    pub phone_number: String,
    pub profile_picture_url: Option<String>,
}

impl ProfileTemplate {
    /// Builds the full profile document for the given email.
    ///
    /// Optional fields are written as explicit nulls, and both timestamps are
    /// left for the store to stamp.
    pub fn to_document(&self, email: &str) -> Document {
        let mut fields = Document::new();
        fields.insert("email".to_string(), email.into());
        fields.insert("role".to_string(), self.role.as_str().into());
        fields.insert("firstName".to_string(), self.first_name.as_str().into());
        fields.insert("lastName".to_string(), self.last_name.as_str().into());
        fields.insert(
            "middleName".to_string(),
            FieldValue::optional(self.middle_name.as_deref()),
        );
        fields.insert("userName".to_string(), self.user_name.as_str().into());
        fields.insert("phoneNumber".to_string(), self.phone_number.as_str().into());
        fields.insert(
            "profilePictureUrl".to_string(),
            FieldValue::optional(self.profile_picture_url.as_deref()),
        );
        fields.insert("createdAt".to_string(), FieldValue::ServerTimestamp);
        fields.insert("lastSeen".to_string(), FieldValue::ServerTimestamp);
        fields
    }
}

/// The external call a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    CreatePrincipal,
    WriteProfile,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::CreatePrincipal => f.write_str("creating the user"),
            Step::WriteProfile => f.write_str("writing the profile"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProvisionError {
    /// The email already has a principal. Nothing was changed.
    #[error("a user with email {email} already exists")]
    DuplicateIdentity { email: String },

    /// Either external call failed. When the profile write failed,
    /// `rolled_back` records that the new principal was removed again.
    /// A timed out call may still have taken effect on the service's side.
    #[error("{step} failed: {message}")]
    ExternalServiceFailure {
        step: Step,
        message: String,
        timed_out: bool,
        rolled_back: bool,
    },

    /// The profile write failed, and so did removing the new principal.
    /// The principal is left behind without a profile.
    #[error(
        "writing the profile failed ({write_error}), and user {principal_id} could not be removed ({cleanup_error})"
    )]
    PartialFailure {
        principal_id: String,
        write_error: String,
        cleanup_error: String,
    },
}

/// A successfully provisioned account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provisioned {
    pub principal_id: String,
    pub email: String,
}

/// The result of a provisioning attempt.
pub type Outcome = Result<Provisioned, ProvisionError>;

/// Why a bounded call didn't succeed.
struct CallFailure {
    message: String,
    timed_out: bool,
}

/// Creates a principal, then its profile document.
pub struct Provisioner {
    identity: Arc<dyn IdentityService>,
    store: Arc<dyn DocumentStore>,
    collection: String,
    call_timeout: Duration,
}

impl Provisioner {
    pub fn new(
        identity: Arc<dyn IdentityService>,
        store: Arc<dyn DocumentStore>,
        collection: impl Into<String>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            identity,
            store,
            collection: collection.into(),
            call_timeout,
        }
    }

    /// Awaits a single external call, bounded by our timeout.
    async fn bounded<T, E, F>(&self, call: F) -> Result<T, CallFailure>
    where
        E: fmt::Display,
        F: Future<Output = Result<T, E>>,
    {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result.map_err(|error| CallFailure {
                message: error.to_string(),
                timed_out: false,
            }),
            Err(_) => Err(self.timed_out()),
        }
    }

    fn timed_out(&self) -> CallFailure {
        CallFailure {
            message: format!("timed out after {:?}", self.call_timeout),
            timed_out: true,
        }
    }

    #[tracing::instrument(skip_all, fields(email = %identity.email, collection = %self.collection))]
    pub async fn provision(&self, identity: &NewPrincipal, template: &ProfileTemplate) -> Outcome {
        let created = tokio::time::timeout(
            self.call_timeout,
            self.identity.create_principal(identity),
        )
        .await;

        let principal = match created {
            Ok(Ok(principal)) => principal,
            Ok(Err(IdentityError::EmailExists(email))) => {
                tracing::warn!("user already exists; nothing was changed");
                return Err(ProvisionError::DuplicateIdentity { email });
            }
            Ok(Err(error)) => {
                tracing::error!(%error, "unable to create user");
                return Err(ProvisionError::ExternalServiceFailure {
                    step: Step::CreatePrincipal,
                    message: error.to_string(),
                    timed_out: false,
                    rolled_back: false,
                });
            }
            // Whether the service actually created the principal is unknown here,
            // and without its uid there's nothing we could roll back.
            Err(_) => {
                tracing::error!(timeout = ?self.call_timeout, "creating user timed out");
                let failure = self.timed_out();
                return Err(ProvisionError::ExternalServiceFailure {
                    step: Step::CreatePrincipal,
                    message: failure.message,
                    timed_out: failure.timed_out,
                    rolled_back: false,
                });
            }
        };
        tracing::info!(uid = %principal.uid, "created user");

        let document = template.to_document(&identity.email);
        let written = self
            .bounded(
                self.store
                    .set_document(&self.collection, &principal.uid, &document),
            )
            .await;

        match written {
            Ok(()) => {
                tracing::info!(uid = %principal.uid, "wrote profile");
                Ok(Provisioned {
                    principal_id: principal.uid,
                    email: principal.email,
                })
            }
            Err(write_error) => {
                tracing::error!(
                    uid = %principal.uid,
                    error = %write_error.message,
                    "unable to write profile"
                );
                Err(self.roll_back(principal, write_error).await)
            }
        }
    }

    /// Removes a principal whose profile could not be written.
    async fn roll_back(&self, principal: Principal, write_error: CallFailure) -> ProvisionError {
        match self
            .bounded(self.identity.delete_principal(&principal.uid))
            .await
        {
            Ok(()) => {
                tracing::warn!(uid = %principal.uid, "removed user after failed profile write");
                ProvisionError::ExternalServiceFailure {
                    step: Step::WriteProfile,
                    message: write_error.message,
                    timed_out: write_error.timed_out,
                    rolled_back: true,
                }
            }
            Err(cleanup_error) => {
                tracing::error!(
                    uid = %principal.uid,
                    error = %cleanup_error.message,
                    "unable to remove user; it is left without a profile"
                );
                ProvisionError::PartialFailure {
                    principal_id: principal.uid,
                    write_error: write_error.message,
                    cleanup_error: cleanup_error.message,
                }
            }
        }
    }
}
