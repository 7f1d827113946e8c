//! Creation (and, when a later step fails, removal) of authenticated principals.

mod toolkit;

use async_trait::async_trait;

use crate::google::GoogleError;

pub use toolkit::{IdentityToolkitClient, DEFAULT_BASE_URL as DEFAULT_IDENTITY_BASE_URL};

/// Everything the identity service needs to create a principal.
#[derive(Clone, PartialEq, Eq)]
pub struct NewPrincipal {
    pub email: String,
    /// Write-only: sent once on creation and never read back.
    pub password: String,
    pub display_name: String,
}

impl std::fmt::Debug for NewPrincipal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewPrincipal")
            .field("email", &self.email)
            .field("password", &"[redacted]")
            .field("display_name", &self.display_name)
            .finish()
    }
}

/// A principal as issued by the identity service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Opaque identifier assigned by the service.
    pub uid: String,
    pub email: String,
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// The email already belongs to a principal.
    #[error("a user with email {0} already exists")]
    EmailExists(String),
    #[error(transparent)]
    Google(#[from] GoogleError),
}

#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Creates a principal, failing with [`IdentityError::EmailExists`] on duplicates.
    async fn create_principal(&self, new: &NewPrincipal) -> Result<Principal, IdentityError>;

    /// Deletes the principal with the given identifier.
    async fn delete_principal(&self, uid: &str) -> Result<(), IdentityError>;
}
