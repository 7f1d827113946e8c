//! Configuration, loaded from the environment.
//!
//! # Environment Variables
//!
//! - `GOOGLE_APPLICATION_CREDENTIALS`: path to a service account key
//!   (required unless using emulators)
//! - `FIREBASE_PROJECT_ID`: project to provision into (default: the key's `project_id`)
//! - `FIREBASE_AUTH_EMULATOR_HOST` / `FIRESTORE_EMULATOR_HOST`: target local emulators instead
//! - `ADMIN_EMAIL`, `ADMIN_PASSWORD`, `ADMIN_PHONE_NUMBER`: required
//! - `ADMIN_DISPLAY_NAME` (default: `Admin User`), `ADMIN_ROLE` (default: `admin`),
//!   `ADMIN_FIRST_NAME` (default: `Admin`), `ADMIN_LAST_NAME` (default: `User`),
//!   `ADMIN_USERNAME` (default: `admin`)
//! - `ADMIN_MIDDLE_NAME`, `ADMIN_PROFILE_PICTURE_URL`: optional, stored as null when unset
//! - `PROFILE_COLLECTION`: top-level collection for profiles, no `/` (default: `users`)
//! - `REQUEST_TIMEOUT_SECS`: bound on each external call (default: 30)
//!
//! A `.env` file in the working directory is loaded first, if present.

use anyhow::{bail, Context};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::firestore::validate_collection;
use crate::identity::NewPrincipal;
use crate::provision::{ProfileTemplate, DEFAULT_COLLECTION};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Host:port pairs of the local Firebase emulators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emulators {
    pub auth_host: String,
    pub firestore_host: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub credentials_path: Option<PathBuf>,
    pub project_id: Option<String>,
    pub emulators: Option<Emulators>,
    pub identity: NewPrincipal,
    pub profile: ProfileTemplate,
    pub collection: String,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds configuration from any variable source.
    /// Empty values are treated the same as unset ones.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let required = |name: &str| {
            var(name).with_context(|| format!("{name} environment variable is required"))
        };
        let or_default =
            |name: &str, default: &str| var(name).unwrap_or_else(|| default.to_string());

        let emulators = match (
            var("FIREBASE_AUTH_EMULATOR_HOST"),
            var("FIRESTORE_EMULATOR_HOST"),
        ) {
            (Some(auth_host), Some(firestore_host)) => Some(Emulators {
                auth_host,
                firestore_host,
            }),
            (None, None) => None,
            _ => bail!(
                "FIREBASE_AUTH_EMULATOR_HOST and FIRESTORE_EMULATOR_HOST must be set together"
            ),
        };

        let project_id = var("FIREBASE_PROJECT_ID");
        let credentials_path = var("GOOGLE_APPLICATION_CREDENTIALS").map(PathBuf::from);
        match (&emulators, &credentials_path, &project_id) {
            (Some(_), _, None) => bail!("FIREBASE_PROJECT_ID is required when using emulators"),
            (None, None, _) => {
                bail!("GOOGLE_APPLICATION_CREDENTIALS environment variable is required")
            }
            _ => {}
        }

        let request_timeout = match var("REQUEST_TIMEOUT_SECS") {
            Some(value) => value
                .trim()
                .parse::<u64>()
                .context("REQUEST_TIMEOUT_SECS must be a whole number of seconds")?,
            None => DEFAULT_TIMEOUT_SECS,
        };
        if request_timeout == 0 {
            bail!("REQUEST_TIMEOUT_SECS must be greater than zero");
        }

        // The profile must land directly in this collection, not in a subcollection.
        let collection = or_default("PROFILE_COLLECTION", DEFAULT_COLLECTION);
        if validate_collection(&collection).is_err() {
            bail!("PROFILE_COLLECTION must be a single collection name, got {collection:?}");
        }

        let identity = NewPrincipal {
            email: required("ADMIN_EMAIL")?,
            password: required("ADMIN_PASSWORD")?,
            display_name: or_default("ADMIN_DISPLAY_NAME", "Admin User"),
        };

        let profile = ProfileTemplate {
            role: or_default("ADMIN_ROLE", "admin"),
            first_name: or_default("ADMIN_FIRST_NAME", "Admin"),
            last_name: or_default("ADMIN_LAST_NAME", "User"),
            middle_name: var("ADMIN_MIDDLE_NAME"),
            user_name: or_default("ADMIN_USERNAME", "admin"),
            phone_number: required("ADMIN_PHONE_NUMBER")?,
            profile_picture_url: var("ADMIN_PROFILE_PICTURE_URL"),
        };

        Ok(Self {
            credentials_path,
            project_id,
            emulators,
            identity,
            profile,
            collection,
            request_timeout: Duration::from_secs(request_timeout),
        })
    }

    /// Base URL for Identity Toolkit.
    /// The emulator serves it beneath a path named after the production host.
    pub fn identity_base_url(&self) -> anyhow::Result<Url> {
        let url = match &self.emulators {
            Some(emulators) => format!(
                "http://{}/identitytoolkit.googleapis.com/",
                emulators.auth_host
            ),
            None => crate::identity::DEFAULT_IDENTITY_BASE_URL.to_string(),
        };
        Url::parse(&url).with_context(|| format!("invalid Identity Toolkit URL {url}"))
    }

    /// Base URL for Firestore.
    pub fn firestore_base_url(&self) -> anyhow::Result<Url> {
        let url = match &self.emulators {
            Some(emulators) => format!("http://{}/", emulators.firestore_host),
            None => crate::firestore::DEFAULT_FIRESTORE_BASE_URL.to_string(),
        };
        Url::parse(&url).with_context(|| format!("invalid Firestore URL {url}"))
    }
}
