use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::OnceCell;
use url::Url;

use super::{credentials::ServiceAccountKey, oauth_client};

/// Scopes requested for our access token.
/// Identity Toolkit's admin endpoints and Firestore both accept `cloud-platform`,
/// but we list their narrower scopes as well so the grant reads clearly in audit logs.
pub const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/cloud-platform",
    "https://www.googleapis.com/auth/identitytoolkit",
    "https://www.googleapis.com/auth/datastore",
];

/// The Firebase emulators accept this literal bearer token as an admin credential.
const EMULATOR_TOKEN: &str = "owner";

const USER_AGENT: &str = concat!("adminctl/", env!("CARGO_PKG_VERSION"));

/// Possible issues while loading credentials for, or talking to, Google APIs.
#[derive(Debug, thiserror::Error)]
pub enum GoogleError {
    #[error("request failed: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("unable to parse response: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{status}: {message}")]
    Api { status: StatusCode, message: String },
    #[error("unable to obtain access token: {0}")]
    OAuth2(String),
    #[error("unable to sign token assertion: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
    #[error("unable to read service account key {}: {source}", .path.display())]
    KeyFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid endpoint: {0}")]
    Url(#[from] url::ParseError),
}

/// Google's standard error envelope: `{"error": {"code": 400, "message": "..."}}`.
#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

impl GoogleError {
    /// Builds an API error from a non-success response.
    /// We prefer the envelope's message, but fall back to the raw body otherwise.
    pub fn api(status: StatusCode, body: &str) -> Self {
        let message = match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => envelope.error.message,
            Err(_) => body.trim().to_string(),
        };
        GoogleError::Api { status, message }
    }
}

/// Where our bearer tokens come from.
pub enum TokenSource {
    /// A real project, authenticated via a service account key.
    ServiceAccount(ServiceAccountKey),
    /// The local Firebase emulators, which trust anyone claiming to be `owner`.
    Emulator,
}

/// A thin wrapper around `reqwest` shared by the Identity Toolkit and Firestore clients.
///
/// Our access token is fetched on first use and reused for the remainder of the run.
/// A run makes at most three requests, far within a token's one hour lifetime.
pub struct GoogleClient {
    http: reqwest::Client,
    tokens: TokenSource,
    access_token: OnceCell<String>,
}

impl GoogleClient {
    pub fn new(tokens: TokenSource, timeout: Duration) -> Result<Self, GoogleError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            tokens,
            access_token: OnceCell::new(),
        })
    }

    async fn bearer_token(&self) -> Result<&str, GoogleError> {
        match &self.tokens {
            TokenSource::Emulator => Ok(EMULATOR_TOKEN),
            TokenSource::ServiceAccount(key) => {
                let token = self
                    .access_token
                    .get_or_try_init(|| oauth_client::obtain_access_token(&self.http, key, SCOPES))
                    .await?;
                Ok(token.as_str())
            }
        }
    }

    /// POSTs the given body as JSON, and parses the response as JSON.
    pub async fn post_json<B, R>(&self, url: Url, body: &B) -> Result<R, GoogleError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let token = self.bearer_token().await?;
        tracing::trace!(%url, "POST");

        let result = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;

        let status = result.status();
        let response_text = result.text().await?;
        if !status.is_success() {
            return Err(GoogleError::api(status, &response_text));
        }

        Ok(serde_json::from_str(&response_text)?)
    }
}
