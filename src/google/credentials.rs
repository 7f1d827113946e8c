use serde::Deserialize;
use std::path::Path;

use super::http_client::GoogleError;

/// Google's token endpoint, used whenever a key file omits `token_uri`.
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// The portions of a service account key file we care about.
///
/// Google issues these as JSON from the Cloud Console. There are several
/// more fields (`auth_uri`, `client_x509_cert_url`, ...) that we simply ignore.
#[derive(Deserialize, Clone)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    /// Optional, but when present it's sent along as the JWT `kid`.
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_json(contents: &str) -> Result<Self, GoogleError> {
        serde_json::from_str(contents).map_err(GoogleError::Parse)
    }

    /// Reads and parses the key file at the given path.
    /// This is the only file this tool ever reads.
    pub fn from_file(path: &Path) -> Result<Self, GoogleError> {
        let contents = std::fs::read_to_string(path).map_err(|source| GoogleError::KeyFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents)
    }
}

// The private key must never end up in logs, even at trace level.
impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"[redacted]")
            .field("project_id", &self.project_id)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}
