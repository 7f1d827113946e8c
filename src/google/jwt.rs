use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

use super::{credentials::ServiceAccountKey, http_client::GoogleError};

/// Google caps assertion lifetimes at one hour.
const ASSERTION_LIFETIME_SECS: u64 = 3600;

/// The claims Google expects within a JWT-bearer assertion.
#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

/// Signs an assertion for the given scopes, issued right now.
pub fn create_assertion(key: &ServiceAccountKey, scopes: &[&str]) -> Result<String, GoogleError> {
    let issued_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or_default();
    create_assertion_at(key, scopes, issued_at)
}

/// Signs an RS256 assertion with the service account's private key.
///
/// The audience is always the key's own token endpoint: that's where the
/// assertion will be exchanged, and Google rejects any other audience.
pub fn create_assertion_at(
    key: &ServiceAccountKey,
    scopes: &[&str],
    issued_at: u64,
) -> Result<String, GoogleError> {
    let scope = scopes.join(" ");
    let claims = AssertionClaims {
        iss: &key.client_email,
        scope: &scope,
        aud: &key.token_uri,
        iat: issued_at,
        exp: issued_at + ASSERTION_LIFETIME_SECS,
    };

    let mut header = Header::new(Algorithm::RS256);
    header.kid = key.private_key_id.clone();

    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
    Ok(jsonwebtoken::encode(&header, &claims, &encoding_key)?)
}
