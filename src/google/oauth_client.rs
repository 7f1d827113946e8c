use serde::Deserialize;

use super::{credentials::ServiceAccountKey, http_client::GoogleError, jwt};

/// The grant type for exchanging a signed assertion for an access token.
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// The portion of the token endpoint's response we care about.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Exchanges a freshly signed assertion for an OAuth2 access token.
pub async fn obtain_access_token(
    client: &reqwest::Client,
    key: &ServiceAccountKey,
    scopes: &[&str],
) -> Result<String, GoogleError> {
    let assertion = jwt::create_assertion(key, scopes)?;

    let result = client
        .post(&key.token_uri)
        .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", &assertion)])
        .send()
        .await?;

    // Google's token endpoint reports failures as `{"error": ..., "error_description": ...}`.
    // There isn't much we can do with them beyond showing them to the operator.
    let status = result.status();
    let response_text = result.text().await?;
    if !status.is_success() {
        return Err(GoogleError::OAuth2(format!("{status}: {response_text}")));
    }

    let body: TokenResponse = serde_json::from_str(&response_text)?;
    tracing::debug!(client_email = %key.client_email, "obtained access token");
    Ok(body.access_token)
}
