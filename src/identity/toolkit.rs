use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use url::Url;

use super::{IdentityError, IdentityService, NewPrincipal, Principal};
use crate::google::{GoogleClient, GoogleError};

/// Identity Toolkit (Firebase Authentication) in production.
pub const DEFAULT_BASE_URL: &str = "https://identitytoolkit.googleapis.com/";

/// Error messages Identity Toolkit uses for an email that's already taken.
/// Messages may carry a suffix (`EMAIL_EXISTS : ...`), so we only match on prefixes.
const DUPLICATE_EMAIL_CODES: &[&str] = &["EMAIL_EXISTS", "DUPLICATE_EMAIL"];

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateAccountRequest<'a> {
    email: &'a str,
    password: &'a str,
    display_name: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateAccountResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteAccountRequest<'a> {
    local_id: &'a str,
}

/// Talks to the project-scoped admin endpoints of Identity Toolkit.
pub struct IdentityToolkitClient {
    google: Arc<GoogleClient>,
    base_url: Url,
    project_id: String,
}

impl IdentityToolkitClient {
    pub fn new(google: Arc<GoogleClient>, base_url: Url, project_id: impl Into<String>) -> Self {
        Self {
            google,
            base_url,
            project_id: project_id.into(),
        }
    }

    fn endpoint(&self, method: &str) -> Result<Url, GoogleError> {
        Ok(self
            .base_url
            .join(&format!("v1/projects/{}/{method}", self.project_id))?)
    }
}

/// Whether the given error is Identity Toolkit's way of saying the email is taken.
fn is_duplicate_email(error: &GoogleError) -> bool {
    match error {
        GoogleError::Api { status, message } => {
            *status == StatusCode::BAD_REQUEST
                && DUPLICATE_EMAIL_CODES
                    .iter()
                    .any(|code| message.starts_with(*code))
        }
        _ => false,
    }
}

#[async_trait]
impl IdentityService for IdentityToolkitClient {
    async fn create_principal(&self, new: &NewPrincipal) -> Result<Principal, IdentityError> {
        let request = CreateAccountRequest {
            email: &new.email,
            password: &new.password,
            display_name: &new.display_name,
        };

        let created = self
            .google
            .post_json::<_, CreateAccountResponse>(self.endpoint("accounts")?, &request)
            .await;
        let response = match created {
            Ok(response) => response,
            Err(error) if is_duplicate_email(&error) => {
                return Err(IdentityError::EmailExists(new.email.clone()));
            }
            Err(error) => return Err(error.into()),
        };

        Ok(Principal {
            uid: response.local_id,
            email: response.email.unwrap_or_else(|| new.email.clone()),
        })
    }

    async fn delete_principal(&self, uid: &str) -> Result<(), IdentityError> {
        let request = DeleteAccountRequest { local_id: uid };
        // The response is an (effectively) empty object, which we don't need.
        let _: Value = self
            .google
            .post_json(self.endpoint("accounts:delete")?, &request)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::google::TokenSource;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> IdentityToolkitClient {
        let google = GoogleClient::new(TokenSource::Emulator, Duration::from_secs(5)).unwrap();
        let base_url = Url::parse(&format!("{}/identitytoolkit.googleapis.com/", server.uri()))
            .unwrap();
        IdentityToolkitClient::new(Arc::new(google), base_url, "demo-project")
    }

    fn new_admin() -> NewPrincipal {
        NewPrincipal {
            email: "admin@example.com".to_string(),
            password: "admin123".to_string(),
            display_name: "Admin User".to_string(),
        }
    }

    #[tokio::test]
    async fn creates_principal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(
                "/identitytoolkit.googleapis.com/v1/projects/demo-project/accounts",
            ))
            .and(header("authorization", "Bearer owner"))
            .and(body_json(json!({
                "email": "admin@example.com",
                "password": "admin123",
                "displayName": "Admin User"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "kind": "identitytoolkit#SignupNewUserResponse",
                "localId": "abc123",
                "email": "admin@example.com"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let principal = client_for(&server)
            .create_principal(&new_admin())
            .await
            .unwrap();
        assert_eq!(
            principal,
            Principal {
                uid: "abc123".to_string(),
                email: "admin@example.com".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn email_exists_maps_to_duplicate() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"code": 400, "message": "EMAIL_EXISTS", "errors": []}
            })))
            .mount(&server)
            .await;

        let result = client_for(&server).create_principal(&new_admin()).await;
        match result {
            Err(IdentityError::EmailExists(email)) => assert_eq!(email, "admin@example.com"),
            other => panic!("expected a duplicate email, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn duplicate_email_with_suffix_maps_to_duplicate() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"code": 400, "message": "DUPLICATE_EMAIL : already in use"}
            })))
            .mount(&server)
            .await;

        let result = client_for(&server).create_principal(&new_admin()).await;
        assert!(matches!(result, Err(IdentityError::EmailExists(_))));
    }

    #[tokio::test]
    async fn other_bad_requests_are_not_duplicates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"code": 400, "message": "WEAK_PASSWORD : Password should be at least 6 characters"}
            })))
            .mount(&server)
            .await;

        let result = client_for(&server).create_principal(&new_admin()).await;
        match result {
            Err(IdentityError::Google(GoogleError::Api { message, .. })) => {
                assert!(message.starts_with("WEAK_PASSWORD"))
            }
            other => panic!("expected an API error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn deletes_principal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(
                "/identitytoolkit.googleapis.com/v1/projects/demo-project/accounts:delete",
            ))
            .and(body_json(json!({"localId": "abc123"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "kind": "identitytoolkit#DeleteAccountResponse"
            })))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server).delete_principal("abc123").await.unwrap();
    }
}
