mod credentials;
mod http_client;
mod jwt;
mod oauth_client;

pub use credentials::ServiceAccountKey;
pub use http_client::{GoogleClient, GoogleError, TokenSource};
