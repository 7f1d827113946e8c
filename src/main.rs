mod config;
mod firestore;
mod google;
mod identity;
#[cfg(test)]
mod memory;
mod provision;
mod report;

use anyhow::Context;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::firestore::FirestoreClient;
use crate::google::{GoogleClient, ServiceAccountKey, TokenSource};
use crate::identity::IdentityToolkitClient;
use crate::provision::Provisioner;

#[tokio::main]
async fn main() -> ExitCode {
    // Diagnostics go to stderr, so stdout only carries the status lines below.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "adminctl=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    for line in report::banner() {
        println!("{line}");
    }

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(error) => {
            tracing::error!("unable to load configuration: {error:#}");
            println!("❌ Error: {error:#}");
            return ExitCode::from(report::EXIT_STARTUP_FAILURE);
        }
    };

    let provisioner = match build_provisioner(&config) {
        Ok(provisioner) => provisioner,
        Err(error) => {
            tracing::error!("unable to set up clients: {error:#}");
            println!("❌ Error: {error:#}");
            return ExitCode::from(report::EXIT_STARTUP_FAILURE);
        }
    };

    let outcome = provisioner
        .provision(&config.identity, &config.profile)
        .await;
    for line in report::render(&config.identity, &config.profile, &outcome) {
        println!("{line}");
    }

    ExitCode::from(report::exit_code(&outcome))
}

/// Resolves credentials and the target project, and wires up both clients.
fn build_provisioner(config: &Config) -> anyhow::Result<Provisioner> {
    let (tokens, project_id) = match &config.emulators {
        Some(_) => {
            // Configuration already insists on a project ID alongside emulators.
            let project_id = config
                .project_id
                .clone()
                .context("FIREBASE_PROJECT_ID is required when using emulators")?;
            (TokenSource::Emulator, project_id)
        }
        None => {
            let path = config
                .credentials_path
                .as_deref()
                .context("GOOGLE_APPLICATION_CREDENTIALS environment variable is required")?;
            let key = ServiceAccountKey::from_file(path)
                .with_context(|| format!("unable to load service account key {}", path.display()))?;

            // An explicit project wins over the one the key was issued for.
            let project_id = config
                .project_id
                .clone()
                .or_else(|| key.project_id.clone())
                .context("service account key has no project_id; set FIREBASE_PROJECT_ID")?;
            (TokenSource::ServiceAccount(key), project_id)
        }
    };

    tracing::info!(
        project_id = %project_id,
        emulated = config.emulators.is_some(),
        "targeting Firebase project"
    );

    let google = Arc::new(GoogleClient::new(tokens, config.request_timeout)?);
    let identity = IdentityToolkitClient::new(
        google.clone(),
        config.identity_base_url()?,
        project_id.as_str(),
    );
    let store = FirestoreClient::new(google, config.firestore_base_url()?, project_id.as_str());

    Ok(Provisioner::new(
        Arc::new(identity),
        Arc::new(store),
        config.collection.as_str(),
        config.request_timeout,
    ))
}
