//! Operator-facing status lines.
//!
//! These go to stdout as-is; diagnostics belong in `tracing` instead.

use crate::identity::NewPrincipal;
use crate::provision::{Outcome, ProfileTemplate, ProvisionError, Step};

/// Exit status for a successful run.
pub const EXIT_SUCCESS: u8 = 0;
/// Exit status when provisioning itself failed.
pub const EXIT_FAILURE: u8 = 1;
/// Exit status when we couldn't even start (configuration, credentials).
pub const EXIT_STARTUP_FAILURE: u8 = 2;

const RULE_WIDTH: usize = 60;

pub fn banner() -> Vec<String> {
    let rule = "=".repeat(RULE_WIDTH);
    vec![rule.clone(), "Creating Admin User".to_string(), rule]
}

/// Renders the outcome of a run.
///
/// On success this includes the login credentials that were just provisioned,
/// since the operator has no other way of seeing them.
pub fn render(
    identity: &NewPrincipal,
    template: &ProfileTemplate,
    outcome: &Outcome,
) -> Vec<String> {
    match outcome {
        Ok(provisioned) => vec![
            "✅ Successfully created user in Firebase Auth".to_string(),
            format!("   User ID: {}", provisioned.principal_id),
            format!("   Email: {}", provisioned.email),
            format!("✅ Successfully created {} profile in Firestore", template.role),
            String::new(),
            "🎉 Admin user created successfully!".to_string(),
            String::new(),
            "Login credentials:".to_string(),
            format!("   Email: {}", identity.email),
            format!("   Password: {}", identity.password),
            format!("   Username: {}", template.user_name),
        ],
        Err(ProvisionError::DuplicateIdentity { email }) => vec![
            format!("❌ Error: User with email {email} already exists"),
            "   If you want to recreate it, delete the existing user first from the Firebase Console"
                .to_string(),
        ],
        Err(ProvisionError::ExternalServiceFailure {
            step: Step::CreatePrincipal,
            message,
            timed_out,
            ..
        }) => {
            let mut lines = vec![format!("❌ Error creating admin user: {message}")];
            if *timed_out {
                // The request may have landed anyway, and there's no uid to clean up with.
                lines.push(
                    "   The user may have been created anyway; check the Firebase Console \
                     before trying again"
                        .to_string(),
                );
            }
            lines
        }
        Err(ProvisionError::ExternalServiceFailure {
            step: Step::WriteProfile,
            message,
            rolled_back,
            ..
        }) => {
            let mut lines = vec![format!("❌ Error creating admin profile: {message}")];
            if *rolled_back {
                lines.push("   The new user was removed again, so nothing was changed".to_string());
            }
            lines
        }
        Err(ProvisionError::PartialFailure {
            principal_id,
            write_error,
            cleanup_error,
        }) => vec![
            format!("❌ Error creating admin profile: {write_error}"),
            format!("⚠️  User {principal_id} was created but could not be removed: {cleanup_error}"),
            "   Delete it from the Firebase Console before trying again".to_string(),
        ],
    }
}

pub fn exit_code(outcome: &Outcome) -> u8 {
    match outcome {
        Ok(_) => EXIT_SUCCESS,
        Err(_) => EXIT_FAILURE,
    }
}
