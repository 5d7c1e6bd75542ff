//! Per-sub-resource reconcilers.
//!
//! Each reconciler reads the remote state it needs right before acting,
//! decides on its own whether dry-run stops it short of a mutating call, and
//! returns an [`Outcome`]. None of them keeps state between calls.

pub mod association;
pub mod instance_profile;
pub mod policies;
pub mod role;

pub use association::ProfileAssociationReconciler;
pub use instance_profile::InstanceProfileReconciler;
pub use policies::{PolicyDiff, PolicySetReconciler};
pub use role::RoleReconciler;

use crate::context::ConnectionContext;
use crate::error::{IamError, MAX_ERROR_MESSAGE_CHARS, Result, truncate_str};
use crate::outcome::Outcome;
use crate::provider::IamProvider;

/// What every reconciler is handed: the provider, the connection selector
/// to forward and the dry-run switch.
#[derive(Clone, Copy)]
pub struct Scope<'a> {
    pub(crate) provider: &'a dyn IamProvider,
    pub(crate) connection: &'a ConnectionContext,
    pub(crate) dry_run: bool,
}

impl<'a> Scope<'a> {
    pub fn new(
        provider: &'a dyn IamProvider,
        connection: &'a ConnectionContext,
        dry_run: bool,
    ) -> Self {
        Self {
            provider,
            connection,
            dry_run,
        }
    }

    /// Collapses a mutating call's result to its success flag. A raised
    /// error counts as a refusal.
    pub(crate) fn mutated(&self, operation: &'static str, result: Result<bool>) -> bool {
        match result {
            Ok(done) => done,
            Err(err) => {
                tracing::warn!(operation, error = %err, "provider raised during mutation");
                false
            }
        }
    }
}

/// Outcome for a read call that raised.
pub(crate) fn read_failure(what: &str, role: &str, err: &IamError) -> Outcome {
    let text = err.to_string();
    tracing::warn!(role, what, error = %text, "provider read failed");
    Outcome::failed(format!(
        "Failed to read {} for role {}: {}",
        what,
        role,
        truncate_str(&text, MAX_ERROR_MESSAGE_CHARS)
    ))
}
