//! The role object and its trust (assume-role) policy document.

use serde_json::Value;
use tracing::{debug, info, warn};

use super::{Scope, read_failure};
use crate::desired::DesiredRoleSpec;
use crate::outcome::{ChangeKey, Outcome};

pub struct RoleReconciler<'a> {
    scope: Scope<'a>,
}

impl<'a> RoleReconciler<'a> {
    pub fn new(scope: Scope<'a>) -> Self {
        Self { scope }
    }

    /// Creates the role if missing, otherwise converges its trust document.
    pub fn ensure(&self, spec: &DesiredRoleSpec) -> Outcome {
        let Scope {
            provider,
            connection,
            dry_run,
        } = self.scope;
        let name = spec.name.as_str();

        let role = match provider.describe_role(name, connection) {
            Ok(Some(role)) => role,
            Ok(None) => return self.create(spec),
            Err(err) => return read_failure("role state", name, &err),
        };

        let present = format!("{} role present.", name);
        let desired = match spec.policy_document {
            Some(ref document) => document.clone(),
            None => match provider.build_default_trust_policy(connection) {
                Ok(document) => document,
                Err(err) => return read_failure("default trust policy", name, &err),
            },
        };

        if role.assume_role_policy_document == desired {
            debug!(role = name, "trust policy up to date");
            return Outcome::succeeded(present);
        }

        if dry_run {
            return Outcome::pending(format!(
                "{} Assume role policy document to be updated.",
                present
            ));
        }

        let updated = self.scope.mutated(
            "update_assume_role_policy",
            provider.update_assume_role_policy(name, &desired, connection),
        );
        if !updated {
            warn!(role = name, "trust policy update refused");
            return Outcome::failed(format!("{} Failed to update assume role policy.", present));
        }

        let applied = match provider.describe_role(name, connection) {
            Ok(Some(after)) => after.assume_role_policy_document,
            Ok(None) | Err(_) => {
                debug!(role = name, "role not readable after update, reporting applied document");
                desired
            }
        };
        info!(role = name, "trust policy updated");
        Outcome::succeeded(format!("{} Assume role policy document updated.", present))
            .with_change(
                ChangeKey::PolicyDocument,
                role.assume_role_policy_document,
                applied,
            )
    }

    fn create(&self, spec: &DesiredRoleSpec) -> Outcome {
        let name = spec.name.as_str();
        if self.scope.dry_run {
            return Outcome::pending(format!("IAM role {} is set to be created.", name));
        }
        let created = self.scope.mutated(
            "create_role",
            self.scope.provider.create_role(
                name,
                spec.policy_document.as_ref(),
                spec.path.as_deref(),
                self.scope.connection,
            ),
        );
        if !created {
            warn!(role = name, "role creation refused");
            return Outcome::failed(format!("Failed to create {} IAM role.", name));
        }
        info!(role = name, path = ?spec.path, "role created");
        Outcome::succeeded(format!("IAM role {} created.", name)).with_change(
            ChangeKey::Role,
            Value::Null,
            name,
        )
    }

    /// Deletes the role if it exists.
    pub fn ensure_absent(&self, name: &str) -> Outcome {
        let exists = match self.scope.provider.role_exists(name, self.scope.connection) {
            Ok(exists) => exists,
            Err(err) => return read_failure("role state", name, &err),
        };
        if !exists {
            return Outcome::succeeded(format!("{} role does not exist.", name));
        }
        if self.scope.dry_run {
            return Outcome::pending(format!("IAM role {} is set to be removed.", name));
        }
        let deleted = self.scope.mutated(
            "delete_role",
            self.scope.provider.delete_role(name, self.scope.connection),
        );
        if !deleted {
            warn!(role = name, "role deletion refused");
            return Outcome::failed(format!("Failed to delete {} iam role.", name));
        }
        info!(role = name, "role deleted");
        Outcome::succeeded(format!("IAM role {} removed.", name)).with_change(
            ChangeKey::Role,
            name,
            Value::Null,
        )
    }
}
