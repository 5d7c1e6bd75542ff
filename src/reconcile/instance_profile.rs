//! The instance profile named after the role.

use serde_json::Value;
use tracing::{info, warn};

use super::{Scope, read_failure};
use crate::outcome::{ChangeKey, Outcome};

pub struct InstanceProfileReconciler<'a> {
    scope: Scope<'a>,
}

impl<'a> InstanceProfileReconciler<'a> {
    pub fn new(scope: Scope<'a>) -> Self {
        Self { scope }
    }

    fn exists(&self, name: &str) -> Result<bool, Outcome> {
        self.scope
            .provider
            .instance_profile_exists(name, self.scope.connection)
            .map_err(|err| read_failure("instance profile", name, &err))
    }

    /// Creates the instance profile if missing.
    pub fn ensure(&self, name: &str) -> Outcome {
        match self.exists(name) {
            Ok(true) => return Outcome::succeeded(""),
            Ok(false) => {}
            Err(outcome) => return outcome,
        }
        if self.scope.dry_run {
            return Outcome::pending(format!("Instance profile {} is set to be created.", name));
        }
        let created = self.scope.mutated(
            "create_instance_profile",
            self.scope
                .provider
                .create_instance_profile(name, self.scope.connection),
        );
        if !created {
            warn!(profile = name, "instance profile creation refused");
            return Outcome::failed(format!("Failed to create {} instance profile.", name));
        }
        info!(profile = name, "instance profile created");
        Outcome::succeeded(format!("Instance profile {} created.", name)).with_change(
            ChangeKey::InstanceProfile,
            Value::Null,
            name,
        )
    }

    /// Deletes the instance profile if it exists.
    pub fn ensure_absent(&self, name: &str) -> Outcome {
        match self.exists(name) {
            Ok(true) => {}
            Ok(false) => {
                return Outcome::succeeded(format!("{} instance profile does not exist.", name));
            }
            Err(outcome) => return outcome,
        }
        if self.scope.dry_run {
            return Outcome::pending(format!("Instance profile {} is set to be removed.", name));
        }
        let deleted = self.scope.mutated(
            "delete_instance_profile",
            self.scope
                .provider
                .delete_instance_profile(name, self.scope.connection),
        );
        if !deleted {
            warn!(profile = name, "instance profile deletion refused");
            return Outcome::failed(format!("Failed to delete {} instance profile.", name));
        }
        info!(profile = name, "instance profile deleted");
        Outcome::succeeded(format!("Instance profile {} removed.", name)).with_change(
            ChangeKey::InstanceProfile,
            name,
            Value::Null,
        )
    }
}
