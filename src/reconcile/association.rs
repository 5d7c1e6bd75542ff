//! Association between the role and its same-named instance profile.

use tracing::{info, warn};

use super::{Scope, read_failure};
use crate::outcome::{ChangeKey, Outcome};

pub struct ProfileAssociationReconciler<'a> {
    scope: Scope<'a>,
}

impl<'a> ProfileAssociationReconciler<'a> {
    pub fn new(scope: Scope<'a>) -> Self {
        Self { scope }
    }

    // The profile always carries the role's name.
    fn associated(&self, name: &str) -> Result<bool, Outcome> {
        self.scope
            .provider
            .profile_associated(name, name, self.scope.connection)
            .map_err(|err| read_failure("profile association", name, &err))
    }

    pub fn ensure_associated(&self, name: &str) -> Outcome {
        match self.associated(name) {
            Ok(true) => return Outcome::succeeded(""),
            Ok(false) => {}
            Err(outcome) => return outcome,
        }
        if self.scope.dry_run {
            return Outcome::pending(format!(
                "Instance profile {} is set to be associated.",
                name
            ));
        }
        let associated = self.scope.mutated(
            "associate_profile_to_role",
            self.scope
                .provider
                .associate_profile_to_role(name, name, self.scope.connection),
        );
        if !associated {
            warn!(role = name, "profile association refused");
            return Outcome::failed(format!(
                "Failed to associate {0} instance profile with {0} role.",
                name
            ));
        }
        info!(role = name, "instance profile associated");
        Outcome::succeeded(format!("Instance profile {} associated.", name)).with_change(
            ChangeKey::ProfileAssociated,
            false,
            true,
        )
    }

    pub fn ensure_disassociated(&self, name: &str) -> Outcome {
        match self.associated(name) {
            Ok(true) => {}
            Ok(false) => return Outcome::succeeded(""),
            Err(outcome) => return outcome,
        }
        if self.scope.dry_run {
            return Outcome::pending(format!(
                "Instance profile {} is set to be disassociated.",
                name
            ));
        }
        let disassociated = self.scope.mutated(
            "disassociate_profile_from_role",
            self.scope
                .provider
                .disassociate_profile_from_role(name, name, self.scope.connection),
        );
        if !disassociated {
            warn!(role = name, "profile disassociation refused");
            return Outcome::failed(format!(
                "Failed to disassociate {0} instance profile from {0} role.",
                name
            ));
        }
        info!(role = name, "instance profile disassociated");
        Outcome::succeeded(format!("Instance profile {} disassociated.", name)).with_change(
            ChangeKey::ProfileAssociated,
            true,
            false,
        )
    }
}
