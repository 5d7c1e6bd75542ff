//! `present` / `absent` entry points.
//!
//! Steps run in dependency order and each outcome is merged into one. A step
//! that fails stops the run; a pending (dry-run) step does not, so a preview
//! shows every change the run would make.

use tracing::{info, info_span};
use uuid::Uuid;

use crate::config::ReconcileConfig;
use crate::context::ConnectionContext;
use crate::desired::DesiredRoleSpec;
use crate::document::{PolicyMap, merge_policy_sources};
use crate::error::{MAX_ERROR_MESSAGE_CHARS, Result, truncate_str};
use crate::outcome::{Outcome, StateReturn};
use crate::pillar::{NoPillars, PillarSource};
use crate::provider::IamProvider;
use crate::reconcile::{
    InstanceProfileReconciler, PolicySetReconciler, ProfileAssociationReconciler, RoleReconciler,
    Scope,
};

/// Drives the reconcilers for one invocation.
pub struct RoleState<'a> {
    provider: &'a dyn IamProvider,
    pillars: &'a dyn PillarSource,
    config: ReconcileConfig,
}

impl<'a> RoleState<'a> {
    /// Creates an orchestrator without pillar data.
    pub fn new(provider: &'a dyn IamProvider, config: ReconcileConfig) -> Self {
        Self {
            provider,
            pillars: &NoPillars,
            config,
        }
    }

    /// Sets where `policies_from_pillars` keys are looked up.
    pub fn with_pillars(mut self, pillars: &'a dyn PillarSource) -> Self {
        self.pillars = pillars;
        self
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Inline policies the role should carry: pillar maps folded in order,
    /// then the explicit map on top.
    pub fn desired_policies(&self, spec: &DesiredRoleSpec) -> Result<PolicyMap> {
        let sources = spec
            .policies_from_pillars
            .iter()
            .map(|key| self.pillars.get(key))
            .collect::<Result<Vec<_>>>()?;
        Ok(merge_policy_sources(sources, &spec.policies))
    }

    /// Ensures the role, its instance profile and its inline policies match `spec`.
    pub fn present(&self, spec: &DesiredRoleSpec) -> Outcome {
        let span = info_span!(
            "iam_role.present",
            role = %spec.name,
            dry_run = self.config.dry_run,
            run = %Uuid::new_v4()
        );
        let _entered = span.enter();

        let mut run = Outcome::default();
        let name = spec.name.as_str();

        let policies = match self.desired_policies(spec) {
            Ok(policies) => policies,
            Err(err) => {
                run.merge(Outcome::failed(format!(
                    "Failed to read pillar policies for role {}: {}",
                    name,
                    truncate_str(&err.to_string(), MAX_ERROR_MESSAGE_CHARS)
                )));
                return self.finish(run);
            }
        };

        let scope = Scope::new(self.provider, &spec.connection, self.config.dry_run);

        if merge_failed(&mut run, RoleReconciler::new(scope).ensure(spec)) {
            return self.finish(run);
        }
        if spec.create_instance_profile {
            if merge_failed(&mut run, InstanceProfileReconciler::new(scope).ensure(name)) {
                return self.finish(run);
            }
            let association = ProfileAssociationReconciler::new(scope).ensure_associated(name);
            if merge_failed(&mut run, association) {
                return self.finish(run);
            }
        }
        run.merge(PolicySetReconciler::new(scope).ensure(
            name,
            &policies,
            spec.delete_policies_not_in_spec,
        ));
        self.finish(run)
    }

    /// Removes the role's inline policies, instance profile and the role itself.
    pub fn absent(&self, name: &str, connection: &ConnectionContext) -> Outcome {
        let span = info_span!(
            "iam_role.absent",
            role = %name,
            dry_run = self.config.dry_run,
            run = %Uuid::new_v4()
        );
        let _entered = span.enter();

        let scope = Scope::new(self.provider, connection, self.config.dry_run);
        let mut run = Outcome::default();

        if merge_failed(&mut run, PolicySetReconciler::new(scope).purge(name)) {
            return self.finish(run);
        }
        let association = ProfileAssociationReconciler::new(scope).ensure_disassociated(name);
        if merge_failed(&mut run, association) {
            return self.finish(run);
        }
        if merge_failed(&mut run, InstanceProfileReconciler::new(scope).ensure_absent(name)) {
            return self.finish(run);
        }
        run.merge(RoleReconciler::new(scope).ensure_absent(name));
        self.finish(run)
    }

    /// Runs [`present`](Self::present) and renders the host record.
    pub fn present_return(&self, spec: &DesiredRoleSpec) -> StateReturn {
        self.present(spec)
            .into_state_return(spec.name.clone(), self.config.comment_format)
    }

    /// Runs [`absent`](Self::absent) and renders the host record.
    pub fn absent_return(&self, name: &str, connection: &ConnectionContext) -> StateReturn {
        self.absent(name, connection)
            .into_state_return(name, self.config.comment_format)
    }

    fn finish(&self, run: Outcome) -> Outcome {
        info!(
            status = ?run.status,
            changed = !run.changes.is_empty(),
            "run finished"
        );
        run
    }
}

/// Merges `step` into `run`; returns `true` when the step failed hard.
fn merge_failed(run: &mut Outcome, step: Outcome) -> bool {
    let failed = step.is_failed();
    run.merge(step);
    failed
}
