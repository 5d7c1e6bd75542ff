//! The set of inline policies attached to a role.
//!
//! Convergence happens in two passes, upserts first and deletions second.
//! Both passes stop at the first refused call: whatever was applied up to
//! that point stays applied, and the outcome reports the policy names as
//! they were before the run and as re-listed right after the failure.

use serde_json::Value;
use tracing::{debug, info, warn};

use super::{Scope, read_failure};
use crate::document::{PolicyDocument, PolicyMap};
use crate::error::Result;
use crate::outcome::{ChangeKey, Outcome};

/// Difference between the desired and the current inline-policy set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolicyDiff {
    /// Policies missing on the role or with a different document.
    pub to_create: Vec<(String, PolicyDocument)>,
    /// Policies on the role that are not desired.
    pub to_delete: Vec<String>,
    /// Policy names on the role when the diff was computed.
    pub current: Vec<String>,
}

impl PolicyDiff {
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_delete.is_empty()
    }

    /// Names to be touched: deletions first, then creations.
    pub fn names_to_modify(&self) -> Vec<&str> {
        self.to_delete
            .iter()
            .map(String::as_str)
            .chain(self.to_create.iter().map(|(name, _)| name.as_str()))
            .collect()
    }
}

#[derive(Clone, Copy)]
enum Mode {
    Converge,
    Purge,
}

pub struct PolicySetReconciler<'a> {
    scope: Scope<'a>,
}

impl<'a> PolicySetReconciler<'a> {
    pub fn new(scope: Scope<'a>) -> Self {
        Self { scope }
    }

    /// Computes what [`ensure`](Self::ensure) would change. Read-only.
    ///
    /// Policies not in `desired` are only scheduled for deletion when
    /// `delete_not_desired` is set.
    pub fn diff(
        &self,
        role: &str,
        desired: &PolicyMap,
        delete_not_desired: bool,
    ) -> Result<PolicyDiff> {
        let Scope {
            provider,
            connection,
            ..
        } = self.scope;

        let mut to_create = Vec::new();
        for (policy_name, document) in desired {
            let current = provider.get_role_policy(role, policy_name, connection)?;
            if current.as_ref() != Some(document) {
                debug!(role, policy = %policy_name, exists = current.is_some(), "policy differs");
                to_create.push((policy_name.clone(), document.clone()));
            }
        }

        let current = provider.list_role_policies(role, connection)?;
        let to_delete = if delete_not_desired {
            current
                .iter()
                .filter(|policy_name| !desired.contains_key(policy_name.as_str()))
                .cloned()
                .collect()
        } else {
            Vec::new()
        };

        Ok(PolicyDiff {
            to_create,
            to_delete,
            current,
        })
    }

    /// Converges the role's inline policies to `desired`.
    pub fn ensure(&self, role: &str, desired: &PolicyMap, delete_not_desired: bool) -> Outcome {
        let diff = match self.diff(role, desired, delete_not_desired) {
            Ok(diff) => diff,
            Err(err) => return read_failure("inline policies", role, &err),
        };
        if diff.is_empty() {
            return Outcome::succeeded("");
        }
        if self.scope.dry_run {
            return Outcome::pending(format!(
                "{} policies to be modified on role {}.",
                diff.names_to_modify().join(", "),
                role
            ));
        }
        self.apply(role, diff, Mode::Converge)
    }

    /// Removes every inline policy from the role.
    pub fn purge(&self, role: &str) -> Outcome {
        let diff = match self.diff(role, &PolicyMap::new(), true) {
            Ok(diff) => diff,
            Err(err) => return read_failure("inline policies", role, &err),
        };
        if diff.is_empty() {
            return Outcome::succeeded(format!("No policies in role {}.", role));
        }
        if self.scope.dry_run {
            return Outcome::pending(format!(
                "{} policies to be removed from role {}.",
                diff.to_delete.join(", "),
                role
            ));
        }
        self.apply(role, diff, Mode::Purge)
    }

    fn apply(&self, role: &str, diff: PolicyDiff, mode: Mode) -> Outcome {
        let Scope {
            provider,
            connection,
            ..
        } = self.scope;
        let before = Value::from(diff.current.clone());

        for (policy_name, document) in &diff.to_create {
            let done = self.scope.mutated(
                "upsert_role_policy",
                provider.upsert_role_policy(role, policy_name, document, connection),
            );
            if !done {
                warn!(role, policy = %policy_name, "policy upsert refused");
                return Outcome::failed(format!(
                    "Failed to add policy {} to role {}",
                    policy_name, role
                ))
                .with_change(ChangeKey::Policies, before, self.listed(role));
            }
            info!(role, policy = %policy_name, "policy written");
        }

        for policy_name in &diff.to_delete {
            let done = self.scope.mutated(
                "delete_role_policy",
                provider.delete_role_policy(role, policy_name, connection),
            );
            if !done {
                warn!(role, policy = %policy_name, "policy deletion refused");
                return Outcome::failed(format!(
                    "Failed to remove policy {} from role {}",
                    policy_name, role
                ))
                .with_change(ChangeKey::Policies, before, self.listed(role));
            }
            info!(role, policy = %policy_name, "policy deleted");
        }

        // Both messages name what is left on the role after the re-list.
        let after = self.listed(role);
        let remaining = names_of(&after).join(", ");
        let message = match mode {
            Mode::Converge => format!("{} policies modified on role {}.", remaining, role),
            Mode::Purge => format!("{} policies removed from role {}.", remaining, role),
        };
        Outcome::succeeded(message).with_change(ChangeKey::Policies, before, after)
    }

    /// Re-lists policy names for the after snapshot; `null` if the listing raised.
    fn listed(&self, role: &str) -> Value {
        match self
            .scope
            .provider
            .list_role_policies(role, self.scope.connection)
        {
            Ok(names) => Value::from(names),
            Err(err) => {
                warn!(role, error = %err, "cannot re-list policies after mutation");
                Value::Null
            }
        }
    }
}

fn names_of(listing: &Value) -> Vec<&str> {
    listing
        .as_array()
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ConnectionContext;
    use crate::memory::{InMemoryProvider, Operation, ec2_trust_policy};
    use crate::outcome::Status;
    use serde_json::json;

    fn doc(sid: &str) -> PolicyDocument {
        PolicyDocument::new(json!({"Statement": [{"Sid": sid, "Effect": "Allow"}]}))
    }

    fn account_with(policies: &[(&str, &str)]) -> InMemoryProvider {
        let account = InMemoryProvider::new();
        account.insert_role("app", ec2_trust_policy());
        for (name, sid) in policies {
            account.insert_role_policy("app", name, doc(sid));
        }
        account
    }

    fn desired(policies: &[(&str, &str)]) -> PolicyMap {
        policies
            .iter()
            .map(|(name, sid)| (name.to_string(), doc(sid)))
            .collect()
    }

    #[test]
    fn deletion_gating() {
        let account = account_with(&[("a", "A"), ("b", "B")]);
        let connection = ConnectionContext::default();
        let reconciler = PolicySetReconciler::new(Scope::new(&account, &connection, false));
        let want = desired(&[("a", "A")]);

        let keep = reconciler.diff("app", &want, false).unwrap();
        assert!(keep.to_delete.is_empty());
        assert!(keep.is_empty());

        let prune = reconciler.diff("app", &want, true).unwrap();
        assert_eq!(prune.to_delete, vec!["b".to_string()]);
        assert!(prune.to_create.is_empty());
    }

    #[test]
    fn kept_policies_are_not_reported() {
        let account = account_with(&[("a", "A"), ("manual", "M")]);
        let connection = ConnectionContext::default();
        let outcome = PolicySetReconciler::new(Scope::new(&account, &connection, false)).ensure(
            "app",
            &desired(&[("a", "A")]),
            false,
        );

        assert_eq!(outcome.status, Status::Succeeded);
        assert_eq!(outcome.message, vec![String::new()]);
        assert!(outcome.changes.is_empty());
        assert!(account.role_policies("app").contains_key("manual"));
    }

    #[test]
    fn changed_document_is_rewritten() {
        let account = account_with(&[("a", "old")]);
        let connection = ConnectionContext::default();
        let outcome = PolicySetReconciler::new(Scope::new(&account, &connection, false)).ensure(
            "app",
            &desired(&[("a", "new")]),
            true,
        );

        assert_eq!(outcome.status, Status::Succeeded);
        assert_eq!(
            outcome.message,
            vec!["a policies modified on role app.".to_string()]
        );
        assert_eq!(account.role_policies("app")["a"], doc("new"));
    }

    #[test]
    fn dry_run_lists_deletions_then_creations() {
        let account = account_with(&[("stale", "S"), ("a", "old")]);
        let connection = ConnectionContext::default();
        let outcome = PolicySetReconciler::new(Scope::new(&account, &connection, true)).ensure(
            "app",
            &desired(&[("a", "new"), ("b", "B")]),
            true,
        );

        assert_eq!(outcome.status, Status::Pending);
        assert_eq!(
            outcome.message,
            vec!["stale, a, b policies to be modified on role app.".to_string()]
        );
        assert!(outcome.changes.is_empty());
        assert!(account.mutating_calls().is_empty());
    }

    #[test]
    fn failed_upsert_stops_everything_after_it() {
        let account = account_with(&[("stale", "S")]);
        account.refuse(Operation::UpsertRolePolicy, Some("x"));
        let connection = ConnectionContext::default();
        let outcome = PolicySetReconciler::new(Scope::new(&account, &connection, false)).ensure(
            "app",
            &desired(&[("w", "W"), ("x", "X"), ("y", "Y")]),
            true,
        );

        assert_eq!(outcome.status, Status::Failed);
        assert_eq!(
            outcome.message,
            vec!["Failed to add policy x to role app".to_string()]
        );
        assert_eq!(
            outcome.changes.old(ChangeKey::Policies),
            Some(&json!(["stale"]))
        );
        assert_eq!(
            outcome.changes.new_value(ChangeKey::Policies),
            Some(&json!(["stale", "w"]))
        );
        let attempted: Vec<String> = account
            .mutating_calls()
            .into_iter()
            .map(|call| call.target)
            .collect();
        assert_eq!(attempted, vec!["w", "x"]);
    }

    #[test]
    fn failed_delete_reports_partial_state() {
        let account = account_with(&[("b", "B"), ("c", "C")]);
        account.refuse(Operation::DeleteRolePolicy, Some("c"));
        let connection = ConnectionContext::default();
        let outcome = PolicySetReconciler::new(Scope::new(&account, &connection, false)).ensure(
            "app",
            &PolicyMap::new(),
            true,
        );

        assert_eq!(outcome.status, Status::Failed);
        assert_eq!(
            outcome.message,
            vec!["Failed to remove policy c from role app".to_string()]
        );
        assert_eq!(outcome.changes.new_value(ChangeKey::Policies), Some(&json!(["c"])));
    }

    #[test]
    fn purge_messages() {
        let account = account_with(&[("a", "A"), ("b", "B")]);
        let connection = ConnectionContext::default();

        let preview = PolicySetReconciler::new(Scope::new(&account, &connection, true)).purge("app");
        assert_eq!(preview.status, Status::Pending);
        assert_eq!(
            preview.message,
            vec!["a, b policies to be removed from role app.".to_string()]
        );

        let reconciler = PolicySetReconciler::new(Scope::new(&account, &connection, false));
        let outcome = reconciler.purge("app");
        assert_eq!(outcome.status, Status::Succeeded);
        assert_eq!(
            outcome.message,
            vec![" policies removed from role app.".to_string()]
        );
        assert_eq!(outcome.changes.old(ChangeKey::Policies), Some(&json!(["a", "b"])));
        assert_eq!(outcome.changes.new_value(ChangeKey::Policies), Some(&json!([])));

        let again = reconciler.purge("app");
        assert_eq!(again.message, vec!["No policies in role app.".to_string()]);
        assert!(again.changes.is_empty());
    }

    #[test]
    fn read_error_fails_before_any_mutation() {
        let account = account_with(&[]);
        account.raise(Operation::GetRolePolicy, None);
        let connection = ConnectionContext::default();
        let outcome = PolicySetReconciler::new(Scope::new(&account, &connection, false)).ensure(
            "app",
            &desired(&[("a", "A")]),
            true,
        );

        assert_eq!(outcome.status, Status::Failed);
        assert!(account.mutating_calls().is_empty());
    }
}
