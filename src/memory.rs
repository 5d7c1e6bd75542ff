//! In-process IAM account used for previews, local runs and tests.
//!
//! [`InMemoryProvider`] models the parts of an IAM account the reconcilers
//! touch, enforces the same conflicts the real service does (a role with
//! inline policies or an instance profile cannot be deleted, a profile holds
//! at most one role), journals every call and can be told to refuse or raise
//! on chosen operations.
//!
//! ```
//! use iam_role_state::memory::{InMemoryProvider, Operation};
//! use iam_role_state::{DesiredRoleSpec, ReconcileConfig, RoleState};
//!
//! let account = InMemoryProvider::new();
//! let state = RoleState::new(&account, ReconcileConfig::default().with_dry_run(true));
//! let outcome = state.present(&DesiredRoleSpec::new("app"));
//!
//! assert!(outcome.is_pending());
//! assert!(account.calls().iter().all(|call| !call.operation.is_mutating()));
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::json;

use crate::context::ConnectionContext;
use crate::document::PolicyDocument;
use crate::error::{IamError, Result};
use crate::provider::{IamProvider, RoleDescription};

/// Provider operations, as recorded in the call journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
    RoleExists,
    DescribeRole,
    CreateRole,
    BuildDefaultTrustPolicy,
    UpdateAssumeRolePolicy,
    DeleteRole,
    InstanceProfileExists,
    CreateInstanceProfile,
    DeleteInstanceProfile,
    ProfileAssociated,
    AssociateProfileToRole,
    DisassociateProfileFromRole,
    GetRolePolicy,
    ListRolePolicies,
    UpsertRolePolicy,
    DeleteRolePolicy,
}

impl Operation {
    /// Returns `true` for calls that change account state.
    pub fn is_mutating(self) -> bool {
        matches!(
            self,
            Operation::CreateRole
                | Operation::UpdateAssumeRolePolicy
                | Operation::DeleteRole
                | Operation::CreateInstanceProfile
                | Operation::DeleteInstanceProfile
                | Operation::AssociateProfileToRole
                | Operation::DisassociateProfileFromRole
                | Operation::UpsertRolePolicy
                | Operation::DeleteRolePolicy
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::RoleExists => "role_exists",
            Operation::DescribeRole => "describe_role",
            Operation::CreateRole => "create_role",
            Operation::BuildDefaultTrustPolicy => "build_default_trust_policy",
            Operation::UpdateAssumeRolePolicy => "update_assume_role_policy",
            Operation::DeleteRole => "delete_role",
            Operation::InstanceProfileExists => "instance_profile_exists",
            Operation::CreateInstanceProfile => "create_instance_profile",
            Operation::DeleteInstanceProfile => "delete_instance_profile",
            Operation::ProfileAssociated => "profile_associated",
            Operation::AssociateProfileToRole => "associate_profile_to_role",
            Operation::DisassociateProfileFromRole => "disassociate_profile_from_role",
            Operation::GetRolePolicy => "get_role_policy",
            Operation::ListRolePolicies => "list_role_policies",
            Operation::UpsertRolePolicy => "upsert_role_policy",
            Operation::DeleteRolePolicy => "delete_role_policy",
        }
    }
}

/// One journaled provider call.
///
/// `target` is the policy name for inline-policy calls, the profile name for
/// instance-profile calls and the role name otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub operation: Operation,
    pub target: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fault {
    Refuse,
    Raise,
}

#[derive(Debug, Clone)]
struct RoleRecord {
    path: Option<String>,
    trust: PolicyDocument,
    policies: BTreeMap<String, PolicyDocument>,
}

#[derive(Debug, Default)]
struct Account {
    roles: BTreeMap<String, RoleRecord>,
    instance_profiles: BTreeMap<String, BTreeSet<String>>,
}

/// In-memory [`IamProvider`].
pub struct InMemoryProvider {
    account: Mutex<Account>,
    journal: Mutex<Vec<Call>>,
    faults: Mutex<Vec<(Operation, Option<String>, Fault)>>,
    default_trust_policy: PolicyDocument,
}

impl Default for InMemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Trust policy letting EC2 instances assume the role.
pub fn ec2_trust_policy() -> PolicyDocument {
    PolicyDocument::new(json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": {"Service": ["ec2.amazonaws.com"]},
            "Action": ["sts:AssumeRole"]
        }]
    }))
}

impl InMemoryProvider {
    /// Creates an empty account whose default trust policy is [`ec2_trust_policy`].
    pub fn new() -> Self {
        Self::with_default_trust_policy(ec2_trust_policy())
    }

    pub fn with_default_trust_policy(document: PolicyDocument) -> Self {
        Self {
            account: Mutex::new(Account::default()),
            journal: Mutex::new(Vec::new()),
            faults: Mutex::new(Vec::new()),
            default_trust_policy: document,
        }
    }

    // Seeding helpers. These bypass the journal and fault injection.

    /// Adds a role with the given trust policy.
    pub fn insert_role(&self, name: &str, trust: PolicyDocument) {
        lock(&self.account).roles.insert(
            name.to_string(),
            RoleRecord {
                path: None,
                trust,
                policies: BTreeMap::new(),
            },
        );
    }

    /// Adds or replaces an inline policy on an existing role.
    pub fn insert_role_policy(&self, role: &str, policy: &str, document: PolicyDocument) {
        if let Some(record) = lock(&self.account).roles.get_mut(role) {
            record.policies.insert(policy.to_string(), document);
        }
    }

    /// Adds an instance profile, optionally holding `role`.
    pub fn insert_instance_profile(&self, name: &str, role: Option<&str>) {
        let roles = role.into_iter().map(str::to_string).collect();
        lock(&self.account)
            .instance_profiles
            .insert(name.to_string(), roles);
    }

    // Fault injection.

    /// Makes a mutating call return `Ok(false)`. A `None` target matches any.
    pub fn refuse(&self, operation: Operation, target: Option<&str>) {
        lock(&self.faults).push((operation, target.map(str::to_string), Fault::Refuse));
    }

    /// Makes a call return `Err`. A `None` target matches any.
    pub fn raise(&self, operation: Operation, target: Option<&str>) {
        lock(&self.faults).push((operation, target.map(str::to_string), Fault::Raise));
    }

    pub fn clear_faults(&self) {
        lock(&self.faults).clear();
    }

    // Inspection.

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        lock(&self.journal).clone()
    }

    /// Mutating calls made so far, in order.
    pub fn mutating_calls(&self) -> Vec<Call> {
        lock(&self.journal)
            .iter()
            .filter(|call| call.operation.is_mutating())
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        lock(&self.journal).clear();
    }

    pub fn has_role(&self, name: &str) -> bool {
        lock(&self.account).roles.contains_key(name)
    }

    pub fn role_path(&self, name: &str) -> Option<String> {
        lock(&self.account)
            .roles
            .get(name)
            .and_then(|record| record.path.clone())
    }

    pub fn trust_policy(&self, name: &str) -> Option<PolicyDocument> {
        lock(&self.account)
            .roles
            .get(name)
            .map(|record| record.trust.clone())
    }

    pub fn role_policies(&self, name: &str) -> BTreeMap<String, PolicyDocument> {
        lock(&self.account)
            .roles
            .get(name)
            .map(|record| record.policies.clone())
            .unwrap_or_default()
    }

    pub fn has_instance_profile(&self, name: &str) -> bool {
        lock(&self.account).instance_profiles.contains_key(name)
    }

    /// Records the call and applies any matching fault.
    ///
    /// Returns `Ok(true)` when the call should be refused.
    fn enter(&self, operation: Operation, target: &str) -> Result<bool> {
        lock(&self.journal).push(Call {
            operation,
            target: target.to_string(),
        });
        let fault = lock(&self.faults)
            .iter()
            .find(|(op, fault_target, _)| {
                *op == operation && fault_target.as_deref().is_none_or(|t| t == target)
            })
            .map(|(_, _, fault)| *fault);
        match fault {
            Some(Fault::Raise) => Err(IamError::provider(
                operation.as_str(),
                format!("injected failure for {}", target),
            )),
            Some(Fault::Refuse) => Ok(operation.is_mutating()),
            None => Ok(false),
        }
    }
}

impl IamProvider for InMemoryProvider {
    fn role_exists(&self, name: &str, _ctx: &ConnectionContext) -> Result<bool> {
        self.enter(Operation::RoleExists, name)?;
        Ok(self.has_role(name))
    }

    fn describe_role(
        &self,
        name: &str,
        _ctx: &ConnectionContext,
    ) -> Result<Option<RoleDescription>> {
        self.enter(Operation::DescribeRole, name)?;
        Ok(lock(&self.account)
            .roles
            .get(name)
            .map(|record| RoleDescription {
                name: name.to_string(),
                path: record.path.clone(),
                assume_role_policy_document: record.trust.clone(),
            }))
    }

    fn create_role(
        &self,
        name: &str,
        policy_document: Option<&PolicyDocument>,
        path: Option<&str>,
        _ctx: &ConnectionContext,
    ) -> Result<bool> {
        if self.enter(Operation::CreateRole, name)? {
            return Ok(false);
        }
        let mut account = lock(&self.account);
        if account.roles.contains_key(name) {
            return Ok(false);
        }
        let trust = policy_document
            .cloned()
            .unwrap_or_else(|| self.default_trust_policy.clone());
        account.roles.insert(
            name.to_string(),
            RoleRecord {
                path: path.map(str::to_string),
                trust,
                policies: BTreeMap::new(),
            },
        );
        Ok(true)
    }

    fn build_default_trust_policy(&self, _ctx: &ConnectionContext) -> Result<PolicyDocument> {
        self.enter(Operation::BuildDefaultTrustPolicy, "")?;
        Ok(self.default_trust_policy.clone())
    }

    fn update_assume_role_policy(
        &self,
        name: &str,
        policy_document: &PolicyDocument,
        _ctx: &ConnectionContext,
    ) -> Result<bool> {
        if self.enter(Operation::UpdateAssumeRolePolicy, name)? {
            return Ok(false);
        }
        match lock(&self.account).roles.get_mut(name) {
            Some(record) => {
                record.trust = policy_document.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_role(&self, name: &str, _ctx: &ConnectionContext) -> Result<bool> {
        if self.enter(Operation::DeleteRole, name)? {
            return Ok(false);
        }
        let mut account = lock(&self.account);
        let in_profile = account
            .instance_profiles
            .values()
            .any(|roles| roles.contains(name));
        let removable = !in_profile
            && account
                .roles
                .get(name)
                .is_some_and(|record| record.policies.is_empty());
        if removable {
            account.roles.remove(name);
        }
        Ok(removable)
    }

    fn instance_profile_exists(&self, name: &str, _ctx: &ConnectionContext) -> Result<bool> {
        self.enter(Operation::InstanceProfileExists, name)?;
        Ok(self.has_instance_profile(name))
    }

    fn create_instance_profile(&self, name: &str, _ctx: &ConnectionContext) -> Result<bool> {
        if self.enter(Operation::CreateInstanceProfile, name)? {
            return Ok(false);
        }
        let mut account = lock(&self.account);
        if account.instance_profiles.contains_key(name) {
            return Ok(false);
        }
        account
            .instance_profiles
            .insert(name.to_string(), BTreeSet::new());
        Ok(true)
    }

    fn delete_instance_profile(&self, name: &str, _ctx: &ConnectionContext) -> Result<bool> {
        if self.enter(Operation::DeleteInstanceProfile, name)? {
            return Ok(false);
        }
        let mut account = lock(&self.account);
        let removable = account
            .instance_profiles
            .get(name)
            .is_some_and(BTreeSet::is_empty);
        if removable {
            account.instance_profiles.remove(name);
        }
        Ok(removable)
    }

    fn profile_associated(
        &self,
        profile_name: &str,
        role_name: &str,
        _ctx: &ConnectionContext,
    ) -> Result<bool> {
        self.enter(Operation::ProfileAssociated, profile_name)?;
        Ok(lock(&self.account)
            .instance_profiles
            .get(profile_name)
            .is_some_and(|roles| roles.contains(role_name)))
    }

    fn associate_profile_to_role(
        &self,
        profile_name: &str,
        role_name: &str,
        _ctx: &ConnectionContext,
    ) -> Result<bool> {
        if self.enter(Operation::AssociateProfileToRole, profile_name)? {
            return Ok(false);
        }
        let mut account = lock(&self.account);
        if !account.roles.contains_key(role_name) {
            return Ok(false);
        }
        match account.instance_profiles.get_mut(profile_name) {
            // A profile holds at most one role.
            Some(roles) if roles.is_empty() => {
                roles.insert(role_name.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn disassociate_profile_from_role(
        &self,
        profile_name: &str,
        role_name: &str,
        _ctx: &ConnectionContext,
    ) -> Result<bool> {
        if self.enter(Operation::DisassociateProfileFromRole, profile_name)? {
            return Ok(false);
        }
        Ok(lock(&self.account)
            .instance_profiles
            .get_mut(profile_name)
            .is_some_and(|roles| roles.remove(role_name)))
    }

    fn get_role_policy(
        &self,
        role_name: &str,
        policy_name: &str,
        _ctx: &ConnectionContext,
    ) -> Result<Option<PolicyDocument>> {
        self.enter(Operation::GetRolePolicy, policy_name)?;
        Ok(lock(&self.account)
            .roles
            .get(role_name)
            .and_then(|record| record.policies.get(policy_name).cloned()))
    }

    fn list_role_policies(&self, role_name: &str, _ctx: &ConnectionContext) -> Result<Vec<String>> {
        self.enter(Operation::ListRolePolicies, role_name)?;
        Ok(self.role_policies(role_name).into_keys().collect())
    }

    fn upsert_role_policy(
        &self,
        role_name: &str,
        policy_name: &str,
        document: &PolicyDocument,
        _ctx: &ConnectionContext,
    ) -> Result<bool> {
        if self.enter(Operation::UpsertRolePolicy, policy_name)? {
            return Ok(false);
        }
        match lock(&self.account).roles.get_mut(role_name) {
            Some(record) => {
                record
                    .policies
                    .insert(policy_name.to_string(), document.clone());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_role_policy(
        &self,
        role_name: &str,
        policy_name: &str,
        _ctx: &ConnectionContext,
    ) -> Result<bool> {
        if self.enter(Operation::DeleteRolePolicy, policy_name)? {
            return Ok(false);
        }
        Ok(lock(&self.account)
            .roles
            .get_mut(role_name)
            .is_some_and(|record| record.policies.remove(policy_name).is_some()))
    }
}
