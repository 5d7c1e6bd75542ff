//! The remote-operation capability the reconcilers are driven through.

use crate::context::ConnectionContext;
use crate::document::PolicyDocument;
use crate::error::Result;

/// Current state of a role as returned by [`IamProvider::describe_role`].
#[derive(Debug, Clone, PartialEq)]
pub struct RoleDescription {
    pub name: String,
    pub path: Option<String>,
    pub assume_role_policy_document: PolicyDocument,
}

/// Synchronous, already-authenticated access to an IAM account.
///
/// Mutating calls report success as `Ok(true)` and a refused mutation as
/// `Ok(false)`. An `Err` means the call raised; reconcilers treat an `Err`
/// from a mutating call the same as `Ok(false)`. Missing resources are
/// reported as `false`/`None`, never as errors.
///
/// Every call receives the [`ConnectionContext`] of the desired state
/// unchanged.
pub trait IamProvider {
    fn role_exists(&self, name: &str, ctx: &ConnectionContext) -> Result<bool>;

    fn describe_role(&self, name: &str, ctx: &ConnectionContext)
    -> Result<Option<RoleDescription>>;

    /// Creates a role. A `None` document means the provider's default trust policy.
    fn create_role(
        &self,
        name: &str,
        policy_document: Option<&PolicyDocument>,
        path: Option<&str>,
        ctx: &ConnectionContext,
    ) -> Result<bool>;

    /// Builds the trust policy used when a role states none, typically
    /// allowing the compute service of the current partition to assume it.
    fn build_default_trust_policy(&self, ctx: &ConnectionContext) -> Result<PolicyDocument>;

    fn update_assume_role_policy(
        &self,
        name: &str,
        policy_document: &PolicyDocument,
        ctx: &ConnectionContext,
    ) -> Result<bool>;

    fn delete_role(&self, name: &str, ctx: &ConnectionContext) -> Result<bool>;

    fn instance_profile_exists(&self, name: &str, ctx: &ConnectionContext) -> Result<bool>;

    fn create_instance_profile(&self, name: &str, ctx: &ConnectionContext) -> Result<bool>;

    fn delete_instance_profile(&self, name: &str, ctx: &ConnectionContext) -> Result<bool>;

    fn profile_associated(
        &self,
        profile_name: &str,
        role_name: &str,
        ctx: &ConnectionContext,
    ) -> Result<bool>;

    fn associate_profile_to_role(
        &self,
        profile_name: &str,
        role_name: &str,
        ctx: &ConnectionContext,
    ) -> Result<bool>;

    fn disassociate_profile_from_role(
        &self,
        profile_name: &str,
        role_name: &str,
        ctx: &ConnectionContext,
    ) -> Result<bool>;

    fn get_role_policy(
        &self,
        role_name: &str,
        policy_name: &str,
        ctx: &ConnectionContext,
    ) -> Result<Option<PolicyDocument>>;

    /// Names of the inline policies on the role, in provider order.
    fn list_role_policies(&self, role_name: &str, ctx: &ConnectionContext) -> Result<Vec<String>>;

    /// Creates or replaces an inline policy by name.
    fn upsert_role_policy(
        &self,
        role_name: &str,
        policy_name: &str,
        document: &PolicyDocument,
        ctx: &ConnectionContext,
    ) -> Result<bool>;

    fn delete_role_policy(
        &self,
        role_name: &str,
        policy_name: &str,
        ctx: &ConnectionContext,
    ) -> Result<bool>;
}
