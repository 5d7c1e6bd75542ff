use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::context::ConnectionContext;
use crate::document::{PolicyDocument, PolicyMap};
use crate::error::Result;

/// Desired state of one IAM role.
///
/// Deserializes from the state arguments a host passes in:
///
/// ```
/// use iam_role_state::DesiredRoleSpec;
///
/// let spec = DesiredRoleSpec::from_json(r#"{
///     "name": "myrole",
///     "policies_from_pillars": ["shared_iam_bootstrap_policy"],
///     "policies": {
///         "MySQSPolicy": {"Statement": [{"Action": ["sqs:*"], "Effect": "Allow"}]}
///     },
///     "region": "us-east-1"
/// }"#).unwrap();
///
/// assert!(spec.create_instance_profile);
/// assert!(spec.delete_policies_not_in_spec);
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct DesiredRoleSpec {
    /// Name of the role; the instance profile shares it.
    pub name: String,

    /// Trust (assume-role) document. When absent the provider's default is used.
    #[serde(default)]
    pub policy_document: Option<PolicyDocument>,

    /// Path attribute passed on role creation.
    #[serde(default)]
    pub path: Option<String>,

    /// Inline policies stated directly; these win over pillar policies.
    #[serde(default)]
    pub policies: PolicyMap,

    /// Pillar keys whose policy maps are merged in order.
    #[serde(default)]
    pub policies_from_pillars: Vec<String>,

    #[serde(default = "default_true")]
    pub create_instance_profile: bool,

    /// Remove inline policies that are not in the desired set.
    #[serde(default = "default_true", alias = "delete_policies")]
    pub delete_policies_not_in_spec: bool,

    #[serde(flatten)]
    pub connection: ConnectionContext,
}

fn default_true() -> bool {
    true
}

impl DesiredRoleSpec {
    /// Creates a spec with the host defaults: instance profile on, stray
    /// policies deleted, no explicit documents.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            policy_document: None,
            path: None,
            policies: PolicyMap::new(),
            policies_from_pillars: Vec::new(),
            create_instance_profile: true,
            delete_policies_not_in_spec: true,
            connection: ConnectionContext::default(),
        }
    }

    /// Parses a spec from JSON text.
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Reads a spec from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn with_policy_document(mut self, document: impl Into<PolicyDocument>) -> Self {
        self.policy_document = Some(document.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_policy(
        mut self,
        name: impl Into<String>,
        document: impl Into<PolicyDocument>,
    ) -> Self {
        self.policies.insert(name.into(), document.into());
        self
    }

    pub fn with_pillar_source(mut self, key: impl Into<String>) -> Self {
        self.policies_from_pillars.push(key.into());
        self
    }

    pub fn with_instance_profile(mut self, create: bool) -> Self {
        self.create_instance_profile = create;
        self
    }

    pub fn with_delete_policies(mut self, delete: bool) -> Self {
        self.delete_policies_not_in_spec = delete;
        self
    }

    pub fn with_connection(mut self, connection: ConnectionContext) -> Self {
        self.connection = connection;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_from_minimal_json() {
        let spec = DesiredRoleSpec::from_json(r#"{"name": "app"}"#).unwrap();
        assert_eq!(spec.name, "app");
        assert!(spec.create_instance_profile);
        assert!(spec.delete_policies_not_in_spec);
        assert!(spec.policies.is_empty());
        assert!(spec.policy_document.is_none());
        assert_eq!(spec.connection, ConnectionContext::default());
    }

    #[test]
    fn delete_policies_alias() {
        let spec =
            DesiredRoleSpec::from_json(r#"{"name": "app", "delete_policies": false}"#).unwrap();
        assert!(!spec.delete_policies_not_in_spec);
    }

    #[test]
    fn connection_fields_are_flattened() {
        let spec = DesiredRoleSpec::from_json(
            r#"{"name": "app", "region": "eu-west-1", "profile": "ops"}"#,
        )
        .unwrap();
        assert_eq!(spec.connection.region.as_deref(), Some("eu-west-1"));
        assert_eq!(spec.connection.profile, Some(json!("ops")));
    }

    #[test]
    fn null_policy_document_means_default() {
        let spec =
            DesiredRoleSpec::from_json(r#"{"name": "app", "policy_document": null}"#).unwrap();
        assert!(spec.policy_document.is_none());
    }

    #[test]
    fn missing_name_is_error() {
        assert!(DesiredRoleSpec::from_json(r#"{"path": "/"}"#).is_err());
    }

    #[test]
    fn builder_matches_defaults() {
        let spec = DesiredRoleSpec::new("app")
            .with_path("/service/")
            .with_policy("p", json!({"Statement": []}))
            .with_pillar_source("shared")
            .with_instance_profile(false)
            .with_delete_policies(false);
        assert_eq!(spec.path.as_deref(), Some("/service/"));
        assert_eq!(spec.policies.len(), 1);
        assert_eq!(spec.policies_from_pillars, vec!["shared".to_string()]);
        assert!(!spec.create_instance_profile);
        assert!(!spec.delete_policies_not_in_spec);
    }
}
