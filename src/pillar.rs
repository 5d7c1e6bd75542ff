//! Shared policy maps pulled from the host's pillar store.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::document::PolicyMap;
use crate::error::{IamError, Result};

/// Looks up a policy map by pillar key.
pub trait PillarSource {
    /// Returns the policy map stored under `key`, or an empty map when the
    /// key is not present.
    fn get(&self, key: &str) -> Result<PolicyMap>;
}

/// Pillar store with no data; every lookup yields an empty map.
pub struct NoPillars;

impl PillarSource for NoPillars {
    fn get(&self, _key: &str) -> Result<PolicyMap> {
        Ok(PolicyMap::new())
    }
}

impl PillarSource for BTreeMap<String, PolicyMap> {
    fn get(&self, key: &str) -> Result<PolicyMap> {
        Ok(BTreeMap::get(self, key).cloned().unwrap_or_default())
    }
}

/// Pillar data loaded from a JSON object.
///
/// Keys may be nested with `:` as separator (`iam:shared_policies`), the
/// same lookup syntax hosts use for pillar paths.
pub struct JsonPillar {
    root: serde_json::Value,
}

impl JsonPillar {
    /// Parses pillar data from JSON text.
    pub fn parse(content: &str) -> Result<Self> {
        let root: serde_json::Value = serde_json::from_str(content)?;
        if !root.is_object() {
            return Err(IamError::Pillar("pillar root must be a JSON object".into()));
        }
        Ok(Self { root })
    }

    /// Reads pillar data from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            IamError::Pillar(format!("cannot read pillar file {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    fn lookup(&self, key: &str) -> Option<&serde_json::Value> {
        key.split(':')
            .try_fold(&self.root, |node, segment| node.get(segment))
    }
}

impl PillarSource for JsonPillar {
    fn get(&self, key: &str) -> Result<PolicyMap> {
        match self.lookup(key) {
            None | Some(serde_json::Value::Null) => Ok(PolicyMap::new()),
            Some(value @ serde_json::Value::Object(_)) => serde_json::from_value(value.clone())
                .map_err(|e| IamError::Pillar(format!("key '{}': {}", key, e))),
            Some(_) => Err(IamError::Pillar(format!(
                "key '{}' does not hold a policy mapping",
                key
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::PolicyDocument;
    use serde_json::json;

    #[test]
    fn missing_key_is_empty() {
        let pillar = JsonPillar::parse(r#"{"other": {}}"#).unwrap();
        assert!(pillar.get("shared").unwrap().is_empty());
        assert!(NoPillars.get("shared").unwrap().is_empty());
    }

    #[test]
    fn nested_key_lookup() {
        let pillar = JsonPillar::parse(
            r#"{"iam": {"bootstrap": {"Logs": {"Statement": [{"Effect": "Allow"}]}}}}"#,
        )
        .unwrap();
        let policies = pillar.get("iam:bootstrap").unwrap();
        assert_eq!(
            policies["Logs"],
            PolicyDocument::new(json!({"Statement": [{"Effect": "Allow"}]}))
        );
    }

    #[test]
    fn non_mapping_value_is_error() {
        let pillar = JsonPillar::parse(r#"{"shared": ["not", "a", "map"]}"#).unwrap();
        let err = pillar.get("shared").unwrap_err();
        assert!(matches!(err, IamError::Pillar(_)));
    }

    #[test]
    fn root_must_be_object() {
        assert!(JsonPillar::parse("[]").is_err());
    }

    #[test]
    fn btreemap_source() {
        let mut store = BTreeMap::new();
        let mut policies = PolicyMap::new();
        policies.insert("p".to_string(), PolicyDocument::new(json!({})));
        store.insert("shared".to_string(), policies);
        assert_eq!(PillarSource::get(&store, "shared").unwrap().len(), 1);
        assert!(PillarSource::get(&store, "absent").unwrap().is_empty());
    }
}
