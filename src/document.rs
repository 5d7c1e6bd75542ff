//! Policy documents and inline-policy sets.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// An IAM policy document, kept as an opaque JSON tree.
///
/// Equality is deep structural equality of the tree. No normalization is
/// applied, so reordered statements compare unequal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyDocument(serde_json::Value);

impl PolicyDocument {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Parses a document from JSON text.
    pub fn from_json(text: &str) -> crate::Result<Self> {
        Ok(Self(serde_json::from_str(text)?))
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

impl From<serde_json::Value> for PolicyDocument {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

impl From<PolicyDocument> for serde_json::Value {
    fn from(document: PolicyDocument) -> Self {
        document.0
    }
}

/// Inline policies of a role, keyed by policy name.
pub type PolicyMap = BTreeMap<String, PolicyDocument>;

/// Composes the desired inline-policy set.
///
/// `sources` are folded left to right, so a later source overrides an
/// earlier one on a name collision; `explicit` is applied last and wins over
/// every source.
pub fn merge_policy_sources<I>(sources: I, explicit: &PolicyMap) -> PolicyMap
where
    I: IntoIterator<Item = PolicyMap>,
{
    let mut merged = PolicyMap::new();
    for source in sources {
        merged.extend(source);
    }
    merged.extend(
        explicit
            .iter()
            .map(|(name, document)| (name.clone(), document.clone())),
    );
    merged
}
