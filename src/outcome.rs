//! The result record every reconciler returns and the orchestrator merges.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::config::CommentFormat;

/// Tri-state result of a reconciliation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// State matches, or every mutation went through.
    Succeeded,
    /// Dry-run: a mutation would have been issued.
    Pending,
    /// A mutating call was refused or raised.
    Failed,
}

impl Status {
    /// Returns `true` for a hard failure. Pending is not a failure.
    pub fn is_failed(self) -> bool {
        self == Status::Failed
    }

    /// Combines two statuses: any failure wins, then any pending.
    pub fn combine(self, other: Status) -> Status {
        match (self, other) {
            (Status::Failed, _) | (_, Status::Failed) => Status::Failed,
            (Status::Pending, _) | (_, Status::Pending) => Status::Pending,
            _ => Status::Succeeded,
        }
    }

    /// Host encoding: `true`, `false`, or `null` for pending.
    pub fn as_result(self) -> Option<bool> {
        match self {
            Status::Succeeded => Some(true),
            Status::Failed => Some(false),
            Status::Pending => None,
        }
    }
}

/// The sub-resource a change entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKey {
    Role,
    PolicyDocument,
    InstanceProfile,
    ProfileAssociated,
    Policies,
}

/// Before/after snapshots keyed by sub-resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Changes {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    old: BTreeMap<ChangeKey, Value>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    new: BTreeMap<ChangeKey, Value>,
}

impl Changes {
    pub fn is_empty(&self) -> bool {
        self.old.is_empty() && self.new.is_empty()
    }

    pub fn old(&self, key: ChangeKey) -> Option<&Value> {
        self.old.get(&key)
    }

    pub fn new_value(&self, key: ChangeKey) -> Option<&Value> {
        self.new.get(&key)
    }

    /// Keys that have an entry on either side.
    pub fn keys(&self) -> Vec<ChangeKey> {
        let mut keys: Vec<ChangeKey> = self.old.keys().chain(self.new.keys()).copied().collect();
        keys.sort();
        keys.dedup();
        keys
    }

    pub(crate) fn set_old(&mut self, key: ChangeKey, value: Value) {
        self.old.insert(key, value);
    }

    pub(crate) fn set_new(&mut self, key: ChangeKey, value: Value) {
        self.new.insert(key, value);
    }

    /// Adds `other`'s entries next to the existing ones.
    ///
    /// Every reconciler owns its own key, so a collision means two steps
    /// reported the same sub-resource; the later snapshot is kept and the
    /// overwrite is logged.
    pub fn merge(&mut self, other: Changes) {
        for (side, mine, theirs) in [
            ("old", &mut self.old, other.old),
            ("new", &mut self.new, other.new),
        ] {
            for (key, value) in theirs {
                if let Some(previous) = mine.insert(key, value) {
                    tracing::warn!(?key, side, %previous, "change entry overwritten by later step");
                }
            }
        }
    }
}

/// Result of a reconciliation step or of a whole run.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub status: Status,
    /// One fragment per step in execution order; empty fragments are kept.
    pub message: Vec<String>,
    pub changes: Changes,
}

impl Default for Outcome {
    fn default() -> Self {
        Self {
            status: Status::Succeeded,
            message: Vec::new(),
            changes: Changes::default(),
        }
    }
}

impl Outcome {
    pub fn succeeded(message: impl Into<String>) -> Self {
        Self::with_status(Status::Succeeded, message)
    }

    pub fn pending(message: impl Into<String>) -> Self {
        Self::with_status(Status::Pending, message)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::with_status(Status::Failed, message)
    }

    fn with_status(status: Status, message: impl Into<String>) -> Self {
        Self {
            status,
            message: vec![message.into()],
            changes: Changes::default(),
        }
    }

    /// Records a before/after snapshot for `key`.
    pub fn with_change(
        mut self,
        key: ChangeKey,
        old: impl Into<Value>,
        new: impl Into<Value>,
    ) -> Self {
        self.changes.set_old(key, old.into());
        self.changes.set_new(key, new.into());
        self
    }

    pub fn is_failed(&self) -> bool {
        self.status.is_failed()
    }

    pub fn is_pending(&self) -> bool {
        self.status == Status::Pending
    }

    /// Folds a later step into this outcome.
    pub fn merge(&mut self, step: Outcome) {
        self.status = self.status.combine(step.status);
        self.message.extend(step.message);
        self.changes.merge(step.changes);
    }

    /// Renders the message fragments as one comment string.
    pub fn comment(&self, format: CommentFormat) -> String {
        match format {
            CommentFormat::Legacy => self.message.iter().fold(String::new(), |mut acc, fragment| {
                acc.push(' ');
                acc.push_str(fragment);
                acc
            }),
            CommentFormat::Fragments => self
                .message
                .iter()
                .filter(|fragment| !fragment.is_empty())
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    /// Converts into the record a host state engine expects.
    pub fn into_state_return(self, name: impl Into<String>, format: CommentFormat) -> StateReturn {
        StateReturn {
            name: name.into(),
            result: self.status.as_result(),
            comment: self.comment(format),
            changes: self.changes,
        }
    }
}

/// Host-facing result: `{name, result, comment, changes}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateReturn {
    pub name: String,
    pub result: Option<bool>,
    pub comment: String,
    pub changes: Changes,
}
