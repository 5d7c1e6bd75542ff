//! Declarative reconciliation of IAM roles.
//!
//! Given the desired state of a role (trust policy, inline policies,
//! instance-profile association), this crate reads the current state through
//! an [`IamProvider`], issues the create/update/delete calls needed to
//! converge, and reports what changed as an [`Outcome`].
//!
//! - [`RoleState::present`]: create or converge the role, its instance
//!   profile and association, and its inline policies
//! - [`RoleState::absent`]: remove inline policies, the instance profile and
//!   the role, in that order
//!
//! Dry-run mode ([`ReconcileConfig::with_dry_run`]) reports
//! [`Status::Pending`] for every step that would mutate and issues only
//! read calls.
//!
//! # Quick Start
//!
//! ```
//! use iam_role_state::memory::InMemoryProvider;
//! use iam_role_state::{DesiredRoleSpec, ReconcileConfig, RoleState, Status};
//! use serde_json::json;
//!
//! let account = InMemoryProvider::new();
//! let state = RoleState::new(&account, ReconcileConfig::default());
//!
//! let spec = DesiredRoleSpec::new("myrole").with_policy(
//!     "MySQSPolicy",
//!     json!({"Statement": [{"Action": ["sqs:*"], "Effect": "Allow", "Resource": ["*"]}]}),
//! );
//!
//! let outcome = state.present(&spec);
//! assert_eq!(outcome.status, Status::Succeeded);
//!
//! // A second run finds nothing to do.
//! let again = state.present(&spec);
//! assert!(again.changes.is_empty());
//! ```

pub mod config;
pub mod context;
pub mod desired;
pub mod document;
pub mod error;
pub mod memory;
pub mod outcome;
pub mod pillar;
pub mod provider;
pub mod reconcile;
pub mod state;

pub use config::{CommentFormat, ReconcileConfig};
pub use context::ConnectionContext;
pub use desired::DesiredRoleSpec;
pub use document::{PolicyDocument, PolicyMap, merge_policy_sources};
pub use error::{IamError, Result};
pub use outcome::{ChangeKey, Changes, Outcome, StateReturn, Status};
pub use pillar::{JsonPillar, NoPillars, PillarSource};
pub use provider::{IamProvider, RoleDescription};
pub use state::RoleState;

// One provider is shared by every invocation, and outcomes and errors cross
// back to whichever thread the host runs the state on.
const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}
    let _ = assert_send_sync::<memory::InMemoryProvider>;
    let _ = assert_send_sync::<IamError>;
    let _ = assert_send_sync::<Outcome>;
    let _ = assert_send_sync::<DesiredRoleSpec>;
};
