//! Properties that hold across a range of starting states.

use std::io::Write;

use iam_role_state::memory::{InMemoryProvider, ec2_trust_policy};
use iam_role_state::{
    ConnectionContext, DesiredRoleSpec, JsonPillar, PolicyDocument, ReconcileConfig, RoleState,
    Status,
};
use serde_json::json;

fn doc(sid: &str) -> PolicyDocument {
    PolicyDocument::new(json!({"Statement": [{"Sid": sid, "Effect": "Allow"}]}))
}

fn lambda_trust() -> PolicyDocument {
    PolicyDocument::new(json!({
        "Statement": [{
            "Effect": "Allow",
            "Principal": {"Service": "lambda.amazonaws.com"},
            "Action": "sts:AssumeRole"
        }]
    }))
}

/// Starting accounts, from empty to fully populated with drift.
fn accounts() -> Vec<InMemoryProvider> {
    let empty = InMemoryProvider::new();

    let bare_role = InMemoryProvider::new();
    bare_role.insert_role("app", ec2_trust_policy());

    let drifted = InMemoryProvider::new();
    drifted.insert_role("app", lambda_trust());
    drifted.insert_role_policy("app", "a", doc("stale"));
    drifted.insert_role_policy("app", "manual", doc("M"));
    drifted.insert_instance_profile("app", None);

    let converged = InMemoryProvider::new();
    converged.insert_role("app", ec2_trust_policy());
    converged.insert_role_policy("app", "a", doc("A"));
    converged.insert_instance_profile("app", Some("app"));

    vec![empty, bare_role, drifted, converged]
}

fn specs() -> Vec<DesiredRoleSpec> {
    vec![
        DesiredRoleSpec::new("app"),
        DesiredRoleSpec::new("app").with_policy("a", doc("A")),
        DesiredRoleSpec::new("app")
            .with_policy("a", doc("A"))
            .with_policy("b", doc("B"))
            .with_delete_policies(false),
        DesiredRoleSpec::new("app")
            .with_policy_document(lambda_trust())
            .with_instance_profile(false),
    ]
}

#[test]
fn dry_run_never_mutates() {
    for spec in specs() {
        for account in accounts() {
            let state = RoleState::new(&account, ReconcileConfig::default().with_dry_run(true));

            let outcome = state.present(&spec);
            assert_ne!(outcome.status, Status::Failed);
            assert!(outcome.changes.is_empty());

            let removal = state.absent(&spec.name, &spec.connection);
            assert_ne!(removal.status, Status::Failed);

            assert!(
                account.mutating_calls().is_empty(),
                "dry run mutated: {:?}",
                account.mutating_calls()
            );
        }
    }
}

#[test]
fn present_is_idempotent() {
    for spec in specs() {
        for account in accounts() {
            let state = RoleState::new(&account, ReconcileConfig::default());

            let first = state.present(&spec);
            assert_eq!(first.status, Status::Succeeded, "first run: {:?}", first);

            let second = state.present(&spec);
            assert_eq!(second.status, Status::Succeeded);
            assert!(second.changes.is_empty(), "second run changed: {:?}", second.changes);
        }
    }
}

#[test]
fn pending_only_when_something_would_change() {
    for spec in specs() {
        for account in accounts() {
            RoleState::new(&account, ReconcileConfig::default()).present(&spec);
            let preview = RoleState::new(&account, ReconcileConfig::default().with_dry_run(true))
                .present(&spec);
            assert_eq!(preview.status, Status::Succeeded);
        }
    }
}

#[test]
fn absent_after_present_clears_account() {
    for spec in specs() {
        for account in accounts() {
            let state = RoleState::new(&account, ReconcileConfig::default());
            state.present(&spec);

            let outcome = state.absent(&spec.name, &spec.connection);
            assert_eq!(outcome.status, Status::Succeeded, "absent: {:?}", outcome);
            assert!(!account.has_role("app"));
            assert!(!account.has_instance_profile("app"));
        }
    }
}

#[test]
fn pillar_file_feeds_policy_set() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "{}",
        json!({"iam": {"shared": {"Shared": {"Statement": [{"Sid": "S", "Effect": "Allow"}]}}}})
    )
    .unwrap();
    let pillars = JsonPillar::from_file(file.path()).unwrap();

    let account = InMemoryProvider::new();
    let state = RoleState::new(&account, ReconcileConfig::default()).with_pillars(&pillars);
    let spec = DesiredRoleSpec::new("app")
        .with_pillar_source("iam:shared")
        .with_connection(ConnectionContext::region("eu-central-1"));

    assert_eq!(state.present(&spec).status, Status::Succeeded);
    assert_eq!(account.role_policies("app")["Shared"], doc("S"));
}
