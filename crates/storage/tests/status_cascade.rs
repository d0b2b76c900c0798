#![forbid(unsafe_code)]

use gt_core::ids::UserId;
use gt_core::model::{ContributionKind, VersionStatus};
use gt_storage::{CreateNodeRequest, EditStatusRequest, SqliteStore, StoreError};
use std::path::PathBuf;

fn temp_dir(test_name: &str) -> PathBuf {
    let base = std::env::temp_dir();
    let pid = std::process::id();
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let dir = base.join(format!("gt_storage_{test_name}_{pid}_{nonce}"));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn user() -> UserId {
    UserId::try_new("user-1").expect("user id")
}

fn create_node(store: &mut SqliteStore, name: &str, parent: Option<&str>) -> String {
    store
        .create_node(
            &user(),
            CreateNodeRequest {
                name: name.to_string(),
                parent_id: parent.map(str::to_string),
                is_root: parent.is_none(),
                owner_id: None,
                schedule_ms: None,
                reeffect_hours: None,
            },
        )
        .expect("create node")
        .id
}

fn status_of(store: &SqliteStore, node: &str, prestige: i64) -> VersionStatus {
    store
        .get_version(node, prestige)
        .expect("get version")
        .expect("version exists")
        .status
}

#[test]
fn inherited_change_targets_each_childs_current_prestige() {
    let storage_dir = temp_dir("inherited_change_targets_each_childs_current_prestige");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");

    let root = create_node(&mut store, "root", None);
    let left = create_node(&mut store, "left", Some(&root));
    let right = create_node(&mut store, "right", Some(&root));
    let grandchild = create_node(&mut store, "grandchild", Some(&left));

    // Right branch has cycled once, so its current version is 1.
    store.advance_prestige(&user(), &right).expect("advance right");

    let outcome = store
        .edit_status(
            &user(),
            EditStatusRequest {
                node_id: root.clone(),
                version_prestige: 0,
                status: VersionStatus::Trimmed,
                inherited: true,
            },
        )
        .expect("cascade trim");
    assert_eq!(outcome.versions_updated, 4);
    assert_eq!(outcome.stopped_at, None);

    assert_eq!(status_of(&store, &root, 0), VersionStatus::Trimmed);
    assert_eq!(status_of(&store, &left, 0), VersionStatus::Trimmed);
    assert_eq!(status_of(&store, &grandchild, 0), VersionStatus::Trimmed);
    // The cascade follows each child's own current prestige, not the
    // parent's targeted version number.
    assert_eq!(status_of(&store, &right, 1), VersionStatus::Trimmed);
    assert_eq!(status_of(&store, &right, 0), VersionStatus::Completed);
}

#[test]
fn divider_touches_only_the_target_node() {
    let storage_dir = temp_dir("divider_touches_only_the_target_node");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");

    let root = create_node(&mut store, "root", None);
    let child = create_node(&mut store, "child", Some(&root));

    let outcome = store
        .edit_status(
            &user(),
            EditStatusRequest {
                node_id: root.clone(),
                version_prestige: 0,
                status: VersionStatus::Divider,
                inherited: true,
            },
        )
        .expect("set divider");
    assert_eq!(outcome.versions_updated, 1);

    assert_eq!(status_of(&store, &root, 0), VersionStatus::Divider);
    assert_eq!(status_of(&store, &child, 0), VersionStatus::Active);
}

#[test]
fn non_inherited_change_stops_at_the_node() {
    let storage_dir = temp_dir("non_inherited_change_stops_at_the_node");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");

    let root = create_node(&mut store, "root", None);
    let child = create_node(&mut store, "child", Some(&root));

    store
        .edit_status(
            &user(),
            EditStatusRequest {
                node_id: root.clone(),
                version_prestige: 0,
                status: VersionStatus::Completed,
                inherited: false,
            },
        )
        .expect("complete root version");

    assert_eq!(status_of(&store, &root, 0), VersionStatus::Completed);
    assert_eq!(status_of(&store, &child, 0), VersionStatus::Active);
}

#[test]
fn cascade_logs_one_contribution_per_node_touched() {
    let storage_dir = temp_dir("cascade_logs_one_contribution_per_node_touched");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");

    let root = create_node(&mut store, "root", None);
    let child = create_node(&mut store, "child", Some(&root));

    store
        .edit_status(
            &user(),
            EditStatusRequest {
                node_id: root.clone(),
                version_prestige: 0,
                status: VersionStatus::Trimmed,
                inherited: true,
            },
        )
        .expect("cascade trim");

    let child_log = store
        .list_node_contributions(&child, 64)
        .expect("child contributions");
    let status_entries: Vec<_> = child_log
        .iter()
        .filter(|entry| entry.kind == ContributionKind::Status)
        .collect();
    assert_eq!(status_entries.len(), 1);
    assert!(status_entries[0].payload_json.contains("\"inherited\":true"));
}

#[test]
fn missing_target_version_is_not_found() {
    let storage_dir = temp_dir("missing_target_version_is_not_found");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");
    let root = create_node(&mut store, "root", None);

    let err = store
        .edit_status(
            &user(),
            EditStatusRequest {
                node_id: root.clone(),
                version_prestige: 7,
                status: VersionStatus::Trimmed,
                inherited: false,
            },
        )
        .expect_err("expected missing version");
    match err {
        StoreError::VersionNotFound { node_id, prestige } => {
            assert_eq!(node_id, root);
            assert_eq!(prestige, 7);
        }
        other => panic!("expected VersionNotFound, got {other:?}"),
    }
}
