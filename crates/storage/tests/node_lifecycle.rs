#![forbid(unsafe_code)]

use gt_core::ids::UserId;
use gt_core::model::{ContributionKind, MAX_TREE_DEPTH, VersionStatus};
use gt_storage::{CreateNodeRequest, SetValueRequest, SqliteStore, StoreError};
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

fn set_value(store: &mut SqliteStore, node: &str, key: &str, amount: f64) {
    store
        .set_value(
            &user(),
            SetValueRequest {
                node_id: node.to_string(),
                version_prestige: 0,
                key: key.to_string(),
                amount,
            },
        )
        .expect("set value");
}

#[test]
fn initial_version_shape() {
    let storage_dir = temp_dir("initial_version_shape");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");

    let node = store
        .create_node(
            &user(),
            CreateNodeRequest {
                name: "meditate".to_string(),
                parent_id: None,
                is_root: true,
                owner_id: Some("user-1".to_string()),
                schedule_ms: Some(42_000),
                reeffect_hours: Some(12.0),
            },
        )
        .expect("create node");

    assert_eq!(node.prestige, 0);
    assert!(node.global_values.is_empty());
    assert!(node.is_root);
    assert_eq!(node.owner_id.as_deref(), Some("user-1"));

    let v0 = store
        .get_version(&node.id, 0)
        .expect("get version")
        .expect("version exists");
    assert_eq!(v0.prestige, 0);
    assert_eq!(v0.status, VersionStatus::Active);
    assert!(v0.values.is_empty());
    assert!(v0.goals.is_empty());
    assert_eq!(v0.schedule_ms, Some(42_000));
    assert_eq!(v0.reeffect_hours, 12.0);
}

#[test]
fn create_validates_inputs() {
    let storage_dir = temp_dir("create_validates_inputs");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");

    let err = store
        .create_node(
            &user(),
            CreateNodeRequest {
                name: "  ".to_string(),
                parent_id: None,
                is_root: true,
                owner_id: None,
                schedule_ms: None,
                reeffect_hours: None,
            },
        )
        .expect_err("blank name");
    assert!(matches!(err, StoreError::InvalidInput(_)));

    for bad_reeffect in [-1.0, 1_000_001.0, f64::NAN] {
        let err = store
            .create_node(
                &user(),
                CreateNodeRequest {
                    name: "habit".to_string(),
                    parent_id: None,
                    is_root: true,
                    owner_id: None,
                    schedule_ms: None,
                    reeffect_hours: Some(bad_reeffect),
                },
            )
            .expect_err("reeffect out of range");
        assert!(matches!(err, StoreError::InvalidInput(_)));
    }

    let err = store
        .create_node(
            &user(),
            CreateNodeRequest {
                name: "orphan".to_string(),
                parent_id: Some("NODE-999".to_string()),
                is_root: false,
                owner_id: None,
                schedule_ms: None,
                reeffect_hours: None,
            },
        )
        .expect_err("missing parent");
    match err {
        StoreError::NodeNotFound { id } => assert_eq!(id, "NODE-999"),
        other => panic!("expected NodeNotFound, got {other:?}"),
    }
}

#[test]
fn create_rejects_over_deep_chains() {
    let storage_dir = temp_dir("create_rejects_over_deep_chains");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");

    let mut parent = create_node(&mut store, "depth-0", None);
    for depth in 1..=MAX_TREE_DEPTH {
        parent = create_node(&mut store, &format!("depth-{depth}"), Some(&parent));
    }

    let err = store
        .create_node(
            &user(),
            CreateNodeRequest {
                name: "one-too-deep".to_string(),
                parent_id: Some(parent),
                is_root: false,
                owner_id: None,
                schedule_ms: None,
                reeffect_hours: None,
            },
        )
        .expect_err("chain must stay bounded");
    match err {
        StoreError::TreeDepthExceeded => {}
        other => panic!("expected TreeDepthExceeded, got {other:?}"),
    }
}

#[test]
fn delete_cascades_subtree_and_reaggregates() {
    let storage_dir = temp_dir("delete_cascades_subtree_and_reaggregates");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");

    let root = create_node(&mut store, "root", None);
    let mid = create_node(&mut store, "mid", Some(&root));
    let leaf = create_node(&mut store, "leaf", Some(&mid));

    set_value(&mut store, &mid, "wood", 2.0);
    set_value(&mut store, &leaf, "gold", 3.0);

    let root_row = store.get_node(&root).expect("get root").expect("root");
    assert_eq!(root_row.global_values.get("wood"), 2.0);
    assert_eq!(root_row.global_values.get("gold"), 3.0);

    let outcome = store.delete_node(&user(), &mid).expect("delete mid");
    assert_eq!(outcome.ancestors_updated, 1);
    assert_eq!(outcome.broken_parent, None);

    assert!(store.get_node(&mid).expect("get mid").is_none());
    assert!(store.get_node(&leaf).expect("get leaf").is_none());

    // The subtree's totals were backed out of the former ancestors.
    let root_row = store.get_node(&root).expect("get root").expect("root");
    assert!(root_row.global_values.is_empty());
    assert!(store.list_children(&root).expect("children").is_empty());

    // History of the deleted subtree is gone; only the deletion itself
    // remains on record.
    let mid_log = store
        .list_node_contributions(&mid, 64)
        .expect("mid contributions");
    assert_eq!(mid_log.len(), 1);
    assert_eq!(mid_log[0].kind, ContributionKind::Delete);
    assert!(
        store
            .list_node_contributions(&leaf, 64)
            .expect("leaf contributions")
            .is_empty()
    );
}

#[test]
fn contribution_log_is_ordered_and_cursorable() {
    let storage_dir = temp_dir("contribution_log_is_ordered_and_cursorable");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");

    let node = create_node(&mut store, "journal", None);
    set_value(&mut store, &node, "pages", 1.0);
    set_value(&mut store, &node, "pages", 2.0);
    store.advance_prestige(&user(), &node).expect("advance");

    let first_page = store.list_contributions(None, 2).expect("first page");
    assert_eq!(first_page.len(), 2);
    assert_eq!(first_page[0].kind, ContributionKind::Create);
    assert!(first_page[0].seq < first_page[1].seq);

    let cursor = first_page[1].contribution_id();
    let rest = store
        .list_contributions(Some(&cursor), 64)
        .expect("second page");
    assert_eq!(rest.len(), 2);
    assert_eq!(rest[0].kind, ContributionKind::Value);
    assert_eq!(rest[1].kind, ContributionKind::Prestige);

    let err = store
        .list_contributions(Some("bogus"), 8)
        .expect_err("bad cursor");
    assert!(matches!(err, StoreError::InvalidInput(_)));
}

#[test]
fn contributors_are_recorded_on_roots_only() {
    let storage_dir = temp_dir("contributors_are_recorded_on_roots_only");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");

    let root = create_node(&mut store, "root", None);
    let child = create_node(&mut store, "child", Some(&root));
    let invitee = UserId::try_new("user-2").expect("user id");

    store
        .add_contributor(&user(), &root, &invitee)
        .expect("add contributor");
    assert_eq!(
        store.list_contributors(&root).expect("list contributors"),
        vec!["user-2".to_string()]
    );

    let err = store
        .add_contributor(&user(), &child, &invitee)
        .expect_err("child nodes take no contributors");
    assert!(matches!(err, StoreError::InvalidInput(_)));
}
