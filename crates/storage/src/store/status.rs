#![forbid(unsafe_code)]

use super::*;
use rusqlite::{Transaction, params};

/// How far an inherited status change actually reached.
///
/// `stopped_at` names a descendant whose current version row was
/// missing; the cascade stops descending there and everything already
/// applied stands.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CascadeOutcome {
    pub versions_updated: usize,
    pub stopped_at: Option<String>,
}

impl SqliteStore {
    /// Sets the status of the targeted version. With `inherited` the
    /// change walks the whole descendant subtree, touching each child's
    /// *current-prestige* version rather than a version-number match, so
    /// sibling branches that have cycled a different number of times
    /// still move together. Divider never cascades.
    pub fn edit_status(
        &mut self,
        user: &UserId,
        request: EditStatusRequest,
    ) -> Result<CascadeOutcome, StoreError> {
        let EditStatusRequest {
            node_id,
            version_prestige,
            status,
            inherited,
        } = request;

        let now_ms = now_ms();
        let tx = self.conn.transaction()?;
        require_node(&tx, &node_id)?;
        require_version(&tx, &node_id, version_prestige)?;

        write_status_tx(&tx, &node_id, version_prestige, status)?;
        touch_node_tx(&tx, &node_id, now_ms)?;
        insert_contribution_tx(
            &tx,
            &node_id,
            user,
            ContributionKind::Status,
            version_prestige,
            status_payload(status, false),
            now_ms,
        )?;

        let mut outcome = CascadeOutcome {
            versions_updated: 1,
            stopped_at: None,
        };

        if inherited && status.cascades() {
            cascade_status_tx(&tx, user, &node_id, status, now_ms, &mut outcome)?;
        }

        tx.commit()?;
        Ok(outcome)
    }
}

fn cascade_status_tx(
    tx: &Transaction<'_>,
    user: &UserId,
    root: &str,
    status: VersionStatus,
    now_ms: i64,
    outcome: &mut CascadeOutcome,
) -> Result<(), StoreError> {
    let mut seen = BTreeSet::new();
    seen.insert(root.to_string());

    let mut queue: Vec<(String, usize)> = child_ids(tx, root)?
        .into_iter()
        .map(|id| (id, 1usize))
        .collect();

    while let Some((id, depth)) = queue.pop() {
        if !seen.insert(id.clone()) {
            return Err(StoreError::NodeCycle);
        }
        if depth > MAX_TREE_DEPTH {
            return Err(StoreError::TreeDepthExceeded);
        }

        let node = require_node(tx, &id)?;
        if load_version(tx, &id, node.prestige)?.is_none() {
            // Corrupted chain below this point; apply nothing further
            // down this subtree and surface where the walk ended.
            outcome.stopped_at = Some(id);
            break;
        }

        write_status_tx(tx, &id, node.prestige, status)?;
        touch_node_tx(tx, &id, now_ms)?;
        insert_contribution_tx(
            tx,
            &id,
            user,
            ContributionKind::Status,
            node.prestige,
            status_payload(status, true),
            now_ms,
        )?;
        outcome.versions_updated += 1;

        for child in child_ids(tx, &id)? {
            queue.push((child, depth + 1));
        }
    }

    Ok(())
}

fn write_status_tx(
    tx: &Transaction<'_>,
    node_id: &str,
    prestige: i64,
    status: VersionStatus,
) -> Result<(), StoreError> {
    let updated = tx.execute(
        "UPDATE versions SET status=?3 WHERE node_id=?1 AND prestige=?2",
        params![node_id, prestige, status.as_str()],
    )?;
    if updated == 0 {
        return Err(StoreError::VersionNotFound {
            node_id: node_id.to_string(),
            prestige,
        });
    }
    Ok(())
}

fn status_payload(status: VersionStatus, inherited: bool) -> String {
    serde_json::json!({ "status": status.as_str(), "inherited": inherited }).to_string()
}
