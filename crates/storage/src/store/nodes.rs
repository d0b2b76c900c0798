#![forbid(unsafe_code)]

use super::*;
use rusqlite::{Connection, params};
use gt_core::model::MAX_REEFFECT_HOURS;
use gt_core::values::is_finite_amount;

#[derive(Clone, Debug, PartialEq)]
pub struct NodeRow {
    pub id: String,
    pub name: String,
    /// Index of the current (active) version in the node's chain.
    pub prestige: i64,
    pub parent_id: Option<String>,
    /// Derived aggregate: own version values plus all descendants'.
    pub global_values: ValueMap,
    pub is_root: bool,
    pub owner_id: Option<String>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl SqliteStore {
    /// Creates a node together with its initial version
    /// (`prestige=0, values={}, status=active, goals={}`).
    pub fn create_node(
        &mut self,
        user: &UserId,
        request: CreateNodeRequest,
    ) -> Result<NodeRow, StoreError> {
        let CreateNodeRequest {
            name,
            parent_id,
            is_root,
            owner_id,
            schedule_ms,
            reeffect_hours,
        } = request;

        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(StoreError::InvalidInput("node name must not be empty"));
        }
        let reeffect_hours = validate_reeffect(reeffect_hours.unwrap_or(0.0))?;
        let parent_id = parent_id
            .as_deref()
            .map(canonicalize_node_id)
            .transpose()?;

        let now_ms = now_ms();
        let tx = self.conn.transaction()?;

        if let Some(parent_id) = parent_id.as_deref() {
            require_node(&tx, parent_id)?;
            // New node sits one below its parent; the chain above must
            // already terminate within bounds.
            if ancestor_depth(&tx, parent_id)? + 1 > MAX_TREE_DEPTH {
                return Err(StoreError::TreeDepthExceeded);
            }
        }

        let id = mint_node_id_tx(&tx)?;
        let empty = map_to_json(&ValueMap::new())?;

        tx.execute(
            r#"
            INSERT INTO nodes(id, name, prestige, parent_id, global_values_json,
                              is_root, owner_id, created_at_ms, updated_at_ms)
            VALUES (?1, ?2, 0, ?3, ?4, ?5, ?6, ?7, ?7)
            "#,
            params![
                id,
                name,
                parent_id,
                empty,
                if is_root { 1i64 } else { 0i64 },
                owner_id,
                now_ms
            ],
        )?;

        tx.execute(
            r#"
            INSERT INTO versions(node_id, prestige, status, values_json, goals_json,
                                 schedule_ms, reeffect_hours, created_at_ms)
            VALUES (?1, 0, ?2, ?3, ?3, ?4, ?5, ?6)
            "#,
            params![
                id,
                VersionStatus::Active.as_str(),
                empty,
                schedule_ms,
                reeffect_hours,
                now_ms
            ],
        )?;

        insert_contribution_tx(
            &tx,
            &id,
            user,
            ContributionKind::Create,
            0,
            serde_json::json!({ "name": name, "parent": parent_id }).to_string(),
            now_ms,
        )?;

        tx.commit()?;

        require_node(&self.conn, &id)
    }

    pub fn get_node(&self, id: &str) -> Result<Option<NodeRow>, StoreError> {
        load_node(&self.conn, id)
    }

    pub fn list_nodes(&self, limit: usize, offset: usize) -> Result<Vec<NodeRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id FROM nodes ORDER BY id ASC LIMIT ?1 OFFSET ?2",
        )?;
        let mut rows = stmt.query(params![limit as i64, offset as i64])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            ids.push(row.get::<_, String>(0)?);
        }
        drop(rows);
        drop(stmt);

        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            out.push(require_node(&self.conn, &id)?);
        }
        Ok(out)
    }

    pub fn list_children(&self, id: &str) -> Result<Vec<NodeRow>, StoreError> {
        let ids = child_ids(&self.conn, id)?;
        let mut out = Vec::with_capacity(ids.len());
        for child_id in ids {
            out.push(require_node(&self.conn, &child_id)?);
        }
        Ok(out)
    }

    /// Records a collaborator id against a root node. Authorization of
    /// who may invite whom lives outside the engine.
    pub fn add_contributor(
        &mut self,
        user: &UserId,
        node_id: &str,
        contributor: &UserId,
    ) -> Result<(), StoreError> {
        let now_ms = now_ms();
        let tx = self.conn.transaction()?;
        let node = require_node(&tx, node_id)?;
        if !node.is_root {
            return Err(StoreError::InvalidInput(
                "contributors can only be added to root nodes",
            ));
        }

        tx.execute(
            r#"
            INSERT OR IGNORE INTO node_contributors(node_id, user_id, added_at_ms)
            VALUES (?1, ?2, ?3)
            "#,
            params![node_id, contributor.as_str(), now_ms],
        )?;

        insert_contribution_tx(
            &tx,
            node_id,
            user,
            ContributionKind::Create,
            node.prestige,
            serde_json::json!({ "contributor": contributor.as_str() }).to_string(),
            now_ms,
        )?;

        tx.commit()?;
        Ok(())
    }

    pub fn list_contributors(&self, node_id: &str) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id FROM node_contributors WHERE node_id=?1 ORDER BY user_id ASC",
        )?;
        let mut rows = stmt.query(params![node_id])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(row.get::<_, String>(0)?);
        }
        Ok(out)
    }

    /// Deletes the node and its entire subtree (versions, contributor
    /// rows and contribution history included), then backs the deleted
    /// totals out of the former ancestor chain. The returned outcome
    /// reports how far the back-out reached.
    pub fn delete_node(
        &mut self,
        user: &UserId,
        node_id: &str,
    ) -> Result<PropagationOutcome, StoreError> {
        let now_ms = now_ms();
        let tx = self.conn.transaction()?;
        let node = require_node(&tx, node_id)?;

        let subtree = collect_subtree(&tx, node_id)?;
        for id in &subtree {
            tx.execute("DELETE FROM contributions WHERE node_id=?1", params![id])?;
        }

        // Child nodes, versions and contributor rows go with the root
        // of the subtree via the cascading foreign keys.
        tx.execute("DELETE FROM nodes WHERE id=?1", params![node_id])?;

        let mut outcome = PropagationOutcome::default();
        if let Some(parent_id) = node.parent_id.as_deref()
            && !node.global_values.is_empty()
        {
            outcome =
                propagate_delta_tx(&tx, node_id, Some(parent_id), &node.global_values.negated())?;
        }

        insert_contribution_tx(
            &tx,
            node_id,
            user,
            ContributionKind::Delete,
            node.prestige,
            serde_json::json!({ "name": node.name, "subtree": subtree.len() }).to_string(),
            now_ms,
        )?;

        tx.commit()?;
        Ok(outcome)
    }
}

/// Id collection over the subtree rooted at `root`, bounded the same
/// way the cascades are.
fn collect_subtree(conn: &Connection, root: &str) -> Result<Vec<String>, StoreError> {
    let mut out = Vec::new();
    let mut queue = vec![(root.to_string(), 0usize)];
    let mut seen = BTreeSet::new();

    while let Some((id, depth)) = queue.pop() {
        if !seen.insert(id.clone()) {
            return Err(StoreError::NodeCycle);
        }
        if depth > MAX_TREE_DEPTH {
            return Err(StoreError::TreeDepthExceeded);
        }
        for child in child_ids(conn, &id)? {
            queue.push((child, depth + 1));
        }
        out.push(id);
    }

    Ok(out)
}

pub(crate) fn validate_reeffect(hours: f64) -> Result<f64, StoreError> {
    if !is_finite_amount(hours) {
        return Err(StoreError::InvalidInput("reeffect hours must be a number"));
    }
    if hours < 0.0 {
        return Err(StoreError::InvalidInput("reeffect hours must not be negative"));
    }
    if hours > MAX_REEFFECT_HOURS {
        return Err(StoreError::InvalidInput("reeffect hours are out of range"));
    }
    Ok(hours)
}
