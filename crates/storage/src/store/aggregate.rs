#![forbid(unsafe_code)]

use super::*;
use rusqlite::{Connection, Transaction, params};

/// What an upward propagation walk actually reached.
///
/// `broken_parent` names a parent pointer that resolved to no row. The
/// walk stops there; everything already written below the break stands
/// and the surrounding operation still commits.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PropagationOutcome {
    pub ancestors_updated: usize,
    pub broken_parent: Option<String>,
}

/// Re-derives `node_id`'s globalValues from its own versions plus its
/// direct children's globals, then pushes the net change up the parent
/// chain as a delta instead of re-deriving every ancestor.
pub(crate) fn refresh_global_values_tx(
    tx: &Transaction<'_>,
    node_id: &str,
) -> Result<PropagationOutcome, StoreError> {
    let node = require_node(tx, node_id)?;

    let mut new_global = local_values(tx, node_id)?;
    let mut stmt = tx.prepare("SELECT global_values_json FROM nodes WHERE parent_id=?1")?;
    let mut rows = stmt.query(params![node_id])?;
    while let Some(row) = rows.next()? {
        let child_global = json_to_map(&row.get::<_, String>(0)?)?;
        new_global.merge_add(&child_global);
    }
    drop(rows);
    drop(stmt);

    let net = new_global.delta_from(&node.global_values);
    write_global_tx(tx, node_id, &new_global)?;

    if net.is_empty() {
        return Ok(PropagationOutcome::default());
    }

    propagate_delta_tx(tx, node_id, node.parent_id.as_deref(), &net)
}

/// Sum of every version's values for one node, grouped by key.
pub(crate) fn local_values(conn: &Connection, node_id: &str) -> Result<ValueMap, StoreError> {
    let mut stmt = conn.prepare("SELECT values_json FROM versions WHERE node_id=?1")?;
    let mut rows = stmt.query(params![node_id])?;
    let mut total = ValueMap::new();
    while let Some(row) = rows.next()? {
        let values = json_to_map(&row.get::<_, String>(0)?)?;
        total.merge_add(&values);
    }
    Ok(total)
}

/// Applies `net` to each ancestor starting at `start_parent`, one hop at
/// a time, until the chain ends at a root. Exact-zero keys fall out of
/// the stored maps along the way. A missing parent row stops the walk
/// and is reported in the outcome; a revisited id is a hard cycle error.
pub(crate) fn propagate_delta_tx(
    tx: &Transaction<'_>,
    origin: &str,
    start_parent: Option<&str>,
    net: &ValueMap,
) -> Result<PropagationOutcome, StoreError> {
    let mut outcome = PropagationOutcome::default();
    let mut seen = BTreeSet::new();
    seen.insert(origin.to_string());

    let mut current = start_parent.map(str::to_string);
    while let Some(id) = current {
        if !seen.insert(id.clone()) {
            return Err(StoreError::NodeCycle);
        }
        if seen.len() > MAX_TREE_DEPTH {
            return Err(StoreError::TreeDepthExceeded);
        }

        let Some(ancestor) = load_node(tx, &id)? else {
            outcome.broken_parent = Some(id);
            break;
        };

        let mut global = ancestor.global_values;
        global.apply_delta(net);
        write_global_tx(tx, &id, &global)?;
        outcome.ancestors_updated += 1;

        current = ancestor.parent_id;
    }

    Ok(outcome)
}

fn write_global_tx(
    tx: &Transaction<'_>,
    node_id: &str,
    global: &ValueMap,
) -> Result<(), StoreError> {
    tx.execute(
        "UPDATE nodes SET global_values_json=?2, updated_at_ms=?3 WHERE id=?1",
        params![node_id, map_to_json(global)?, now_ms()],
    )?;
    Ok(())
}
