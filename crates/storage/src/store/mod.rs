#![forbid(unsafe_code)]

mod error;
mod requests;

mod aggregate;
mod contributions;
mod nodes;
mod status;
mod trade;
mod transactions;
mod values;
mod versions;

pub use aggregate::PropagationOutcome;
pub(crate) use aggregate::{propagate_delta_tx, refresh_global_values_tx};
pub use contributions::ContributionRow;
pub use error::StoreError;
pub use nodes::NodeRow;
pub use requests::*;
pub use status::CascadeOutcome;
pub use transactions::TradeRow;
pub use versions::VersionRow;

use gt_core::ids::{NodeId, UserId};
use gt_core::model::{MAX_TREE_DEPTH, ContributionKind, VersionStatus};
use gt_core::values::ValueMap;
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

const SCHEMA_VERSION: i64 = 1;
const MS_PER_HOUR: f64 = 3_600_000.0;

#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    storage_dir: PathBuf,
}

impl SqliteStore {
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&storage_dir)?;

        let db_path = storage_dir.join("goaltree.db");
        let conn = Connection::open(db_path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        install_schema(&conn)?;

        Ok(Self { conn, storage_dir })
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }
}

fn install_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS meta (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS counters (
          name TEXT PRIMARY KEY,
          value INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS nodes (
          id TEXT PRIMARY KEY,
          name TEXT NOT NULL,
          prestige INTEGER NOT NULL,
          parent_id TEXT,
          global_values_json TEXT NOT NULL,
          is_root INTEGER NOT NULL,
          owner_id TEXT,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL,
          FOREIGN KEY(parent_id) REFERENCES nodes(id) ON DELETE CASCADE,
          CHECK(parent_id IS NULL OR parent_id <> id)
        );

        CREATE INDEX IF NOT EXISTS idx_nodes_parent ON nodes(parent_id);

        CREATE TABLE IF NOT EXISTS node_contributors (
          node_id TEXT NOT NULL,
          user_id TEXT NOT NULL,
          added_at_ms INTEGER NOT NULL,
          PRIMARY KEY(node_id, user_id),
          FOREIGN KEY(node_id) REFERENCES nodes(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS versions (
          node_id TEXT NOT NULL,
          prestige INTEGER NOT NULL,
          status TEXT NOT NULL,
          values_json TEXT NOT NULL,
          goals_json TEXT NOT NULL,
          schedule_ms INTEGER,
          reeffect_hours REAL NOT NULL,
          created_at_ms INTEGER NOT NULL,
          PRIMARY KEY(node_id, prestige),
          FOREIGN KEY(node_id) REFERENCES nodes(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS trades (
          id TEXT PRIMARY KEY,
          node_a TEXT NOT NULL,
          version_a INTEGER NOT NULL,
          values_a_json TEXT NOT NULL,
          node_b TEXT NOT NULL,
          version_b INTEGER NOT NULL,
          values_b_json TEXT NOT NULL,
          created_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS contributions (
          seq INTEGER PRIMARY KEY AUTOINCREMENT,
          node_id TEXT NOT NULL,
          user_id TEXT NOT NULL,
          action TEXT NOT NULL,
          version_prestige INTEGER NOT NULL,
          payload_json TEXT NOT NULL,
          ts_ms INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_contributions_node_seq
          ON contributions(node_id, seq);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO meta(key, value) VALUES (?1, ?2)",
        params!["schema_version", SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => duration,
        Err(_) => return 0,
    };

    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}

fn hours_to_ms(hours: f64) -> i64 {
    (hours * MS_PER_HOUR).round() as i64
}

fn canonicalize_node_id(value: &str) -> Result<String, StoreError> {
    NodeId::try_new(value.trim())
        .map(NodeId::into_string)
        .map_err(|err| StoreError::InvalidInput(err.message()))
}

fn map_to_json(values: &ValueMap) -> Result<String, StoreError> {
    Ok(serde_json::to_string(values.as_map())?)
}

fn json_to_map(text: &str) -> Result<ValueMap, StoreError> {
    let amounts: BTreeMap<String, f64> = serde_json::from_str(text)?;
    Ok(ValueMap::from_map(amounts))
}

fn next_counter_tx(tx: &Transaction<'_>, name: &str) -> Result<i64, StoreError> {
    let current: i64 = tx
        .query_row(
            "SELECT value FROM counters WHERE name=?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?
        .unwrap_or(0);
    let next = current + 1;
    tx.execute(
        r#"
        INSERT INTO counters(name, value) VALUES (?1, ?2)
        ON CONFLICT(name) DO UPDATE SET value=excluded.value
        "#,
        params![name, next],
    )?;
    Ok(next)
}

fn mint_node_id_tx(tx: &Transaction<'_>) -> Result<String, StoreError> {
    let seq = next_counter_tx(tx, "node_seq")?;
    Ok(format!("NODE-{seq:03}"))
}

fn mint_trade_id_tx(tx: &Transaction<'_>) -> Result<String, StoreError> {
    let seq = next_counter_tx(tx, "trade_seq")?;
    Ok(format!("TXN-{seq:03}"))
}

fn load_node(conn: &Connection, id: &str) -> Result<Option<NodeRow>, StoreError> {
    let row = conn
        .query_row(
            r#"
            SELECT id, name, prestige, parent_id, global_values_json,
                   is_root, owner_id, created_at_ms, updated_at_ms
            FROM nodes
            WHERE id = ?1
            "#,
            params![id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, Option<String>>(6)?,
                    row.get::<_, i64>(7)?,
                    row.get::<_, i64>(8)?,
                ))
            },
        )
        .optional()?;

    let Some((id, name, prestige, parent_id, global_json, is_root, owner_id, created, updated)) =
        row
    else {
        return Ok(None);
    };

    Ok(Some(NodeRow {
        id,
        name,
        prestige,
        parent_id,
        global_values: json_to_map(&global_json)?,
        is_root: is_root != 0,
        owner_id,
        created_at_ms: created,
        updated_at_ms: updated,
    }))
}

fn require_node(conn: &Connection, id: &str) -> Result<NodeRow, StoreError> {
    load_node(conn, id)?.ok_or_else(|| StoreError::NodeNotFound { id: id.to_string() })
}

fn load_version(
    conn: &Connection,
    node_id: &str,
    prestige: i64,
) -> Result<Option<VersionRow>, StoreError> {
    let row = conn
        .query_row(
            r#"
            SELECT status, values_json, goals_json, schedule_ms, reeffect_hours, created_at_ms
            FROM versions
            WHERE node_id = ?1 AND prestige = ?2
            "#,
            params![node_id, prestige],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                    row.get::<_, f64>(4)?,
                    row.get::<_, i64>(5)?,
                ))
            },
        )
        .optional()?;

    let Some((status, values_json, goals_json, schedule_ms, reeffect_hours, created_at_ms)) = row
    else {
        return Ok(None);
    };

    let status = VersionStatus::parse(&status)
        .ok_or(StoreError::InvalidState("version row has an unknown status"))?;

    Ok(Some(VersionRow {
        node_id: node_id.to_string(),
        prestige,
        status,
        values: json_to_map(&values_json)?,
        goals: json_to_map(&goals_json)?,
        schedule_ms,
        reeffect_hours,
        created_at_ms,
    }))
}

fn require_version(
    conn: &Connection,
    node_id: &str,
    prestige: i64,
) -> Result<VersionRow, StoreError> {
    load_version(conn, node_id, prestige)?.ok_or_else(|| StoreError::VersionNotFound {
        node_id: node_id.to_string(),
        prestige,
    })
}

fn child_ids(conn: &Connection, node_id: &str) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn.prepare("SELECT id FROM nodes WHERE parent_id=?1 ORDER BY id ASC")?;
    let mut rows = stmt.query(params![node_id])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(row.get::<_, String>(0)?);
    }
    Ok(out)
}

/// Hop count from `id` up to its root. Guards node creation against
/// over-deep chains and detects corrupted (cyclic) parent pointers.
fn ancestor_depth(conn: &Connection, id: &str) -> Result<usize, StoreError> {
    let mut current = Some(id.to_string());
    let mut depth = 0usize;
    let mut seen = BTreeSet::new();

    while let Some(node_id) = current {
        if !seen.insert(node_id.clone()) {
            return Err(StoreError::NodeCycle);
        }

        let parent = conn
            .query_row(
                "SELECT parent_id FROM nodes WHERE id=?1",
                params![node_id],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?
            .flatten();

        current = parent;
        if current.is_some() {
            depth = depth.saturating_add(1);
            if depth > MAX_TREE_DEPTH {
                return Err(StoreError::TreeDepthExceeded);
            }
        }
    }

    Ok(depth)
}

fn touch_node_tx(tx: &Transaction<'_>, id: &str, now_ms: i64) -> Result<(), StoreError> {
    tx.execute(
        "UPDATE nodes SET updated_at_ms=?2 WHERE id=?1",
        params![id, now_ms],
    )?;
    Ok(())
}

fn write_version_values_tx(
    tx: &Transaction<'_>,
    node_id: &str,
    prestige: i64,
    values: &ValueMap,
) -> Result<(), StoreError> {
    let updated = tx.execute(
        "UPDATE versions SET values_json=?3 WHERE node_id=?1 AND prestige=?2",
        params![node_id, prestige, map_to_json(values)?],
    )?;
    if updated == 0 {
        return Err(StoreError::VersionNotFound {
            node_id: node_id.to_string(),
            prestige,
        });
    }
    Ok(())
}

fn insert_contribution_tx(
    tx: &Transaction<'_>,
    node_id: &str,
    user: &UserId,
    kind: ContributionKind,
    version_prestige: i64,
    payload_json: String,
    ts_ms: i64,
) -> Result<ContributionRow, StoreError> {
    tx.execute(
        r#"
        INSERT INTO contributions(node_id, user_id, action, version_prestige, payload_json, ts_ms)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
        params![
            node_id,
            user.as_str(),
            kind.as_str(),
            version_prestige,
            payload_json,
            ts_ms
        ],
    )?;
    let seq = tx.last_insert_rowid();
    Ok(ContributionRow {
        seq,
        node_id: node_id.to_string(),
        user_id: user.as_str().to_string(),
        kind,
        version_prestige,
        payload_json,
        ts_ms,
    })
}
