#![forbid(unsafe_code)]

use super::*;
use rusqlite::params;

#[derive(Clone, Debug, PartialEq)]
pub struct VersionRow {
    pub node_id: String,
    /// Generation index; equals the version's position in the chain.
    pub prestige: i64,
    pub status: VersionStatus,
    pub values: ValueMap,
    pub goals: ValueMap,
    /// Epoch milliseconds; `None` means the version floats unscheduled.
    pub schedule_ms: Option<i64>,
    pub reeffect_hours: f64,
    pub created_at_ms: i64,
}

impl SqliteStore {
    /// Completes the current version, banks its values into the
    /// aggregate, and appends a fresh version one prestige higher.
    ///
    /// The new version starts every banked key at zero, inherits goals
    /// and reeffect unchanged, and moves the schedule forward by the
    /// reeffect interval unless the old version was floating. A prestige
    /// pointer that matches no version row fails loudly instead of
    /// appending onto a corrupted chain.
    pub fn advance_prestige(
        &mut self,
        user: &UserId,
        node_id: &str,
    ) -> Result<VersionRow, StoreError> {
        let now_ms = now_ms();
        let tx = self.conn.transaction()?;

        let node = require_node(&tx, node_id)?;
        let Some(current) = load_version(&tx, node_id, node.prestige)? else {
            return Err(StoreError::InvalidState(
                "prestige pointer does not match any version",
            ));
        };

        tx.execute(
            "UPDATE versions SET status=?3 WHERE node_id=?1 AND prestige=?2",
            params![node_id, current.prestige, VersionStatus::Completed.as_str()],
        )?;

        let next_prestige = node.prestige + 1;
        let next_schedule = current
            .schedule_ms
            .map(|schedule| schedule.saturating_add(hours_to_ms(current.reeffect_hours)));
        let next_values = current.values.zeroed();

        tx.execute(
            r#"
            INSERT INTO versions(node_id, prestige, status, values_json, goals_json,
                                 schedule_ms, reeffect_hours, created_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                node_id,
                next_prestige,
                VersionStatus::Active.as_str(),
                map_to_json(&next_values)?,
                map_to_json(&current.goals)?,
                next_schedule,
                current.reeffect_hours,
                now_ms
            ],
        )?;

        tx.execute(
            "UPDATE nodes SET prestige=?2, updated_at_ms=?3 WHERE id=?1",
            params![node_id, next_prestige, now_ms],
        )?;

        refresh_global_values_tx(&tx, node_id)?;

        insert_contribution_tx(
            &tx,
            node_id,
            user,
            ContributionKind::Prestige,
            current.prestige,
            serde_json::json!({
                "completed_prestige": current.prestige,
                "new_prestige": next_prestige,
            })
            .to_string(),
            now_ms,
        )?;

        tx.commit()?;

        require_version(&self.conn, node_id, next_prestige)
    }

    pub fn get_version(
        &self,
        node_id: &str,
        prestige: i64,
    ) -> Result<Option<VersionRow>, StoreError> {
        load_version(&self.conn, node_id, prestige)
    }

    pub fn list_versions(&self, node_id: &str) -> Result<Vec<VersionRow>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT prestige FROM versions WHERE node_id=?1 ORDER BY prestige ASC")?;
        let mut rows = stmt.query(params![node_id])?;
        let mut indexes = Vec::new();
        while let Some(row) = rows.next()? {
            indexes.push(row.get::<_, i64>(0)?);
        }
        drop(rows);
        drop(stmt);

        let mut out = Vec::with_capacity(indexes.len());
        for prestige in indexes {
            out.push(require_version(&self.conn, node_id, prestige)?);
        }
        Ok(out)
    }
}
