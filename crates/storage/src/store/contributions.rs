#![forbid(unsafe_code)]

use super::*;
use rusqlite::params;

/// Append-only audit event: who changed which node, what kind of change,
/// which version index it hit, and an action-specific JSON payload.
#[derive(Clone, Debug, PartialEq)]
pub struct ContributionRow {
    pub seq: i64,
    pub node_id: String,
    pub user_id: String,
    pub kind: ContributionKind,
    pub version_prestige: i64,
    pub payload_json: String,
    pub ts_ms: i64,
}

impl ContributionRow {
    pub fn contribution_id(&self) -> String {
        format!("ctb_{:016}", self.seq)
    }
}

impl SqliteStore {
    /// Contributions after the given cursor (`ctb_<16-digit-seq>`),
    /// oldest first.
    pub fn list_contributions(
        &self,
        since: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ContributionRow>, StoreError> {
        let since_seq = match since {
            None => 0i64,
            Some(cursor) => parse_contribution_id(cursor)
                .ok_or(StoreError::InvalidInput("since must be like ctb_<16-digit-seq>"))?,
        };

        let mut stmt = self.conn.prepare(
            r#"
            SELECT seq, node_id, user_id, action, version_prestige, payload_json, ts_ms
            FROM contributions
            WHERE seq > ?1
            ORDER BY seq ASC
            LIMIT ?2
            "#,
        )?;
        let mut rows = stmt.query(params![since_seq, limit as i64])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(contribution_from_row(
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get::<_, String>(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
            )?);
        }
        Ok(out)
    }

    pub fn list_node_contributions(
        &self,
        node_id: &str,
        limit: usize,
    ) -> Result<Vec<ContributionRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT seq, node_id, user_id, action, version_prestige, payload_json, ts_ms
            FROM contributions
            WHERE node_id = ?1
            ORDER BY seq ASC
            LIMIT ?2
            "#,
        )?;
        let mut rows = stmt.query(params![node_id, limit as i64])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(contribution_from_row(
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get::<_, String>(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
            )?);
        }
        Ok(out)
    }
}

fn contribution_from_row(
    seq: i64,
    node_id: String,
    user_id: String,
    action: String,
    version_prestige: i64,
    payload_json: String,
    ts_ms: i64,
) -> Result<ContributionRow, StoreError> {
    let kind = ContributionKind::parse(&action)
        .ok_or(StoreError::InvalidState("contribution row has an unknown action"))?;
    Ok(ContributionRow {
        seq,
        node_id,
        user_id,
        kind,
        version_prestige,
        payload_json,
        ts_ms,
    })
}

fn parse_contribution_id(cursor: &str) -> Option<i64> {
    let digits = cursor.strip_prefix("ctb_")?;
    digits.parse::<i64>().ok()
}
