#![forbid(unsafe_code)]

use super::*;
use rusqlite::{OptionalExtension, params};

/// Immutable record of one executed trade: two (node, version, amounts)
/// legs. Rows are only ever inserted.
#[derive(Clone, Debug, PartialEq)]
pub struct TradeRow {
    pub id: String,
    pub node_a: String,
    pub version_a: i64,
    pub values_a: ValueMap,
    pub node_b: String,
    pub version_b: i64,
    pub values_b: ValueMap,
    pub created_at_ms: i64,
}

impl SqliteStore {
    pub fn get_trade(&self, id: &str) -> Result<Option<TradeRow>, StoreError> {
        let row = self
            .conn
            .query_row(
                r#"
                SELECT id, node_a, version_a, values_a_json,
                       node_b, version_b, values_b_json, created_at_ms
                FROM trades
                WHERE id = ?1
                "#,
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, i64>(5)?,
                        row.get::<_, String>(6)?,
                        row.get::<_, i64>(7)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((id, node_a, version_a, values_a, node_b, version_b, values_b, created_at_ms)) => {
                Ok(Some(TradeRow {
                    id,
                    node_a,
                    version_a,
                    values_a: json_to_map(&values_a)?,
                    node_b,
                    version_b,
                    values_b: json_to_map(&values_b)?,
                    created_at_ms,
                }))
            }
            None => Ok(None),
        }
    }

    pub fn list_trades(&self, limit: usize, offset: usize) -> Result<Vec<TradeRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id
            FROM trades
            ORDER BY created_at_ms ASC, id ASC
            LIMIT ?1 OFFSET ?2
            "#,
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
            let Some(trade) = self.get_trade(&id)? else {
                return Err(StoreError::InvalidState("trade row vanished mid-listing"));
            };
            out.push(trade);
        }
        Ok(out)
    }
}
