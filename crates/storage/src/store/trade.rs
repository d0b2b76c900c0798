#![forbid(unsafe_code)]

use super::*;
use rusqlite::params;
use gt_core::values::is_finite_amount;

impl SqliteStore {
    /// Moves the requested amounts between the two versions and records
    /// the exchange as an immutable trade.
    ///
    /// Both legs are validated for sufficiency before either ledger is
    /// touched, so a failing trade leaves both sides exactly as they
    /// were. Each side's node is re-aggregated afterwards and both
    /// contribution entries reference the same trade id.
    pub fn trade(&mut self, user: &UserId, request: TradeRequest) -> Result<TradeRow, StoreError> {
        let TradeRequest {
            node_a,
            version_a,
            values_a,
            node_b,
            version_b,
            values_b,
        } = request;

        validate_legs(&values_a)?;
        validate_legs(&values_b)?;
        if values_a.is_empty() && values_b.is_empty() {
            return Err(StoreError::InvalidInput("trade moves nothing"));
        }
        if node_a == node_b {
            return Err(StoreError::InvalidInput("trade requires two distinct nodes"));
        }

        let now_ms = now_ms();
        let tx = self.conn.transaction()?;

        require_node(&tx, &node_a)?;
        require_node(&tx, &node_b)?;
        let mut side_a = require_version(&tx, &node_a, version_a)?;
        let mut side_b = require_version(&tx, &node_b, version_b)?;

        ensure_sufficient(&node_a, &side_a.values, &values_a)?;
        ensure_sufficient(&node_b, &side_b.values, &values_b)?;

        for (key, amount) in values_a.iter() {
            side_a.values.add(key, -amount);
            side_b.values.add(key, amount);
        }
        for (key, amount) in values_b.iter() {
            side_b.values.add(key, -amount);
            side_a.values.add(key, amount);
        }

        write_version_values_tx(&tx, &node_a, version_a, &side_a.values)?;
        write_version_values_tx(&tx, &node_b, version_b, &side_b.values)?;

        refresh_global_values_tx(&tx, &node_a)?;
        refresh_global_values_tx(&tx, &node_b)?;

        let trade_id = mint_trade_id_tx(&tx)?;
        tx.execute(
            r#"
            INSERT INTO trades(id, node_a, version_a, values_a_json,
                               node_b, version_b, values_b_json, created_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                trade_id,
                node_a,
                version_a,
                map_to_json(&values_a)?,
                node_b,
                version_b,
                map_to_json(&values_b)?,
                now_ms
            ],
        )?;

        insert_contribution_tx(
            &tx,
            &node_a,
            user,
            ContributionKind::Trade,
            version_a,
            serde_json::json!({ "trade": trade_id.as_str(), "counterpart": node_b.as_str() })
                .to_string(),
            now_ms,
        )?;
        insert_contribution_tx(
            &tx,
            &node_b,
            user,
            ContributionKind::Trade,
            version_b,
            serde_json::json!({ "trade": trade_id.as_str(), "counterpart": node_a.as_str() })
                .to_string(),
            now_ms,
        )?;

        tx.commit()?;

        Ok(TradeRow {
            id: trade_id,
            node_a,
            version_a,
            values_a,
            node_b,
            version_b,
            values_b,
            created_at_ms: now_ms,
        })
    }
}

fn validate_legs(values: &ValueMap) -> Result<(), StoreError> {
    for (_, amount) in values.iter() {
        if !is_finite_amount(amount) {
            return Err(StoreError::InvalidInput("trade amount must be a number"));
        }
        if amount < 0.0 {
            return Err(StoreError::InvalidInput("trade amount must not be negative"));
        }
    }
    Ok(())
}

fn ensure_sufficient(
    node_id: &str,
    held: &ValueMap,
    requested: &ValueMap,
) -> Result<(), StoreError> {
    for (key, amount) in requested.iter() {
        let available = held.get(key);
        if available < amount {
            return Err(StoreError::InsufficientFunds {
                node_id: node_id.to_string(),
                key: key.to_string(),
                requested: amount,
                available,
            });
        }
    }
    Ok(())
}
