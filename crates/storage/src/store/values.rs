#![forbid(unsafe_code)]

use super::*;
use rusqlite::params;
use crate::store::nodes::validate_reeffect;
use gt_core::values::is_finite_amount;

impl SqliteStore {
    /// Overwrites one key of one version's value ledger (not additive)
    /// and re-aggregates the node and its ancestors. The returned
    /// outcome says how far up the chain the new totals reached.
    pub fn set_value(
        &mut self,
        user: &UserId,
        request: SetValueRequest,
    ) -> Result<PropagationOutcome, StoreError> {
        let SetValueRequest {
            node_id,
            version_prestige,
            key,
            amount,
        } = request;

        let key = validate_key(key)?;
        if !is_finite_amount(amount) {
            return Err(StoreError::InvalidInput("value amount must be a number"));
        }

        let now_ms = now_ms();
        let tx = self.conn.transaction()?;
        require_node(&tx, &node_id)?;
        let mut version = require_version(&tx, &node_id, version_prestige)?;

        version.values.set(key.clone(), amount);
        write_version_values_tx(&tx, &node_id, version_prestige, &version.values)?;

        let outcome = refresh_global_values_tx(&tx, &node_id)?;

        insert_contribution_tx(
            &tx,
            &node_id,
            user,
            ContributionKind::Value,
            version_prestige,
            serde_json::json!({ "key": key, "amount": amount }).to_string(),
            now_ms,
        )?;

        tx.commit()?;
        Ok(outcome)
    }

    /// Overwrites one goal entry. Goals are targets, not holdings, so
    /// no aggregation runs.
    pub fn set_goal(&mut self, user: &UserId, request: SetGoalRequest) -> Result<(), StoreError> {
        let SetGoalRequest {
            node_id,
            version_prestige,
            key,
            goal_amount,
        } = request;

        let key = validate_key(key)?;
        if !is_finite_amount(goal_amount) {
            return Err(StoreError::InvalidInput("goal amount must be a number"));
        }

        let now_ms = now_ms();
        let tx = self.conn.transaction()?;
        require_node(&tx, &node_id)?;
        let mut version = require_version(&tx, &node_id, version_prestige)?;

        version.goals.set(key.clone(), goal_amount);
        tx.execute(
            "UPDATE versions SET goals_json=?3 WHERE node_id=?1 AND prestige=?2",
            params![node_id, version_prestige, map_to_json(&version.goals)?],
        )?;
        touch_node_tx(&tx, &node_id, now_ms)?;

        insert_contribution_tx(
            &tx,
            &node_id,
            user,
            ContributionKind::Goal,
            version_prestige,
            serde_json::json!({ "key": key, "goal": goal_amount }).to_string(),
            now_ms,
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Pins, moves or clears a version's schedule and/or adjusts its
    /// reeffect interval.
    pub fn set_schedule(
        &mut self,
        user: &UserId,
        request: SetScheduleRequest,
    ) -> Result<(), StoreError> {
        let SetScheduleRequest {
            node_id,
            version_prestige,
            schedule_ms,
            reeffect_hours,
        } = request;

        if schedule_ms.is_none() && reeffect_hours.is_none() {
            return Err(StoreError::InvalidInput("no fields to edit"));
        }

        let now_ms = now_ms();
        let tx = self.conn.transaction()?;
        require_node(&tx, &node_id)?;
        let version = require_version(&tx, &node_id, version_prestige)?;

        let next_schedule = schedule_ms.unwrap_or(version.schedule_ms);
        let next_reeffect = match reeffect_hours {
            Some(hours) => validate_reeffect(hours)?,
            None => version.reeffect_hours,
        };

        tx.execute(
            "UPDATE versions SET schedule_ms=?3, reeffect_hours=?4 WHERE node_id=?1 AND prestige=?2",
            params![node_id, version_prestige, next_schedule, next_reeffect],
        )?;
        touch_node_tx(&tx, &node_id, now_ms)?;

        insert_contribution_tx(
            &tx,
            &node_id,
            user,
            ContributionKind::Schedule,
            version_prestige,
            serde_json::json!({
                "schedule_ms": next_schedule,
                "reeffect_hours": next_reeffect,
            })
            .to_string(),
            now_ms,
        )?;

        tx.commit()?;
        Ok(())
    }
}

fn validate_key(key: String) -> Result<String, StoreError> {
    let key = key.trim().to_string();
    if key.is_empty() {
        return Err(StoreError::InvalidInput("value key must not be empty"));
    }
    if key.len() > 128 {
        return Err(StoreError::InvalidInput("value key is too long"));
    }
    Ok(key)
}
