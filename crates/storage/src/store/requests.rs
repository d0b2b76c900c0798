#![forbid(unsafe_code)]

use gt_core::model::VersionStatus;
use gt_core::values::ValueMap;

#[derive(Clone, Debug, PartialEq)]
pub struct CreateNodeRequest {
    pub name: String,
    pub parent_id: Option<String>,
    pub is_root: bool,
    pub owner_id: Option<String>,
    /// Epoch milliseconds; `None` keeps the initial version floating.
    pub schedule_ms: Option<i64>,
    pub reeffect_hours: Option<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SetValueRequest {
    pub node_id: String,
    pub version_prestige: i64,
    pub key: String,
    pub amount: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SetGoalRequest {
    pub node_id: String,
    pub version_prestige: i64,
    pub key: String,
    pub goal_amount: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SetScheduleRequest {
    pub node_id: String,
    pub version_prestige: i64,
    /// `None` leaves the schedule alone; `Some(None)` clears it back to
    /// floating; `Some(Some(ts))` pins it.
    pub schedule_ms: Option<Option<i64>>,
    pub reeffect_hours: Option<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EditStatusRequest {
    pub node_id: String,
    pub version_prestige: i64,
    pub status: VersionStatus,
    pub inherited: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TradeRequest {
    pub node_a: String,
    pub version_a: i64,
    /// Amounts leaving side A for side B.
    pub values_a: ValueMap,
    pub node_b: String,
    pub version_b: i64,
    /// Amounts leaving side B for side A.
    pub values_b: ValueMap,
}
