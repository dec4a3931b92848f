//! Reconciliation result record handed back to the automation runner

use crate::aws::GroupSnapshot;
use serde::Serialize;

/// Post-reconciliation view of the group
#[derive(Debug, Clone, Serialize)]
pub struct GroupInfo {
    /// Cache security group name
    pub name: String,
    /// Latest remote snapshot; absent when the group does not exist
    /// post-reconciliation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<GroupSnapshot>,
}

/// Result record for one reconciliation invocation
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    /// Whether any remote mutation was issued
    pub changed: bool,
    /// Resulting group view
    pub info: GroupInfo,
}
