//! Typed snapshots of remote cache security group state
//!
//! SDK responses are parsed into these records at the boundary, failing
//! fast on missing fields or unknown status values instead of threading
//! loosely-typed optionals through the reconciler.

use aws_sdk_elasticache::types::{CacheSecurityGroup, Ec2SecurityGroup};
use serde::Serialize;
use thiserror::Error;

/// Errors parsing a remote response into a snapshot
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// A required field was absent from the remote response
    #[error("remote response missing required field: {field}")]
    MissingField { field: &'static str },

    /// An ingress entry carried a status outside the known lifecycle
    #[error("unknown ingress status: {0:?}")]
    UnknownStatus(String),
}

/// Lifecycle status of an ingress authorization.
///
/// Remote values are `authorizing` -> `authorized`, or `authorized` ->
/// `revoking` -> (entry removed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display, strum::EnumString)]
#[strum(ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum IngressStatus {
    /// Authorization requested, not yet active
    #[strum(serialize = "authorizing")]
    Authorizing,
    /// Authorization active
    #[strum(serialize = "authorized")]
    Authorized,
    /// Revocation in progress; the peer cannot be re-authorized until the
    /// entry disappears from remote state
    #[strum(serialize = "revoking")]
    Revoking,
}

/// One ingress authorization on a cache security group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngressEntry {
    /// Peer EC2 security group name
    pub peer_name: String,
    /// Peer EC2 security group owner account id
    pub peer_owner_id: Option<String>,
    /// Authorization lifecycle status
    pub status: IngressStatus,
}

/// Remote state of a cache security group, parsed from an SDK response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSnapshot {
    /// Cache security group name
    pub name: String,
    /// Group description
    pub description: String,
    /// AWS account id owning the group; used as the peer owner id when
    /// authorizing ingress
    pub owner_id: String,
    /// Current ingress authorizations
    pub ingress: Vec<IngressEntry>,
}

impl GroupSnapshot {
    /// Look up the ingress entry for a peer group, if any
    pub fn ingress_for(&self, peer_name: &str) -> Option<&IngressEntry> {
        self.ingress.iter().find(|e| e.peer_name == peer_name)
    }
}

impl TryFrom<&Ec2SecurityGroup> for IngressEntry {
    type Error = SnapshotError;

    fn try_from(entry: &Ec2SecurityGroup) -> Result<Self, Self::Error> {
        let peer_name = entry
            .ec2_security_group_name()
            .ok_or(SnapshotError::MissingField {
                field: "EC2SecurityGroupName",
            })?
            .to_string();
        let status_str = entry.status().ok_or(SnapshotError::MissingField {
            field: "EC2SecurityGroup.Status",
        })?;
        let status = status_str
            .parse::<IngressStatus>()
            .map_err(|_| SnapshotError::UnknownStatus(status_str.to_string()))?;

        Ok(Self {
            peer_name,
            peer_owner_id: entry.ec2_security_group_owner_id().map(str::to_string),
            status,
        })
    }
}

impl TryFrom<&CacheSecurityGroup> for GroupSnapshot {
    type Error = SnapshotError;

    fn try_from(group: &CacheSecurityGroup) -> Result<Self, Self::Error> {
        let name = group
            .cache_security_group_name()
            .ok_or(SnapshotError::MissingField {
                field: "CacheSecurityGroupName",
            })?
            .to_string();
        let description = group
            .description()
            .ok_or(SnapshotError::MissingField {
                field: "Description",
            })?
            .to_string();
        let owner_id = group
            .owner_id()
            .ok_or(SnapshotError::MissingField { field: "OwnerId" })?
            .to_string();
        let ingress = group
            .ec2_security_groups()
            .iter()
            .map(IngressEntry::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name,
            description,
            owner_id,
            ingress,
        })
    }
}
