//! Configuration types for group reconciliation

use thiserror::Error;

/// Configuration validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// name field is empty
    #[error("group name cannot be empty")]
    EmptyName,

    /// description field is empty
    #[error("description cannot be empty")]
    EmptyDescription,

    /// a peer security group name is empty
    #[error("peer security group names cannot be empty")]
    EmptyPeerName,
}

/// Desired state of a single cache security group.
///
/// The name is the stable identifier; the description is immutable after
/// creation. Peer order is irrelevant and duplicates are dropped.
#[derive(Debug, Clone)]
pub struct GroupSpec {
    /// Cache security group name
    pub name: String,
    /// Group description (set at creation, never updated)
    pub description: String,
    /// EC2 security groups whose ingress should be authorized
    pub peer_groups: Vec<String>,
}

impl GroupSpec {
    /// Build a validated spec. Peer names are deduplicated, first
    /// occurrence wins.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        peer_groups: Vec<String>,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        let description = description.into();

        if name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if description.trim().is_empty() {
            return Err(ConfigError::EmptyDescription);
        }
        if peer_groups.iter().any(|p| p.trim().is_empty()) {
            return Err(ConfigError::EmptyPeerName);
        }

        let mut deduped: Vec<String> = Vec::with_capacity(peer_groups.len());
        for peer in peer_groups {
            if !deduped.contains(&peer) {
                deduped.push(peer);
            }
        }

        Ok(Self {
            name,
            description,
            peer_groups: deduped,
        })
    }

    /// Parse a comma-separated peer list (e.g. from a CLI argument),
    /// trimming whitespace and dropping empty segments.
    pub fn parse_peer_groups(peers: &str) -> Vec<String> {
        peers
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// AWS connection settings, injected by the caller.
///
/// The reconciler never reads process environment itself; credential and
/// region resolution happens at this boundary (or falls through to the SDK's
/// default provider chain when the explicit fields are unset).
#[derive(Debug, Clone, Default)]
pub struct AwsSettings {
    /// AWS region
    pub region: String,
    /// AWS profile name (overrides default credential resolution)
    pub profile: Option<String>,
    /// Static access key id (used only together with the secret key)
    pub access_key_id: Option<String>,
    /// Static secret access key
    pub secret_access_key: Option<String>,
}
