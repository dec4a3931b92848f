//! ElastiCache cache security group operations

use super::context::AwsContext;
use super::error::classify_sdk_error;
use super::types::GroupSnapshot;
use crate::config::AwsSettings;
use anyhow::{Context, Result};
use aws_sdk_elasticache::Client;
use tracing::{debug, info, warn};

/// Result of an authorize-ingress call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizeOutcome {
    /// Ingress was authorized; carries the group snapshot from the
    /// authorize response payload
    Authorized(GroupSnapshot),
    /// The authorization already existed remotely (idempotent no-op)
    AlreadyAuthorized,
}

/// Trait for cache security group operations that can be mocked in tests.
///
/// This abstracts the ElastiCache client so reconciliation logic can be
/// unit tested without hitting real AWS.
#[allow(async_fn_in_trait)] // Internal use only, Send+Sync bounds on trait are sufficient
#[cfg_attr(test, mockall::automock)]
pub trait CacheOperations: Send + Sync {
    /// Fetch the current remote state of a group, `None` if it does not
    /// exist. Any remote describe failure is also reported as `None`
    /// (compatibility behavior, see [`ElastiCacheClient::describe_group`]).
    async fn describe_group(&self, name: &str) -> Result<Option<GroupSnapshot>>;

    /// Create a group; returns the snapshot from the create response
    async fn create_group(&self, name: &str, description: &str) -> Result<GroupSnapshot>;

    /// Delete a group
    async fn delete_group(&self, name: &str) -> Result<()>;

    /// Authorize ingress from a peer EC2 security group
    async fn authorize_ingress(
        &self,
        group_name: &str,
        peer_name: &str,
        peer_owner_id: &str,
    ) -> Result<AuthorizeOutcome>;
}

/// ElastiCache client wrapper for cache security group management
pub struct ElastiCacheClient {
    client: Client,
}

impl ElastiCacheClient {
    /// Create a new client from the given settings
    pub async fn new(settings: &AwsSettings) -> Self {
        let ctx = AwsContext::new(settings).await;
        Self::from_context(&ctx)
    }

    /// Create a client from a pre-loaded AWS context
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.elasticache_client(),
        }
    }
}

impl CacheOperations for ElastiCacheClient {
    /// Describe a cache security group.
    ///
    /// Remote failures are swallowed and reported as "group absent": this
    /// matches the long-standing contract that callers re-run reconciliation
    /// to converge. The failure is classified and logged (not-found at
    /// debug, anything else at warn) so a strict mode can distinguish true
    /// absence later without changing this default.
    async fn describe_group(&self, name: &str) -> Result<Option<GroupSnapshot>> {
        let response = self
            .client
            .describe_cache_security_groups()
            .cache_security_group_name(name)
            .send()
            .await;

        match response {
            Ok(output) => {
                let group = output
                    .cache_security_groups()
                    .iter()
                    .find(|g| g.cache_security_group_name() == Some(name));
                match group {
                    Some(g) => Ok(Some(GroupSnapshot::try_from(g)?)),
                    None => Ok(None),
                }
            }
            Err(err) => {
                let classified = classify_sdk_error(&err);
                if classified.is_not_found() {
                    debug!(group = %name, "Cache security group does not exist");
                } else {
                    warn!(
                        group = %name,
                        error = %classified,
                        "Describe failed, treating group as absent"
                    );
                }
                Ok(None)
            }
        }
    }

    async fn create_group(&self, name: &str, description: &str) -> Result<GroupSnapshot> {
        info!(group = %name, "Creating cache security group");

        let output = self
            .client
            .create_cache_security_group()
            .cache_security_group_name(name)
            .description(description)
            .send()
            .await
            .map_err(|err| anyhow::Error::from(classify_sdk_error(&err)))
            .context("Failed to create cache security group")?;

        let group = output
            .cache_security_group()
            .context("Create response missing CacheSecurityGroup payload")?;
        let snapshot = GroupSnapshot::try_from(group)?;

        info!(group = %name, owner_id = %snapshot.owner_id, "Cache security group created");
        Ok(snapshot)
    }

    async fn delete_group(&self, name: &str) -> Result<()> {
        info!(group = %name, "Deleting cache security group");

        self.client
            .delete_cache_security_group()
            .cache_security_group_name(name)
            .send()
            .await
            .map_err(|err| anyhow::Error::from(classify_sdk_error(&err)))
            .context("Failed to delete cache security group")?;

        info!(group = %name, "Cache security group deleted");
        Ok(())
    }

    async fn authorize_ingress(
        &self,
        group_name: &str,
        peer_name: &str,
        peer_owner_id: &str,
    ) -> Result<AuthorizeOutcome> {
        info!(
            group = %group_name,
            peer = %peer_name,
            peer_owner_id = %peer_owner_id,
            "Authorizing ingress"
        );

        let response = self
            .client
            .authorize_cache_security_group_ingress()
            .cache_security_group_name(group_name)
            .ec2_security_group_name(peer_name)
            .ec2_security_group_owner_id(peer_owner_id)
            .send()
            .await;

        match response {
            Ok(output) => {
                let group = output
                    .cache_security_group()
                    .context("Authorize response missing CacheSecurityGroup payload")?;
                let snapshot = GroupSnapshot::try_from(group)?;
                debug!(group = %group_name, peer = %peer_name, "Ingress authorized");
                Ok(AuthorizeOutcome::Authorized(snapshot))
            }
            Err(err) => {
                let classified = classify_sdk_error(&err);
                if classified.is_already_exists() {
                    debug!(
                        group = %group_name,
                        peer = %peer_name,
                        "Ingress authorization already exists"
                    );
                    Ok(AuthorizeOutcome::AlreadyAuthorized)
                } else {
                    Err(anyhow::Error::from(classified).context(format!(
                        "Failed to authorize ingress from '{peer_name}'"
                    )))
                }
            }
        }
    }
}
