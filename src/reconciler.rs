//! Cache security group reconciliation
//!
//! [`GroupReconciler`] compares desired state against remote state and
//! issues the minimal set of control-plane calls to converge: create if
//! absent, authorize missing ingress, delete if unwanted. Peers removed
//! from the desired set are never revoked; that removal path is an
//! intentional, documented limitation.

use crate::aws::{AuthorizeOutcome, CacheOperations, GroupSnapshot, IngressStatus};
use crate::config::GroupSpec;
use crate::report::{GroupInfo, ReconcileReport};
use crate::wait::{wait_for_condition, WaitConfig};
use anyhow::{Context, Result};
use std::cell::RefCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Reconciles one cache security group against a [`GroupSpec`].
///
/// Tracks whether any remote mutation happened and the latest remote
/// snapshot. The snapshot is only ever replaced by remote responses
/// (describe polls, or the create/authorize response payloads), never
/// edited locally.
pub struct GroupReconciler<O: CacheOperations> {
    ops: O,
    spec: GroupSpec,
    wait: WaitConfig,
    cancel: Option<CancellationToken>,
    changed: bool,
    snapshot: Option<GroupSnapshot>,
}

impl<O: CacheOperations> GroupReconciler<O> {
    /// Create a reconciler with the default wait behavior (1s poll
    /// interval, no timeout) and no cancellation.
    pub fn new(ops: O, spec: GroupSpec) -> Self {
        Self {
            ops,
            spec,
            wait: WaitConfig::default(),
            cancel: None,
            changed: false,
            snapshot: None,
        }
    }

    /// Override the revoke-wait configuration.
    pub fn with_wait_config(mut self, wait: WaitConfig) -> Self {
        self.wait = wait;
        self
    }

    /// Attach a cancellation token; cancelling it aborts an in-flight
    /// revoke wait.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Whether any remote mutation was issued so far.
    pub fn changed(&self) -> bool {
        self.changed
    }

    /// Latest remote snapshot, if the group exists.
    pub fn snapshot(&self) -> Option<&GroupSnapshot> {
        self.snapshot.as_ref()
    }

    /// Consume the reconciler and produce the caller-facing result record.
    pub fn into_report(self) -> ReconcileReport {
        ReconcileReport {
            changed: self.changed,
            info: GroupInfo {
                name: self.spec.name,
                data: self.snapshot,
            },
        }
    }

    /// Ensure the group exists and its ingress covers the desired peers.
    pub async fn ensure_present(&mut self) -> Result<()> {
        self.snapshot = self.ops.describe_group(&self.spec.name).await?;

        if self.snapshot.is_none() {
            self.create().await?;
        }
        self.sync().await
    }

    /// Ensure the group does not exist. No-op if already absent.
    pub async fn ensure_absent(&mut self) -> Result<()> {
        self.snapshot = self.ops.describe_group(&self.spec.name).await?;

        if self.snapshot.is_some() {
            self.delete().await?;
        } else {
            debug!(group = %self.spec.name, "Group already absent, nothing to delete");
        }
        Ok(())
    }

    /// Reconcile ingress authorizations against the desired peer set.
    ///
    /// Peers with no ingress entry are authorized; peers mid-revocation are
    /// waited on and then re-authorized; peers already authorizing or
    /// authorized are left untouched. Ingress for peers outside the desired
    /// set is never revoked.
    pub async fn sync(&mut self) -> Result<()> {
        let peers = self.spec.peer_groups.clone();
        for peer in &peers {
            let status = self
                .snapshot
                .as_ref()
                .and_then(|s| s.ingress_for(peer))
                .map(|e| e.status);

            match status {
                None => self.authorize(peer).await?,
                Some(IngressStatus::Revoking) => {
                    self.wait_revoked(peer).await?;
                    self.authorize(peer).await?;
                }
                Some(s @ (IngressStatus::Authorizing | IngressStatus::Authorized)) => {
                    debug!(
                        group = %self.spec.name,
                        peer = %peer,
                        status = %s,
                        "Ingress already in place"
                    );
                }
            }
        }
        Ok(())
    }

    /// Authorize ingress from one peer. A pre-existing authorization on the
    /// remote side is a no-op; any other remote error aborts reconciliation.
    pub async fn authorize(&mut self, peer: &str) -> Result<()> {
        let owner_id = self
            .snapshot
            .as_ref()
            .map(|s| s.owner_id.clone())
            .context("Cannot authorize ingress without a remote group snapshot")?;

        match self
            .ops
            .authorize_ingress(&self.spec.name, peer, &owner_id)
            .await?
        {
            AuthorizeOutcome::Authorized(snapshot) => {
                self.snapshot = Some(snapshot);
                self.changed = true;
            }
            AuthorizeOutcome::AlreadyAuthorized => {
                debug!(
                    group = %self.spec.name,
                    peer = %peer,
                    "Authorization already existed, no change"
                );
            }
        }
        Ok(())
    }

    /// Poll remote state until the peer's ingress entry is gone.
    ///
    /// An entry in `revoking` cannot be re-authorized; this waits (at the
    /// configured fixed interval, bounded by the configured timeout if any)
    /// for the remote revocation to finish, refreshing the snapshot from
    /// each poll.
    pub async fn wait_revoked(&mut self, peer: &str) -> Result<()> {
        info!(
            group = %self.spec.name,
            peer = %peer,
            "Ingress is being revoked remotely, waiting for it to finish"
        );

        let latest = RefCell::new(self.snapshot.clone());
        let latest_ref = &latest;
        let ops = &self.ops;
        let name = self.spec.name.as_str();
        let what = format!("revocation of ingress from '{peer}'");

        wait_for_condition(
            &self.wait,
            self.cancel.as_ref(),
            move || async move {
                let snap = ops.describe_group(name).await?;
                let gone = snap.as_ref().and_then(|s| s.ingress_for(peer)).is_none();
                *latest_ref.borrow_mut() = snap;
                Ok(gone)
            },
            &what,
        )
        .await?;

        self.snapshot = latest.into_inner();
        Ok(())
    }

    /// Create the group and replace the snapshot with the create response.
    pub async fn create(&mut self) -> Result<()> {
        let snapshot = self
            .ops
            .create_group(&self.spec.name, &self.spec.description)
            .await?;
        self.snapshot = Some(snapshot);
        self.changed = true;
        Ok(())
    }

    /// Delete the group and clear the snapshot.
    pub async fn delete(&mut self) -> Result<()> {
        self.ops.delete_group(&self.spec.name).await?;
        self.snapshot = None;
        self.changed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::{IngressEntry, MockCacheOperations};
    use mockall::predicate::eq;
    use mockall::Sequence;
    use std::time::Duration;

    const OWNER: &str = "123456789012";

    fn spec(peers: &[&str]) -> GroupSpec {
        GroupSpec::new("g1", "test group", peers.iter().map(|p| p.to_string()).collect())
            .unwrap()
    }

    fn snap(peers: &[(&str, IngressStatus)]) -> GroupSnapshot {
        GroupSnapshot {
            name: "g1".to_string(),
            description: "test group".to_string(),
            owner_id: OWNER.to_string(),
            ingress: peers
                .iter()
                .map(|(name, status)| IngressEntry {
                    peer_name: name.to_string(),
                    peer_owner_id: Some(OWNER.to_string()),
                    status: *status,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn absent_group_is_created_and_peers_authorized() {
        let mut ops = MockCacheOperations::new();
        ops.expect_describe_group()
            .with(eq("g1"))
            .times(1)
            .returning(|_| Ok(None));
        ops.expect_create_group()
            .with(eq("g1"), eq("test group"))
            .times(1)
            .returning(|_, _| Ok(snap(&[])));
        ops.expect_authorize_ingress()
            .with(eq("g1"), eq("p1"), eq(OWNER))
            .times(1)
            .returning(|_, _, _| {
                Ok(AuthorizeOutcome::Authorized(snap(&[(
                    "p1",
                    IngressStatus::Authorizing,
                )])))
            });
        ops.expect_authorize_ingress()
            .with(eq("g1"), eq("p2"), eq(OWNER))
            .times(1)
            .returning(|_, _, _| {
                Ok(AuthorizeOutcome::Authorized(snap(&[
                    ("p1", IngressStatus::Authorizing),
                    ("p2", IngressStatus::Authorizing),
                ])))
            });

        let mut reconciler = GroupReconciler::new(ops, spec(&["p1", "p2"]));
        reconciler.ensure_present().await.unwrap();

        assert!(reconciler.changed());
        let report = reconciler.into_report();
        let data = report.info.data.unwrap();
        assert!(data.ingress_for("p1").is_some());
        assert!(data.ingress_for("p2").is_some());
    }

    #[tokio::test]
    async fn second_run_is_a_no_op() {
        // Remote already matches the desired state: no create, no authorize.
        let mut ops = MockCacheOperations::new();
        ops.expect_describe_group().times(1).returning(|_| {
            Ok(Some(snap(&[
                ("p1", IngressStatus::Authorized),
                ("p2", IngressStatus::Authorized),
            ])))
        });

        let mut reconciler = GroupReconciler::new(ops, spec(&["p1", "p2"]));
        reconciler.ensure_present().await.unwrap();

        assert!(!reconciler.changed());
        let report = reconciler.into_report();
        assert_eq!(report.info.data.unwrap().ingress.len(), 2);
    }

    #[tokio::test]
    async fn authorizing_peer_is_left_untouched() {
        let mut ops = MockCacheOperations::new();
        ops.expect_describe_group()
            .times(1)
            .returning(|_| Ok(Some(snap(&[("p1", IngressStatus::Authorizing)]))));

        let mut reconciler = GroupReconciler::new(ops, spec(&["p1"]));
        reconciler.ensure_present().await.unwrap();

        assert!(!reconciler.changed());
    }

    #[tokio::test]
    async fn only_missing_peers_are_authorized() {
        let mut ops = MockCacheOperations::new();
        ops.expect_describe_group()
            .times(1)
            .returning(|_| Ok(Some(snap(&[("p1", IngressStatus::Authorized)]))));
        ops.expect_authorize_ingress()
            .with(eq("g1"), eq("p2"), eq(OWNER))
            .times(1)
            .returning(|_, _, _| {
                Ok(AuthorizeOutcome::Authorized(snap(&[
                    ("p1", IngressStatus::Authorized),
                    ("p2", IngressStatus::Authorizing),
                ])))
            });

        let mut reconciler = GroupReconciler::new(ops, spec(&["p1", "p2"]));
        reconciler.ensure_present().await.unwrap();

        assert!(reconciler.changed());
    }

    #[tokio::test(start_paused = true)]
    async fn revoking_peer_is_waited_on_then_authorized() {
        let mut seq = Sequence::new();
        let mut ops = MockCacheOperations::new();
        // Initial describe: p1 mid-revocation.
        ops.expect_describe_group()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(Some(snap(&[("p1", IngressStatus::Revoking)]))));
        // First poll: still revoking.
        ops.expect_describe_group()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(Some(snap(&[("p1", IngressStatus::Revoking)]))));
        // Second poll: entry gone.
        ops.expect_describe_group()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(Some(snap(&[]))));
        ops.expect_authorize_ingress()
            .with(eq("g1"), eq("p1"), eq(OWNER))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| {
                Ok(AuthorizeOutcome::Authorized(snap(&[(
                    "p1",
                    IngressStatus::Authorizing,
                )])))
            });

        let mut reconciler = GroupReconciler::new(ops, spec(&["p1"]));
        reconciler.ensure_present().await.unwrap();

        assert!(reconciler.changed());
        assert_eq!(
            reconciler.snapshot().unwrap().ingress_for("p1").unwrap().status,
            IngressStatus::Authorizing
        );
    }

    #[tokio::test(start_paused = true)]
    async fn revoke_wait_times_out_when_bounded() {
        let mut ops = MockCacheOperations::new();
        ops.expect_describe_group()
            .returning(|_| Ok(Some(snap(&[("p1", IngressStatus::Revoking)]))));

        let mut reconciler = GroupReconciler::new(ops, spec(&["p1"]))
            .with_wait_config(WaitConfig::with_timeout(Duration::from_secs(3)));
        let err = reconciler.ensure_present().await.unwrap_err();

        assert!(
            err.to_string().contains("revocation of ingress from 'p1'"),
            "unexpected error: {err}"
        );
    }

    #[tokio::test]
    async fn cancellation_aborts_revoke_wait() {
        let mut ops = MockCacheOperations::new();
        ops.expect_describe_group()
            .returning(|_| Ok(Some(snap(&[("p1", IngressStatus::Revoking)]))));

        let token = CancellationToken::new();
        token.cancel();
        let mut reconciler =
            GroupReconciler::new(ops, spec(&["p1"])).with_cancellation(token);
        let err = reconciler.ensure_present().await.unwrap_err();

        assert!(err.to_string().contains("cancelled"), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn duplicate_authorization_is_not_a_change() {
        let mut ops = MockCacheOperations::new();
        ops.expect_describe_group()
            .times(1)
            .returning(|_| Ok(Some(snap(&[]))));
        ops.expect_authorize_ingress()
            .with(eq("g1"), eq("p1"), eq(OWNER))
            .times(1)
            .returning(|_, _, _| Ok(AuthorizeOutcome::AlreadyAuthorized));

        let mut reconciler = GroupReconciler::new(ops, spec(&["p1"]));
        reconciler.ensure_present().await.unwrap();

        assert!(!reconciler.changed());
    }

    #[tokio::test]
    async fn fatal_authorize_error_aborts_reconciliation() {
        let mut ops = MockCacheOperations::new();
        ops.expect_describe_group()
            .times(1)
            .returning(|_| Ok(Some(snap(&[]))));
        // p1 fails hard; p2 must never be attempted (no expectation set).
        ops.expect_authorize_ingress()
            .with(eq("g1"), eq("p1"), eq(OWNER))
            .times(1)
            .returning(|_, _, _| anyhow::bail!("AWS error: access denied"));

        let mut reconciler = GroupReconciler::new(ops, spec(&["p1", "p2"]));
        let err = reconciler.ensure_present().await.unwrap_err();

        assert!(err.to_string().contains("access denied"));
        assert!(!reconciler.changed());
    }

    #[tokio::test]
    async fn ensure_absent_deletes_existing_group() {
        let mut ops = MockCacheOperations::new();
        ops.expect_describe_group()
            .times(1)
            .returning(|_| Ok(Some(snap(&[]))));
        ops.expect_delete_group()
            .with(eq("g1"))
            .times(1)
            .returning(|_| Ok(()));

        let mut reconciler = GroupReconciler::new(ops, spec(&[]));
        reconciler.ensure_absent().await.unwrap();

        assert!(reconciler.changed());
        let report = reconciler.into_report();
        assert!(report.info.data.is_none());
    }

    #[tokio::test]
    async fn ensure_absent_is_a_no_op_when_already_gone() {
        let mut ops = MockCacheOperations::new();
        ops.expect_describe_group()
            .times(1)
            .returning(|_| Ok(None));

        let mut reconciler = GroupReconciler::new(ops, spec(&[]));
        reconciler.ensure_absent().await.unwrap();

        assert!(!reconciler.changed());
    }

    #[tokio::test]
    async fn undesired_peers_are_never_revoked() {
        // p-stale exists remotely but is not desired; nothing touches it.
        let mut ops = MockCacheOperations::new();
        ops.expect_describe_group().times(1).returning(|_| {
            Ok(Some(snap(&[
                ("p1", IngressStatus::Authorized),
                ("p-stale", IngressStatus::Authorized),
            ])))
        });

        let mut reconciler = GroupReconciler::new(ops, spec(&["p1"]));
        reconciler.ensure_present().await.unwrap();

        assert!(!reconciler.changed());
        assert!(reconciler.snapshot().unwrap().ingress_for("p-stale").is_some());
    }
}
