//! Check-in reconciliation: what a device has versus what it should have.
//!
//! The store assembles a [`CheckinSnapshot`] in a single read transaction;
//! [`diff`] turns it into a [`ReconcileResult`] without further I/O. The
//! reconciler never writes; device state only moves when a result is
//! recorded through [`StatusRecorder`](crate::status::StatusRecorder).

use std::{collections::HashMap, sync::Arc};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
  Error, Result,
  action::DeviceAction,
  deployment::{AcknowledgedDeployment, Deployment},
  key::{DeploymentKey, DeviceKey, PolicyKey},
  payload::RawPayload,
  scope::ScopedPolicySet,
  store::MdmStore,
};

// ─── Snapshot ────────────────────────────────────────────────────────────────

/// Everything a check-in needs, read at one consistent point.
#[derive(Debug, Clone, Default)]
pub struct CheckinSnapshot {
  pub device:            DeviceKey,
  pub scope:             ScopedPolicySet,
  /// Latest deployment of each scoped policy that has one.
  pub latest:            Vec<Deployment>,
  /// Most recent deployment of each scoped policy the device holds.
  pub last_acknowledged: Vec<AcknowledgedDeployment>,
  /// Deployments the device holds whose policy is no longer scoped.
  pub requiring_removal: Vec<AcknowledgedDeployment>,
  pub pending_actions:   Vec<DeviceAction>,
}

// ─── Result ──────────────────────────────────────────────────────────────────

/// One entry of a policy delta: a policy and the deployment content to send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDelta {
  pub policy:     PolicyKey,
  pub deployment: DeploymentKey,
  pub payload:    RawPayload,
}

impl From<Deployment> for PolicyDelta {
  fn from(d: Deployment) -> Self {
    Self {
      policy:     d.policy,
      deployment: d.key,
      payload:    d.payload,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconcileResult {
  pub to_apply:        Vec<PolicyDelta>,
  pub to_remove:       Vec<PolicyDelta>,
  pub pending_actions: Vec<DeviceAction>,
}

impl ReconcileResult {
  /// Nothing to send to the device.
  pub fn is_empty(&self) -> bool {
    self.to_apply.is_empty() && self.to_remove.is_empty() && self.pending_actions.is_empty()
  }
}

// ─── Diff ────────────────────────────────────────────────────────────────────

/// Compute the apply/remove delta for a snapshot.
///
/// A policy goes into `to_apply` when the device has never acknowledged it or
/// last acknowledged a different deployment than the latest one. Removals
/// come from scope contraction only. Both lists are ordered by policy key,
/// then deployment key.
pub fn diff(snapshot: CheckinSnapshot) -> ReconcileResult {
  let CheckinSnapshot {
    scope,
    latest,
    last_acknowledged,
    requiring_removal,
    pending_actions,
    ..
  } = snapshot;

  let acknowledged: HashMap<PolicyKey, DeploymentKey> = last_acknowledged
    .into_iter()
    .filter(|a| a.result.is_held())
    .map(|a| (a.deployment.policy, a.deployment.key))
    .collect();

  let mut to_apply: Vec<PolicyDelta> = latest
    .into_iter()
    .filter(|d| scope.contains(d.policy))
    .filter(|d| acknowledged.get(&d.policy) != Some(&d.key))
    .map(PolicyDelta::from)
    .collect();
  to_apply.sort_by_key(|d| (d.policy, d.deployment));

  let mut to_remove: Vec<PolicyDelta> = requiring_removal
    .into_iter()
    .filter(|a| a.result.is_held() && !scope.contains(a.deployment.policy))
    .map(|a| PolicyDelta::from(a.deployment))
    .collect();
  to_remove.sort_by_key(|d| (d.policy, d.deployment));

  ReconcileResult { to_apply, to_remove, pending_actions }
}

// ─── Reconciler ──────────────────────────────────────────────────────────────

/// Read-only check-in entry point over any [`MdmStore`].
pub struct Reconciler<S> {
  store: Arc<S>,
}

impl<S> Clone for Reconciler<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

impl<S: MdmStore> Reconciler<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  /// Policies currently scoped to `device`, read fresh from the graph.
  pub async fn resolve(&self, device: DeviceKey) -> Result<ScopedPolicySet> {
    self.store.scoped_policies(device).await.map_err(Into::<Error>::into)
  }

  /// Compute the complete delta for `device`, or fail the whole call.
  ///
  /// Safe to retry: with no server-side change in between, a repeated call
  /// returns the same result.
  pub async fn reconcile(&self, device: DeviceKey) -> Result<ReconcileResult> {
    let snapshot = self.store.checkin_snapshot(device).await.map_err(Into::<Error>::into)?;
    let scoped = snapshot.scope.len();
    let result = diff(snapshot);
    debug!(
      %device,
      scoped,
      apply = result.to_apply.len(),
      remove = result.to_remove.len(),
      actions = result.pending_actions.len(),
      "reconciled check-in"
    );
    Ok(result)
  }
}

#[cfg(test)]
mod tests {
  use chrono::{DateTime, Utc};

  use super::*;
  use crate::deployment::DeploymentResult;

  fn at(secs: i64) -> DateTime<Utc> { DateTime::from_timestamp(secs, 0).unwrap() }

  fn dep(key: i64, policy: i64, done_at: i64) -> Deployment {
    Deployment {
      key:     DeploymentKey(key),
      policy:  PolicyKey(policy),
      payload: RawPayload { kind: "windows".into(), data: serde_json::json!({ "v": key }) },
      comment: None,
      done_at: at(done_at),
    }
  }

  fn ack(d: Deployment, result: DeploymentResult) -> AcknowledgedDeployment {
    AcknowledgedDeployment { deployment: d, result }
  }

  fn scope(direct: &[i64]) -> ScopedPolicySet {
    ScopedPolicySet::from_parts(direct.iter().copied().map(PolicyKey), Vec::new())
  }

  #[test]
  fn unseen_policy_is_applied() {
    let result = diff(CheckinSnapshot {
      scope: scope(&[1]),
      latest: vec![dep(10, 1, 100)],
      ..Default::default()
    });
    assert_eq!(result.to_apply.len(), 1);
    assert_eq!(result.to_apply[0].deployment, DeploymentKey(10));
    assert!(result.to_remove.is_empty());
  }

  #[test]
  fn acknowledged_latest_is_skipped() {
    let result = diff(CheckinSnapshot {
      scope: scope(&[1]),
      latest: vec![dep(10, 1, 100)],
      last_acknowledged: vec![ack(dep(10, 1, 100), DeploymentResult::Success)],
      ..Default::default()
    });
    assert!(result.is_empty());
  }

  #[test]
  fn newer_version_supersedes_acknowledged_one() {
    let result = diff(CheckinSnapshot {
      scope: scope(&[1]),
      latest: vec![dep(11, 1, 200)],
      last_acknowledged: vec![ack(dep(10, 1, 100), DeploymentResult::Success)],
      ..Default::default()
    });
    assert_eq!(result.to_apply.len(), 1);
    assert_eq!(result.to_apply[0].deployment, DeploymentKey(11));
  }

  #[test]
  fn removed_acknowledgment_means_reapply() {
    let result = diff(CheckinSnapshot {
      scope: scope(&[1]),
      latest: vec![dep(10, 1, 100)],
      last_acknowledged: vec![ack(dep(10, 1, 100), DeploymentResult::Removed)],
      ..Default::default()
    });
    assert_eq!(result.to_apply.len(), 1);
  }

  #[test]
  fn unscoped_deployments_are_never_applied() {
    let result = diff(CheckinSnapshot {
      scope: scope(&[1]),
      latest: vec![dep(10, 1, 100), dep(20, 2, 100)],
      ..Default::default()
    });
    assert_eq!(result.to_apply.len(), 1);
    assert_eq!(result.to_apply[0].policy, PolicyKey(1));
  }

  #[test]
  fn removal_list_excludes_scoped_and_already_removed() {
    let result = diff(CheckinSnapshot {
      scope: scope(&[1]),
      requiring_removal: vec![
        ack(dep(30, 3, 100), DeploymentResult::Success),
        ack(dep(20, 2, 100), DeploymentResult::Failure),
        ack(dep(40, 4, 100), DeploymentResult::Removed),
        ack(dep(10, 1, 100), DeploymentResult::Success),
      ],
      ..Default::default()
    });
    let removed: Vec<_> = result.to_remove.iter().map(|d| d.deployment).collect();
    assert_eq!(removed, vec![DeploymentKey(20), DeploymentKey(30)]);
  }

  #[test]
  fn outputs_are_sorted_by_policy() {
    let result = diff(CheckinSnapshot {
      scope: scope(&[1, 2, 3]),
      latest: vec![dep(33, 3, 1), dep(11, 1, 1), dep(22, 2, 1)],
      ..Default::default()
    });
    let order: Vec<_> = result.to_apply.iter().map(|d| d.policy.get()).collect();
    assert_eq!(order, vec![1, 2, 3]);
  }
}
