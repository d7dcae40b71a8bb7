//! The deployment ledger's record types.
//!
//! Deployments are append-only: once published, a deployment's content and
//! owning policy never change. Per-device outcomes live in
//! [`DeploymentStatus`] rows, at most one per (deployment, device) pair.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::{
  key::{DeploymentKey, DeviceKey, PolicyKey},
  payload::RawPayload,
};

/// An immutable published version of a policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
  pub key:     DeploymentKey,
  pub policy:  PolicyKey,
  pub payload: RawPayload,
  pub comment: Option<String>,
  pub done_at: DateTime<Utc>,
}

/// Outcome a device reported for a deployment.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeploymentResult {
  /// Sent to the device, outcome not yet known.
  Pending,
  Success,
  Failure,
  /// The device applied a removal instruction for this deployment. A removed
  /// deployment no longer counts as acknowledged.
  Removed,
}

impl DeploymentResult {
  /// Whether the device still holds (or is trying to hold) this deployment.
  pub fn is_held(self) -> bool { !matches!(self, Self::Removed) }
}

/// Per (deployment, device) outcome; upserted, never appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentStatus {
  pub deployment: DeploymentKey,
  pub device:     DeviceKey,
  pub result:     DeploymentResult,
  pub updated_at: DateTime<Utc>,
}

/// A deployment a device has a status row for, paired with that result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcknowledgedDeployment {
  pub deployment: Deployment,
  pub result:     DeploymentResult,
}
