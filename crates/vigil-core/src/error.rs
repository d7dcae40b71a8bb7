//! Error types for `vigil-core`.

use thiserror::Error;

use crate::key::{ActionKey, DeploymentKey, DeviceKey, GroupKey, PolicyKey, TenantKey};

#[derive(Debug, Error)]
pub enum Error {
  /// The backing store could not complete the request. Transient: the caller
  /// should retry the whole check-in (or the single `record_result` call).
  #[error("storage unavailable: {0}")]
  StorageUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("device not found: {0}")]
  DeviceNotFound(DeviceKey),

  #[error("policy not found: {0}")]
  PolicyNotFound(PolicyKey),

  #[error("group not found: {0}")]
  GroupNotFound(GroupKey),

  #[error("deployment not found: {0}")]
  DeploymentNotFound(DeploymentKey),

  #[error("device action not found: {0}")]
  ActionNotFound(ActionKey),

  /// A result was reported for a deployment that no longer exists.
  #[error("cannot record a result for device {device} on missing deployment {deployment}")]
  InvalidStatusTransition {
    device:     DeviceKey,
    deployment: DeploymentKey,
  },

  #[error("tenant mismatch: expected {expected}, found {found}")]
  TenantMismatch {
    expected: TenantKey,
    found:    TenantKey,
  },

  #[error("unknown payload kind: {0:?}")]
  UnknownPayloadKind(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  /// Referential errors name a row that does not exist. Mid-scan these are
  /// treated as "not scoped" rather than fatal.
  pub fn is_not_found(&self) -> bool {
    matches!(
      self,
      Self::DeviceNotFound(_)
        | Self::PolicyNotFound(_)
        | Self::GroupNotFound(_)
        | Self::DeploymentNotFound(_)
        | Self::ActionNotFound(_)
    )
  }

  pub fn is_transient(&self) -> bool { matches!(self, Self::StorageUnavailable(_)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
