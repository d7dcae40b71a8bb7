//! Writes device acknowledgments back into the deployment ledger.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::{
  Error, Result,
  action::DeviceAction,
  deployment::{DeploymentResult, DeploymentStatus},
  key::{ActionKey, DeploymentKey, DeviceKey},
  store::MdmStore,
};

/// What happened to a reported result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "status", rename_all = "snake_case")]
pub enum RecordOutcome {
  Recorded(DeploymentStatus),
  /// The deployment no longer exists, so the result is moot.
  Dropped,
}

pub struct StatusRecorder<S> {
  store: Arc<S>,
}

impl<S> Clone for StatusRecorder<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

impl<S: MdmStore> StatusRecorder<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  /// Upsert the single status row for (`deployment`, `device`).
  ///
  /// Results for deployments that have disappeared are logged and dropped.
  /// Storage failures are returned; the caller should retry this call alone.
  pub async fn record_result(
    &self,
    device: DeviceKey,
    deployment: DeploymentKey,
    result: DeploymentResult,
  ) -> Result<RecordOutcome> {
    match self.store.record_result(device, deployment, result).await.map_err(Into::<Error>::into) {
      Ok(status) => {
        debug!(%device, %deployment, result = result.as_ref(), "recorded deployment result");
        Ok(RecordOutcome::Recorded(status))
      }
      Err(Error::InvalidStatusTransition { device, deployment }) => {
        warn!(%device, %deployment, "dropping result for missing deployment");
        Ok(RecordOutcome::Dropped)
      }
      Err(e) => Err(e),
    }
  }

  pub async fn mark_action_delivered(&self, action: ActionKey) -> Result<DeviceAction> {
    self.store.mark_action_delivered(action).await.map_err(Into::<Error>::into)
  }
}
