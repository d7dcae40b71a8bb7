//! `POST /checkin/:device/actions/:action/delivered`

use axum::{
  Json,
  extract::{Path, State},
};
use tracing::info;
use vigil_core::{
  action::DeviceAction,
  key::{ActionKey, DeviceKey},
  store::MdmStore,
};

use crate::{AppState, Error};

/// Mark a queued action as sent. Only the device the action targets may
/// acknowledge it.
pub async fn delivered<S: MdmStore + 'static>(
  State(state): State<AppState<S>>,
  Path((device, action)): Path<(DeviceKey, ActionKey)>,
) -> Result<Json<DeviceAction>, Error> {
  let queued = state.store.get_action(action).await.map_err(Error::store)?;
  if !queued.is_some_and(|a| a.device == device) {
    return Err(Error::NotFound(format!("action {action} not found for device {device}")));
  }

  let delivered = state.recorder.mark_action_delivered(action).await?;
  info!(%device, %action, kind = delivered.action.as_ref(), "device action delivered");
  Ok(Json(delivered))
}
