//! `POST /checkin/:device`

use axum::{
  Json,
  extract::{Path, State},
};
use tracing::{info, warn};
use vigil_core::{key::DeviceKey, reconcile::ReconcileResult, store::MdmStore};

use crate::{AppState, Error};

/// Compute the device's delta and stamp its last sync time.
///
/// The delta is read-only, so a failed stamp is logged and the delta still
/// returned.
pub async fn handler<S: MdmStore + 'static>(
  State(state): State<AppState<S>>,
  Path(device): Path<DeviceKey>,
) -> Result<Json<ReconcileResult>, Error> {
  let result = state.reconciler.reconcile(device).await?;

  if let Err(e) = state.store.touch_device(device).await {
    let e: vigil_core::Error = e.into();
    warn!(%device, error = %e, "failed to record last sync time");
  }

  info!(
    %device,
    apply = result.to_apply.len(),
    remove = result.to_remove.len(),
    actions = result.pending_actions.len(),
    "device checked in"
  );
  Ok(Json(result))
}
