//! Handlers for `/devices` endpoints.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `GET`   | `/devices?tenant=<key>` | Devices of one tenant |
//! | `POST`  | `/devices` | Body: [`NewDevice`]; re-enrolling a serial updates in place |
//! | `GET`   | `/devices/:key` | 404 if not found |
//! | `PATCH` | `/devices/:key` | Body: [`DevicePatch`] |
//! | `GET`   | `/devices/:key/scope` | Policies scoped to the device and how |
//! | `GET`   | `/devices/:key/statuses` | Deployment results the device reported |
//! | `POST`  | `/devices/:key/actions` | Body: `{"action":"restart"}` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use vigil_core::{
  action::DeviceActionKind,
  deployment::DeploymentStatus,
  device::{Device, DevicePatch, NewDevice},
  key::{DeviceKey, TenantKey},
  scope::ScopedPolicy,
  store::MdmStore,
};

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct TenantParams {
  pub tenant: TenantKey,
}

async fn require_device<S: MdmStore>(store: &S, key: DeviceKey) -> Result<Device, ApiError> {
  store
    .get_device(key)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("device {key} not found")))
}

// ─── List / enroll ────────────────────────────────────────────────────────────

/// `GET /devices?tenant=<key>`
pub async fn list<S: MdmStore>(
  State(store): State<Arc<S>>,
  Query(params): Query<TenantParams>,
) -> Result<Json<Vec<Device>>, ApiError> {
  let devices = store.list_devices(params.tenant).await.map_err(ApiError::store)?;
  Ok(Json(devices))
}

/// `POST /devices`
pub async fn enroll<S: MdmStore>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewDevice>,
) -> Result<impl IntoResponse, ApiError> {
  if body.serial_number.trim().is_empty() {
    return Err(ApiError::BadRequest("serial_number must not be empty".into()));
  }
  let device = store.enroll_device(body).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(device)))
}

// ─── Single device ────────────────────────────────────────────────────────────

/// `GET /devices/:key`
pub async fn get_one<S: MdmStore>(
  State(store): State<Arc<S>>,
  Path(key): Path<DeviceKey>,
) -> Result<Json<Device>, ApiError> {
  Ok(Json(require_device(store.as_ref(), key).await?))
}

/// `PATCH /devices/:key`
pub async fn update<S: MdmStore>(
  State(store): State<Arc<S>>,
  Path(key): Path<DeviceKey>,
  Json(patch): Json<DevicePatch>,
) -> Result<Json<Device>, ApiError> {
  let device = store.update_device(key, patch).await.map_err(ApiError::store)?;
  Ok(Json(device))
}

/// `GET /devices/:key/scope`
pub async fn scope<S: MdmStore>(
  State(store): State<Arc<S>>,
  Path(key): Path<DeviceKey>,
) -> Result<Json<Vec<ScopedPolicy>>, ApiError> {
  require_device(store.as_ref(), key).await?;
  let scope = store.scoped_policies(key).await.map_err(ApiError::store)?;
  Ok(Json(scope.entries()))
}

/// `GET /devices/:key/statuses`
pub async fn statuses<S: MdmStore>(
  State(store): State<Arc<S>>,
  Path(key): Path<DeviceKey>,
) -> Result<Json<Vec<DeploymentStatus>>, ApiError> {
  require_device(store.as_ref(), key).await?;
  let statuses = store.device_statuses(key).await.map_err(ApiError::store)?;
  Ok(Json(statuses))
}

// ─── Actions ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct QueueActionBody {
  pub action:     DeviceActionKind,
  #[serde(default)]
  pub created_by: Option<String>,
}

/// `POST /devices/:key/actions`
pub async fn queue_action<S: MdmStore>(
  State(store): State<Arc<S>>,
  Path(key): Path<DeviceKey>,
  Json(body): Json<QueueActionBody>,
) -> Result<impl IntoResponse, ApiError> {
  let action = store
    .queue_action(key, body.action, body.created_by)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(action)))
}
