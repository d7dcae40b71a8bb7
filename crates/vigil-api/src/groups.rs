//! Handlers for `/groups` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/groups?tenant=<key>` | |
//! | `POST`   | `/groups` | Body: `{"tenant":1,"name":"kiosks"}` |
//! | `GET`    | `/groups/:key` | |
//! | `DELETE` | `/groups/:key` | Also drops the group's assignments |
//! | `GET`    | `/groups/:key/members` | |
//! | `POST`   | `/groups/:key/members` | Body: `{"kind":"device","key":3}` |
//! | `DELETE` | `/groups/:key/members` | Same body as `POST` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use vigil_core::{
  group::{Group, GroupMember},
  key::{GroupKey, TenantKey},
  store::MdmStore,
};

use crate::{devices::TenantParams, error::ApiError};

fn group_not_found(key: GroupKey) -> ApiError { ApiError::NotFound(format!("group {key} not found")) }

/// `GET /groups?tenant=<key>`
pub async fn list<S: MdmStore>(
  State(store): State<Arc<S>>,
  Query(params): Query<TenantParams>,
) -> Result<Json<Vec<Group>>, ApiError> {
  let groups = store.list_groups(params.tenant).await.map_err(ApiError::store)?;
  Ok(Json(groups))
}

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub tenant: TenantKey,
  pub name:   String,
}

/// `POST /groups`
pub async fn create<S: MdmStore>(
  State(store): State<Arc<S>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
  let group = store
    .create_group(body.tenant, body.name)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(group)))
}

/// `GET /groups/:key`
pub async fn get_one<S: MdmStore>(
  State(store): State<Arc<S>>,
  Path(key): Path<GroupKey>,
) -> Result<Json<Group>, ApiError> {
  let group = store
    .get_group(key)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| group_not_found(key))?;
  Ok(Json(group))
}

/// `DELETE /groups/:key`
pub async fn delete<S: MdmStore>(
  State(store): State<Arc<S>>,
  Path(key): Path<GroupKey>,
) -> Result<StatusCode, ApiError> {
  if store.delete_group(key).await.map_err(ApiError::store)? {
    Ok(StatusCode::NO_CONTENT)
  } else {
    Err(group_not_found(key))
  }
}

// ─── Members ──────────────────────────────────────────────────────────────────

/// `GET /groups/:key/members`
pub async fn members<S: MdmStore>(
  State(store): State<Arc<S>>,
  Path(key): Path<GroupKey>,
) -> Result<Json<Vec<GroupMember>>, ApiError> {
  if store.get_group(key).await.map_err(ApiError::store)?.is_none() {
    return Err(group_not_found(key));
  }
  let members = store.list_group_members(key).await.map_err(ApiError::store)?;
  Ok(Json(members))
}

/// `POST /groups/:key/members`
pub async fn add_member<S: MdmStore>(
  State(store): State<Arc<S>>,
  Path(key): Path<GroupKey>,
  Json(member): Json<GroupMember>,
) -> Result<impl IntoResponse, ApiError> {
  store.add_group_member(key, member).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(member)))
}

/// `DELETE /groups/:key/members`
pub async fn remove_member<S: MdmStore>(
  State(store): State<Arc<S>>,
  Path(key): Path<GroupKey>,
  Json(member): Json<GroupMember>,
) -> Result<StatusCode, ApiError> {
  if store.remove_group_member(key, member).await.map_err(ApiError::store)? {
    Ok(StatusCode::NO_CONTENT)
  } else {
    Err(ApiError::NotFound(format!("{member:?} is not a member of group {key}")))
  }
}
