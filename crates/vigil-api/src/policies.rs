//! Handlers for `/policies` endpoints, including the deployment history and
//! assignment edges of each policy.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/policies?tenant=<key>` | |
//! | `POST`   | `/policies` | Body: [`CreateBody`]; starts as an undeployed draft |
//! | `GET`    | `/policies/:key` | Draft content, not what devices see |
//! | `PATCH`  | `/policies/:key` | Body: [`PolicyPatch`]; edits the draft only |
//! | `DELETE` | `/policies/:key` | Devices holding it get it in `to_remove` |
//! | `GET`    | `/policies/:key/deployments` | Newest first |
//! | `POST`   | `/policies/:key/deployments` | Body: `{"comment":"..."}`; snapshots the draft |
//! | `GET`    | `/policies/:key/assignments` | |
//! | `POST`   | `/policies/:key/assignments` | Body: `{"kind":"group","key":2}` |
//! | `DELETE` | `/policies/:key/assignments` | Same body as `POST` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;
use vigil_core::{
  assignment::{Assignment, AssignmentTarget},
  deployment::Deployment,
  key::{DeploymentKey, PolicyKey, TenantKey},
  payload::PolicyPayload,
  policy::{NewPolicy, Policy, PolicyPatch},
  store::MdmStore,
};

use crate::{devices::TenantParams, error::ApiError};

fn policy_not_found(key: PolicyKey) -> ApiError {
  ApiError::NotFound(format!("policy {key} not found"))
}

async fn require_policy<S: MdmStore>(store: &S, key: PolicyKey) -> Result<Policy, ApiError> {
  store
    .get_policy(key)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| policy_not_found(key))
}

// ─── List / create ────────────────────────────────────────────────────────────

/// `GET /policies?tenant=<key>`
pub async fn list<S: MdmStore>(
  State(store): State<Arc<S>>,
  Query(params): Query<TenantParams>,
) -> Result<Json<Vec<Policy>>, ApiError> {
  let policies = store.list_policies(params.tenant).await.map_err(ApiError::store)?;
  Ok(Json(policies))
}

/// Either a full `payload` or just a `kind`, which starts an empty draft.
#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub tenant:      TenantKey,
  pub name:        String,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub kind:        Option<String>,
  #[serde(default)]
  pub payload:     Option<PolicyPayload>,
}

/// `POST /policies`
pub async fn create<S: MdmStore>(
  State(store): State<Arc<S>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
  let payload = match (body.payload, body.kind) {
    (Some(payload), _) => payload,
    (None, Some(kind)) => PolicyPayload::empty(&kind)?,
    (None, None) => return Err(ApiError::BadRequest("either payload or kind is required".into())),
  };

  let mut input = NewPolicy::new(body.tenant, body.name, &payload)?;
  input.description = body.description;

  let policy = store.create_policy(input).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(policy)))
}

// ─── Single policy ────────────────────────────────────────────────────────────

/// `GET /policies/:key`
pub async fn get_one<S: MdmStore>(
  State(store): State<Arc<S>>,
  Path(key): Path<PolicyKey>,
) -> Result<Json<Policy>, ApiError> {
  Ok(Json(require_policy(store.as_ref(), key).await?))
}

/// `PATCH /policies/:key`
pub async fn update<S: MdmStore>(
  State(store): State<Arc<S>>,
  Path(key): Path<PolicyKey>,
  Json(patch): Json<PolicyPatch>,
) -> Result<Json<Policy>, ApiError> {
  let policy = store.update_policy(key, patch).await.map_err(ApiError::store)?;
  Ok(Json(policy))
}

/// `DELETE /policies/:key`
pub async fn delete<S: MdmStore>(
  State(store): State<Arc<S>>,
  Path(key): Path<PolicyKey>,
) -> Result<StatusCode, ApiError> {
  if store.delete_policy(key).await.map_err(ApiError::store)? {
    Ok(StatusCode::NO_CONTENT)
  } else {
    Err(policy_not_found(key))
  }
}

// ─── Deployments ──────────────────────────────────────────────────────────────

/// `GET /policies/:key/deployments`
pub async fn deployments<S: MdmStore>(
  State(store): State<Arc<S>>,
  Path(key): Path<PolicyKey>,
) -> Result<Json<Vec<Deployment>>, ApiError> {
  let deployments = store.list_deployments(key).await.map_err(ApiError::store)?;
  Ok(Json(deployments))
}

#[derive(Debug, Default, Deserialize)]
pub struct DeployBody {
  #[serde(default)]
  pub comment: Option<String>,
}

/// `POST /policies/:key/deployments`
pub async fn deploy<S: MdmStore>(
  State(store): State<Arc<S>>,
  Path(key): Path<PolicyKey>,
  Json(body): Json<DeployBody>,
) -> Result<impl IntoResponse, ApiError> {
  let deployment = store
    .deploy_policy(key, body.comment)
    .await
    .map_err(ApiError::store)?;
  info!(policy = %key, deployment = %deployment.key, "policy deployed");
  Ok((StatusCode::CREATED, Json(deployment)))
}

/// `GET /deployments/:key`
pub async fn get_deployment<S: MdmStore>(
  State(store): State<Arc<S>>,
  Path(key): Path<DeploymentKey>,
) -> Result<Json<Deployment>, ApiError> {
  let deployment = store
    .get_deployment(key)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("deployment {key} not found")))?;
  Ok(Json(deployment))
}

// ─── Assignments ──────────────────────────────────────────────────────────────

/// `GET /policies/:key/assignments`
pub async fn assignments<S: MdmStore>(
  State(store): State<Arc<S>>,
  Path(key): Path<PolicyKey>,
) -> Result<Json<Vec<Assignment>>, ApiError> {
  require_policy(store.as_ref(), key).await?;
  let assignments = store.list_assignments(key).await.map_err(ApiError::store)?;
  Ok(Json(assignments))
}

/// `POST /policies/:key/assignments`
pub async fn assign<S: MdmStore>(
  State(store): State<Arc<S>>,
  Path(key): Path<PolicyKey>,
  Json(target): Json<AssignmentTarget>,
) -> Result<impl IntoResponse, ApiError> {
  let assignment = store.assign(key, target).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(assignment)))
}

/// `DELETE /policies/:key/assignments`
pub async fn unassign<S: MdmStore>(
  State(store): State<Arc<S>>,
  Path(key): Path<PolicyKey>,
  Json(target): Json<AssignmentTarget>,
) -> Result<StatusCode, ApiError> {
  if store.unassign(key, target).await.map_err(ApiError::store)? {
    Ok(StatusCode::NO_CONTENT)
  } else {
    Err(ApiError::NotFound(format!("policy {key} is not assigned to {target:?}")))
  }
}
