//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;
use vigil_core::Error as CoreError;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("conflict: {0}")]
  Conflict(String),

  /// The store is temporarily unreachable; the client may retry.
  #[error("unavailable: {0}")]
  Unavailable(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Convert a backend error through the domain error it maps to.
  pub fn store<E: Into<CoreError>>(e: E) -> Self {
    let e: CoreError = e.into();
    e.into()
  }
}

impl From<CoreError> for ApiError {
  fn from(e: CoreError) -> Self {
    match e {
      e if e.is_not_found() => ApiError::NotFound(e.to_string()),
      e @ CoreError::InvalidStatusTransition { .. } => ApiError::Conflict(e.to_string()),
      e @ (CoreError::TenantMismatch { .. }
      | CoreError::UnknownPayloadKind(_)
      | CoreError::Serialization(_)) => ApiError::BadRequest(e.to_string()),
      e @ CoreError::StorageUnavailable(_) => ApiError::Unavailable(e.to_string()),
      e => ApiError::Store(Box::new(e)),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::Unavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m.clone()),
      ApiError::Store(e) => {
        error!(error = %e, "unhandled store error");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
