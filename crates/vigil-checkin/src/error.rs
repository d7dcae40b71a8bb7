//! Error types and axum `IntoResponse` implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};
use vigil_core::Error as CoreError;

/// Seconds a device should wait before retrying a check-in that hit a
/// storage fault.
const RETRY_AFTER_SECS: &str = "5";

#[derive(Debug, Error)]
pub enum Error {
  #[error("not found: {0}")]
  NotFound(String),
  #[error("bad request: {0}")]
  BadRequest(String),
  #[error("conflict: {0}")]
  Conflict(String),
  #[error("store unavailable: {0}")]
  Unavailable(String),
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn store<E: Into<CoreError>>(e: E) -> Self {
    let e: CoreError = e.into();
    e.into()
  }
}

impl From<CoreError> for Error {
  fn from(e: CoreError) -> Self {
    match e {
      e if e.is_not_found() => Error::NotFound(e.to_string()),
      e if e.is_transient() => Error::Unavailable(e.to_string()),
      e @ CoreError::InvalidStatusTransition { .. } => Error::Conflict(e.to_string()),
      e @ (CoreError::TenantMismatch { .. } | CoreError::UnknownPayloadKind(_)) => {
        Error::BadRequest(e.to_string())
      }
      e => Error::Store(Box::new(e)),
    }
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      Error::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      Error::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      Error::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      Error::Unavailable(m) => {
        warn!(error = %m, "check-in failed on a storage fault");
        let mut res =
          (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "error": m }))).into_response();
        res
          .headers_mut()
          .insert(header::RETRY_AFTER, HeaderValue::from_static(RETRY_AFTER_SECS));
        return res;
      }
      Error::Store(e) => {
        error!(error = %e, "unhandled store error");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
