//! Device check-in server for Vigil.
//!
//! Exposes an axum [`Router`] with the device-facing check-in endpoints and
//! the admin API nested under `/api`, backed by any [`MdmStore`].

pub mod error;
pub mod handlers;

pub use error::Error;

use std::{path::PathBuf, sync::Arc};

use axum::{Router, routing::post};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use vigil_core::{Reconciler, StatusRecorder, store::MdmStore};

use handlers::{actions, checkin, results};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `VIGIL_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                    String,
  #[serde(default = "default_port")]
  pub port:                    u16,
  pub store_path:              PathBuf,
  /// Upper bound on entries in one result report.
  #[serde(default = "default_max_results")]
  pub max_results_per_report:  usize,
}

fn default_host() -> String { "127.0.0.1".to_string() }

fn default_port() -> u16 { 8420 }

fn default_max_results() -> usize { 256 }

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all check-in handlers.
pub struct AppState<S> {
  pub store:      Arc<S>,
  pub config:     Arc<ServerConfig>,
  pub reconciler: Reconciler<S>,
  pub recorder:   StatusRecorder<S>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:      Arc::clone(&self.store),
      config:     Arc::clone(&self.config),
      reconciler: self.reconciler.clone(),
      recorder:   self.recorder.clone(),
    }
  }
}

impl<S: MdmStore> AppState<S> {
  pub fn new(store: Arc<S>, config: ServerConfig) -> Self {
    Self {
      reconciler: Reconciler::new(Arc::clone(&store)),
      recorder: StatusRecorder::new(Arc::clone(&store)),
      config: Arc::new(config),
      store,
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full server router: check-in routes plus `/api`.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: MdmStore + 'static,
{
  let api = vigil_api::api_router(Arc::clone(&state.store));

  Router::new()
    .route("/checkin/{device}",         post(checkin::handler::<S>))
    .route("/checkin/{device}/results", post(results::handler::<S>))
    .route(
      "/checkin/{device}/actions/{action}/delivered",
      post(actions::delivered::<S>),
    )
    .with_state(state)
    .nest("/api", api)
    .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests;
