//! JSON admin API for Vigil.
//!
//! Exposes an axum [`Router`] backed by any [`vigil_core::store::MdmStore`]
//! for managing devices, groups, policies, deployments and assignments.
//! Auth, TLS, and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", vigil_api::api_router(store.clone()))
//! ```

pub mod devices;
pub mod error;
pub mod groups;
pub mod policies;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use vigil_core::store::MdmStore;

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: MdmStore + 'static,
{
  Router::new()
    // Devices
    .route("/devices", get(devices::list::<S>).post(devices::enroll::<S>))
    .route("/devices/{key}", get(devices::get_one::<S>).patch(devices::update::<S>))
    .route("/devices/{key}/scope", get(devices::scope::<S>))
    .route("/devices/{key}/statuses", get(devices::statuses::<S>))
    .route("/devices/{key}/actions", post(devices::queue_action::<S>))
    // Groups
    .route("/groups", get(groups::list::<S>).post(groups::create::<S>))
    .route("/groups/{key}", get(groups::get_one::<S>).delete(groups::delete::<S>))
    .route(
      "/groups/{key}/members",
      get(groups::members::<S>)
        .post(groups::add_member::<S>)
        .delete(groups::remove_member::<S>),
    )
    // Policies
    .route("/policies", get(policies::list::<S>).post(policies::create::<S>))
    .route(
      "/policies/{key}",
      get(policies::get_one::<S>)
        .patch(policies::update::<S>)
        .delete(policies::delete::<S>),
    )
    .route(
      "/policies/{key}/deployments",
      get(policies::deployments::<S>).post(policies::deploy::<S>),
    )
    .route(
      "/policies/{key}/assignments",
      get(policies::assignments::<S>)
        .post(policies::assign::<S>)
        .delete(policies::unassign::<S>),
    )
    .route("/deployments/{key}", get(policies::get_deployment::<S>))
    .with_state(store)
}
