//! Core types and trait definitions for the Vigil device-management engine.
//!
//! This crate is deliberately free of HTTP and database dependencies. It owns
//! the policy scoping rules, the check-in diff and the status-recording
//! contract; storage backends implement [`store::MdmStore`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod action;
pub mod assignment;
pub mod clock;
pub mod deployment;
pub mod device;
pub mod error;
pub mod group;
pub mod key;
pub mod patch;
pub mod payload;
pub mod policy;
pub mod reconcile;
pub mod scope;
pub mod status;
pub mod store;

pub use error::{Error, Result};
pub use reconcile::Reconciler;
pub use status::StatusRecorder;
