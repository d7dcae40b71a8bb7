//! Device-facing check-in handlers.
//!
//! A device checks in, applies and removes what it is told, then reports one
//! result per deployment it touched. Every endpoint is safe to retry.

pub mod actions;
pub mod checkin;
pub mod results;
