//! One-off commands queued for a device.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::key::{ActionKey, DeviceKey};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeviceActionKind {
  Restart,
  Shutdown,
  Lost,
  Wipe,
  Retire,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceAction {
  pub key:         ActionKey,
  pub device:      DeviceKey,
  pub action:      DeviceActionKind,
  /// Administrator who queued the action, if known.
  pub created_by:  Option<String>,
  pub created_at:  DateTime<Utc>,
  /// `None` until the action has been sent to the device.
  pub deployed_at: Option<DateTime<Utc>>,
}

impl DeviceAction {
  pub fn is_pending(&self) -> bool { self.deployed_at.is_none() }
}
