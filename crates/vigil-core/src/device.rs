//! Enrolled devices.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::{
  key::{DeviceKey, TenantKey},
  patch::{merge_field, nullable},
};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeviceOs {
  Windows,
  Apple,
  Android,
  Linux,
  Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
  pub key:           DeviceKey,
  pub tenant:        TenantKey,
  pub name:          String,
  pub description:   Option<String>,
  /// Unique across the store; re-enrolling the same serial updates in place.
  pub serial_number: String,
  pub os:            DeviceOs,
  pub os_version:    Option<String>,
  pub model:         Option<String>,
  pub enrolled_at:   DateTime<Utc>,
  /// Time of the last successful check-in.
  pub last_synced:   Option<DateTime<Utc>>,
}

/// Input to [`crate::store::MdmStore::enroll_device`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewDevice {
  pub tenant:        TenantKey,
  pub name:          String,
  pub serial_number: String,
  pub os:            DeviceOs,
  #[serde(default)]
  pub os_version:    Option<String>,
  #[serde(default)]
  pub model:         Option<String>,
}

impl NewDevice {
  pub fn new(
    tenant: TenantKey,
    name: impl Into<String>,
    serial_number: impl Into<String>,
    os: DeviceOs,
  ) -> Self {
    Self {
      tenant,
      name: name.into(),
      serial_number: serial_number.into(),
      os,
      os_version: None,
      model: None,
    }
  }
}

/// Partial update of the administrator-editable device fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DevicePatch {
  #[serde(default)]
  pub name:        Option<String>,
  #[serde(default, deserialize_with = "nullable")]
  pub description: Option<Option<String>>,
  #[serde(default, deserialize_with = "nullable")]
  pub os_version:  Option<Option<String>>,
  #[serde(default, deserialize_with = "nullable")]
  pub model:       Option<Option<String>>,
}

impl DevicePatch {
  pub fn merge(self, device: &mut Device) {
    merge_field(&mut device.name, self.name);
    merge_field(&mut device.description, self.description);
    merge_field(&mut device.os_version, self.os_version);
    merge_field(&mut device.model, self.model);
  }

  pub fn is_empty(&self) -> bool {
    self.name.is_none()
      && self.description.is_none()
      && self.os_version.is_none()
      && self.model.is_none()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn device() -> Device {
    Device {
      key:           DeviceKey(1),
      tenant:        TenantKey(1),
      name:          "laptop".into(),
      description:   Some("finance".into()),
      serial_number: "C02XK0".into(),
      os:            DeviceOs::Apple,
      os_version:    Some("14.2".into()),
      model:         None,
      enrolled_at:   Utc::now(),
      last_synced:   None,
    }
  }

  #[test]
  fn patch_only_touches_present_fields() {
    let mut d = device();
    let patch: DevicePatch =
      serde_json::from_str(r#"{"name":"renamed","description":null}"#).unwrap();
    patch.merge(&mut d);

    assert_eq!(d.name, "renamed");
    assert_eq!(d.description, None);
    assert_eq!(d.os_version.as_deref(), Some("14.2"));
    assert_eq!(d.serial_number, "C02XK0");
  }

  #[test]
  fn empty_patch_is_a_no_op() {
    let mut d = device();
    let patch = DevicePatch::default();
    assert!(patch.is_empty());
    patch.merge(&mut d);
    assert_eq!(d.name, "laptop");
    assert_eq!(d.description.as_deref(), Some("finance"));
  }

  #[test]
  fn os_round_trips_through_its_discriminant() {
    assert_eq!(DeviceOs::Windows.as_ref(), "windows");
    assert_eq!("apple".parse::<DeviceOs>().unwrap(), DeviceOs::Apple);
  }
}
