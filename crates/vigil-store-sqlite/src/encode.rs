//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings so that lexical
//! order is chronological order (the ledger sorts on them). Enum
//! discriminants are the `strum` snake_case names. Payloads are split into a
//! kind column and a compact JSON column.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::Row;
use vigil_core::{
  action::DeviceAction,
  deployment::{AcknowledgedDeployment, Deployment, DeploymentStatus},
  device::Device,
  group::Group,
  key::{ActionKey, DeploymentKey, DeviceKey, GroupKey, PolicyKey, TenantKey},
  payload::RawPayload,
  policy::Policy,
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Micros, true) }

/// Truncate to the precision the columns keep, so values handed back from a
/// write compare equal to the same row read later.
pub fn stored_precision(dt: DateTime<Utc>) -> DateTime<Utc> { dt.trunc_subsecs(6) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

// ─── Discriminants ───────────────────────────────────────────────────────────

pub fn decode_enum<T: FromStr>(s: &str, what: &str) -> Result<T> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown {what}: {s:?}")))
}

// ─── Payload ─────────────────────────────────────────────────────────────────

pub fn encode_payload(p: &RawPayload) -> Result<(String, String)> {
  Ok((p.kind.clone(), serde_json::to_string(&p.data)?))
}

pub fn decode_payload(kind: String, json: &str) -> Result<RawPayload> {
  Ok(RawPayload { kind, data: serde_json::from_str(json)? })
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const DEVICE_COLUMNS: &str = "device_key, tenant_key, name, description, serial_number, \
   os, os_version, model, enrolled_at, last_synced";

/// Raw values read directly from a `devices` row.
pub struct RawDevice {
  pub device_key:    i64,
  pub tenant_key:    i64,
  pub name:          String,
  pub description:   Option<String>,
  pub serial_number: String,
  pub os:            String,
  pub os_version:    Option<String>,
  pub model:         Option<String>,
  pub enrolled_at:   String,
  pub last_synced:   Option<String>,
}

impl RawDevice {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      device_key:    row.get(0)?,
      tenant_key:    row.get(1)?,
      name:          row.get(2)?,
      description:   row.get(3)?,
      serial_number: row.get(4)?,
      os:            row.get(5)?,
      os_version:    row.get(6)?,
      model:         row.get(7)?,
      enrolled_at:   row.get(8)?,
      last_synced:   row.get(9)?,
    })
  }

  pub fn into_device(self) -> Result<Device> {
    Ok(Device {
      key:           DeviceKey(self.device_key),
      tenant:        TenantKey(self.tenant_key),
      name:          self.name,
      description:   self.description,
      serial_number: self.serial_number,
      os:            decode_enum(&self.os, "device os")?,
      os_version:    self.os_version,
      model:         self.model,
      enrolled_at:   decode_dt(&self.enrolled_at)?,
      last_synced:   decode_opt_dt(self.last_synced)?,
    })
  }
}

pub const GROUP_COLUMNS: &str = "group_key, tenant_key, name, created_at";

pub struct RawGroup {
  pub group_key:  i64,
  pub tenant_key: i64,
  pub name:       String,
  pub created_at: String,
}

impl RawGroup {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      group_key:  row.get(0)?,
      tenant_key: row.get(1)?,
      name:       row.get(2)?,
      created_at: row.get(3)?,
    })
  }

  pub fn into_group(self) -> Result<Group> {
    Ok(Group {
      key:        GroupKey(self.group_key),
      tenant:     TenantKey(self.tenant_key),
      name:       self.name,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

pub const POLICY_COLUMNS: &str =
  "policy_key, tenant_key, name, description, payload_kind, payload_json, created_at";

pub struct RawPolicy {
  pub policy_key:   i64,
  pub tenant_key:   i64,
  pub name:         String,
  pub description:  Option<String>,
  pub payload_kind: String,
  pub payload_json: String,
  pub created_at:   String,
}

impl RawPolicy {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      policy_key:   row.get(0)?,
      tenant_key:   row.get(1)?,
      name:         row.get(2)?,
      description:  row.get(3)?,
      payload_kind: row.get(4)?,
      payload_json: row.get(5)?,
      created_at:   row.get(6)?,
    })
  }

  pub fn into_policy(self) -> Result<Policy> {
    Ok(Policy {
      key:         PolicyKey(self.policy_key),
      tenant:      TenantKey(self.tenant_key),
      name:        self.name,
      description: self.description,
      payload:     decode_payload(self.payload_kind, &self.payload_json)?,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

/// Column list for `policy_deployments` aliased as `d`.
pub const DEPLOYMENT_COLUMNS: &str =
  "d.deployment_key, d.policy_key, d.payload_kind, d.payload_json, d.comment, d.done_at";

pub struct RawDeployment {
  pub deployment_key: i64,
  pub policy_key:     i64,
  pub payload_kind:   String,
  pub payload_json:   String,
  pub comment:        Option<String>,
  pub done_at:        String,
}

impl RawDeployment {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      deployment_key: row.get(0)?,
      policy_key:     row.get(1)?,
      payload_kind:   row.get(2)?,
      payload_json:   row.get(3)?,
      comment:        row.get(4)?,
      done_at:        row.get(5)?,
    })
  }

  pub fn into_deployment(self) -> Result<Deployment> {
    Ok(Deployment {
      key:     DeploymentKey(self.deployment_key),
      policy:  PolicyKey(self.policy_key),
      payload: decode_payload(self.payload_kind, &self.payload_json)?,
      comment: self.comment,
      done_at: decode_dt(&self.done_at)?,
    })
  }
}

/// A deployment row followed by the device's status `result` column.
pub struct RawAcknowledged {
  pub deployment: RawDeployment,
  pub result:     String,
}

impl RawAcknowledged {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      deployment: RawDeployment::from_row(row)?,
      result:     row.get(6)?,
    })
  }

  pub fn into_acknowledged(self) -> Result<AcknowledgedDeployment> {
    Ok(AcknowledgedDeployment {
      deployment: self.deployment.into_deployment()?,
      result:     decode_enum(&self.result, "deployment result")?,
    })
  }
}

pub const STATUS_COLUMNS: &str = "deployment_key, device_key, result, updated_at";

pub struct RawStatus {
  pub deployment_key: i64,
  pub device_key:     i64,
  pub result:         String,
  pub updated_at:     String,
}

impl RawStatus {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      deployment_key: row.get(0)?,
      device_key:     row.get(1)?,
      result:         row.get(2)?,
      updated_at:     row.get(3)?,
    })
  }

  pub fn into_status(self) -> Result<DeploymentStatus> {
    Ok(DeploymentStatus {
      deployment: DeploymentKey(self.deployment_key),
      device:     DeviceKey(self.device_key),
      result:     decode_enum(&self.result, "deployment result")?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

pub const ACTION_COLUMNS: &str =
  "action_key, device_key, action, created_by, created_at, deployed_at";

pub struct RawAction {
  pub action_key:  i64,
  pub device_key:  i64,
  pub action:      String,
  pub created_by:  Option<String>,
  pub created_at:  String,
  pub deployed_at: Option<String>,
}

impl RawAction {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      action_key:  row.get(0)?,
      device_key:  row.get(1)?,
      action:      row.get(2)?,
      created_by:  row.get(3)?,
      created_at:  row.get(4)?,
      deployed_at: row.get(5)?,
    })
  }

  pub fn into_action(self) -> Result<DeviceAction> {
    Ok(DeviceAction {
      key:         ActionKey(self.action_key),
      device:      DeviceKey(self.device_key),
      action:      decode_enum(&self.action, "device action")?,
      created_by:  self.created_by,
      created_at:  decode_dt(&self.created_at)?,
      deployed_at: decode_opt_dt(self.deployed_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn encoded_timestamps_sort_chronologically() {
    let early = DateTime::from_timestamp(100, 500_000_000).unwrap();
    let late = DateTime::from_timestamp(100, 0).unwrap() + chrono::Duration::seconds(1);
    let whole = DateTime::from_timestamp(100, 0).unwrap();

    let (a, b, c) = (encode_dt(whole), encode_dt(early), encode_dt(late));
    assert!(a < b && b < c, "{a} {b} {c}");
    assert_eq!(a.len(), b.len());
  }

  #[test]
  fn timestamps_round_trip_at_microsecond_precision() {
    let dt = DateTime::from_timestamp(1_700_000_000, 123_456_000).unwrap();
    assert_eq!(decode_dt(&encode_dt(dt)).unwrap(), dt);
  }

  #[test]
  fn unknown_discriminant_is_a_decode_error() {
    let r: Result<vigil_core::deployment::DeploymentResult> = decode_enum("maybe", "deployment result");
    assert!(matches!(r, Err(Error::Decode(_))));
  }
}
