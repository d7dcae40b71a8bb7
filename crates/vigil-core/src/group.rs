//! Groups and their membership.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::key::{DeviceKey, GroupKey, TenantKey, UserKey};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
  pub key:        GroupKey,
  pub tenant:     TenantKey,
  pub name:       String,
  pub created_at: DateTime<Utc>,
}

/// Discriminant stored in the `variant` column of a membership row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum MemberKind {
  Device,
  User,
}

/// A member of a group. Only `Device` members contribute to policy scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "key", rename_all = "snake_case")]
pub enum GroupMember {
  Device(DeviceKey),
  User(UserKey),
}

impl GroupMember {
  pub fn kind(&self) -> MemberKind {
    match self {
      Self::Device(_) => MemberKind::Device,
      Self::User(_) => MemberKind::User,
    }
  }

  pub fn raw_key(&self) -> i64 {
    match self {
      Self::Device(k) => k.get(),
      Self::User(k) => k.get(),
    }
  }

  pub fn from_parts(kind: MemberKind, key: i64) -> Self {
    match kind {
      MemberKind::Device => Self::Device(DeviceKey(key)),
      MemberKind::User => Self::User(UserKey(key)),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn member_json_is_tagged() {
    let json = serde_json::to_value(GroupMember::Device(DeviceKey(9))).unwrap();
    assert_eq!(json, serde_json::json!({ "kind": "device", "key": 9 }));
  }

  #[test]
  fn member_parts_round_trip() {
    let m = GroupMember::User(UserKey(4));
    assert_eq!(GroupMember::from_parts(m.kind(), m.raw_key()), m);
    assert_eq!(m.kind().as_ref(), "user");
  }
}
