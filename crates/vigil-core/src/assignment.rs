//! Edges of the assignment graph: policy → device or policy → group.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::key::{DeviceKey, GroupKey, PolicyKey};

/// Discriminant stored in the `variant` column of an assignment row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum TargetKind {
  Device,
  Group,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "key", rename_all = "snake_case")]
pub enum AssignmentTarget {
  Device(DeviceKey),
  Group(GroupKey),
}

impl AssignmentTarget {
  pub fn kind(&self) -> TargetKind {
    match self {
      Self::Device(_) => TargetKind::Device,
      Self::Group(_) => TargetKind::Group,
    }
  }

  pub fn raw_key(&self) -> i64 {
    match self {
      Self::Device(k) => k.get(),
      Self::Group(k) => k.get(),
    }
  }

  pub fn from_parts(kind: TargetKind, key: i64) -> Self {
    match kind {
      TargetKind::Device => Self::Device(DeviceKey(key)),
      TargetKind::Group => Self::Group(GroupKey(key)),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Assignment {
  pub policy: PolicyKey,
  pub target: AssignmentTarget,
}
