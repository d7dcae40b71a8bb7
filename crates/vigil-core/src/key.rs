//! Opaque integer keys for every entity.
//!
//! Nodes of the assignment graph are referenced by key, never by pointer.
//! Keys are assigned by the store in insertion order, which makes them usable
//! as a deterministic tie-breaker.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! key_type {
  ($(#[$meta:meta])* $name:ident) => {
    $(#[$meta])*
    #[derive(
      Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
      Deserialize,
    )]
    #[serde(transparent)]
    pub struct $name(pub i64);

    impl $name {
      pub fn get(self) -> i64 { self.0 }
    }

    impl From<i64> for $name {
      fn from(v: i64) -> Self { Self(v) }
    }

    impl fmt::Display for $name {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
    }
  };
}

key_type!(
  /// Owning tenant. Tenant CRUD lives outside this system.
  TenantKey
);
key_type!(DeviceKey);
key_type!(GroupKey);
key_type!(PolicyKey);
key_type!(
  /// Monotonic with insertion order.
  DeploymentKey
);
key_type!(ActionKey);
key_type!(
  /// A user directory entry; only ever seen as a group member.
  UserKey
);

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn keys_serialize_as_bare_integers() {
    let json = serde_json::to_string(&PolicyKey(42)).unwrap();
    assert_eq!(json, "42");
    let back: DeviceKey = serde_json::from_str("7").unwrap();
    assert_eq!(back, DeviceKey(7));
  }

  #[test]
  fn keys_order_by_value() {
    assert!(DeploymentKey(1) < DeploymentKey(2));
    assert_eq!(GroupKey::from(3).get(), 3);
  }
}
