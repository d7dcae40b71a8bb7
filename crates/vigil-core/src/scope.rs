//! The set of policies scoped to a device.
//!
//! Scope is the union of policies assigned directly to the device and
//! policies assigned to any group the device is a member of. It is always
//! recomputed from the current assignment graph and never cached.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::key::PolicyKey;

/// How a policy reached the device. When a policy is reachable both ways,
/// `Direct` wins (it sorts first).
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ScopeVia {
  Direct,
  Group,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopedPolicy {
  pub policy: PolicyKey,
  pub via:    ScopeVia,
}

/// Deduplicated union of directly- and group-scoped policies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopedPolicySet {
  policies: BTreeMap<PolicyKey, ScopeVia>,
}

impl ScopedPolicySet {
  pub fn from_parts(
    direct: impl IntoIterator<Item = PolicyKey>,
    via_group: impl IntoIterator<Item = PolicyKey>,
  ) -> Self {
    let mut set = Self::default();
    for p in direct {
      set.insert(p, ScopeVia::Direct);
    }
    for p in via_group {
      set.insert(p, ScopeVia::Group);
    }
    set
  }

  fn insert(&mut self, policy: PolicyKey, via: ScopeVia) {
    self
      .policies
      .entry(policy)
      .and_modify(|v| *v = (*v).min(via))
      .or_insert(via);
  }

  pub fn contains(&self, policy: PolicyKey) -> bool { self.policies.contains_key(&policy) }

  pub fn via(&self, policy: PolicyKey) -> Option<ScopeVia> { self.policies.get(&policy).copied() }

  pub fn len(&self) -> usize { self.policies.len() }

  pub fn is_empty(&self) -> bool { self.policies.is_empty() }

  /// Policy keys in ascending order.
  pub fn keys(&self) -> Vec<PolicyKey> { self.policies.keys().copied().collect() }

  pub fn entries(&self) -> Vec<ScopedPolicy> {
    self
      .policies
      .iter()
      .map(|(&policy, &via)| ScopedPolicy { policy, via })
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn keys(v: &[i64]) -> Vec<PolicyKey> { v.iter().copied().map(PolicyKey).collect() }

  #[test]
  fn union_is_exact_and_deduplicated() {
    let set = ScopedPolicySet::from_parts(keys(&[1, 2]), keys(&[2, 3, 3]));
    assert_eq!(set.keys(), keys(&[1, 2, 3]));
    assert_eq!(set.len(), 3);
  }

  #[test]
  fn direct_wins_over_group() {
    let set = ScopedPolicySet::from_parts(keys(&[2]), keys(&[2, 5]));
    assert_eq!(set.via(PolicyKey(2)), Some(ScopeVia::Direct));
    assert_eq!(set.via(PolicyKey(5)), Some(ScopeVia::Group));
    assert_eq!(set.via(PolicyKey(9)), None);
  }

  #[test]
  fn group_then_direct_still_resolves_direct() {
    let mut set = ScopedPolicySet::from_parts(keys(&[]), keys(&[4]));
    set.insert(PolicyKey(4), ScopeVia::Direct);
    assert_eq!(set.via(PolicyKey(4)), Some(ScopeVia::Direct));
  }

  #[test]
  fn empty_scope() {
    let set = ScopedPolicySet::from_parts(keys(&[]), keys(&[]));
    assert!(set.is_empty());
    assert!(!set.contains(PolicyKey(1)));
    assert!(set.entries().is_empty());
  }
}
