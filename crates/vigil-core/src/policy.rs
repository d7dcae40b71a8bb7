//! Policies: administrator-authored configuration with a mutable draft.
//!
//! Editing a policy only changes its draft payload. Devices see nothing until
//! the policy is deployed, which snapshots the draft into an immutable
//! [`Deployment`](crate::deployment::Deployment).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Result,
  key::{PolicyKey, TenantKey},
  patch::{merge_field, nullable},
  payload::{PolicyPayload, RawPayload},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
  pub key:         PolicyKey,
  pub tenant:      TenantKey,
  pub name:        String,
  pub description: Option<String>,
  /// Draft content; published by deploying.
  pub payload:     RawPayload,
  pub created_at:  DateTime<Utc>,
}

/// Input to [`crate::store::MdmStore::create_policy`].
#[derive(Debug, Clone)]
pub struct NewPolicy {
  pub tenant:      TenantKey,
  pub name:        String,
  pub description: Option<String>,
  pub payload:     RawPayload,
}

impl NewPolicy {
  pub fn new(tenant: TenantKey, name: impl Into<String>, payload: &PolicyPayload) -> Result<Self> {
    Ok(Self {
      tenant,
      name: name.into(),
      description: None,
      payload: payload.to_raw()?,
    })
  }
}

/// Partial update of a policy. The payload, when present, replaces the draft
/// wholesale.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolicyPatch {
  #[serde(default)]
  pub name:        Option<String>,
  #[serde(default, deserialize_with = "nullable")]
  pub description: Option<Option<String>>,
  #[serde(default)]
  pub payload:     Option<PolicyPayload>,
}

impl PolicyPatch {
  pub fn merge(self, policy: &mut Policy) -> Result<()> {
    let payload = self.payload.as_ref().map(PolicyPayload::to_raw).transpose()?;
    merge_field(&mut policy.name, self.name);
    merge_field(&mut policy.description, self.description);
    merge_field(&mut policy.payload, payload);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::payload::{ApplePayload, WindowsPayload};

  fn policy() -> Policy {
    Policy {
      key:         PolicyKey(1),
      tenant:      TenantKey(1),
      name:        "Camera".into(),
      description: Some("block the camera".into()),
      payload:     PolicyPayload::Windows(WindowsPayload::default()).to_raw().unwrap(),
      created_at:  Utc::now(),
    }
  }

  #[test]
  fn patch_replaces_payload_and_keeps_description() {
    let mut p = policy();
    PolicyPatch {
      payload: Some(PolicyPayload::Apple(ApplePayload::default())),
      ..Default::default()
    }
    .merge(&mut p)
    .unwrap();

    assert_eq!(p.payload.kind, "apple");
    assert_eq!(p.name, "Camera");
    assert_eq!(p.description.as_deref(), Some("block the camera"));
  }

  #[test]
  fn patch_can_clear_description() {
    let mut p = policy();
    let patch: PolicyPatch = serde_json::from_str(r#"{"description":null}"#).unwrap();
    patch.merge(&mut p).unwrap();
    assert_eq!(p.description, None);
    assert_eq!(p.payload.kind, "windows");
  }
}
