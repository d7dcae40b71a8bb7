//! Policy content.
//!
//! A policy's payload is parsed into the typed [`PolicyPayload`] only at the
//! edges (when an administrator writes it, or when a protocol layer encodes
//! it). Everywhere in between (the deployment ledger, the reconciler) it is
//! carried as an opaque [`RawPayload`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Windows ─────────────────────────────────────────────────────────────────

/// One configured CSP node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CspSetting {
  #[serde(default = "enabled_by_default")]
  pub enabled: bool,
  pub data:    serde_json::Value,
}

/// Windows configuration service provider settings keyed by OMA-URI path,
/// e.g. `./Device/Vendor/MSFT/Policy/Config/Camera/AllowCamera`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowsPayload {
  pub csps: BTreeMap<String, CspSetting>,
}

// ─── Apple ───────────────────────────────────────────────────────────────────

/// A single entry of a configuration profile's `PayloadContent` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppleProfilePayload {
  /// e.g. `com.apple.applicationaccess`.
  pub payload_type: String,
  pub identifier:   String,
  #[serde(default = "enabled_by_default")]
  pub enabled:      bool,
  /// Payload-specific keys, e.g. `allowCamera`.
  #[serde(default)]
  pub content:      BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplePayload {
  pub payloads: Vec<AppleProfilePayload>,
}

fn enabled_by_default() -> bool { true }

// ─── PolicyPayload ───────────────────────────────────────────────────────────

/// The typed content of a policy. The variant name is the `kind` stored
/// alongside the raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum PolicyPayload {
  Windows(WindowsPayload),
  Apple(ApplePayload),
}

impl PolicyPayload {
  /// Must match the `rename_all = "snake_case"` serde tags above.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::Windows(_) => "windows",
      Self::Apple(_) => "apple",
    }
  }

  /// An empty payload of the given kind: the draft content of a freshly
  /// created policy.
  pub fn empty(kind: &str) -> Result<Self> {
    match kind {
      "windows" => Ok(Self::Windows(WindowsPayload::default())),
      "apple" => Ok(Self::Apple(ApplePayload::default())),
      other => Err(Error::UnknownPayloadKind(other.to_owned())),
    }
  }

  pub fn to_raw(&self) -> Result<RawPayload> {
    let full = serde_json::to_value(self)?;
    Ok(RawPayload {
      kind: self.kind().to_owned(),
      data: full.get("data").cloned().unwrap_or(serde_json::Value::Null),
    })
  }
}

// ─── RawPayload ──────────────────────────────────────────────────────────────

/// Uninterpreted policy content as stored in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPayload {
  pub kind: String,
  pub data: serde_json::Value,
}

impl RawPayload {
  pub fn parse(&self) -> Result<PolicyPayload> {
    match self.kind.as_str() {
      "windows" | "apple" => {
        let wrapped = serde_json::json!({ "kind": self.kind, "data": self.data });
        Ok(serde_json::from_value(wrapped)?)
      }
      other => Err(Error::UnknownPayloadKind(other.to_owned())),
    }
  }
}

impl TryFrom<&PolicyPayload> for RawPayload {
  type Error = Error;

  fn try_from(p: &PolicyPayload) -> Result<Self> { p.to_raw() }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn camera_policy() -> PolicyPayload {
    let mut csps = BTreeMap::new();
    csps.insert(
      "./Device/Vendor/MSFT/Policy/Config/Camera/AllowCamera".to_owned(),
      CspSetting { enabled: true, data: serde_json::json!(0) },
    );
    PolicyPayload::Windows(WindowsPayload { csps })
  }

  #[test]
  fn raw_payload_strips_the_tag() {
    let raw = camera_policy().to_raw().unwrap();
    assert_eq!(raw.kind, "windows");
    assert!(raw.data.get("csps").is_some());
    assert!(raw.data.get("kind").is_none());
  }

  #[test]
  fn raw_payload_parses_back_into_its_variant() {
    let raw = camera_policy().to_raw().unwrap();
    assert_eq!(raw.parse().unwrap(), camera_policy());
  }

  #[test]
  fn unknown_kind_is_rejected() {
    let raw = RawPayload { kind: "android".into(), data: serde_json::json!({}) };
    assert!(matches!(raw.parse(), Err(Error::UnknownPayloadKind(k)) if k == "android"));
    assert!(PolicyPayload::empty("android").is_err());
  }

  #[test]
  fn apple_entries_default_to_enabled() {
    let raw = RawPayload {
      kind: "apple".into(),
      data: serde_json::json!({
        "payloads": [{
          "payload_type": "com.apple.applicationaccess",
          "identifier":   "com.example.restrictions",
          "content":      { "allowCamera": false }
        }]
      }),
    };
    let PolicyPayload::Apple(apple) = raw.parse().unwrap() else {
      panic!("expected an apple payload");
    };
    assert!(apple.payloads[0].enabled);
    assert_eq!(apple.payloads[0].content["allowCamera"], serde_json::json!(false));
  }
}
