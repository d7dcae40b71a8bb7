//! Field-level partial updates.
//!
//! A patch carries only the fields the caller wants to change. Absent fields
//! leave the stored record untouched. Nullable fields use `Option<Option<T>>`
//! so that "absent" (`None`) and "clear" (`Some(None)`) stay distinct.

use serde::{Deserialize, Deserializer};

/// Overwrite `slot` with `value` if the patch carries one.
pub fn merge_field<T>(slot: &mut T, value: Option<T>) {
  if let Some(v) = value {
    *slot = v;
  }
}

/// Deserialise a present field (including an explicit `null`) as `Some(..)`.
/// Pair with `#[serde(default)]` so a missing field stays `None`.
pub fn nullable<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
  D: Deserializer<'de>,
  T: Deserialize<'de>,
{
  Option::<T>::deserialize(de).map(Some)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Debug, Default, Deserialize)]
  struct Probe {
    #[serde(default, deserialize_with = "nullable")]
    note: Option<Option<String>>,
  }

  #[test]
  fn merge_field_keeps_value_when_absent() {
    let mut name = "old".to_owned();
    merge_field(&mut name, None);
    assert_eq!(name, "old");
    merge_field(&mut name, Some("new".to_owned()));
    assert_eq!(name, "new");
  }

  #[test]
  fn nullable_distinguishes_missing_from_null() {
    let missing: Probe = serde_json::from_str("{}").unwrap();
    assert_eq!(missing.note, None);

    let cleared: Probe = serde_json::from_str(r#"{"note":null}"#).unwrap();
    assert_eq!(cleared.note, Some(None));

    let set: Probe = serde_json::from_str(r#"{"note":"hi"}"#).unwrap();
    assert_eq!(set.note, Some(Some("hi".to_owned())));
  }
}
