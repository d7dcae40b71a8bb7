//! Assignment-graph queries.
//!
//! Devices, groups and policies are nodes addressed by key; assignments and
//! memberships are edge rows. Scope is a fresh join over those rows every
//! time. Assignments whose policy row is gone drop out of the join, so a
//! concurrent policy deletion reads as "not scoped".

use rusqlite::{Connection, OptionalExtension as _, params};
use vigil_core::{
  assignment::TargetKind,
  group::MemberKind,
  key::{DeviceKey, PolicyKey},
  scope::ScopedPolicySet,
};

fn policy_keys(
  conn: &Connection,
  sql: &str,
  params: impl rusqlite::Params,
) -> rusqlite::Result<Vec<PolicyKey>> {
  let mut stmt = conn.prepare_cached(sql)?;
  let rows = stmt
    .query_map(params, |row| row.get(0).map(PolicyKey))?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

/// Policies with a `device` assignment targeting `device`.
pub fn directly_scoped(conn: &Connection, device: DeviceKey) -> rusqlite::Result<Vec<PolicyKey>> {
  policy_keys(
    conn,
    "SELECT a.policy_key
     FROM policy_assignments a
     JOIN policies p ON p.policy_key = a.policy_key
     WHERE a.variant = ?1 AND a.target_key = ?2",
    params![TargetKind::Device.as_ref(), device.get()],
  )
}

/// Policies with a `group` assignment targeting any group `device` is a
/// `device` member of.
pub fn group_scoped(conn: &Connection, device: DeviceKey) -> rusqlite::Result<Vec<PolicyKey>> {
  policy_keys(
    conn,
    "SELECT DISTINCT a.policy_key
     FROM policy_assignments a
     JOIN policies      p ON p.policy_key = a.policy_key
     JOIN group_members m ON m.group_key  = a.target_key
     WHERE a.variant = ?1 AND m.variant = ?2 AND m.member_key = ?3",
    params![TargetKind::Group.as_ref(), MemberKind::Device.as_ref(), device.get()],
  )
}

pub fn scoped_policies(conn: &Connection, device: DeviceKey) -> rusqlite::Result<ScopedPolicySet> {
  let direct = directly_scoped(conn, device)?;
  let via_group = group_scoped(conn, device)?;
  Ok(ScopedPolicySet::from_parts(direct, via_group))
}

pub fn device_tenant(conn: &Connection, device: DeviceKey) -> rusqlite::Result<Option<i64>> {
  conn
    .query_row(
      "SELECT tenant_key FROM devices WHERE device_key = ?1",
      params![device.get()],
      |r| r.get(0),
    )
    .optional()
}

pub fn group_tenant(conn: &Connection, group: i64) -> rusqlite::Result<Option<i64>> {
  conn
    .query_row(
      "SELECT tenant_key FROM device_groups WHERE group_key = ?1",
      params![group],
      |r| r.get(0),
    )
    .optional()
}

pub fn policy_tenant(conn: &Connection, policy: PolicyKey) -> rusqlite::Result<Option<i64>> {
  conn
    .query_row(
      "SELECT tenant_key FROM policies WHERE policy_key = ?1",
      params![policy.get()],
      |r| r.get(0),
    )
    .optional()
}
