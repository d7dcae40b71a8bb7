//! Deployment-ledger queries.
//!
//! "Latest" always means greatest `done_at`, then greatest `deployment_key`
//! among equal timestamps. Status rows with a `removed` result mean the device
//! no longer holds that deployment; they are ignored by both the
//! acknowledgment and the removal lookups.

use rusqlite::{Connection, params, params_from_iter};
use vigil_core::{
  deployment::DeploymentResult,
  key::{DeviceKey, PolicyKey},
};

use crate::encode::{
  ACTION_COLUMNS, DEPLOYMENT_COLUMNS, RawAcknowledged, RawAction, RawDeployment,
};

/// `?, ?, ?` with `n` placeholders.
fn placeholders(n: usize) -> String { vec!["?"; n].join(", ") }

const LATEST_FIRST: &str = "d.done_at DESC, d.deployment_key DESC";

pub fn latest_deployments_for(
  conn: &Connection,
  policies: &[PolicyKey],
) -> rusqlite::Result<Vec<RawDeployment>> {
  if policies.is_empty() {
    return Ok(Vec::new());
  }

  let sql = format!(
    "SELECT deployment_key, policy_key, payload_kind, payload_json, comment, done_at
     FROM (
       SELECT {DEPLOYMENT_COLUMNS},
              ROW_NUMBER() OVER (PARTITION BY d.policy_key ORDER BY {LATEST_FIRST}) AS rn
       FROM policy_deployments d
       WHERE d.policy_key IN ({})
     )
     WHERE rn = 1
     ORDER BY policy_key",
    placeholders(policies.len()),
  );

  let mut stmt = conn.prepare(&sql)?;
  let rows = stmt
    .query_map(params_from_iter(policies.iter().map(|p| p.get())), RawDeployment::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

pub fn last_acknowledged_for(
  conn: &Connection,
  device: DeviceKey,
  policies: &[PolicyKey],
) -> rusqlite::Result<Vec<RawAcknowledged>> {
  if policies.is_empty() {
    return Ok(Vec::new());
  }

  let sql = format!(
    "SELECT deployment_key, policy_key, payload_kind, payload_json, comment, done_at, result
     FROM (
       SELECT {DEPLOYMENT_COLUMNS}, s.result,
              ROW_NUMBER() OVER (PARTITION BY d.policy_key ORDER BY {LATEST_FIRST}) AS rn
       FROM policy_deployments d
       JOIN deployment_statuses s
         ON s.deployment_key = d.deployment_key AND s.device_key = ?
       WHERE s.result != '{removed}'
         AND d.policy_key IN ({})
     )
     WHERE rn = 1
     ORDER BY policy_key",
    placeholders(policies.len()),
    removed = DeploymentResult::Removed.as_ref(),
  );

  let args = std::iter::once(device.get()).chain(policies.iter().map(|p| p.get()));
  let mut stmt = conn.prepare(&sql)?;
  let rows = stmt
    .query_map(params_from_iter(args), RawAcknowledged::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

/// Deployments `device` still holds whose policy is not in `scope`: a left
/// anti-join of the device's status rows against the scoped set.
pub fn requiring_removal(
  conn: &Connection,
  device: DeviceKey,
  scope: &[PolicyKey],
) -> rusqlite::Result<Vec<RawAcknowledged>> {
  let outside_scope = if scope.is_empty() {
    String::new()
  } else {
    format!("AND d.policy_key NOT IN ({})", placeholders(scope.len()))
  };

  let sql = format!(
    "SELECT {DEPLOYMENT_COLUMNS}, s.result
     FROM policy_deployments d
     JOIN deployment_statuses s
       ON s.deployment_key = d.deployment_key AND s.device_key = ?
     WHERE s.result != '{removed}'
       {outside_scope}
     ORDER BY d.policy_key, d.deployment_key",
    removed = DeploymentResult::Removed.as_ref(),
  );

  let args = std::iter::once(device.get()).chain(scope.iter().map(|p| p.get()));
  let mut stmt = conn.prepare(&sql)?;
  let rows = stmt
    .query_map(params_from_iter(args), RawAcknowledged::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

pub fn pending_actions(conn: &Connection, device: DeviceKey) -> rusqlite::Result<Vec<RawAction>> {
  let sql = format!(
    "SELECT {ACTION_COLUMNS} FROM device_actions
     WHERE device_key = ?1 AND deployed_at IS NULL
     ORDER BY action_key"
  );
  let mut stmt = conn.prepare_cached(&sql)?;
  let rows = stmt
    .query_map(params![device.get()], RawAction::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}
