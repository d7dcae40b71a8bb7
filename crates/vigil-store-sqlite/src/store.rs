//! [`SqliteStore`]: the SQLite implementation of [`MdmStore`].

use std::{path::Path, sync::Arc};

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, TransactionBehavior, params};
use tracing::debug;

use vigil_core::{
  Error as CoreError,
  action::{DeviceAction, DeviceActionKind},
  assignment::{Assignment, AssignmentTarget, TargetKind},
  clock::{Clock, SystemClock},
  deployment::{AcknowledgedDeployment, Deployment, DeploymentResult, DeploymentStatus},
  device::{Device, DevicePatch, NewDevice},
  group::{Group, GroupMember, MemberKind},
  key::{ActionKey, DeploymentKey, DeviceKey, GroupKey, PolicyKey, TenantKey},
  policy::{NewPolicy, Policy, PolicyPatch},
  reconcile::CheckinSnapshot,
  scope::ScopedPolicySet,
  store::MdmStore,
};

use crate::{
  Result,
  encode::{
    ACTION_COLUMNS, DEVICE_COLUMNS, GROUP_COLUMNS, POLICY_COLUMNS, RawAcknowledged, RawAction,
    RawDeployment, RawDevice, RawGroup, RawPolicy, RawStatus, STATUS_COLUMNS, decode_enum,
    encode_dt, encode_payload, stored_precision,
  },
  error::reject,
  graph, ledger,
  schema::SCHEMA,
};

const DEPLOYMENT_RETURNING: &str =
  "deployment_key, policy_key, payload_kind, payload_json, comment, done_at";

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Vigil store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. All access
/// goes through one connection thread, so each `call` closure runs in
/// isolation; multi-statement operations additionally run in a transaction.
#[derive(Clone)]
pub struct SqliteStore {
  conn:  tokio_rusqlite::Connection,
  clock: Arc<dyn Clock>,
}

/// Raw rows of a check-in snapshot, decoded after leaving the connection
/// thread.
struct RawSnapshot {
  scope:             ScopedPolicySet,
  latest:            Vec<RawDeployment>,
  last_acknowledged: Vec<RawAcknowledged>,
  requiring_removal: Vec<RawAcknowledged>,
  pending_actions:   Vec<RawAction>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with_clock(path, Arc::new(SystemClock)).await
  }

  pub async fn open_with_clock(path: impl AsRef<Path>, clock: Arc<dyn Clock>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, clock };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    Self::open_in_memory_with_clock(Arc::new(SystemClock)).await
  }

  pub async fn open_in_memory_with_clock(clock: Arc<dyn Clock>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, clock };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  fn now(&self) -> DateTime<Utc> { stored_precision(self.clock.now()) }
}

// ─── MdmStore impl ───────────────────────────────────────────────────────────

impl MdmStore for SqliteStore {
  type Error = crate::Error;

  // ── Devices ───────────────────────────────────────────────────────────────

  async fn enroll_device(&self, input: NewDevice) -> Result<Device> {
    let tenant      = input.tenant.get();
    let os          = input.os.as_ref().to_owned();
    let enrolled_at = encode_dt(self.now());

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let previous: Option<(i64, i64)> = tx
          .query_row(
            "SELECT device_key, tenant_key FROM devices WHERE serial_number = ?1",
            params![input.serial_number],
            |r| Ok((r.get(0)?, r.get(1)?)),
          )
          .optional()?;

        // Re-enrolled into another tenant: edges from the old tenant go.
        if let Some((key, old_tenant)) = previous
          && old_tenant != tenant
        {
          tx.execute(
            "DELETE FROM policy_assignments WHERE variant = ?1 AND target_key = ?2",
            params![TargetKind::Device.as_ref(), key],
          )?;
          tx.execute(
            "DELETE FROM group_members WHERE variant = ?1 AND member_key = ?2",
            params![MemberKind::Device.as_ref(), key],
          )?;
        }

        let raw = tx.query_row(
          &format!(
            "INSERT INTO devices (
               tenant_key, name, serial_number, os, os_version, model, enrolled_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT (serial_number) DO UPDATE SET
               tenant_key = excluded.tenant_key,
               name       = excluded.name,
               os         = excluded.os,
               os_version = excluded.os_version,
               model      = excluded.model
             RETURNING {DEVICE_COLUMNS}"
          ),
          params![
            tenant,
            input.name,
            input.serial_number,
            os,
            input.os_version,
            input.model,
            enrolled_at,
          ],
          RawDevice::from_row,
        )?;

        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.into_device()
  }

  async fn get_device(&self, key: DeviceKey) -> Result<Option<Device>> {
    let raw: Option<RawDevice> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE device_key = ?1"),
              params![key.get()],
              RawDevice::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawDevice::into_device).transpose()
  }

  async fn find_device_by_serial<'a>(&'a self, serial_number: &'a str) -> Result<Option<Device>> {
    let serial = serial_number.to_owned();

    let raw: Option<RawDevice> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE serial_number = ?1"),
              params![serial],
              RawDevice::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawDevice::into_device).transpose()
  }

  async fn list_devices(&self, tenant: TenantKey) -> Result<Vec<Device>> {
    let raws: Vec<RawDevice> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {DEVICE_COLUMNS} FROM devices WHERE tenant_key = ?1 ORDER BY device_key"
        ))?;
        let rows = stmt
          .query_map(params![tenant.get()], RawDevice::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDevice::into_device).collect()
  }

  async fn update_device(&self, key: DeviceKey, patch: DevicePatch) -> Result<Device> {
    let device = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let Some(raw) = tx
          .query_row(
            &format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE device_key = ?1"),
            params![key.get()],
            RawDevice::from_row,
          )
          .optional()?
        else {
          return Err(reject(CoreError::DeviceNotFound(key)));
        };

        let mut device = raw.into_device()?;
        patch.merge(&mut device);

        tx.execute(
          "UPDATE devices
           SET name = ?2, description = ?3, os_version = ?4, model = ?5
           WHERE device_key = ?1",
          params![
            key.get(),
            device.name,
            device.description,
            device.os_version,
            device.model,
          ],
        )?;

        tx.commit()?;
        Ok(device)
      })
      .await?;

    Ok(device)
  }

  async fn touch_device(&self, key: DeviceKey) -> Result<()> {
    let at = encode_dt(self.now());

    let updated = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE devices SET last_synced = ?2 WHERE device_key = ?1",
          params![key.get(), at],
        )?)
      })
      .await?;

    if updated == 0 {
      return Err(CoreError::DeviceNotFound(key).into());
    }
    Ok(())
  }

  // ── Groups ────────────────────────────────────────────────────────────────

  async fn create_group(&self, tenant: TenantKey, name: String) -> Result<Group> {
    let created_at = encode_dt(self.now());

    let raw = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          &format!(
            "INSERT INTO device_groups (tenant_key, name, created_at) VALUES (?1, ?2, ?3)
             RETURNING {GROUP_COLUMNS}"
          ),
          params![tenant.get(), name, created_at],
          RawGroup::from_row,
        )?)
      })
      .await?;

    raw.into_group()
  }

  async fn get_group(&self, key: GroupKey) -> Result<Option<Group>> {
    let raw: Option<RawGroup> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {GROUP_COLUMNS} FROM device_groups WHERE group_key = ?1"),
              params![key.get()],
              RawGroup::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawGroup::into_group).transpose()
  }

  async fn list_groups(&self, tenant: TenantKey) -> Result<Vec<Group>> {
    let raws: Vec<RawGroup> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {GROUP_COLUMNS} FROM device_groups WHERE tenant_key = ?1 ORDER BY group_key"
        ))?;
        let rows = stmt
          .query_map(params![tenant.get()], RawGroup::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawGroup::into_group).collect()
  }

  async fn delete_group(&self, key: GroupKey) -> Result<bool> {
    let deleted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "DELETE FROM policy_assignments WHERE variant = ?1 AND target_key = ?2",
          params![TargetKind::Group.as_ref(), key.get()],
        )?;
        // Memberships go with the group via ON DELETE CASCADE.
        let n = tx.execute("DELETE FROM device_groups WHERE group_key = ?1", params![key.get()])?;
        tx.commit()?;
        Ok(n > 0)
      })
      .await?;

    Ok(deleted)
  }

  async fn add_group_member(&self, group: GroupKey, member: GroupMember) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let Some(group_tenant) = graph::group_tenant(&tx, group.get())? else {
          return Err(reject(CoreError::GroupNotFound(group)));
        };

        if let GroupMember::Device(device) = member {
          let Some(device_tenant) = graph::device_tenant(&tx, device)? else {
            return Err(reject(CoreError::DeviceNotFound(device)));
          };
          if device_tenant != group_tenant {
            return Err(reject(CoreError::TenantMismatch {
              expected: TenantKey(group_tenant),
              found:    TenantKey(device_tenant),
            }));
          }
        }

        tx.execute(
          "INSERT OR IGNORE INTO group_members (group_key, variant, member_key)
           VALUES (?1, ?2, ?3)",
          params![group.get(), member.kind().as_ref(), member.raw_key()],
        )?;

        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(())
  }

  async fn remove_group_member(&self, group: GroupKey, member: GroupMember) -> Result<bool> {
    let removed = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "DELETE FROM group_members WHERE group_key = ?1 AND variant = ?2 AND member_key = ?3",
          params![group.get(), member.kind().as_ref(), member.raw_key()],
        )?;
        Ok(n > 0)
      })
      .await?;

    Ok(removed)
  }

  async fn list_group_members(&self, group: GroupKey) -> Result<Vec<GroupMember>> {
    let raws: Vec<(String, i64)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT variant, member_key FROM group_members
           WHERE group_key = ?1
           ORDER BY variant, member_key",
        )?;
        let rows = stmt
          .query_map(params![group.get()], |r| Ok((r.get(0)?, r.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(variant, key)| -> Result<GroupMember> {
        let kind: MemberKind = decode_enum(&variant, "member kind")?;
        Ok(GroupMember::from_parts(kind, key))
      })
      .collect()
  }

  // ── Policies ──────────────────────────────────────────────────────────────

  async fn create_policy(&self, input: NewPolicy) -> Result<Policy> {
    let (kind, json) = encode_payload(&input.payload)?;
    let created_at   = encode_dt(self.now());

    let raw = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          &format!(
            "INSERT INTO policies (
               tenant_key, name, description, payload_kind, payload_json, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             RETURNING {POLICY_COLUMNS}"
          ),
          params![
            input.tenant.get(),
            input.name,
            input.description,
            kind,
            json,
            created_at,
          ],
          RawPolicy::from_row,
        )?)
      })
      .await?;

    raw.into_policy()
  }

  async fn get_policy(&self, key: PolicyKey) -> Result<Option<Policy>> {
    let raw: Option<RawPolicy> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {POLICY_COLUMNS} FROM policies WHERE policy_key = ?1"),
              params![key.get()],
              RawPolicy::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawPolicy::into_policy).transpose()
  }

  async fn list_policies(&self, tenant: TenantKey) -> Result<Vec<Policy>> {
    let raws: Vec<RawPolicy> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {POLICY_COLUMNS} FROM policies WHERE tenant_key = ?1 ORDER BY policy_key"
        ))?;
        let rows = stmt
          .query_map(params![tenant.get()], RawPolicy::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPolicy::into_policy).collect()
  }

  async fn update_policy(&self, key: PolicyKey, patch: PolicyPatch) -> Result<Policy> {
    let policy = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let Some(raw) = tx
          .query_row(
            &format!("SELECT {POLICY_COLUMNS} FROM policies WHERE policy_key = ?1"),
            params![key.get()],
            RawPolicy::from_row,
          )
          .optional()?
        else {
          return Err(reject(CoreError::PolicyNotFound(key)));
        };

        let mut policy = raw.into_policy()?;
        patch.merge(&mut policy).map_err(reject)?;
        let (kind, json) = encode_payload(&policy.payload)?;

        tx.execute(
          "UPDATE policies
           SET name = ?2, description = ?3, payload_kind = ?4, payload_json = ?5
           WHERE policy_key = ?1",
          params![key.get(), policy.name, policy.description, kind, json],
        )?;

        tx.commit()?;
        Ok(policy)
      })
      .await?;

    Ok(policy)
  }

  async fn delete_policy(&self, key: PolicyKey) -> Result<bool> {
    // Assignments go via ON DELETE CASCADE; deployments and statuses stay.
    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM policies WHERE policy_key = ?1", params![key.get()])? > 0)
      })
      .await?;

    if deleted {
      debug!(policy = %key, "policy deleted");
    }
    Ok(deleted)
  }

  // ── Deployments (append-only) ─────────────────────────────────────────────

  async fn deploy_policy(&self, key: PolicyKey, comment: Option<String>) -> Result<Deployment> {
    let done_at = encode_dt(self.now());

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let Some((kind, json)): Option<(String, String)> = tx
          .query_row(
            "SELECT payload_kind, payload_json FROM policies WHERE policy_key = ?1",
            params![key.get()],
            |r| Ok((r.get(0)?, r.get(1)?)),
          )
          .optional()?
        else {
          return Err(reject(CoreError::PolicyNotFound(key)));
        };

        let raw = tx.query_row(
          &format!(
            "INSERT INTO policy_deployments (
               policy_key, payload_kind, payload_json, comment, done_at
             ) VALUES (?1, ?2, ?3, ?4, ?5)
             RETURNING {DEPLOYMENT_RETURNING}"
          ),
          params![key.get(), kind, json, comment, done_at],
          RawDeployment::from_row,
        )?;

        tx.commit()?;
        Ok(raw)
      })
      .await?;

    let deployment = raw.into_deployment()?;
    debug!(policy = %key, deployment = %deployment.key, "policy deployed");
    Ok(deployment)
  }

  async fn get_deployment(&self, key: DeploymentKey) -> Result<Option<Deployment>> {
    let raw: Option<RawDeployment> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {DEPLOYMENT_RETURNING} FROM policy_deployments WHERE deployment_key = ?1"
              ),
              params![key.get()],
              RawDeployment::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawDeployment::into_deployment).transpose()
  }

  async fn list_deployments(&self, policy: PolicyKey) -> Result<Vec<Deployment>> {
    let raws: Vec<RawDeployment> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {DEPLOYMENT_RETURNING} FROM policy_deployments
           WHERE policy_key = ?1
           ORDER BY done_at DESC, deployment_key DESC"
        ))?;
        let rows = stmt
          .query_map(params![policy.get()], RawDeployment::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDeployment::into_deployment).collect()
  }

  // ── Assignments ───────────────────────────────────────────────────────────

  async fn assign(&self, policy: PolicyKey, target: AssignmentTarget) -> Result<Assignment> {
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let Some(policy_tenant) = graph::policy_tenant(&tx, policy)? else {
          return Err(reject(CoreError::PolicyNotFound(policy)));
        };

        let target_tenant = match target {
          AssignmentTarget::Device(device) => graph::device_tenant(&tx, device)?
            .ok_or_else(|| reject(CoreError::DeviceNotFound(device)))?,
          AssignmentTarget::Group(group) => graph::group_tenant(&tx, group.get())?
            .ok_or_else(|| reject(CoreError::GroupNotFound(group)))?,
        };

        if target_tenant != policy_tenant {
          return Err(reject(CoreError::TenantMismatch {
            expected: TenantKey(policy_tenant),
            found:    TenantKey(target_tenant),
          }));
        }

        tx.execute(
          "INSERT OR IGNORE INTO policy_assignments (policy_key, variant, target_key)
           VALUES (?1, ?2, ?3)",
          params![policy.get(), target.kind().as_ref(), target.raw_key()],
        )?;

        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(Assignment { policy, target })
  }

  async fn unassign(&self, policy: PolicyKey, target: AssignmentTarget) -> Result<bool> {
    let removed = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "DELETE FROM policy_assignments
           WHERE policy_key = ?1 AND variant = ?2 AND target_key = ?3",
          params![policy.get(), target.kind().as_ref(), target.raw_key()],
        )?;
        Ok(n > 0)
      })
      .await?;

    Ok(removed)
  }

  async fn list_assignments(&self, policy: PolicyKey) -> Result<Vec<Assignment>> {
    let raws: Vec<(String, i64)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT variant, target_key FROM policy_assignments
           WHERE policy_key = ?1
           ORDER BY variant, target_key",
        )?;
        let rows = stmt
          .query_map(params![policy.get()], |r| Ok((r.get(0)?, r.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(variant, key)| -> Result<Assignment> {
        let kind: TargetKind = decode_enum(&variant, "assignment target")?;
        Ok(Assignment { policy, target: AssignmentTarget::from_parts(kind, key) })
      })
      .collect()
  }

  // ── Scope & ledger reads ──────────────────────────────────────────────────

  async fn scoped_policies(&self, device: DeviceKey) -> Result<ScopedPolicySet> {
    let scope = self
      .conn
      .call(move |conn| Ok(graph::scoped_policies(conn, device)?))
      .await?;
    Ok(scope)
  }

  async fn latest_deployments_for<'a>(&'a self, policies: &'a [PolicyKey]) -> Result<Vec<Deployment>> {
    let policies = policies.to_vec();

    let raws = self
      .conn
      .call(move |conn| Ok(ledger::latest_deployments_for(conn, &policies)?))
      .await?;

    raws.into_iter().map(RawDeployment::into_deployment).collect()
  }

  async fn last_acknowledged_deployments_for<'a>(
    &'a self,
    device: DeviceKey,
    policies: &'a [PolicyKey],
  ) -> Result<Vec<AcknowledgedDeployment>> {
    let policies = policies.to_vec();

    let raws = self
      .conn
      .call(move |conn| Ok(ledger::last_acknowledged_for(conn, device, &policies)?))
      .await?;

    raws.into_iter().map(RawAcknowledged::into_acknowledged).collect()
  }

  async fn deployments_requiring_removal(
    &self,
    device: DeviceKey,
  ) -> Result<Vec<AcknowledgedDeployment>> {
    let raws = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
        let scope = graph::scoped_policies(&tx, device)?;
        let rows = ledger::requiring_removal(&tx, device, &scope.keys())?;
        tx.commit()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAcknowledged::into_acknowledged).collect()
  }

  async fn checkin_snapshot(&self, device: DeviceKey) -> Result<CheckinSnapshot> {
    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;

        if graph::device_tenant(&tx, device)?.is_none() {
          return Err(reject(CoreError::DeviceNotFound(device)));
        }

        // Scope is computed once and shared by the apply and remove paths.
        let scope = graph::scoped_policies(&tx, device)?;
        let keys = scope.keys();

        let snapshot = RawSnapshot {
          latest:            ledger::latest_deployments_for(&tx, &keys)?,
          last_acknowledged: ledger::last_acknowledged_for(&tx, device, &keys)?,
          requiring_removal: ledger::requiring_removal(&tx, device, &keys)?,
          pending_actions:   ledger::pending_actions(&tx, device)?,
          scope,
        };

        tx.commit()?;
        Ok(snapshot)
      })
      .await?;

    Ok(CheckinSnapshot {
      device,
      scope:             raw.scope,
      latest:            raw
        .latest
        .into_iter()
        .map(RawDeployment::into_deployment)
        .collect::<Result<_>>()?,
      last_acknowledged: raw
        .last_acknowledged
        .into_iter()
        .map(RawAcknowledged::into_acknowledged)
        .collect::<Result<_>>()?,
      requiring_removal: raw
        .requiring_removal
        .into_iter()
        .map(RawAcknowledged::into_acknowledged)
        .collect::<Result<_>>()?,
      pending_actions:   raw
        .pending_actions
        .into_iter()
        .map(RawAction::into_action)
        .collect::<Result<_>>()?,
    })
  }

  async fn device_statuses(&self, device: DeviceKey) -> Result<Vec<DeploymentStatus>> {
    let raws: Vec<RawStatus> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {STATUS_COLUMNS} FROM deployment_statuses
           WHERE device_key = ?1
           ORDER BY deployment_key DESC"
        ))?;
        let rows = stmt
          .query_map(params![device.get()], RawStatus::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawStatus::into_status).collect()
  }

  // ── Status ────────────────────────────────────────────────────────────────

  async fn record_result(
    &self,
    device: DeviceKey,
    deployment: DeploymentKey,
    result: DeploymentResult,
  ) -> Result<DeploymentStatus> {
    let updated_at = encode_dt(self.now());
    let result_str = result.as_ref().to_owned();

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        if graph::device_tenant(&tx, device)?.is_none() {
          return Err(reject(CoreError::DeviceNotFound(device)));
        }

        let deployment_exists = tx
          .query_row(
            "SELECT 1 FROM policy_deployments WHERE deployment_key = ?1",
            params![deployment.get()],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if !deployment_exists {
          return Err(reject(CoreError::InvalidStatusTransition { device, deployment }));
        }

        let raw = tx.query_row(
          &format!(
            "INSERT INTO deployment_statuses (deployment_key, device_key, result, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (deployment_key, device_key) DO UPDATE SET
               result     = excluded.result,
               updated_at = excluded.updated_at
             RETURNING {STATUS_COLUMNS}"
          ),
          params![deployment.get(), device.get(), result_str, updated_at],
          RawStatus::from_row,
        )?;

        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.into_status()
  }

  // ── Device actions ────────────────────────────────────────────────────────

  async fn queue_action(
    &self,
    device: DeviceKey,
    action: DeviceActionKind,
    created_by: Option<String>,
  ) -> Result<DeviceAction> {
    let created_at = encode_dt(self.now());
    let action_str = action.as_ref().to_owned();

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        if graph::device_tenant(&tx, device)?.is_none() {
          return Err(reject(CoreError::DeviceNotFound(device)));
        }

        let raw = tx.query_row(
          &format!(
            "INSERT INTO device_actions (device_key, action, created_by, created_at)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING {ACTION_COLUMNS}"
          ),
          params![device.get(), action_str, created_by, created_at],
          RawAction::from_row,
        )?;

        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.into_action()
  }

  async fn get_action(&self, key: ActionKey) -> Result<Option<DeviceAction>> {
    let raw: Option<RawAction> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {ACTION_COLUMNS} FROM device_actions WHERE action_key = ?1"),
              params![key.get()],
              RawAction::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawAction::into_action).transpose()
  }

  async fn pending_actions(&self, device: DeviceKey) -> Result<Vec<DeviceAction>> {
    let raws = self
      .conn
      .call(move |conn| Ok(ledger::pending_actions(conn, device)?))
      .await?;

    raws.into_iter().map(RawAction::into_action).collect()
  }

  async fn mark_action_delivered(&self, key: ActionKey) -> Result<DeviceAction> {
    let at = encode_dt(self.now());

    let raw: Option<RawAction> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "UPDATE device_actions SET deployed_at = COALESCE(deployed_at, ?2)
                 WHERE action_key = ?1
                 RETURNING {ACTION_COLUMNS}"
              ),
              params![key.get(), at],
              RawAction::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    match raw {
      Some(raw) => raw.into_action(),
      None => Err(CoreError::ActionNotFound(key).into()),
    }
  }
}
