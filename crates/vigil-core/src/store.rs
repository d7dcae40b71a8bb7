//! The `MdmStore` trait.
//!
//! Implemented by storage backends (e.g. `vigil-store-sqlite`). The admin API
//! and the check-in layer depend on this abstraction, not on any concrete
//! backend.

use std::future::Future;

use crate::{
  action::{DeviceAction, DeviceActionKind},
  assignment::{Assignment, AssignmentTarget},
  deployment::{AcknowledgedDeployment, Deployment, DeploymentResult, DeploymentStatus},
  device::{Device, DevicePatch, NewDevice},
  group::{Group, GroupMember},
  key::{ActionKey, DeploymentKey, DeviceKey, GroupKey, PolicyKey, TenantKey},
  policy::{NewPolicy, Policy, PolicyPatch},
  reconcile::CheckinSnapshot,
  scope::ScopedPolicySet,
};

/// Abstraction over a device-management store backend.
///
/// Deployments are append-only. Deployment statuses are upserted, one row per
/// (deployment, device). Every read observes the latest committed state;
/// [`checkin_snapshot`](MdmStore::checkin_snapshot) additionally guarantees
/// that all of its parts come from one consistent point.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait MdmStore: Send + Sync {
  /// Storage faults must map to [`crate::Error::StorageUnavailable`];
  /// domain errors map to themselves.
  type Error: std::error::Error + Send + Sync + 'static + Into<crate::Error>;

  // ── Devices ───────────────────────────────────────────────────────────

  /// Enroll a device. A device whose serial number is already known is
  /// updated in place and keeps its key.
  fn enroll_device(
    &self,
    input: NewDevice,
  ) -> impl Future<Output = Result<Device, Self::Error>> + Send + '_;

  fn get_device(
    &self,
    key: DeviceKey,
  ) -> impl Future<Output = Result<Option<Device>, Self::Error>> + Send + '_;

  fn find_device_by_serial<'a>(
    &'a self,
    serial_number: &'a str,
  ) -> impl Future<Output = Result<Option<Device>, Self::Error>> + Send + 'a;

  fn list_devices(
    &self,
    tenant: TenantKey,
  ) -> impl Future<Output = Result<Vec<Device>, Self::Error>> + Send + '_;

  /// Apply a field-level patch. Returns `DeviceNotFound` if absent.
  fn update_device(
    &self,
    key: DeviceKey,
    patch: DevicePatch,
  ) -> impl Future<Output = Result<Device, Self::Error>> + Send + '_;

  /// Stamp `last_synced` with the current time.
  fn touch_device(
    &self,
    key: DeviceKey,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Groups ────────────────────────────────────────────────────────────

  fn create_group(
    &self,
    tenant: TenantKey,
    name: String,
  ) -> impl Future<Output = Result<Group, Self::Error>> + Send + '_;

  fn get_group(
    &self,
    key: GroupKey,
  ) -> impl Future<Output = Result<Option<Group>, Self::Error>> + Send + '_;

  fn list_groups(
    &self,
    tenant: TenantKey,
  ) -> impl Future<Output = Result<Vec<Group>, Self::Error>> + Send + '_;

  /// Delete a group with its memberships and the assignments that target it.
  /// Returns `false` if the group did not exist.
  fn delete_group(
    &self,
    key: GroupKey,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Idempotent. Device members must belong to the group's tenant.
  fn add_group_member(
    &self,
    group: GroupKey,
    member: GroupMember,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Returns `false` if the membership did not exist.
  fn remove_group_member(
    &self,
    group: GroupKey,
    member: GroupMember,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn list_group_members(
    &self,
    group: GroupKey,
  ) -> impl Future<Output = Result<Vec<GroupMember>, Self::Error>> + Send + '_;

  // ── Policies ──────────────────────────────────────────────────────────

  fn create_policy(
    &self,
    input: NewPolicy,
  ) -> impl Future<Output = Result<Policy, Self::Error>> + Send + '_;

  fn get_policy(
    &self,
    key: PolicyKey,
  ) -> impl Future<Output = Result<Option<Policy>, Self::Error>> + Send + '_;

  fn list_policies(
    &self,
    tenant: TenantKey,
  ) -> impl Future<Output = Result<Vec<Policy>, Self::Error>> + Send + '_;

  /// Apply a field-level patch to the policy and its draft payload. Devices
  /// are unaffected until the policy is deployed again.
  fn update_policy(
    &self,
    key: PolicyKey,
    patch: PolicyPatch,
  ) -> impl Future<Output = Result<Policy, Self::Error>> + Send + '_;

  /// Delete a policy and its assignments. Its deployments and their status
  /// rows are kept, so devices holding them are told to remove them.
  fn delete_policy(
    &self,
    key: PolicyKey,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Deployments (append-only) ─────────────────────────────────────────

  /// Snapshot the policy's current draft into a new deployment stamped with
  /// the store's clock.
  fn deploy_policy(
    &self,
    key: PolicyKey,
    comment: Option<String>,
  ) -> impl Future<Output = Result<Deployment, Self::Error>> + Send + '_;

  fn get_deployment(
    &self,
    key: DeploymentKey,
  ) -> impl Future<Output = Result<Option<Deployment>, Self::Error>> + Send + '_;

  /// All deployments of a policy, newest first.
  fn list_deployments(
    &self,
    policy: PolicyKey,
  ) -> impl Future<Output = Result<Vec<Deployment>, Self::Error>> + Send + '_;

  // ── Assignments ───────────────────────────────────────────────────────

  /// Idempotent. Rejects targets of another tenant with `TenantMismatch`.
  fn assign(
    &self,
    policy: PolicyKey,
    target: AssignmentTarget,
  ) -> impl Future<Output = Result<Assignment, Self::Error>> + Send + '_;

  /// Returns `false` if the assignment did not exist.
  fn unassign(
    &self,
    policy: PolicyKey,
    target: AssignmentTarget,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn list_assignments(
    &self,
    policy: PolicyKey,
  ) -> impl Future<Output = Result<Vec<Assignment>, Self::Error>> + Send + '_;

  // ── Scope & ledger reads ──────────────────────────────────────────────

  /// Policies scoped to `device`, directly or through a group.
  fn scoped_policies(
    &self,
    device: DeviceKey,
  ) -> impl Future<Output = Result<ScopedPolicySet, Self::Error>> + Send + '_;

  /// The most recent deployment of each listed policy. Policies without
  /// deployments are omitted.
  fn latest_deployments_for<'a>(
    &'a self,
    policies: &'a [PolicyKey],
  ) -> impl Future<Output = Result<Vec<Deployment>, Self::Error>> + Send + 'a;

  /// For each listed policy, the most recent deployment `device` holds a
  /// status row for, with that result. Policies the device has never seen
  /// are omitted.
  fn last_acknowledged_deployments_for<'a>(
    &'a self,
    device: DeviceKey,
    policies: &'a [PolicyKey],
  ) -> impl Future<Output = Result<Vec<AcknowledgedDeployment>, Self::Error>> + Send + 'a;

  /// Deployments `device` holds whose policy is no longer scoped to it.
  fn deployments_requiring_removal(
    &self,
    device: DeviceKey,
  ) -> impl Future<Output = Result<Vec<AcknowledgedDeployment>, Self::Error>> + Send + '_;

  /// Scope, latest deployments, last acknowledgments, removals and pending
  /// actions, all read in one transaction. Returns `DeviceNotFound` if the
  /// device does not exist.
  fn checkin_snapshot(
    &self,
    device: DeviceKey,
  ) -> impl Future<Output = Result<CheckinSnapshot, Self::Error>> + Send + '_;

  /// Every status row of a device, newest deployment first.
  fn device_statuses(
    &self,
    device: DeviceKey,
  ) -> impl Future<Output = Result<Vec<DeploymentStatus>, Self::Error>> + Send + '_;

  // ── Status ────────────────────────────────────────────────────────────

  /// Upsert the status row for (`deployment`, `device`), overwriting any
  /// previous result for that pair only.
  ///
  /// Returns `InvalidStatusTransition` if the deployment does not exist and
  /// `DeviceNotFound` if the device does not.
  fn record_result(
    &self,
    device: DeviceKey,
    deployment: DeploymentKey,
    result: DeploymentResult,
  ) -> impl Future<Output = Result<DeploymentStatus, Self::Error>> + Send + '_;

  // ── Device actions ────────────────────────────────────────────────────

  fn queue_action(
    &self,
    device: DeviceKey,
    action: DeviceActionKind,
    created_by: Option<String>,
  ) -> impl Future<Output = Result<DeviceAction, Self::Error>> + Send + '_;

  fn get_action(
    &self,
    key: ActionKey,
  ) -> impl Future<Output = Result<Option<DeviceAction>, Self::Error>> + Send + '_;

  /// Actions of `device` that have not been delivered yet, oldest first.
  fn pending_actions(
    &self,
    device: DeviceKey,
  ) -> impl Future<Output = Result<Vec<DeviceAction>, Self::Error>> + Send + '_;

  /// Stamp `deployed_at`. An action that was already delivered keeps its
  /// original timestamp.
  fn mark_action_delivered(
    &self,
    key: ActionKey,
  ) -> impl Future<Output = Result<DeviceAction, Self::Error>> + Send + '_;
}
