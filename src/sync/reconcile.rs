//! Generic three-way reconciliation
//!
//! One map-diff loop serves both record shapes: build a key lookup over the
//! remote snapshot, walk the local snapshot, and hand every record to one
//! of three policy callbacks. The reconciler itself never touches a store;
//! planning is a pure function of its input snapshots.

use std::collections::HashMap;

use tracing::debug;

use crate::types::{Action, ActionKind, ActionPlan, SyncEntity};

/// The three terminal cases of a snapshot diff. Policies only append to the
/// plan; the loop owns the matching.
pub trait ReconcilePolicy<E: SyncEntity> {
    /// Both snapshots have the key.
    fn on_both(&self, local: &E, remote: &E, plan: &mut ActionPlan<E>);

    /// Only the local snapshot has the key.
    fn on_local_only(&self, local: &E, plan: &mut ActionPlan<E>);

    /// Only the remote snapshot has the key.
    fn on_remote_only(&self, remote: &E, plan: &mut ActionPlan<E>);
}

/// Diff a local snapshot against a remote snapshot.
///
/// Matching is by stable key only: a record that changed payload but kept
/// its key is always "both sides have it", never a delete-and-reinsert.
pub fn resolve<E, P>(policy: &P, local: &[E], remote: &[E]) -> ActionPlan<E>
where
    E: SyncEntity,
    P: ReconcilePolicy<E>,
{
    let mut remote_by_key: HashMap<&str, &E> =
        remote.iter().map(|record| (record.key(), record)).collect();

    let mut plan = ActionPlan::new();

    for record in local {
        match remote_by_key.remove(record.key()) {
            Some(remote_record) => policy.on_both(record, remote_record, &mut plan),
            None => policy.on_local_only(record, &mut plan),
        }
    }

    // Whatever the loop did not claim exists only remotely. Walk the
    // remote slice rather than the map so the plan order is stable.
    for record in remote {
        if remote_by_key.contains_key(record.key()) {
            policy.on_remote_only(record, &mut plan);
        }
    }

    debug!(
        local_actions = plan.local.len(),
        remote_actions = plan.remote.len(),
        "reconciliation planned"
    );

    plan
}

/// Diff the local store against the mirror snapshot, producing remote-side
/// actions only. Local is authoritative here: a read-flag divergence plans
/// a remote mark-read, and a record the mirror knows but the local store
/// no longer carries plans a remote delete.
pub fn resolve_mirror<E: SyncEntity>(local: &[E], mirror: &[E]) -> Vec<Action<E>> {
    let mut mirror_by_key: HashMap<&str, &E> =
        mirror.iter().map(|record| (record.key(), record)).collect();

    let mut actions = Vec::new();

    for record in local.iter().filter(|record| !record.is_deleted()) {
        if let Some(mirrored) = mirror_by_key.remove(record.key()) {
            if record.flag() && !mirrored.flag() {
                actions.push(Action::mark_read(record.clone()));
            }
        }
    }

    for record in mirror {
        if mirror_by_key.contains_key(record.key()) {
            actions.push(Action::delete(record.clone()));
        }
    }

    debug!(remote_actions = actions.len(), "mirror diff planned");

    actions
}

/// Simulate a batch of actions against an in-memory snapshot.
///
/// Used to refresh the mirror after a sync without another server fetch;
/// the tests also use it to check that applying a plan converges the
/// snapshots.
pub fn apply_to_snapshot<E: SyncEntity>(snapshot: &[E], actions: &[Action<E>]) -> Vec<E> {
    let mut records: Vec<E> = snapshot.to_vec();

    for action in actions {
        match action.kind {
            ActionKind::Insert => {
                if !records.iter().any(|r| r.key() == action.target.key()) {
                    records.push(action.target.clone());
                }
            }
            ActionKind::Delete => {
                records.retain(|r| r.key() != action.target.key());
            }
            // Flag and content changes replace the stored record with the
            // action's target, which already carries the desired state.
            ActionKind::MarkRead | ActionKind::FetchContent | ActionKind::DeleteContent => {
                if let Some(existing) =
                    records.iter_mut().find(|r| r.key() == action.target.key())
                {
                    *existing = action.target.clone();
                }
            }
        }
    }

    records
}
