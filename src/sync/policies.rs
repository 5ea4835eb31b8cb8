//! Reconciliation policies for the two record shapes
//!
//! Voicemails and greetings share the diff loop; what differs is what each
//! terminal case means. For voicemails the server is authoritative: a
//! record the server dropped gets dropped locally. A greeting that exists
//! only locally is a fresh recording and uploads instead.

use crate::types::{Action, ActionKind, ActionPlan, GreetingRecord, SyncEntity, VoicemailRecord};

use super::reconcile::ReconcilePolicy;

/// Default full-sync policy for voicemail records.
pub struct VoicemailPolicy;

impl ReconcilePolicy<VoicemailRecord> for VoicemailPolicy {
    fn on_both(
        &self,
        local: &VoicemailRecord,
        remote: &VoicemailRecord,
        plan: &mut ActionPlan<VoicemailRecord>,
    ) {
        // Read beats unread; propagate to whichever side is stale.
        if remote.read && !local.read {
            let mut updated = local.clone();
            updated.read = true;
            plan.local.push(Action::mark_read(updated));
        } else if local.read && !remote.read {
            plan.remote.push(Action::mark_read(remote.clone()));
        }

        if !local.has_content() && remote.has_content() {
            plan.local.push(Action::fetch_content(local.clone()));
        }
    }

    fn on_local_only(&self, local: &VoicemailRecord, plan: &mut ActionPlan<VoicemailRecord>) {
        // The server no longer has this message; the local copy goes too.
        plan.local.push(Action::delete(local.clone()));
    }

    fn on_remote_only(&self, remote: &VoicemailRecord, plan: &mut ActionPlan<VoicemailRecord>) {
        plan.local.push(Action::insert(remote.clone()));
        plan.local.push(Action::fetch_content(remote.clone()));
    }
}

/// Full-sync policy for greeting records.
///
/// Same diff, two differences: the activation flag reconciles with the
/// server as authority (the TUI knows which greeting it plays), and a
/// local-only greeting is a new recording to upload.
pub struct GreetingPolicy;

impl ReconcilePolicy<GreetingRecord> for GreetingPolicy {
    fn on_both(
        &self,
        local: &GreetingRecord,
        remote: &GreetingRecord,
        plan: &mut ActionPlan<GreetingRecord>,
    ) {
        if local.active != remote.active {
            let mut updated = local.clone();
            updated.active = remote.active;
            plan.local.push(Action::mark_read(updated));
        }

        if !local.has_content() && remote.has_content() {
            plan.local.push(Action::fetch_content(local.clone()));
        } else if local.has_content() && !remote.has_content() {
            // The server-side recording was replaced; the cached payload
            // is stale.
            plan.local
                .push(Action::new(ActionKind::DeleteContent, local.clone()));
        }
    }

    fn on_local_only(&self, local: &GreetingRecord, plan: &mut ActionPlan<GreetingRecord>) {
        plan.remote.push(Action::insert(local.clone()));
    }

    fn on_remote_only(&self, remote: &GreetingRecord, plan: &mut ActionPlan<GreetingRecord>) {
        plan.local.push(Action::insert(remote.clone()));
        plan.local.push(Action::fetch_content(remote.clone()));
    }
}
