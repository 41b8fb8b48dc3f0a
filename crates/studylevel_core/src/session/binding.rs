//! Primary-view binding seen by the reconciliation engine.
//!
//! The host passes its binding into each engine call; core never keeps a
//! process-wide "current view" reference.

use crate::model::record::{ParticipantId, Record};

/// The primary view's live, in-memory record for the signed-in participant.
///
/// Mutations through `record_mut` must be visible to the view immediately;
/// `notify_stats_changed` asks it to re-render totals.
pub trait LiveBinding {
    fn record(&self) -> &Record;
    fn record_mut(&mut self) -> &mut Record;
    fn notify_stats_changed(&mut self);

    fn bound_id(&self) -> &ParticipantId {
        &self.record().id
    }
}

/// Where a participant's session gains must land.
pub enum SyncTarget<'a, 'b> {
    /// The authoritative record is the one the primary view holds.
    LiveBound(&'a mut (dyn LiveBinding + 'b)),
    /// The authoritative record must be reloaded from the store.
    Offline,
}

impl<'a, 'b> SyncTarget<'a, 'b> {
    /// Resolves the target once, by exact id match against the binding.
    pub fn resolve(id: &ParticipantId, live: Option<&'a mut (dyn LiveBinding + 'b)>) -> Self {
        match live {
            Some(binding) if binding.bound_id() == id => Self::LiveBound(binding),
            _ => Self::Offline,
        }
    }
}
