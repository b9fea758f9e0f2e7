use civic_types::{Actor, ComplaintId, ComplaintStatus, UserId};

/// A transition the store has accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedTransition {
    pub complaint_id: ComplaintId,
    pub from: ComplaintStatus,
    pub to: ComplaintStatus,
    pub actor: Actor,
    pub assigned_employee: Option<UserId>,
}

/// Synchronous hook run after every committed transition, while the
/// complaint is still locked. Observers see each complaint's transitions
/// in commit order and must not block.
pub trait TransitionObserver: Send + Sync {
    fn on_commit(&self, transition: &CommittedTransition);
}
