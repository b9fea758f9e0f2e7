use crate::{NotificationEmitter, NotifyError};
use async_trait::async_trait;
use civic_types::{NotificationEvent, NotificationId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::RwLock;

/// Entries kept per user unless configured otherwise.
pub const DEFAULT_INBOX_CAPACITY: usize = 500;

/// An inbox entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(flatten)]
    pub event: NotificationEvent,
    pub read: bool,
}

/// One user's entries in arrival order, plus the ids they hold.
#[derive(Default)]
struct Inbox {
    entries: VecDeque<Notification>,
    ids: HashSet<NotificationId>,
}

/// Per-user in-process notification inbox.
///
/// Redelivered events carry the id of the original and are dropped. Each
/// inbox holds at most `capacity` entries; the oldest arrival is evicted
/// first, after which a redelivery of it would be accepted again.
pub struct InboxEmitter {
    inboxes: RwLock<HashMap<UserId, Inbox>>,
    capacity: usize,
}

impl Default for InboxEmitter {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_INBOX_CAPACITY)
    }
}

impl InboxEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inboxes: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Notifications for `user`, newest first.
    pub fn list(&self, user: &UserId, unread_only: bool) -> Result<Vec<Notification>, NotifyError> {
        let guard = self
            .inboxes
            .read()
            .map_err(|_| NotifyError::Backend("inbox lock poisoned".to_string()))?;
        let mut entries = guard
            .get(user)
            .map(|inbox| {
                inbox
                    .entries
                    .iter()
                    .filter(|entry| !unread_only || !entry.read)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        entries.sort_by(|a, b| b.event.timestamp.cmp(&a.event.timestamp));
        Ok(entries)
    }

    pub fn unread_count(&self, user: &UserId) -> Result<usize, NotifyError> {
        let guard = self
            .inboxes
            .read()
            .map_err(|_| NotifyError::Backend("inbox lock poisoned".to_string()))?;
        Ok(guard
            .get(user)
            .map_or(0, |inbox| inbox.entries.iter().filter(|entry| !entry.read).count()))
    }

    /// Mark one of `user`'s notifications read.
    pub fn mark_read(&self, user: &UserId, id: &NotificationId) -> Result<Notification, NotifyError> {
        let mut guard = self
            .inboxes
            .write()
            .map_err(|_| NotifyError::Backend("inbox lock poisoned".to_string()))?;
        let entry = guard
            .get_mut(user)
            .and_then(|inbox| inbox.entries.iter_mut().find(|entry| &entry.event.id == id))
            .ok_or_else(|| NotifyError::NotFound(id.to_string()))?;
        entry.read = true;
        Ok(entry.clone())
    }

    /// Mark everything in `user`'s inbox read. Returns how many changed.
    pub fn mark_all_read(&self, user: &UserId) -> Result<usize, NotifyError> {
        let mut guard = self
            .inboxes
            .write()
            .map_err(|_| NotifyError::Backend("inbox lock poisoned".to_string()))?;
        let mut changed = 0;
        if let Some(inbox) = guard.get_mut(user) {
            for entry in inbox.entries.iter_mut().filter(|entry| !entry.read) {
                entry.read = true;
                changed += 1;
            }
        }
        Ok(changed)
    }
}

#[async_trait]
impl NotificationEmitter for InboxEmitter {
    async fn emit(&self, event: &NotificationEvent) -> Result<(), NotifyError> {
        let mut guard = self
            .inboxes
            .write()
            .map_err(|_| NotifyError::Backend("inbox lock poisoned".to_string()))?;
        let inbox = guard.entry(event.recipient.clone()).or_default();
        if !inbox.ids.insert(event.id.clone()) {
            tracing::debug!(notification_id = %event.id, "Dropped duplicate notification");
            return Ok(());
        }
        inbox.entries.push_back(Notification {
            event: event.clone(),
            read: false,
        });
        while inbox.entries.len() > self.capacity {
            if let Some(evicted) = inbox.entries.pop_front() {
                inbox.ids.remove(&evicted.event.id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use civic_types::{ComplaintId, ComplaintStatus};

    fn event(complaint: &str, status: ComplaintStatus, minutes_ago: i64) -> NotificationEvent {
        NotificationEvent::new(
            ComplaintId::new(complaint),
            UserId::new("citizen-1"),
            status,
            format!("Complaint is now {status}"),
            Utc::now() - Duration::minutes(minutes_ago),
        )
    }

    #[tokio::test]
    async fn redelivery_is_dropped() {
        let inbox = InboxEmitter::new();
        let submitted = event("c-1", ComplaintStatus::Pending, 5);
        inbox.emit(&submitted).await.unwrap();
        inbox.emit(&submitted).await.unwrap();

        let user = UserId::new("citizen-1");
        assert_eq!(inbox.list(&user, false).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn read_state_and_ordering() {
        let inbox = InboxEmitter::new();
        let user = UserId::new("citizen-1");
        let older = event("c-1", ComplaintStatus::Pending, 10);
        let newer = event("c-1", ComplaintStatus::Assigned, 1);
        inbox.emit(&older).await.unwrap();
        inbox.emit(&newer).await.unwrap();

        let listed = inbox.list(&user, false).unwrap();
        assert_eq!(listed[0].event.id, newer.id);
        assert_eq!(inbox.unread_count(&user).unwrap(), 2);

        let marked = inbox.mark_read(&user, &older.id).unwrap();
        assert!(marked.read);
        let unread = inbox.list(&user, true).unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].event.id, newer.id);

        assert_eq!(inbox.mark_all_read(&user).unwrap(), 1);
        assert_eq!(inbox.unread_count(&user).unwrap(), 0);
        assert_eq!(inbox.mark_all_read(&user).unwrap(), 0);
    }

    #[tokio::test]
    async fn full_inbox_evicts_oldest_arrival() {
        let inbox = InboxEmitter::with_capacity(2);
        let user = UserId::new("citizen-1");
        let first = event("c-1", ComplaintStatus::Pending, 30);
        let second = event("c-2", ComplaintStatus::Pending, 20);
        let third = event("c-3", ComplaintStatus::Pending, 10);
        for e in [&first, &second, &third] {
            inbox.emit(e).await.unwrap();
        }

        let ids = inbox
            .list(&user, false)
            .unwrap()
            .into_iter()
            .map(|n| n.event.id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![third.id.clone(), second.id.clone()]);
        assert!(matches!(inbox.mark_read(&user, &first.id), Err(NotifyError::NotFound(_))));

        // Entries still held keep rejecting redelivery.
        inbox.emit(&second).await.unwrap();
        assert_eq!(inbox.list(&user, false).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn marking_another_users_notification_is_not_found() {
        let inbox = InboxEmitter::new();
        let submitted = event("c-1", ComplaintStatus::Pending, 0);
        inbox.emit(&submitted).await.unwrap();

        let result = inbox.mark_read(&UserId::new("someone-else"), &submitted.id);
        assert!(matches!(result, Err(NotifyError::NotFound(_))));
    }
}
