use crate::{ComplaintId, ComplaintStatus, NotificationId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ComplaintSubmitted,
    ComplaintAssigned,
    WorkStarted,
    ComplaintResolved,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::ComplaintSubmitted => "complaint_submitted",
            NotificationKind::ComplaintAssigned => "complaint_assigned",
            NotificationKind::WorkStarted => "work_started",
            NotificationKind::ComplaintResolved => "complaint_resolved",
        }
    }

    /// The notification raised when a complaint enters `status`.
    pub fn for_status(status: ComplaintStatus) -> Self {
        match status {
            ComplaintStatus::Pending => NotificationKind::ComplaintSubmitted,
            ComplaintStatus::Assigned => NotificationKind::ComplaintAssigned,
            ComplaintStatus::InProgress => NotificationKind::WorkStarted,
            ComplaintStatus::Resolved => NotificationKind::ComplaintResolved,
        }
    }
}

/// A lifecycle event bound for an external delivery channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub id: NotificationId,
    pub complaint_id: ComplaintId,
    pub recipient: UserId,
    pub kind: NotificationKind,
    pub status: ComplaintStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl NotificationEvent {
    pub fn new(
        complaint_id: ComplaintId,
        recipient: UserId,
        status: ComplaintStatus,
        message: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let kind = NotificationKind::for_status(status);
        Self {
            id: NotificationId::derive(&complaint_id, kind, status),
            complaint_id,
            recipient,
            kind,
            status,
            message: message.into(),
            timestamp,
        }
    }
}
