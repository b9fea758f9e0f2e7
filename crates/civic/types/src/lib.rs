//! Civic Types - the shared domain model.
//!
//! Users and their roles, complaints with their append-only timelines, and
//! the notification events the lifecycle emits. Everything here is plain
//! data; enforcement lives in `civic-lifecycle`.

#![deny(unsafe_code)]

mod complaint;
mod ids;
mod notification;
mod user;

pub use complaint::{
    add_working_days, Category, Complaint, ComplaintStatus, ImageAttachment, Location, Priority,
    TimelineEvent,
};
pub use ids::{ComplaintId, NotificationId, UserId};
pub use notification::{NotificationEvent, NotificationKind};
pub use user::{Actor, Role, User};

use thiserror::Error;

/// Failure to parse one of the closed domain enums from its wire name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}
