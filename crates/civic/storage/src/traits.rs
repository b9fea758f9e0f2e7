use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use civic_types::{Complaint, ComplaintId, ImageAttachment, Role, User, UserId};

/// Generic query window for paged reads. A zero limit means "no limit".
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryWindow {
    pub limit: usize,
    pub offset: usize,
}

impl QueryWindow {
    pub fn all() -> Self {
        Self::default()
    }
}

/// Storage interface for user records.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new user. Fails with `Conflict` on a duplicate id or email.
    async fn insert_user(&self, user: User) -> StorageResult<()>;

    /// Replace an existing user record.
    async fn update_user(&self, user: User) -> StorageResult<()>;

    async fn get_user(&self, id: &UserId) -> StorageResult<Option<User>>;

    /// Case-insensitive email lookup.
    async fn find_user_by_email(&self, email: &str) -> StorageResult<Option<User>>;

    /// List users, optionally restricted to one role, oldest first.
    async fn list_users(&self, role: Option<Role>) -> StorageResult<Vec<User>>;
}

/// Storage interface for complaint records.
#[async_trait]
pub trait ComplaintStore: Send + Sync {
    /// Insert a freshly created complaint. The stored record has version 1.
    async fn insert_complaint(&self, complaint: Complaint) -> StorageResult<Complaint>;

    async fn get_complaint(&self, id: &ComplaintId) -> StorageResult<Option<Complaint>>;

    /// Atomically replace a complaint if the stored version equals
    /// `expected_version`. The new record must extend the stored timeline by
    /// exactly one event. Returns the stored record with its bumped version.
    async fn commit_complaint(
        &self,
        complaint: Complaint,
        expected_version: u64,
    ) -> StorageResult<Complaint>;

    /// List complaints newest-first.
    async fn list_complaints(&self, window: QueryWindow) -> StorageResult<Vec<Complaint>>;

    /// Short backend name for health reporting.
    fn backend_name(&self) -> &'static str;
}

/// File storage for uploaded images.
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// Store image bytes and return a stable content-addressed reference.
    async fn put_attachment(&self, mime_type: &str, bytes: Vec<u8>)
        -> StorageResult<ImageAttachment>;

    async fn get_attachment(&self, reference: &str) -> StorageResult<Option<ImageAttachment>>;

    async fn read_attachment(&self, reference: &str) -> StorageResult<Option<Vec<u8>>>;
}

/// Unified storage bundle used by the civic service.
pub trait CivicStorage: UserStore + ComplaintStore + Send + Sync {}

impl<T> CivicStorage for T where T: UserStore + ComplaintStore + Send + Sync {}

/// Validates that `next` is a legal successor record of `stored`: same id and
/// creator, and a timeline extended by exactly one entry whose status is the
/// new complaint status.
pub fn check_append_only(stored: &Complaint, next: &Complaint) -> StorageResult<()> {
    if stored.id != next.id || stored.created_by != next.created_by {
        return Err(StorageError::InvariantViolation(format!(
            "complaint {} identity fields changed",
            stored.id
        )));
    }
    if next.timeline.len() != stored.timeline.len() + 1
        || next.timeline[..stored.timeline.len()] != stored.timeline[..]
    {
        return Err(StorageError::InvariantViolation(format!(
            "complaint {} timeline must grow by exactly one event",
            stored.id
        )));
    }
    if next.last_event().map(|event| event.status) != Some(next.status) {
        return Err(StorageError::InvariantViolation(format!(
            "complaint {} status does not match its last timeline event",
            stored.id
        )));
    }
    Ok(())
}
