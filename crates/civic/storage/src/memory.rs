//! In-memory reference implementation for civic storage traits.
//!
//! This adapter is deterministic and test-friendly. Production deployments
//! should use a transactional backend (e.g. PostgreSQL) for source-of-truth data.

use crate::traits::{check_append_only, ComplaintStore, QueryWindow, UserStore};
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use civic_types::{Complaint, ComplaintId, Role, User, UserId};
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory civic storage adapter.
#[derive(Default)]
pub struct InMemoryCivicStorage {
    users: RwLock<HashMap<UserId, User>>,
    complaints: RwLock<HashMap<ComplaintId, Complaint>>,
}

impl InMemoryCivicStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryCivicStorage {
    async fn insert_user(&self, user: User) -> StorageResult<()> {
        let mut guard = self
            .users
            .write()
            .map_err(|_| StorageError::Backend("users lock poisoned".to_string()))?;

        if guard.contains_key(&user.id) {
            return Err(StorageError::Conflict(format!("user {} already exists", user.id)));
        }
        let email = user.email.to_lowercase();
        if guard.values().any(|existing| existing.email.to_lowercase() == email) {
            return Err(StorageError::Conflict(format!(
                "email {} already registered",
                user.email
            )));
        }

        guard.insert(user.id.clone(), user);
        Ok(())
    }

    async fn update_user(&self, user: User) -> StorageResult<()> {
        let mut guard = self
            .users
            .write()
            .map_err(|_| StorageError::Backend("users lock poisoned".to_string()))?;
        let record = guard
            .get_mut(&user.id)
            .ok_or_else(|| StorageError::NotFound(format!("user {} not found", user.id)))?;
        *record = user;
        Ok(())
    }

    async fn get_user(&self, id: &UserId) -> StorageResult<Option<User>> {
        let guard = self
            .users
            .read()
            .map_err(|_| StorageError::Backend("users lock poisoned".to_string()))?;
        Ok(guard.get(id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StorageResult<Option<User>> {
        let guard = self
            .users
            .read()
            .map_err(|_| StorageError::Backend("users lock poisoned".to_string()))?;
        let email = email.trim().to_lowercase();
        Ok(guard
            .values()
            .find(|user| user.email.to_lowercase() == email)
            .cloned())
    }

    async fn list_users(&self, role: Option<Role>) -> StorageResult<Vec<User>> {
        let guard = self
            .users
            .read()
            .map_err(|_| StorageError::Backend("users lock poisoned".to_string()))?;
        let mut values = guard
            .values()
            .filter(|user| role.map_or(true, |role| user.role == role))
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(values)
    }
}

#[async_trait]
impl ComplaintStore for InMemoryCivicStorage {
    async fn insert_complaint(&self, mut complaint: Complaint) -> StorageResult<Complaint> {
        if !complaint.timeline_is_consistent() {
            return Err(StorageError::InvariantViolation(format!(
                "complaint {} has an inconsistent timeline",
                complaint.id
            )));
        }

        let mut guard = self
            .complaints
            .write()
            .map_err(|_| StorageError::Backend("complaints lock poisoned".to_string()))?;

        if guard.contains_key(&complaint.id) {
            return Err(StorageError::Conflict(format!(
                "complaint {} already exists",
                complaint.id
            )));
        }

        complaint.version = 1;
        guard.insert(complaint.id.clone(), complaint.clone());
        Ok(complaint)
    }

    async fn get_complaint(&self, id: &ComplaintId) -> StorageResult<Option<Complaint>> {
        let guard = self
            .complaints
            .read()
            .map_err(|_| StorageError::Backend("complaints lock poisoned".to_string()))?;
        Ok(guard.get(id).cloned())
    }

    async fn commit_complaint(
        &self,
        mut complaint: Complaint,
        expected_version: u64,
    ) -> StorageResult<Complaint> {
        let mut guard = self
            .complaints
            .write()
            .map_err(|_| StorageError::Backend("complaints lock poisoned".to_string()))?;
        let stored = guard.get_mut(&complaint.id).ok_or_else(|| {
            StorageError::NotFound(format!("complaint {} not found", complaint.id))
        })?;

        if stored.version != expected_version {
            return Err(StorageError::VersionConflict {
                id: complaint.id.to_string(),
                expected: expected_version,
                found: stored.version,
            });
        }
        check_append_only(stored, &complaint)?;

        complaint.version = expected_version + 1;
        *stored = complaint.clone();
        Ok(complaint)
    }

    async fn list_complaints(&self, window: QueryWindow) -> StorageResult<Vec<Complaint>> {
        let guard = self
            .complaints
            .read()
            .map_err(|_| StorageError::Backend("complaints lock poisoned".to_string()))?;
        let mut values = guard.values().cloned().collect::<Vec<_>>();
        values.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(apply_window(values, window))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

pub(crate) fn apply_window<T>(items: Vec<T>, window: QueryWindow) -> Vec<T> {
    let iter = items.into_iter().skip(window.offset);
    if window.limit == 0 {
        iter.collect()
    } else {
        iter.take(window.limit).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use civic_types::{
        Category, ComplaintStatus, Location, Priority, TimelineEvent,
    };

    fn sample_user(email: &str, role: Role) -> User {
        User {
            id: UserId::generate(),
            name: "Mary Johnson".to_string(),
            email: email.to_string(),
            phone: Some("+91 9876543211".to_string()),
            role,
            government_id: None,
            official_number: None,
            department: None,
            address: None,
            dob: None,
            created_at: Utc::now(),
        }
    }

    fn sample_complaint() -> Complaint {
        let now = Utc::now();
        Complaint {
            id: ComplaintId::generate(),
            title: "Garbage Overflow".to_string(),
            category: Category::Garbage,
            description: "bins overflowing".to_string(),
            location: Location {
                street: "Park Avenue".to_string(),
                detail: "Sector 12".to_string(),
            },
            priority: Priority::Medium,
            status: ComplaintStatus::Pending,
            created_by: UserId::new("citizen-1"),
            assigned_employee: None,
            images: vec![],
            contact: None,
            created_at: now,
            due_at: now + Duration::days(14),
            resolved_at: None,
            resolution_proof: None,
            timeline: vec![TimelineEvent {
                date: now,
                description: "Complaint submitted".to_string(),
                status: ComplaintStatus::Pending,
                actor: UserId::new("citizen-1"),
            }],
            version: 0,
        }
    }

    fn advanced(mut complaint: Complaint, status: ComplaintStatus) -> Complaint {
        complaint.status = status;
        complaint.timeline.push(TimelineEvent {
            date: Utc::now(),
            description: status.to_string(),
            status,
            actor: UserId::new("gov-1"),
        });
        complaint
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected_case_insensitively() {
        let storage = InMemoryCivicStorage::new();
        storage
            .insert_user(sample_user("mary@city.gov", Role::Employee))
            .await
            .unwrap();
        let result = storage
            .insert_user(sample_user("MARY@city.gov", Role::Citizen))
            .await;
        assert!(matches!(result, Err(StorageError::Conflict(_))));

        let found = storage.find_user_by_email(" Mary@City.gov ").await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn list_users_filters_by_role() {
        let storage = InMemoryCivicStorage::new();
        storage.insert_user(sample_user("a@x.org", Role::Employee)).await.unwrap();
        storage.insert_user(sample_user("b@x.org", Role::Citizen)).await.unwrap();
        storage.insert_user(sample_user("c@x.org", Role::Employee)).await.unwrap();

        assert_eq!(storage.list_users(Some(Role::Employee)).await.unwrap().len(), 2);
        assert_eq!(storage.list_users(None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn commit_checks_expected_version() {
        let storage = InMemoryCivicStorage::new();
        let stored = storage.insert_complaint(sample_complaint()).await.unwrap();
        assert_eq!(stored.version, 1);

        let next = advanced(stored.clone(), ComplaintStatus::Assigned);
        let committed = storage.commit_complaint(next.clone(), 1).await.unwrap();
        assert_eq!(committed.version, 2);

        // A second writer that read version 1 loses.
        let stale = storage.commit_complaint(next, 1).await;
        assert!(matches!(
            stale,
            Err(StorageError::VersionConflict { expected: 1, found: 2, .. })
        ));
    }

    #[tokio::test]
    async fn commit_rejects_timeline_rewrites() {
        let storage = InMemoryCivicStorage::new();
        let stored = storage.insert_complaint(sample_complaint()).await.unwrap();

        let mut rewritten = advanced(stored.clone(), ComplaintStatus::Assigned);
        rewritten.timeline[0].description = "edited".to_string();
        let result = storage.commit_complaint(rewritten, 1).await;
        assert!(matches!(result, Err(StorageError::InvariantViolation(_))));

        let unchanged = stored.clone();
        let result = storage.commit_complaint(unchanged, 1).await;
        assert!(matches!(result, Err(StorageError::InvariantViolation(_))));

        let after = storage.get_complaint(&stored.id).await.unwrap().unwrap();
        assert_eq!(after.version, 1);
        assert_eq!(after.timeline.len(), 1);
    }

    #[tokio::test]
    async fn commit_unknown_complaint_is_not_found() {
        let storage = InMemoryCivicStorage::new();
        let result = storage
            .commit_complaint(advanced(sample_complaint(), ComplaintStatus::Assigned), 1)
            .await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn list_complaints_is_newest_first_and_windowed() {
        let storage = InMemoryCivicStorage::new();
        let mut older = sample_complaint();
        older.created_at = Utc::now() - Duration::hours(2);
        let older_id = older.id.clone();
        storage.insert_complaint(older).await.unwrap();
        let newer = storage.insert_complaint(sample_complaint()).await.unwrap();

        let all = storage.list_complaints(QueryWindow::all()).await.unwrap();
        assert_eq!(all[0].id, newer.id);
        assert_eq!(all[1].id, older_id);

        let page = storage
            .list_complaints(QueryWindow { limit: 1, offset: 1 })
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, older_id);
    }
}
