//! Balancer behavior when the store misbehaves.

use async_trait::async_trait;
use chrono::Utc;
use civic_assignment::{AssignmentBalancer, AssignmentError, WorkloadLedger};
use civic_lifecycle::{CreateComplaint, LifecycleConfig, LifecycleEngine, LifecycleError};
use civic_notify::InboxEmitter;
use civic_storage::memory::InMemoryCivicStorage;
use civic_storage::{ComplaintStore, QueryWindow, StorageError, StorageResult, UserStore};
use civic_types::{
    Actor, Category, Complaint, ComplaintId, ComplaintStatus, Location, Priority, Role, User,
    UserId,
};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

/// Loses the acknowledgement of the first `lost_acks` commits and can
/// refuse user lookups.
#[derive(Default)]
struct FaultyStore {
    inner: InMemoryCivicStorage,
    lost_acks: AtomicU32,
    users_down: AtomicBool,
}

#[async_trait]
impl UserStore for FaultyStore {
    async fn insert_user(&self, user: User) -> StorageResult<()> {
        self.inner.insert_user(user).await
    }
    async fn update_user(&self, user: User) -> StorageResult<()> {
        self.inner.update_user(user).await
    }
    async fn get_user(&self, id: &UserId) -> StorageResult<Option<User>> {
        if self.users_down.load(Ordering::SeqCst) {
            return Err(StorageError::InvariantViolation("user row unreadable".to_string()));
        }
        self.inner.get_user(id).await
    }
    async fn find_user_by_email(&self, email: &str) -> StorageResult<Option<User>> {
        self.inner.find_user_by_email(email).await
    }
    async fn list_users(&self, role: Option<Role>) -> StorageResult<Vec<User>> {
        self.inner.list_users(role).await
    }
}

#[async_trait]
impl ComplaintStore for FaultyStore {
    async fn insert_complaint(&self, complaint: Complaint) -> StorageResult<Complaint> {
        self.inner.insert_complaint(complaint).await
    }
    async fn get_complaint(&self, id: &ComplaintId) -> StorageResult<Option<Complaint>> {
        self.inner.get_complaint(id).await
    }
    async fn commit_complaint(&self, complaint: Complaint, expected_version: u64) -> StorageResult<Complaint> {
        let committed = self.inner.commit_complaint(complaint, expected_version).await?;
        let remaining = self.lost_acks.load(Ordering::SeqCst);
        if remaining > 0 {
            self.lost_acks.store(remaining - 1, Ordering::SeqCst);
            return Err(StorageError::Unavailable("ack lost".to_string()));
        }
        Ok(committed)
    }
    async fn list_complaints(&self, window: QueryWindow) -> StorageResult<Vec<Complaint>> {
        self.inner.list_complaints(window).await
    }
    fn backend_name(&self) -> &'static str {
        "faulty"
    }
}

async fn add(storage: &FaultyStore, name: &str, role: Role) -> Actor {
    let user = User {
        id: UserId::generate(),
        name: name.to_string(),
        email: format!("{}@ward3.example", name.to_lowercase()),
        phone: None,
        role,
        government_id: None,
        official_number: None,
        department: None,
        address: None,
        dob: None,
        created_at: Utc::now(),
    };
    storage.insert_user(user.clone()).await.unwrap();
    user.actor()
}

struct Desk {
    storage: Arc<FaultyStore>,
    inbox: Arc<InboxEmitter>,
    engine: Arc<LifecycleEngine>,
    balancer: AssignmentBalancer,
    citizen: Actor,
    government: Actor,
    employee: Actor,
}

async fn desk() -> Desk {
    let storage = Arc::new(FaultyStore::default());
    let citizen = add(&storage, "Citizen", Role::Citizen).await;
    let government = add(&storage, "Official", Role::Government).await;
    let employee = add(&storage, "Kiran", Role::Employee).await;
    let inbox = Arc::new(InboxEmitter::new());
    let ledger = Arc::new(WorkloadLedger::new());
    let config = LifecycleConfig {
        retry_backoff_ms: 1,
        ..LifecycleConfig::default()
    };
    let engine = Arc::new(
        LifecycleEngine::new(storage.clone(), inbox.clone(), config).with_observer(ledger.clone()),
    );
    Desk {
        balancer: AssignmentBalancer::new(engine.clone(), ledger),
        storage,
        inbox,
        engine,
        citizen,
        government,
        employee,
    }
}

fn fields() -> CreateComplaint {
    CreateComplaint {
        title: None,
        category: Category::Garbage,
        description: vec!["overflowing"; 40].join(" "),
        location: Location {
            street: "Market Lane".to_string(),
            detail: "Behind the bus stand".to_string(),
        },
        priority: Priority::Medium,
        images: vec![],
        contact: None,
    }
}

#[tokio::test]
async fn assignment_whose_ack_was_lost_still_counts_and_notifies() {
    let d = desk().await;
    let filed = d.engine.create(&d.citizen, fields()).await.unwrap();
    d.storage.lost_acks.store(1, Ordering::SeqCst);

    let outcome = d
        .balancer
        .assign(&filed.id, &d.employee.id, &d.government)
        .await
        .unwrap();
    assert!(!outcome.is_replay());
    assert_eq!(outcome.complaint().status, ComplaintStatus::Assigned);
    assert_eq!(outcome.complaint().timeline.len(), 2);
    assert_eq!(d.balancer.workload_of(&d.employee.id), 1);
    assert_eq!(d.inbox.list(&d.citizen.id, false).unwrap().len(), 2);

    let again = d
        .balancer
        .assign(&filed.id, &d.employee.id, &d.government)
        .await
        .unwrap();
    assert!(again.is_replay());
    assert_eq!(d.balancer.workload_of(&d.employee.id), 1);
    assert_eq!(d.inbox.list(&d.citizen.id, false).unwrap().len(), 2);
}

#[tokio::test]
async fn employee_lookup_failure_uses_the_lifecycle_taxonomy() {
    let d = desk().await;
    let filed = d.engine.create(&d.citizen, fields()).await.unwrap();
    d.storage.users_down.store(true, Ordering::SeqCst);

    let result = d.balancer.assign(&filed.id, &d.employee.id, &d.government).await;
    assert!(matches!(
        result,
        Err(AssignmentError::Lifecycle(LifecycleError::Store(_)))
    ));
    assert_eq!(d.balancer.workload_of(&d.employee.id), 0);
}
