//! End-to-end lifecycle scenarios against the in-memory store.

use chrono::Utc;
use civic_lifecycle::{
    CreateComplaint, LifecycleConfig, LifecycleEngine, LifecycleError, TransitionOutcome,
    TransitionPayload, ValidationFailure,
};
use civic_notify::InboxEmitter;
use civic_storage::memory::InMemoryCivicStorage;
use civic_storage::{ComplaintStore, QueryWindow, UserStore};
use civic_types::{
    Actor, Category, ComplaintStatus, ImageAttachment, Location, Priority, Role, User, UserId,
};
use std::sync::Arc;

struct Harness {
    engine: Arc<LifecycleEngine>,
    storage: Arc<InMemoryCivicStorage>,
    inbox: Arc<InboxEmitter>,
    citizen: Actor,
    government: Actor,
    employee_e: Actor,
    employee_f: Actor,
}

async fn register(storage: &InMemoryCivicStorage, name: &str, role: Role) -> Actor {
    let user = User {
        id: UserId::generate(),
        name: name.to_string(),
        email: format!("{}@city.example", name.to_lowercase()),
        phone: Some("+91 9811111111".to_string()),
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

async fn harness() -> Harness {
    let storage = Arc::new(InMemoryCivicStorage::new());
    let inbox = Arc::new(InboxEmitter::new());
    let citizen = register(&storage, "Citizen", Role::Citizen).await;
    let government = register(&storage, "Official", Role::Government).await;
    let employee_e = register(&storage, "Esha", Role::Employee).await;
    let employee_f = register(&storage, "Farid", Role::Employee).await;
    let engine = Arc::new(LifecycleEngine::new(
        storage.clone(),
        inbox.clone(),
        LifecycleConfig::default(),
    ));
    Harness {
        engine,
        storage,
        inbox,
        citizen,
        government,
        employee_e,
        employee_f,
    }
}

fn description(words: usize) -> String {
    (0..words)
        .map(|i| format!("word{i}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn pothole(words: usize, images: Vec<ImageAttachment>) -> CreateComplaint {
    CreateComplaint {
        title: Some("Deep pothole outside school gate".to_string()),
        category: Category::RoadSafety,
        description: description(words),
        location: Location {
            street: "MG Road".to_string(),
            detail: "Outside Government School gate 2".to_string(),
        },
        priority: Priority::High,
        images,
        contact: Some("+91 9811111111".to_string()),
    }
}

fn png(size_bytes: u64) -> ImageAttachment {
    ImageAttachment {
        reference: "att-a1b2c3".to_string(),
        mime_type: "image/png".to_string(),
        size_bytes,
    }
}

#[tokio::test]
async fn complaint_runs_the_full_lifecycle() {
    let h = harness().await;

    let complaint = h
        .engine
        .create(&h.citizen, pothole(45, vec![png(2 * 1024 * 1024)]))
        .await
        .unwrap();
    assert_eq!(complaint.status, ComplaintStatus::Pending);
    assert_eq!(complaint.timeline.len(), 1);
    assert_eq!(complaint.images.len(), 1);

    let assigned = h
        .engine
        .transition(
            &complaint.id,
            &h.government,
            ComplaintStatus::Assigned,
            TransitionPayload::assign_to(h.employee_e.id.clone()),
        )
        .await
        .unwrap()
        .into_complaint();
    assert_eq!(assigned.status, ComplaintStatus::Assigned);
    assert_eq!(assigned.timeline.len(), 2);
    assert_eq!(assigned.assigned_employee.as_ref(), Some(&h.employee_e.id));

    let started = h
        .engine
        .transition(&complaint.id, &h.employee_e, ComplaintStatus::InProgress, TransitionPayload::default())
        .await
        .unwrap()
        .into_complaint();
    assert_eq!(started.status, ComplaintStatus::InProgress);
    assert_eq!(started.timeline.len(), 3);
    assert_eq!(started.timeline[2].description, "Work started");

    let resolved = h
        .engine
        .transition(&complaint.id, &h.employee_e, ComplaintStatus::Resolved, TransitionPayload::default())
        .await
        .unwrap()
        .into_complaint();
    assert_eq!(resolved.status, ComplaintStatus::Resolved);
    assert_eq!(resolved.timeline.len(), 4);
    assert_eq!(resolved.timeline[3].description, "Issue resolved");
    assert!(resolved.resolved_at.is_some());
    assert!(resolved.timeline_is_consistent());

    // One notification per step, all to the citizen.
    let inbox = h.inbox.list(&h.citizen.id, false).unwrap();
    assert_eq!(inbox.len(), 4);
    assert!(inbox.iter().all(|n| n.event.complaint_id == complaint.id));
}

#[tokio::test]
async fn another_employee_cannot_resolve() {
    let h = harness().await;
    let complaint = h.engine.create(&h.citizen, pothole(45, vec![])).await.unwrap();
    h.engine
        .transition(
            &complaint.id,
            &h.government,
            ComplaintStatus::Assigned,
            TransitionPayload::assign_to(h.employee_e.id.clone()),
        )
        .await
        .unwrap();
    let in_progress = h
        .engine
        .transition(&complaint.id, &h.employee_e, ComplaintStatus::InProgress, TransitionPayload::default())
        .await
        .unwrap()
        .into_complaint();

    let result = h
        .engine
        .transition(&complaint.id, &h.employee_f, ComplaintStatus::Resolved, TransitionPayload::default())
        .await;
    assert!(matches!(result, Err(LifecycleError::Unauthorized(_))));

    let after = h.engine.get(&complaint.id).await.unwrap();
    assert_eq!(after, in_progress);
    assert_eq!(after.timeline.len(), 3);
}

#[tokio::test]
async fn description_minimum_is_exact() {
    let h = harness().await;

    let short = h.engine.create(&h.citizen, pothole(39, vec![])).await;
    assert!(matches!(
        short,
        Err(LifecycleError::Validation(ValidationFailure::DescriptionTooShort { words: 39, min: 40 }))
    ));
    assert!(h
        .storage
        .list_complaints(QueryWindow::all())
        .await
        .unwrap()
        .is_empty());
    assert!(h.inbox.list(&h.citizen.id, false).unwrap().is_empty());

    let exact = h.engine.create(&h.citizen, pothole(40, vec![])).await;
    assert!(exact.is_ok());
}

#[tokio::test]
async fn pending_cannot_skip_to_in_progress() {
    let h = harness().await;
    let complaint = h.engine.create(&h.citizen, pothole(45, vec![])).await.unwrap();

    let result = h
        .engine
        .transition(&complaint.id, &h.employee_e, ComplaintStatus::InProgress, TransitionPayload::default())
        .await;
    assert!(matches!(
        result,
        Err(LifecycleError::InvalidTransition {
            from: ComplaintStatus::Pending,
            to: ComplaintStatus::InProgress
        })
    ));
}

#[tokio::test]
async fn unknown_complaint_is_not_found() {
    let h = harness().await;
    let result = h
        .engine
        .transition(
            &civic_types::ComplaintId::new("does-not-exist"),
            &h.government,
            ComplaintStatus::Assigned,
            TransitionPayload::assign_to(h.employee_e.id.clone()),
        )
        .await;
    assert!(matches!(result, Err(LifecycleError::NotFound(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_resolves_append_once() {
    let h = harness().await;
    let complaint = h.engine.create(&h.citizen, pothole(45, vec![])).await.unwrap();
    h.engine
        .transition(
            &complaint.id,
            &h.government,
            ComplaintStatus::Assigned,
            TransitionPayload::assign_to(h.employee_e.id.clone()),
        )
        .await
        .unwrap();
    h.engine
        .transition(&complaint.id, &h.employee_e, ComplaintStatus::InProgress, TransitionPayload::default())
        .await
        .unwrap();

    let tasks = (0..8)
        .map(|_| {
            let engine = Arc::clone(&h.engine);
            let id = complaint.id.clone();
            let actor = h.employee_e.clone();
            tokio::spawn(async move {
                engine
                    .transition(&id, &actor, ComplaintStatus::Resolved, TransitionPayload::default())
                    .await
            })
        })
        .collect::<Vec<_>>();

    let mut committed = 0;
    for task in tasks {
        match task.await.unwrap().unwrap() {
            TransitionOutcome::Committed(_) => committed += 1,
            TransitionOutcome::Replayed(c) => assert_eq!(c.status, ComplaintStatus::Resolved),
        }
    }
    assert_eq!(committed, 1);

    let resolved = h.engine.get(&complaint.id).await.unwrap();
    assert_eq!(resolved.timeline.len(), 4);
    assert_eq!(
        resolved
            .timeline
            .iter()
            .filter(|e| e.status == ComplaintStatus::Resolved)
            .count(),
        1
    );
    let resolution_notices = h
        .inbox
        .list(&h.citizen.id, false)
        .unwrap()
        .into_iter()
        .filter(|n| n.event.status == ComplaintStatus::Resolved)
        .count();
    assert_eq!(resolution_notices, 1);
}
