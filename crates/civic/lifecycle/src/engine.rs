//! The complaint lifecycle engine.
//!
//! Every mutation runs as read, validate, commit under a per-complaint
//! async mutex, with the store's version check as the cross-process guard.
//! Notifications go out only after the commit has been accepted.

use crate::validation::validate_submission;
use crate::{
    CommittedTransition, ComplaintQuery, ComplaintStatistics, LifecycleConfig, LifecycleError,
    LifecycleResult, TransitionObserver, ValidationFailure,
};
use chrono::{DateTime, Utc};
use civic_notify::NotificationEmitter;
use civic_storage::{CivicStorage, ComplaintStore, QueryWindow, StorageError, UserStore};
use civic_types::{
    add_working_days, Actor, Category, Complaint, ComplaintId, ComplaintStatus, ImageAttachment,
    Location, NotificationEvent, Priority, Role, TimelineEvent, UserId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Fields a citizen supplies when filing a complaint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateComplaint {
    /// Defaults to the category label.
    #[serde(default)]
    pub title: Option<String>,
    pub category: Category,
    pub description: String,
    pub location: Location,
    #[serde(default = "default_priority")]
    pub priority: Priority,
    #[serde(default)]
    pub images: Vec<ImageAttachment>,
    #[serde(default)]
    pub contact: Option<String>,
}

fn default_priority() -> Priority {
    Priority::Medium
}

/// Transition-specific inputs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionPayload {
    /// Required for pending -> assigned.
    pub employee_id: Option<UserId>,
    /// Optional evidence for in-progress -> resolved.
    pub proof: Option<String>,
}

impl TransitionPayload {
    pub fn assign_to(employee_id: UserId) -> Self {
        Self {
            employee_id: Some(employee_id),
            proof: None,
        }
    }

    pub fn with_proof(proof: impl Into<String>) -> Self {
        Self {
            employee_id: None,
            proof: Some(proof.into()),
        }
    }
}

/// Result of a transition request.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    /// A new timeline event was committed.
    Committed(Complaint),
    /// The transition had already been applied; nothing changed.
    Replayed(Complaint),
}

impl TransitionOutcome {
    pub fn complaint(&self) -> &Complaint {
        match self {
            TransitionOutcome::Committed(c) | TransitionOutcome::Replayed(c) => c,
        }
    }

    pub fn into_complaint(self) -> Complaint {
        match self {
            TransitionOutcome::Committed(c) | TransitionOutcome::Replayed(c) => c,
        }
    }

    pub fn is_replay(&self) -> bool {
        matches!(self, TransitionOutcome::Replayed(_))
    }
}

/// Why a single attempt stopped.
enum AttemptError {
    Rejected(LifecycleError),
    Store(StorageError),
}

impl From<StorageError> for AttemptError {
    fn from(err: StorageError) -> Self {
        AttemptError::Store(err)
    }
}

impl From<LifecycleError> for AttemptError {
    fn from(err: LifecycleError) -> Self {
        AttemptError::Rejected(err)
    }
}

impl From<ValidationFailure> for AttemptError {
    fn from(failure: ValidationFailure) -> Self {
        AttemptError::Rejected(LifecycleError::Validation(failure))
    }
}

/// Sole writer of complaint status.
pub struct LifecycleEngine {
    storage: Arc<dyn CivicStorage>,
    emitter: Arc<dyn NotificationEmitter>,
    config: LifecycleConfig,
    observers: Vec<Arc<dyn TransitionObserver>>,
    locks: Mutex<HashMap<ComplaintId, Arc<tokio::sync::Mutex<()>>>>,
}

impl LifecycleEngine {
    pub fn new(
        storage: Arc<dyn CivicStorage>,
        emitter: Arc<dyn NotificationEmitter>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            storage,
            emitter,
            config,
            observers: Vec::new(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn TransitionObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    pub fn storage(&self) -> Arc<dyn CivicStorage> {
        Arc::clone(&self.storage)
    }

    // ── Creation ─────────────────────────────────────────────────────

    /// File a new complaint on behalf of a citizen.
    pub async fn create(
        &self,
        creator: &Actor,
        fields: CreateComplaint,
    ) -> LifecycleResult<Complaint> {
        match creator.role {
            Role::Citizen => {}
            Role::Government | Role::Employee => {
                tracing::warn!(actor = %creator.id, role = %creator.role, "Denied complaint creation");
                return Err(LifecycleError::Unauthorized(format!(
                    "{} accounts cannot file complaints",
                    creator.role
                )));
            }
        }
        validate_submission(&fields.description, &fields.location, &fields.images, &self.config)?;

        let now = Utc::now();
        let title = fields
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| fields.category.label().to_string());
        let complaint = Complaint {
            id: ComplaintId::generate(),
            title,
            category: fields.category,
            description: fields.description.trim().to_string(),
            location: Location {
                street: fields.location.street.trim().to_string(),
                detail: fields.location.detail.trim().to_string(),
            },
            priority: fields.priority,
            status: ComplaintStatus::Pending,
            created_by: creator.id.clone(),
            assigned_employee: None,
            images: fields.images,
            contact: fields
                .contact
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            created_at: now,
            due_at: add_working_days(now, self.config.resolution_working_days),
            resolved_at: None,
            resolution_proof: None,
            timeline: vec![TimelineEvent {
                date: now,
                description: "Complaint submitted".to_string(),
                status: ComplaintStatus::Pending,
                actor: creator.id.clone(),
            }],
            version: 0,
        };

        let stored = tokio::time::timeout(
            self.config.transition_timeout(),
            self.storage.insert_complaint(complaint),
        )
        .await
        .map_err(|_| LifecycleError::TransientStore("complaint creation timed out".to_string()))??;

        tracing::info!(
            complaint_id = %stored.id,
            actor = %creator.id,
            category = stored.category.as_str(),
            "Complaint submitted"
        );
        self.notify(&stored, now).await;
        Ok(stored)
    }

    // ── Transitions ──────────────────────────────────────────────────

    /// Move a complaint to `target`, enforcing the state machine and the
    /// role gate for that step.
    pub async fn transition(
        &self,
        id: &ComplaintId,
        actor: &Actor,
        target: ComplaintStatus,
        payload: TransitionPayload,
    ) -> LifecycleResult<TransitionOutcome> {
        let lock = self.complaint_lock(id)?;
        let result = {
            let _guard = lock.lock().await;
            self.transition_with_retries(id, actor, target, &payload).await
        };
        drop(lock);
        self.release_lock(id);

        let outcome = result?;
        if let TransitionOutcome::Committed(complaint) = &outcome {
            let at = complaint.last_event().map_or_else(Utc::now, |event| event.date);
            self.notify(complaint, at).await;
        }
        Ok(outcome)
    }

    /// Retries transient store failures until the transition deadline.
    ///
    /// `in_flight` holds the version a commit was issued against while its
    /// outcome is unknown. A later read that finds that exact commit stored
    /// settles the request as committed so observers and notifications run.
    async fn transition_with_retries(
        &self,
        id: &ComplaintId,
        actor: &Actor,
        target: ComplaintStatus,
        payload: &TransitionPayload,
    ) -> LifecycleResult<TransitionOutcome> {
        let deadline = tokio::time::Instant::now() + self.config.transition_timeout();
        let mut in_flight: Option<u64> = None;
        let mut attempt = 0;
        loop {
            let attempted = tokio::time::timeout_at(
                deadline,
                self.attempt_transition(id, actor, target, payload, &mut in_flight),
            )
            .await;
            let result = match attempted {
                Ok(result) => result,
                Err(_) => return self.settle_timed_out(id, actor, target, in_flight).await,
            };
            match result {
                Ok(TransitionOutcome::Replayed(complaint))
                    if in_flight.is_some_and(|version| landed(&complaint, version, actor, target)) =>
                {
                    return Ok(self.recover(complaint, actor, target));
                }
                Ok(outcome) => return Ok(outcome),
                Err(AttemptError::Rejected(err)) => {
                    if matches!(err, LifecycleError::Unauthorized(_)) {
                        tracing::warn!(complaint_id = %id, actor = %actor.id, to = %target, error = %err, "Denied transition");
                    }
                    return Err(err);
                }
                Err(AttemptError::Store(err)) if err.is_transient() && attempt < self.config.max_store_retries => {
                    attempt += 1;
                    tracing::debug!(
                        complaint_id = %id,
                        attempt,
                        unconfirmed_commit = in_flight.is_some(),
                        error = %err,
                        "Retrying transition"
                    );
                    tokio::time::sleep(self.config.retry_delay(attempt)).await;
                }
                Err(AttemptError::Store(err)) => return Err(err.into()),
            }
        }
    }

    /// The deadline passed; if a commit was outstanding, one bounded read
    /// decides whether it landed.
    async fn settle_timed_out(
        &self,
        id: &ComplaintId,
        actor: &Actor,
        target: ComplaintStatus,
        in_flight: Option<u64>,
    ) -> LifecycleResult<TransitionOutcome> {
        let timed_out =
            || LifecycleError::TransientStore(format!("transition of {id} to {target} timed out"));
        let Some(version) = in_flight else {
            return Err(timed_out());
        };
        match tokio::time::timeout(self.config.transition_timeout(), self.storage.get_complaint(id)).await {
            Ok(Ok(Some(complaint))) if landed(&complaint, version, actor, target) => {
                Ok(self.recover(complaint, actor, target))
            }
            _ => Err(timed_out()),
        }
    }

    /// Finish a commit whose acknowledgement never arrived.
    fn recover(&self, complaint: Complaint, actor: &Actor, target: ComplaintStatus) -> TransitionOutcome {
        tracing::info!(
            complaint_id = %complaint.id,
            to = %target,
            actor = %actor.id,
            version = complaint.version,
            "Recovered unacknowledged commit"
        );
        if let Some(from) = target.predecessor() {
            self.observe(from, target, actor, &complaint);
        }
        TransitionOutcome::Committed(complaint)
    }

    fn observe(&self, from: ComplaintStatus, to: ComplaintStatus, actor: &Actor, committed: &Complaint) {
        let transition = CommittedTransition {
            complaint_id: committed.id.clone(),
            from,
            to,
            actor: actor.clone(),
            assigned_employee: committed.assigned_employee.clone(),
        };
        for observer in &self.observers {
            observer.on_commit(&transition);
        }
    }

    async fn attempt_transition(
        &self,
        id: &ComplaintId,
        actor: &Actor,
        target: ComplaintStatus,
        payload: &TransitionPayload,
        in_flight: &mut Option<u64>,
    ) -> Result<TransitionOutcome, AttemptError> {
        let complaint = self
            .storage
            .get_complaint(id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(format!("complaint {id}")))?;

        if complaint.status == target && is_replay(&complaint, actor, target, payload) {
            tracing::debug!(complaint_id = %id, actor = %actor.id, to = %target, "Replayed transition");
            return Ok(TransitionOutcome::Replayed(complaint));
        }

        let from = complaint.status;
        if target.predecessor() != Some(from) {
            return Err(LifecycleError::InvalidTransition { from, to: target }.into());
        }
        authorize(&complaint, actor, target)?;

        let now = Utc::now();
        let mut next = complaint.clone();
        let description = match target {
            ComplaintStatus::Pending => {
                return Err(LifecycleError::InvalidTransition { from, to: target }.into())
            }
            ComplaintStatus::Assigned => {
                let employee_id = payload
                    .employee_id
                    .clone()
                    .ok_or(ValidationFailure::MissingEmployee)?;
                let employee = self
                    .storage
                    .get_user(&employee_id)
                    .await?
                    .ok_or_else(|| LifecycleError::NotFound(format!("employee {employee_id}")))?;
                if employee.role != Role::Employee {
                    return Err(ValidationFailure::NotAnEmployee(employee_id).into());
                }
                next.assigned_employee = Some(employee.id.clone());
                format!("Assigned to {}", employee.name)
            }
            ComplaintStatus::InProgress => "Work started".to_string(),
            ComplaintStatus::Resolved => {
                if let Some(proof) = &payload.proof {
                    let proof = proof.trim();
                    if proof.is_empty() {
                        return Err(ValidationFailure::EmptyProof.into());
                    }
                    next.resolution_proof = Some(proof.to_string());
                }
                next.resolved_at = Some(now);
                "Issue resolved".to_string()
            }
        };
        next.status = target;
        next.timeline.push(TimelineEvent {
            date: now,
            description,
            status: target,
            actor: actor.id.clone(),
        });

        *in_flight = Some(complaint.version);
        let committed = match self.storage.commit_complaint(next, complaint.version).await {
            Ok(committed) => committed,
            Err(err) => {
                // A rejected version or a permanent failure wrote nothing.
                if matches!(err, StorageError::VersionConflict { .. }) || !err.is_transient() {
                    *in_flight = None;
                }
                return Err(err.into());
            }
        };
        *in_flight = None;
        tracing::info!(
            complaint_id = %committed.id,
            from = %from,
            to = %target,
            actor = %actor.id,
            version = committed.version,
            "Committed transition"
        );

        self.observe(from, target, actor, &committed);
        Ok(TransitionOutcome::Committed(committed))
    }

    fn complaint_lock(&self, id: &ComplaintId) -> LifecycleResult<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| LifecycleError::Store("complaint lock table poisoned".to_string()))?;
        Ok(Arc::clone(locks.entry(id.clone()).or_default()))
    }

    /// Drops the lock entry once no caller holds or waits on it.
    fn release_lock(&self, id: &ComplaintId) {
        if let Ok(mut locks) = self.locks.lock() {
            if locks.get(id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
                locks.remove(id);
            }
        }
    }

    async fn notify(&self, complaint: &Complaint, at: DateTime<Utc>) {
        let Some(event) = complaint.last_event() else {
            return;
        };
        let notification = NotificationEvent::new(
            complaint.id.clone(),
            complaint.created_by.clone(),
            complaint.status,
            format!("Complaint {}: {}", complaint.id.reference(), event.description),
            at,
        );
        if let Err(err) = self.emitter.emit(&notification).await {
            tracing::warn!(
                complaint_id = %complaint.id,
                notification_id = %notification.id,
                error = %err,
                "Notification delivery failed"
            );
        }
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Fetch a complaint without a visibility check.
    pub async fn get(&self, id: &ComplaintId) -> LifecycleResult<Complaint> {
        self.storage
            .get_complaint(id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(format!("complaint {id}")))
    }

    /// Fetch a complaint the actor is allowed to read.
    pub async fn get_for(&self, id: &ComplaintId, actor: &Actor) -> LifecycleResult<Complaint> {
        let complaint = self.get(id).await?;
        if !complaint.visible_to(actor) {
            return Err(LifecycleError::Unauthorized(format!(
                "{} may not view complaint {id}",
                actor.id
            )));
        }
        Ok(complaint)
    }

    /// Complaints visible to `actor` that match `query`, newest first.
    pub async fn list(&self, actor: &Actor, query: &ComplaintQuery) -> LifecycleResult<Vec<Complaint>> {
        let now = Utc::now();
        let all = self.storage.list_complaints(QueryWindow::all()).await?;
        Ok(query.window(
            all.into_iter()
                .filter(|complaint| complaint.visible_to(actor))
                .filter(|complaint| query.matches(complaint, now)),
        ))
    }

    pub async fn statistics(&self) -> LifecycleResult<ComplaintStatistics> {
        let all = self.storage.list_complaints(QueryWindow::all()).await?;
        Ok(ComplaintStatistics::compute(&all, Utc::now()))
    }
}

/// Role gate for the step into `target`.
fn authorize(complaint: &Complaint, actor: &Actor, target: ComplaintStatus) -> LifecycleResult<()> {
    let allowed = match (target, actor.role) {
        (ComplaintStatus::Assigned, Role::Government) => true,
        (ComplaintStatus::InProgress | ComplaintStatus::Resolved, Role::Employee) => {
            complaint.assigned_employee.as_ref() == Some(&actor.id)
        }
        (ComplaintStatus::Pending, _)
        | (ComplaintStatus::Assigned, Role::Citizen | Role::Employee)
        | (ComplaintStatus::InProgress | ComplaintStatus::Resolved, Role::Citizen | Role::Government) => false,
    };
    if allowed {
        Ok(())
    } else {
        Err(LifecycleError::Unauthorized(format!(
            "{} {} may not move complaint {} to {target}",
            actor.role, actor.id, complaint.id
        )))
    }
}

/// A request whose effect is already committed: the complaint sits at
/// `target`, the caller would pass the gate for that step, and an assignment
/// names the employee already assigned.
fn is_replay(
    complaint: &Complaint,
    actor: &Actor,
    target: ComplaintStatus,
    payload: &TransitionPayload,
) -> bool {
    if authorize(complaint, actor, target).is_err() {
        return false;
    }
    match target {
        ComplaintStatus::Assigned => {
            payload.employee_id.is_some() && payload.employee_id == complaint.assigned_employee
        }
        ComplaintStatus::InProgress | ComplaintStatus::Resolved => true,
        ComplaintStatus::Pending => false,
    }
}

/// Whether the stored complaint is exactly the commit issued against
/// `version` by `actor`.
fn landed(complaint: &Complaint, version: u64, actor: &Actor, target: ComplaintStatus) -> bool {
    complaint.version == version + 1
        && complaint.status == target
        && complaint
            .last_event()
            .is_some_and(|event| event.status == target && event.actor == actor.id)
}
