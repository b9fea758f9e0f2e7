use civic_lifecycle::{CommittedTransition, TransitionObserver};
use civic_storage::{ComplaintStore, QueryWindow, StorageResult};
use civic_types::{ComplaintStatus, UserId};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Open-complaint counters per employee.
#[derive(Debug, Default)]
pub struct WorkloadLedger {
    counts: RwLock<HashMap<UserId, u32>>,
}

impl WorkloadLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recount from stored complaints, replacing current counters.
    pub async fn rebuild<S>(&self, storage: &S) -> StorageResult<usize>
    where
        S: ComplaintStore + ?Sized,
    {
        let complaints = storage.list_complaints(QueryWindow::all()).await?;
        let mut counts = HashMap::new();
        for complaint in &complaints {
            if let (true, Some(employee)) =
                (complaint.status.is_open(), complaint.assigned_employee.as_ref())
            {
                *counts.entry(employee.clone()).or_insert(0u32) += 1;
            }
        }
        let employees = counts.len();
        *self.counts.write().unwrap_or_else(PoisonError::into_inner) = counts;
        tracing::info!(complaints = complaints.len(), employees, "Rebuilt workload ledger");
        Ok(employees)
    }

    pub fn workload_of(&self, employee: &UserId) -> u32 {
        self.counts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(employee)
            .copied()
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> HashMap<UserId, u32> {
        self.counts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl TransitionObserver for WorkloadLedger {
    fn on_commit(&self, transition: &CommittedTransition) {
        let Some(employee) = transition.assigned_employee.as_ref() else {
            return;
        };
        let mut counts = self.counts.write().unwrap_or_else(PoisonError::into_inner);
        match transition.to {
            ComplaintStatus::Assigned => {
                *counts.entry(employee.clone()).or_insert(0) += 1;
            }
            ComplaintStatus::Resolved => {
                if let Some(count) = counts.get_mut(employee) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        counts.remove(employee);
                    }
                }
            }
            ComplaintStatus::Pending | ComplaintStatus::InProgress => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use civic_storage::memory::InMemoryCivicStorage;
    use civic_types::{
        Actor, Category, Complaint, ComplaintId, Location, Priority, Role, TimelineEvent,
    };

    fn committed(to: ComplaintStatus, employee: &str) -> CommittedTransition {
        CommittedTransition {
            complaint_id: ComplaintId::new("c-1"),
            from: to.predecessor().unwrap_or(ComplaintStatus::Pending),
            to,
            actor: Actor::new(UserId::new("actor"), Role::Government),
            assigned_employee: Some(UserId::new(employee)),
        }
    }

    #[test]
    fn counters_follow_assign_and_resolve() {
        let ledger = WorkloadLedger::new();
        let e = UserId::new("e");
        ledger.on_commit(&committed(ComplaintStatus::Assigned, "e"));
        ledger.on_commit(&committed(ComplaintStatus::Assigned, "e"));
        ledger.on_commit(&committed(ComplaintStatus::InProgress, "e"));
        assert_eq!(ledger.workload_of(&e), 2);

        ledger.on_commit(&committed(ComplaintStatus::Resolved, "e"));
        assert_eq!(ledger.workload_of(&e), 1);
        ledger.on_commit(&committed(ComplaintStatus::Resolved, "e"));
        ledger.on_commit(&committed(ComplaintStatus::Resolved, "e"));
        assert_eq!(ledger.workload_of(&e), 0);
        assert!(ledger.snapshot().is_empty());
    }

    fn stored(status: ComplaintStatus, employee: Option<&str>) -> Complaint {
        let now = Utc::now();
        let timeline = ComplaintStatus::ALL
            .iter()
            .filter(|s| **s <= status)
            .map(|s| TimelineEvent {
                date: now,
                description: s.to_string(),
                status: *s,
                actor: UserId::new("x"),
            })
            .collect();
        Complaint {
            id: ComplaintId::generate(),
            title: "Signal broken".to_string(),
            category: Category::Traffic,
            description: "signal broken".to_string(),
            location: Location {
                street: "Ring Road".to_string(),
                detail: "Junction 4".to_string(),
            },
            priority: Priority::Low,
            status,
            created_by: UserId::new("citizen"),
            assigned_employee: employee.map(UserId::new),
            images: vec![],
            contact: None,
            created_at: now,
            due_at: now + Duration::days(14),
            resolved_at: None,
            resolution_proof: None,
            timeline,
            version: 0,
        }
    }

    #[tokio::test]
    async fn rebuild_counts_open_assignments() {
        let storage = InMemoryCivicStorage::new();
        for complaint in [
            stored(ComplaintStatus::Pending, None),
            stored(ComplaintStatus::Assigned, Some("e")),
            stored(ComplaintStatus::InProgress, Some("e")),
            stored(ComplaintStatus::Resolved, Some("e")),
            stored(ComplaintStatus::Assigned, Some("f")),
        ] {
            storage.insert_complaint(complaint).await.unwrap();
        }

        let ledger = WorkloadLedger::new();
        ledger.on_commit(&committed(ComplaintStatus::Assigned, "stale"));
        assert_eq!(ledger.rebuild(&storage).await.unwrap(), 2);
        assert_eq!(ledger.workload_of(&UserId::new("e")), 2);
        assert_eq!(ledger.workload_of(&UserId::new("f")), 1);
        assert_eq!(ledger.workload_of(&UserId::new("stale")), 0);
    }
}
