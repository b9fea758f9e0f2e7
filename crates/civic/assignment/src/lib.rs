//! Civic Assignment - who is working on what.
//!
//! [`WorkloadLedger`] keeps one counter per employee, bumped by committed
//! assignments and dropped by resolutions, so reads never scan complaints.
//! [`AssignmentBalancer`] is the government-facing entry point: it checks
//! the chosen employee, delegates to the lifecycle engine and reports
//! candidates ranked by current load. Choosing is left to a person.

#![deny(unsafe_code)]

mod ledger;

pub use ledger::WorkloadLedger;

use chrono::{DateTime, Utc};
use civic_lifecycle::{
    ComplaintQuery, LifecycleEngine, LifecycleError, TransitionOutcome, TransitionPayload,
    ValidationFailure,
};
use civic_storage::{CivicStorage, StorageError, UserStore};
use civic_types::{Actor, Complaint, ComplaintId, ComplaintStatus, Role, UserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssignmentError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// Store failures reach callers in the lifecycle taxonomy.
impl From<StorageError> for AssignmentError {
    fn from(err: StorageError) -> Self {
        AssignmentError::Lifecycle(LifecycleError::from(err))
    }
}

/// An employee with their current number of open complaints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeLoad {
    pub id: UserId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    pub workload: u32,
}

/// An open complaint on an employee's desk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub complaint: Complaint,
    pub days_left: i64,
    pub overdue: bool,
}

pub struct AssignmentBalancer {
    engine: Arc<LifecycleEngine>,
    storage: Arc<dyn CivicStorage>,
    ledger: Arc<WorkloadLedger>,
}

impl AssignmentBalancer {
    pub fn new(engine: Arc<LifecycleEngine>, ledger: Arc<WorkloadLedger>) -> Self {
        Self {
            storage: engine.storage(),
            engine,
            ledger,
        }
    }

    /// Assign a pending complaint to an employee.
    pub async fn assign(
        &self,
        complaint_id: &ComplaintId,
        employee_id: &UserId,
        actor: &Actor,
    ) -> Result<TransitionOutcome, AssignmentError> {
        match actor.role {
            Role::Government => {}
            Role::Citizen | Role::Employee => {
                return Err(LifecycleError::Unauthorized(format!(
                    "{} accounts cannot assign complaints",
                    actor.role
                ))
                .into());
            }
        }

        let employee = self
            .storage
            .get_user(employee_id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(format!("employee {employee_id}")))?;
        if employee.role != Role::Employee {
            return Err(LifecycleError::Validation(ValidationFailure::NotAnEmployee(
                employee.id,
            ))
            .into());
        }

        let outcome = self
            .engine
            .transition(
                complaint_id,
                actor,
                ComplaintStatus::Assigned,
                TransitionPayload::assign_to(employee.id.clone()),
            )
            .await?;
        tracing::debug!(
            complaint_id = %complaint_id,
            employee = %employee.id,
            workload = self.ledger.workload_of(&employee.id),
            replay = outcome.is_replay(),
            "Assignment handled"
        );
        Ok(outcome)
    }

    pub fn workload_of(&self, employee_id: &UserId) -> u32 {
        self.ledger.workload_of(employee_id)
    }

    /// All employees, least loaded first; ties broken by name.
    pub async fn candidates(&self) -> Result<Vec<EmployeeLoad>, AssignmentError> {
        let employees = self.storage.list_users(Some(Role::Employee)).await?;
        let mut loads = employees
            .into_iter()
            .map(|user| EmployeeLoad {
                workload: self.ledger.workload_of(&user.id),
                id: user.id,
                name: user.name,
                department: user.department,
            })
            .collect::<Vec<_>>();
        loads.sort_by(|a, b| {
            a.workload
                .cmp(&b.workload)
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(loads)
    }

    /// Open complaints assigned to `employee`, most urgent first.
    pub async fn tasks_of(
        &self,
        employee: &Actor,
        now: DateTime<Utc>,
    ) -> Result<Vec<Task>, AssignmentError> {
        let query = ComplaintQuery {
            assigned_to: Some(employee.id.clone()),
            ..Default::default()
        };
        let mut tasks = self
            .engine
            .list(employee, &query)
            .await?
            .into_iter()
            .filter(|complaint| complaint.status.is_open())
            .map(|complaint| Task {
                days_left: complaint.days_left(now),
                overdue: complaint.is_overdue(now),
                complaint,
            })
            .collect::<Vec<_>>();
        tasks.sort_by(|a, b| a.complaint.due_at.cmp(&b.complaint.due_at));
        Ok(tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use civic_lifecycle::{CreateComplaint, LifecycleConfig};
    use civic_notify::InboxEmitter;
    use civic_storage::memory::InMemoryCivicStorage;
    use civic_types::{Category, Location, Priority, User};

    struct Setup {
        balancer: AssignmentBalancer,
        engine: Arc<LifecycleEngine>,
        citizen: Actor,
        government: Actor,
        employees: Vec<Actor>,
    }

    async fn add(storage: &InMemoryCivicStorage, name: &str, role: Role) -> Actor {
        let user = User {
            id: UserId::generate(),
            name: name.to_string(),
            email: format!("{}@city.example", name.to_lowercase()),
            phone: Some("+91 9822222222".to_string()),
            role,
            government_id: None,
            official_number: None,
            department: Some("Roads".to_string()),
            address: None,
            dob: None,
            created_at: Utc::now(),
        };
        storage.insert_user(user.clone()).await.unwrap();
        user.actor()
    }

    async fn setup() -> Setup {
        let storage = Arc::new(InMemoryCivicStorage::new());
        let citizen = add(&storage, "Citizen", Role::Citizen).await;
        let government = add(&storage, "Official", Role::Government).await;
        let employees = vec![
            add(&storage, "Bala", Role::Employee).await,
            add(&storage, "Anil", Role::Employee).await,
        ];
        let ledger = Arc::new(WorkloadLedger::new());
        let engine = Arc::new(
            LifecycleEngine::new(storage, Arc::new(InboxEmitter::new()), LifecycleConfig::default())
                .with_observer(ledger.clone()),
        );
        Setup {
            balancer: AssignmentBalancer::new(engine.clone(), ledger),
            engine,
            citizen,
            government,
            employees,
        }
    }

    fn complaint() -> CreateComplaint {
        CreateComplaint {
            title: None,
            category: Category::Traffic,
            description: vec!["jam"; 40].join(" "),
            location: Location {
                street: "Ring Road".to_string(),
                detail: "Junction 4".to_string(),
            },
            priority: Priority::Medium,
            images: vec![],
            contact: None,
        }
    }

    #[tokio::test]
    async fn assignment_moves_workload() {
        let s = setup().await;
        let bala = &s.employees[0];
        let filed = s.engine.create(&s.citizen, complaint()).await.unwrap();

        assert_eq!(s.balancer.workload_of(&bala.id), 0);
        s.balancer.assign(&filed.id, &bala.id, &s.government).await.unwrap();
        assert_eq!(s.balancer.workload_of(&bala.id), 1);

        // A repeated assignment is a replay and does not count twice.
        let again = s.balancer.assign(&filed.id, &bala.id, &s.government).await.unwrap();
        assert!(again.is_replay());
        assert_eq!(s.balancer.workload_of(&bala.id), 1);

        let tasks = s.balancer.tasks_of(bala, Utc::now()).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert!(!tasks[0].overdue);
        assert!(tasks[0].days_left >= 10);
    }

    #[tokio::test]
    async fn candidates_are_ranked_by_load_then_name() {
        let s = setup().await;
        let bala = &s.employees[0];
        let initial = s.balancer.candidates().await.unwrap();
        assert_eq!(
            initial.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            vec!["Anil", "Bala"]
        );

        let anil = &s.employees[1];
        let filed = s.engine.create(&s.citizen, complaint()).await.unwrap();
        s.balancer.assign(&filed.id, &anil.id, &s.government).await.unwrap();

        let ranked = s.balancer.candidates().await.unwrap();
        assert_eq!(ranked[0].id, bala.id);
        assert_eq!(ranked[1].workload, 1);
    }

    #[tokio::test]
    async fn only_government_assigns_to_real_employees() {
        let s = setup().await;
        let filed = s.engine.create(&s.citizen, complaint()).await.unwrap();
        let bala = s.employees[0].clone();

        let by_employee = s.balancer.assign(&filed.id, &bala.id, &bala).await;
        assert!(matches!(
            by_employee,
            Err(AssignmentError::Lifecycle(LifecycleError::Unauthorized(_)))
        ));

        let to_citizen = s.balancer.assign(&filed.id, &s.citizen.id, &s.government).await;
        assert!(matches!(
            to_citizen,
            Err(AssignmentError::Lifecycle(LifecycleError::Validation(_)))
        ));

        let to_ghost = s
            .balancer
            .assign(&filed.id, &UserId::new("ghost"), &s.government)
            .await;
        assert!(matches!(
            to_ghost,
            Err(AssignmentError::Lifecycle(LifecycleError::NotFound(_)))
        ));
    }
}
