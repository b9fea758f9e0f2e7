//! Employee workload handlers

use crate::api::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use civic_assignment::{EmployeeLoad, Task};
use civic_types::{Role, User, UserId};
use serde::Serialize;

/// Assignment candidates, least loaded first
pub async fn list_candidates(
    State(state): State<AppState>,
    caller: CurrentUser,
) -> ApiResult<Json<Vec<EmployeeLoad>>> {
    caller.require_government()?;
    Ok(Json(state.balancer.candidates().await?))
}

#[derive(Debug, Serialize)]
pub struct WorkloadResponse {
    pub employee_id: UserId,
    pub workload: u32,
}

pub async fn employee_workload(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<WorkloadResponse>> {
    let employee = load_employee(&state, &caller, id).await?;
    Ok(Json(WorkloadResponse {
        workload: state.balancer.workload_of(&employee.id),
        employee_id: employee.id,
    }))
}

/// Open complaints on an employee's desk, earliest deadline first
pub async fn employee_tasks(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Task>>> {
    let employee = load_employee(&state, &caller, id).await?;
    let tasks = state.balancer.tasks_of(&employee.actor(), Utc::now()).await?;
    Ok(Json(tasks))
}

async fn load_employee(state: &AppState, caller: &CurrentUser, id: String) -> ApiResult<User> {
    let id = UserId::new(id);
    caller.require_self_or_government(&id)?;
    let user = state
        .identity
        .lookup(&id)
        .await?
        .filter(|user| user.role == Role::Employee)
        .ok_or_else(|| ApiError::NotFound(format!("Employee {} not found", id)))?;
    Ok(user)
}
