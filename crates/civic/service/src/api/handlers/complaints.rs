//! Complaint lifecycle handlers

use crate::api::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use civic_lifecycle::{ComplaintQuery, CreateComplaint, TransitionOutcome, TransitionPayload};
use civic_types::{
    Category, Complaint, ComplaintId, ComplaintStatus, ImageAttachment, Location, Priority,
    TimelineEvent, UserId,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Create complaint request; images are references returned by `POST /attachments`
#[derive(Debug, Deserialize)]
pub struct CreateComplaintRequest {
    #[serde(default)]
    pub title: Option<String>,
    pub category: Category,
    pub description: String,
    pub location: Location,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub contact: Option<String>,
}

pub async fn create_complaint(
    State(state): State<AppState>,
    caller: CurrentUser,
    Json(request): Json<CreateComplaintRequest>,
) -> ApiResult<(StatusCode, Json<Complaint>)> {
    let images = resolve_images(&state, &request.images).await?;
    let complaint = state
        .engine
        .create(
            &caller.actor(),
            CreateComplaint {
                title: request.title,
                category: request.category,
                description: request.description,
                location: request.location,
                priority: request.priority.unwrap_or(Priority::Medium),
                images,
                contact: request.contact,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(complaint)))
}

/// Stored metadata is authoritative for size and MIME type.
async fn resolve_images(state: &AppState, references: &[String]) -> ApiResult<Vec<ImageAttachment>> {
    let mut images = Vec::with_capacity(references.len());
    for reference in references {
        let image = state
            .attachments
            .get_attachment(reference)
            .await?
            .ok_or_else(|| ApiError::Validation(format!("unknown attachment {reference}")))?;
        images.push(image);
    }
    Ok(images)
}

/// List query params; enum values use their wire names
#[derive(Debug, Default, Deserialize)]
pub struct ListComplaintsQuery {
    pub status: Option<String>,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub assigned_to: Option<String>,
    pub search: Option<String>,
    pub overdue: Option<bool>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

impl ListComplaintsQuery {
    fn into_query(self) -> ApiResult<ComplaintQuery> {
        Ok(ComplaintQuery {
            status: parse_opt::<ComplaintStatus>(self.status)?,
            category: parse_opt::<Category>(self.category)?,
            priority: parse_opt::<Priority>(self.priority)?,
            assigned_to: self.assigned_to.filter(|s| !s.is_empty()).map(UserId::new),
            search: self.search.filter(|s| !s.trim().is_empty()),
            overdue: self.overdue,
            limit: self.limit,
            offset: self.offset,
        })
    }
}

fn parse_opt<T>(value: Option<String>) -> ApiResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .filter(|v| !v.is_empty())
        .map(|v| v.parse::<T>().map_err(|e| ApiError::BadRequest(e.to_string())))
        .transpose()
}

/// Complaints visible to the caller, newest first
pub async fn list_complaints(
    State(state): State<AppState>,
    caller: CurrentUser,
    Query(params): Query<ListComplaintsQuery>,
) -> ApiResult<Json<Vec<Complaint>>> {
    let query = params.into_query()?;
    Ok(Json(state.engine.list(&caller.actor(), &query).await?))
}

pub async fn get_complaint(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Complaint>> {
    let complaint = state
        .engine
        .get_for(&ComplaintId::new(id), &caller.actor())
        .await?;
    Ok(Json(complaint))
}

pub async fn complaint_timeline(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<TimelineEvent>>> {
    let complaint = state
        .engine
        .get_for(&ComplaintId::new(id), &caller.actor())
        .await?;
    Ok(Json(complaint.timeline))
}

/// Result of a transition request
#[derive(Debug, Serialize)]
pub struct TransitionResponse {
    pub complaint: Complaint,
    /// True when the request repeated an already-committed transition
    pub replayed: bool,
}

impl From<TransitionOutcome> for TransitionResponse {
    fn from(outcome: TransitionOutcome) -> Self {
        let replayed = outcome.is_replay();
        Self {
            complaint: outcome.into_complaint(),
            replayed,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub employee_id: UserId,
}

pub async fn assign_complaint(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<String>,
    Json(request): Json<AssignRequest>,
) -> ApiResult<Json<TransitionResponse>> {
    let outcome = state
        .balancer
        .assign(&ComplaintId::new(id), &request.employee_id, &caller.actor())
        .await?;
    Ok(Json(outcome.into()))
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub status: ComplaintStatus,
    #[serde(default)]
    pub employee_id: Option<UserId>,
    #[serde(default)]
    pub proof: Option<String>,
}

pub async fn transition_complaint(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<String>,
    Json(request): Json<TransitionRequest>,
) -> ApiResult<Json<TransitionResponse>> {
    let payload = TransitionPayload {
        employee_id: request.employee_id,
        proof: request.proof,
    };
    let outcome = state
        .engine
        .transition(&ComplaintId::new(id), &caller.actor(), request.status, payload)
        .await?;
    Ok(Json(outcome.into()))
}
