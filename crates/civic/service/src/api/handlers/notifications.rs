//! Notification inbox handlers

use crate::api::CurrentUser;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use civic_notify::Notification;
use civic_types::NotificationId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
pub struct ListNotificationsQuery {
    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Debug, Serialize)]
pub struct InboxResponse {
    pub unread: usize,
    pub notifications: Vec<Notification>,
}

/// The caller's inbox, newest first
pub async fn list_notifications(
    State(state): State<AppState>,
    caller: CurrentUser,
    Query(query): Query<ListNotificationsQuery>,
) -> ApiResult<Json<InboxResponse>> {
    let user = &caller.0.id;
    Ok(Json(InboxResponse {
        unread: state.inbox.unread_count(user)?,
        notifications: state.inbox.list(user, query.unread_only)?,
    }))
}

pub async fn mark_read(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Notification>> {
    let notification = state
        .inbox
        .mark_read(&caller.0.id, &NotificationId::new(id))?;
    Ok(Json(notification))
}

#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    pub marked: usize,
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    caller: CurrentUser,
) -> ApiResult<Json<MarkAllReadResponse>> {
    let marked = state.inbox.mark_all_read(&caller.0.id)?;
    Ok(Json(MarkAllReadResponse { marked }))
}
