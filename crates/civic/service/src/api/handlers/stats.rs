//! Dashboard statistics

use crate::api::CurrentUser;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::{extract::State, Json};
use civic_lifecycle::ComplaintStatistics;

pub async fn statistics(
    State(state): State<AppState>,
    caller: CurrentUser,
) -> ApiResult<Json<ComplaintStatistics>> {
    caller.require_government()?;
    Ok(Json(state.engine.statistics().await?))
}
