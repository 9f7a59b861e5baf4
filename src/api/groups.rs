//! Study group API endpoints.

use std::collections::BTreeSet;

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::NaiveDateTime;

use super::{created, success, ApiResult};
use crate::models::{
    CreateGroupRequest, JoinGroupRequest, SessionView, StudyGroup, SuggestTimesRequest,
};
use crate::scheduling::SessionAnalytics;
use crate::AppState;

/// GET /api/groups - List all groups.
pub async fn list_groups(State(state): State<AppState>) -> ApiResult<Vec<StudyGroup>> {
    success(state.groups.list_groups().await?)
}

/// GET /api/groups/{id} - Get a single group with its roster.
pub async fn get_group(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StudyGroup> {
    success(state.groups.get_group(&id).await?)
}

/// POST /api/groups - Create a group.
pub async fn create_group(
    State(state): State<AppState>,
    Json(request): Json<CreateGroupRequest>,
) -> ApiResult<StudyGroup> {
    created(state.groups.create_group(&request).await?)
}

/// DELETE /api/groups/{id} - Delete a group and its sessions.
pub async fn delete_group(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    state.groups.delete_group(&id).await?;
    success(())
}

/// POST /api/groups/{id}/members - Add a student to a group.
pub async fn join_group(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<JoinGroupRequest>,
) -> ApiResult<StudyGroup> {
    success(state.groups.join(&id, &request.student_id).await?)
}

/// DELETE /api/groups/{id}/members/{student_id} - Remove a student from a group.
pub async fn leave_group(
    State(state): State<AppState>,
    Path((id, student_id)): Path<(String, String)>,
) -> ApiResult<StudyGroup> {
    success(state.groups.leave(&id, &student_id).await?)
}

/// GET /api/groups/{id}/common-slots - Slots every member is available in.
pub async fn common_slots(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<BTreeSet<String>> {
    success(state.groups.common_slots(&id).await?)
}

/// GET /api/groups/{id}/sessions - The group's sessions in time order.
pub async fn group_sessions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<SessionView>> {
    let sessions = state.scheduler.group_sessions(&id).await?;
    success(sessions.into_iter().map(SessionView::from).collect())
}

/// POST /api/groups/{id}/suggest-times - Free meeting times, best first.
pub async fn suggest_times(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SuggestTimesRequest>,
) -> ApiResult<Vec<NaiveDateTime>> {
    success(
        state
            .scheduler
            .suggest_times(&id, request.duration_minutes, request.count)
            .await?,
    )
}

/// GET /api/groups/{id}/analytics - Attendance, type and conflict statistics.
pub async fn group_analytics(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<SessionAnalytics> {
    success(state.scheduler.analyze(&id).await?)
}
