//! Session API endpoints.
//!
//! Sessions are returned as [`SessionView`], which carries both the rendered conflict
//! text and the structured conflict details.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{created, success, ApiResult};
use crate::models::{
    AttendanceRequest, CreateSessionRequest, ForceScheduleRequest, SessionNotesRequest,
    SessionView, StatusChangeRequest, UpdateSessionRequest,
};
use crate::AppState;

/// POST /api/sessions - Create a session. Conflicts are reported, not rejected.
pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> ApiResult<SessionView> {
    created(state.scheduler.create(&request).await?.into())
}

/// GET /api/sessions/upcoming - Scheduled sessions that have not started yet.
pub async fn upcoming_sessions(State(state): State<AppState>) -> ApiResult<Vec<SessionView>> {
    let sessions = state.scheduler.upcoming_sessions().await?;
    success(sessions.into_iter().map(SessionView::from).collect())
}

/// GET /api/sessions/conflicts - Sessions with a non-empty conflict list.
pub async fn conflicting_sessions(State(state): State<AppState>) -> ApiResult<Vec<SessionView>> {
    let sessions = state.scheduler.sessions_with_conflicts().await?;
    success(sessions.into_iter().map(SessionView::from).collect())
}

/// GET /api/sessions/{id} - Get a single session.
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<SessionView> {
    success(state.scheduler.get_session(&id).await?.into())
}

/// PUT /api/sessions/{id} - Reschedule or edit a session.
pub async fn update_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateSessionRequest>,
) -> ApiResult<SessionView> {
    success(state.scheduler.update(&id, &request).await?.into())
}

/// DELETE /api/sessions/{id} - Delete a session.
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    state.scheduler.delete(&id).await?;
    success(())
}

/// POST /api/sessions/{id}/force-schedule - Keep a session despite its conflicts.
pub async fn force_schedule(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ForceScheduleRequest>,
) -> ApiResult<SessionView> {
    success(
        state
            .scheduler
            .force_schedule(&id, &request.reason)
            .await?
            .into(),
    )
}

/// POST /api/sessions/{id}/status - Move a session along its lifecycle.
pub async fn change_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<StatusChangeRequest>,
) -> ApiResult<SessionView> {
    success(state.scheduler.transition(&id, request.status).await?.into())
}

/// POST /api/sessions/{id}/attendance - Record how many members showed up.
pub async fn record_attendance(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<AttendanceRequest>,
) -> ApiResult<SessionView> {
    success(
        state
            .scheduler
            .record_attendance(&id, request.actual_attendees)
            .await?
            .into(),
    )
}

/// PUT /api/sessions/{id}/notes - Replace the session notes.
pub async fn update_notes(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SessionNotesRequest>,
) -> ApiResult<SessionView> {
    success(state.scheduler.add_notes(&id, &request.notes).await?.into())
}
