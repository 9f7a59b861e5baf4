//! Student API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{created, success, ApiResult};
use crate::models::{CreateStudentRequest, SessionView, Student, UpdateAvailabilityRequest};
use crate::AppState;

/// GET /api/students - List all students.
pub async fn list_students(State(state): State<AppState>) -> ApiResult<Vec<Student>> {
    success(state.groups.list_students().await?)
}

/// GET /api/students/{id} - Get a single student.
pub async fn get_student(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Student> {
    success(state.groups.get_student(&id).await?)
}

/// POST /api/students - Register a student.
pub async fn create_student(
    State(state): State<AppState>,
    Json(request): Json<CreateStudentRequest>,
) -> ApiResult<Student> {
    created(state.groups.create_student(&request).await?)
}

/// PUT /api/students/{id}/availability - Replace a student's weekly availability.
pub async fn update_availability(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateAvailabilityRequest>,
) -> ApiResult<Student> {
    success(state.groups.update_availability(&id, &request).await?)
}

/// GET /api/students/{id}/sessions - Sessions of every group the student is in.
pub async fn student_sessions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<SessionView>> {
    let sessions = state.scheduler.student_sessions(&id).await?;
    success(sessions.into_iter().map(SessionView::from).collect())
}
