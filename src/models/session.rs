//! Group session model.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::{render_conflicts, Conflict};

/// Default session length in minutes.
pub const DEFAULT_DURATION_MINUTES: i64 = 60;

/// What a session is for.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionType {
    #[default]
    Study,
    Review,
    ExamPrep,
    ProjectWork,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::Study => "STUDY",
            SessionType::Review => "REVIEW",
            SessionType::ExamPrep => "EXAM_PREP",
            SessionType::ProjectWork => "PROJECT_WORK",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "STUDY" => Some(SessionType::Study),
            "REVIEW" => Some(SessionType::Review),
            "EXAM_PREP" => Some(SessionType::ExamPrep),
            "PROJECT_WORK" => Some(SessionType::ProjectWork),
            _ => None,
        }
    }
}

/// Session lifecycle. COMPLETED and CANCELLED are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Scheduled => "SCHEDULED",
            SessionStatus::InProgress => "IN_PROGRESS",
            SessionStatus::Completed => "COMPLETED",
            SessionStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "SCHEDULED" => Some(SessionStatus::Scheduled),
            "IN_PROGRESS" => Some(SessionStatus::InProgress),
            "COMPLETED" => Some(SessionStatus::Completed),
            "CANCELLED" => Some(SessionStatus::Cancelled),
            _ => None,
        }
    }

    #[cfg(test)]
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Cancelled)
    }

    /// Whether the lifecycle permits moving from `self` to `next`.
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        matches!(
            (self, next),
            (SessionStatus::Scheduled, SessionStatus::InProgress)
                | (SessionStatus::InProgress, SessionStatus::Completed)
                | (SessionStatus::Scheduled, SessionStatus::Cancelled)
        )
    }
}

/// A meeting of one study group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub group_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub scheduled_time: NaiveDateTime,
    pub duration_minutes: i64,
    pub session_type: SessionType,
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
    /// Ordered conflict list; empty means clean
    #[serde(default)]
    pub conflicts: Vec<Conflict>,
    /// Expected attendees, kept free of duplicates
    #[serde(default)]
    pub attendee_ids: Vec<String>,
    pub actual_attendees: i64,
    #[serde(skip)]
    pub reminder_sent: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl Session {
    /// Start plus duration. Both are range-checked before a session is stored, so this
    /// cannot overflow.
    pub fn end_time(&self) -> NaiveDateTime {
        self.scheduled_time + Duration::minutes(self.duration_minutes)
    }

    /// True when `[start, end)` intersects this session's window widened by `buffer` on both sides.
    pub fn overlaps(&self, start: NaiveDateTime, end: NaiveDateTime, buffer: Duration) -> bool {
        self.scheduled_time - buffer < end && start < self.end_time() + buffer
    }

    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    /// Register an expected attendee. Adding an existing id is a no-op.
    pub fn add_attendee(&mut self, student_id: &str) {
        if !self.attendee_ids.iter().any(|id| id == student_id) {
            self.attendee_ids.push(student_id.to_string());
        }
    }

    pub fn attendance_percent(&self) -> f64 {
        let expected = self.attendee_ids.len().max(1) as f64;
        self.actual_attendees as f64 / expected * 100.0
    }
}

/// Request body for creating a session.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub group_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub scheduled_time: NaiveDateTime,
    #[serde(default)]
    pub duration_minutes: Option<i64>,
    #[serde(default, alias = "type")]
    pub session_type: Option<SessionType>,
}

/// Request body for updating a session.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSessionRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub scheduled_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub duration_minutes: Option<i64>,
    #[serde(default, alias = "type")]
    pub session_type: Option<SessionType>,
}

/// Request body for a forced schedule override.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForceScheduleRequest {
    #[serde(default)]
    pub reason: String,
}

/// Request body for a status change.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangeRequest {
    pub status: SessionStatus,
}

/// Request body for recording attendance.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRequest {
    pub actual_attendees: i64,
}

/// Request body for session notes.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionNotesRequest {
    pub notes: String,
}

/// Request body for free-time suggestions.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestTimesRequest {
    #[serde(default)]
    pub duration_minutes: Option<i64>,
    #[serde(default)]
    pub count: Option<i64>,
}

/// Externally visible session shape with conflicts rendered to text.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: String,
    pub group_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub scheduled_time: NaiveDateTime,
    pub duration_minutes: i64,
    #[serde(rename = "type")]
    pub session_type: SessionType,
    pub status: SessionStatus,
    pub conflicts: Vec<String>,
    pub conflict_details: Vec<Conflict>,
    pub attendee_ids: Vec<String>,
    pub actual_attendees: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Session> for SessionView {
    fn from(session: Session) -> Self {
        Self {
            conflicts: render_conflicts(&session.conflicts),
            id: session.id,
            group_id: session.group_id,
            title: session.title,
            description: session.description,
            scheduled_time: session.scheduled_time,
            duration_minutes: session.duration_minutes,
            session_type: session.session_type,
            status: session.status,
            conflict_details: session.conflicts,
            attendee_ids: session.attendee_ids,
            actual_attendees: session.actual_attendees,
            notes: session.notes,
            recommendation: session.recommendation,
            created_at: session.created_at,
            updated_at: session.updated_at,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::NaiveDate;

    pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    pub fn session(id: &str, group_id: &str, start: NaiveDateTime, minutes: i64) -> Session {
        Session {
            id: id.to_string(),
            group_id: group_id.to_string(),
            title: format!("Session {}", id),
            description: None,
            scheduled_time: start,
            duration_minutes: minutes,
            session_type: SessionType::Study,
            status: SessionStatus::Scheduled,
            notes: None,
            recommendation: None,
            conflicts: Vec::new(),
            attendee_ids: Vec::new(),
            actual_attendees: 0,
            reminder_sent: false,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }
}
