//! Aggregate statistics over a group's session history.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{Session, SessionStatus, SessionType};

/// Attendance, conflict and type statistics for one group.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionAnalytics {
    pub total_sessions: usize,
    pub completed_sessions: usize,
    /// Mean attendance over completed sessions only
    pub average_attendance_percent: f64,
    pub session_type_distribution: BTreeMap<SessionType, usize>,
    pub conflict_rate_percent: f64,
}

pub fn analyze(sessions: &[Session]) -> SessionAnalytics {
    let completed: Vec<&Session> = sessions
        .iter()
        .filter(|s| s.status == SessionStatus::Completed)
        .collect();

    let average_attendance_percent = if completed.is_empty() {
        0.0
    } else {
        completed.iter().map(|s| s.attendance_percent()).sum::<f64>() / completed.len() as f64
    };

    let mut session_type_distribution = BTreeMap::new();
    for session in sessions {
        *session_type_distribution
            .entry(session.session_type)
            .or_insert(0) += 1;
    }

    let with_conflicts = sessions.iter().filter(|s| s.has_conflicts()).count();
    let conflict_rate_percent = if sessions.is_empty() {
        0.0
    } else {
        with_conflicts as f64 / sessions.len() as f64 * 100.0
    };

    SessionAnalytics {
        total_sessions: sessions.len(),
        completed_sessions: completed.len(),
        average_attendance_percent,
        session_type_distribution,
        conflict_rate_percent,
    }
}
