//! Group session scheduling engine.
//!
//! Everything in here is synchronous and free of I/O. The engine reads the current
//! state of groups, students and sessions through [`ScheduleSource`]; the service
//! layer loads a [`ScheduleSnapshot`] inside a transaction and hands it in.

pub mod analytics;
pub mod availability;
pub mod conflicts;
pub mod scoring;
pub mod search;

pub use analytics::{analyze, SessionAnalytics};
pub use conflicts::ConflictDetector;
pub use search::TimeSlotSearch;

use std::collections::HashMap;

use chrono::{Duration, NaiveDateTime};

use crate::models::{Session, SessionStatus, Student, StudyGroup};

/// Scheduling heuristics. These are fixed policy, not per-request input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulingRules {
    /// Days scanned ahead of today when suggesting times
    pub horizon_days: u64,
    /// Minimum gap kept around sessions sharing a member
    pub overlap_buffer_minutes: i64,
    /// Sessions per group per day at which overload is reported
    pub daily_session_limit: usize,
    /// Alternatives attached to a conflicting session
    pub alternative_count: usize,
}

impl Default for SchedulingRules {
    fn default() -> Self {
        Self {
            horizon_days: 14,
            overlap_buffer_minutes: 30,
            daily_session_limit: 2,
            alternative_count: 3,
        }
    }
}

impl SchedulingRules {
    pub fn overlap_buffer(&self) -> Duration {
        Duration::minutes(self.overlap_buffer_minutes)
    }
}

/// Read access to the state scheduling decisions are based on.
pub trait ScheduleSource {
    /// Sessions whose `[start, end)` intersects the given window.
    fn sessions_in_window(&self, start: NaiveDateTime, end: NaiveDateTime) -> Vec<&Session>;
    fn sessions_for_group(&self, group_id: &str) -> Vec<&Session>;
    fn group(&self, id: &str) -> Option<&StudyGroup>;
    fn student(&self, id: &str) -> Option<&Student>;
}

/// True when `session` belongs to `group` or to a group sharing a member with it.
pub(crate) fn touches_group<S: ScheduleSource + ?Sized>(
    source: &S,
    session: &Session,
    group: &StudyGroup,
) -> bool {
    if session.status == SessionStatus::Cancelled {
        return false;
    }
    session.group_id == group.id
        || source
            .group(&session.group_id)
            .is_some_and(|other| other.shares_member_with(group))
}

/// In-memory view of the relevant part of the schedule.
#[derive(Debug, Clone, Default)]
pub struct ScheduleSnapshot {
    sessions: Vec<Session>,
    groups: HashMap<String, StudyGroup>,
    students: HashMap<String, Student>,
}

impl ScheduleSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a session by id.
    pub fn put_session(&mut self, session: Session) {
        match self.sessions.iter_mut().find(|s| s.id == session.id) {
            Some(existing) => *existing = session,
            None => self.sessions.push(session),
        }
    }

    pub fn put_group(&mut self, group: StudyGroup) {
        self.groups.insert(group.id.clone(), group);
    }

    pub fn put_student(&mut self, student: Student) {
        self.students.insert(student.id.clone(), student);
    }

    pub fn has_group(&self, id: &str) -> bool {
        self.groups.contains_key(id)
    }

    #[cfg(test)]
    pub fn with_session(mut self, session: Session) -> Self {
        self.put_session(session);
        self
    }

    #[cfg(test)]
    pub fn with_group(mut self, group: StudyGroup) -> Self {
        self.put_group(group);
        self
    }

    #[cfg(test)]
    pub fn with_student(mut self, student: Student) -> Self {
        self.put_student(student);
        self
    }
}

impl ScheduleSource for ScheduleSnapshot {
    fn sessions_in_window(&self, start: NaiveDateTime, end: NaiveDateTime) -> Vec<&Session> {
        self.sessions
            .iter()
            .filter(|s| s.overlaps(start, end, Duration::zero()))
            .collect()
    }

    fn sessions_for_group(&self, group_id: &str) -> Vec<&Session> {
        self.sessions
            .iter()
            .filter(|s| s.group_id == group_id)
            .collect()
    }

    fn group(&self, id: &str) -> Option<&StudyGroup> {
        self.groups.get(id)
    }

    fn student(&self, id: &str) -> Option<&Student> {
        self.students.get(id)
    }
}
