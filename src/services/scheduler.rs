//! Session lifecycle: creation, rescheduling, overrides and history.
//!
//! Each mutation loads a [`crate::scheduling::ScheduleSnapshot`] inside its transaction,
//! runs the pure engine against it and writes the result before committing. Conflicts
//! are recorded on the session, never raised.

use std::sync::Arc;

use chrono::{Datelike, Days, Local, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use super::advice::{self, AdviceProvider};
use super::notifier::{notify_members, NotificationKind, Notifier};
use crate::db::{self, Repository};
use crate::errors::AppError;
use crate::models::{
    Conflict, CreateSessionRequest, Session, SessionStatus, StudyGroup, UpdateSessionRequest,
    DEFAULT_DURATION_MINUTES,
};
use crate::scheduling::{
    analyze, ConflictDetector, ScheduleSource, SchedulingRules, SessionAnalytics, TimeSlotSearch,
};

/// Suggestions returned when the caller does not ask for a count.
pub const DEFAULT_SUGGESTION_COUNT: i64 = 5;
/// Upper bound on requested suggestions.
pub const MAX_SUGGESTION_COUNT: i64 = 20;
/// Longest session accepted, one week.
pub const MAX_DURATION_MINUTES: i64 = 7 * 24 * 60;
/// Start times must have four digit years so stored text sorts chronologically.
const SCHEDULABLE_YEARS: std::ops::RangeInclusive<i32> = 1000..=9999;

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

pub struct SessionScheduler {
    repo: Repository,
    rules: SchedulingRules,
    notifier: Arc<dyn Notifier>,
    advice: Arc<dyn AdviceProvider>,
    clock: fn() -> NaiveDateTime,
}

impl SessionScheduler {
    pub fn new(
        repo: Repository,
        rules: SchedulingRules,
        notifier: Arc<dyn Notifier>,
        advice: Arc<dyn AdviceProvider>,
    ) -> Self {
        Self {
            repo,
            rules,
            notifier,
            advice,
            clock: local_now,
        }
    }

    /// Replace the wall clock to pin "today".
    #[cfg(test)]
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    fn today(&self) -> NaiveDate {
        (self.clock)().date()
    }

    // ==================== QUERIES ====================

    pub async fn get_session(&self, id: &str) -> Result<Session, AppError> {
        self.repo
            .get_session(id)
            .await?
            .ok_or_else(|| AppError::session_not_found(id))
    }

    pub async fn group_sessions(&self, group_id: &str) -> Result<Vec<Session>, AppError> {
        self.require_group(group_id).await?;
        self.repo.group_sessions(group_id).await
    }

    pub async fn student_sessions(&self, student_id: &str) -> Result<Vec<Session>, AppError> {
        if self.repo.get_student(student_id).await?.is_none() {
            return Err(AppError::student_not_found(student_id));
        }
        self.repo.student_sessions(student_id).await
    }

    /// Scheduled sessions that have not started yet, soonest first.
    pub async fn upcoming_sessions(&self) -> Result<Vec<Session>, AppError> {
        self.repo.upcoming_sessions((self.clock)()).await
    }

    pub async fn sessions_with_conflicts(&self) -> Result<Vec<Session>, AppError> {
        self.repo.sessions_with_conflicts().await
    }

    pub async fn analyze(&self, group_id: &str) -> Result<SessionAnalytics, AppError> {
        let sessions = self.group_sessions(group_id).await?;
        Ok(analyze(&sessions))
    }

    /// Free start times for the whole group within the search horizon, best first.
    pub async fn suggest_times(
        &self,
        group_id: &str,
        duration_minutes: Option<i64>,
        count: Option<i64>,
    ) -> Result<Vec<NaiveDateTime>, AppError> {
        let duration = validate_duration(duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES))?;
        let count = count.unwrap_or(DEFAULT_SUGGESTION_COUNT);
        if !(1..=MAX_SUGGESTION_COUNT).contains(&count) {
            return Err(AppError::Validation(format!(
                "Count must be between 1 and {}",
                MAX_SUGGESTION_COUNT
            )));
        }

        let today = self.today();
        let mut tx = self.repo.begin().await?;
        let snapshot =
            db::load_snapshot(&mut tx, group_id, &[self.horizon_window(today, duration)]).await?;
        tx.commit().await?;

        let group = snapshot
            .group(group_id)
            .ok_or_else(|| AppError::group_not_found(group_id))?;
        Ok(TimeSlotSearch::new(&snapshot, self.rules, today).suggest(
            group,
            duration,
            count as usize,
        ))
    }

    // ==================== MUTATIONS ====================

    /// Create a session. Conflicts never block creation; they come back on the session.
    pub async fn create(&self, request: &CreateSessionRequest) -> Result<Session, AppError> {
        let title = validate_title(&request.title)?;
        let duration =
            validate_duration(request.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES))?;
        let scheduled_time = validate_scheduled_time(request.scheduled_time)?;

        let today = self.today();
        let mut tx = self.repo.begin().await?;
        let group = db::fetch_group(&mut tx, &request.group_id)
            .await?
            .ok_or_else(|| AppError::group_not_found(&request.group_id))?;

        let now = Utc::now().to_rfc3339();
        let session_type = request.session_type.unwrap_or_default();
        let mut session = Session {
            id: uuid::Uuid::new_v4().to_string(),
            group_id: group.id.clone(),
            title,
            description: request.description.clone(),
            scheduled_time,
            duration_minutes: duration,
            session_type,
            status: SessionStatus::Scheduled,
            notes: None,
            recommendation: Some(advice::recommendation(
                &self.advice.advice(&group.subject),
                session_type,
            )),
            conflicts: Vec::new(),
            attendee_ids: Vec::new(),
            actual_attendees: 0,
            reminder_sent: false,
            created_at: now.clone(),
            updated_at: now,
        };

        session.conflicts = self.evaluate(&mut tx, &session, today).await?;
        for member_id in &group.member_ids {
            session.add_attendee(member_id);
        }
        db::insert_session(&mut tx, &session).await?;
        let members = db::fetch_group_members(&mut tx, &group.id).await?;
        tx.commit().await?;

        tracing::info!(
            session_id = %session.id,
            group_id = %session.group_id,
            scheduled_time = %session.scheduled_time,
            conflicts = session.conflicts.len(),
            "Created session {}",
            session.title
        );
        notify_members(
            self.notifier.as_ref(),
            &session,
            &members,
            NotificationKind::SessionCreated,
        );
        Ok(session)
    }

    /// Apply changes and re-evaluate. The previous conflict list is replaced.
    pub async fn update(
        &self,
        id: &str,
        request: &UpdateSessionRequest,
    ) -> Result<Session, AppError> {
        let today = self.today();
        let mut tx = self.repo.begin().await?;
        let mut session = db::fetch_session(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::session_not_found(id))?;

        if let Some(title) = &request.title {
            session.title = validate_title(title)?;
        }
        if let Some(description) = &request.description {
            session.description = Some(description.clone());
        }
        if let Some(scheduled_time) = request.scheduled_time {
            session.scheduled_time = validate_scheduled_time(scheduled_time)?;
        }
        if let Some(duration) = request.duration_minutes {
            session.duration_minutes = validate_duration(duration)?;
        }
        if let Some(session_type) = request.session_type {
            session.session_type = session_type;
        }

        session.conflicts = self.evaluate(&mut tx, &session, today).await?;
        session.updated_at = Utc::now().to_rfc3339();
        db::save_session(&mut tx, &session).await?;
        tx.commit().await?;

        tracing::info!(
            session_id = %session.id,
            scheduled_time = %session.scheduled_time,
            conflicts = session.conflicts.len(),
            "Updated session"
        );
        Ok(session)
    }

    /// Commit a session despite its conflicts, recording the override.
    pub async fn force_schedule(&self, id: &str, reason: &str) -> Result<Session, AppError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(AppError::Validation(
                "A reason is required to force schedule a session".to_string(),
            ));
        }

        let mut tx = self.repo.begin().await?;
        let mut session = db::fetch_session(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::session_not_found(id))?;

        session.conflicts.push(Conflict::Forced {
            reason: reason.to_string(),
        });
        session.status = SessionStatus::Scheduled;
        session.updated_at = Utc::now().to_rfc3339();
        db::save_session(&mut tx, &session).await?;
        let members = db::fetch_group_members(&mut tx, &session.group_id).await?;
        tx.commit().await?;

        tracing::warn!(
            session_id = %session.id,
            conflicts = session.conflicts.len(),
            "Session force-scheduled: {}",
            reason
        );
        notify_members(
            self.notifier.as_ref(),
            &session,
            &members,
            NotificationKind::ForceScheduled,
        );
        Ok(session)
    }

    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        let mut tx = self.repo.begin().await?;
        if !db::delete_session(&mut tx, id).await? {
            return Err(AppError::session_not_found(id));
        }
        tx.commit().await?;

        tracing::info!(session_id = %id, "Deleted session");
        Ok(())
    }

    /// Move a session along its lifecycle. Requesting the current status is a no-op.
    pub async fn transition(&self, id: &str, status: SessionStatus) -> Result<Session, AppError> {
        let mut tx = self.repo.begin().await?;
        let mut session = db::fetch_session(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::session_not_found(id))?;

        if session.status == status {
            return Ok(session);
        }
        if !session.status.can_transition_to(status) {
            return Err(AppError::Validation(format!(
                "Cannot move session from {} to {}",
                session.status.as_str(),
                status.as_str()
            )));
        }

        let previous = session.status;
        session.status = status;
        session.updated_at = Utc::now().to_rfc3339();
        db::save_session(&mut tx, &session).await?;
        tx.commit().await?;

        tracing::info!(
            session_id = %session.id,
            from = previous.as_str(),
            to = status.as_str(),
            "Session status changed"
        );
        Ok(session)
    }

    pub async fn record_attendance(&self, id: &str, actual: i64) -> Result<Session, AppError> {
        let mut tx = self.repo.begin().await?;
        let mut session = db::fetch_session(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::session_not_found(id))?;

        let expected = session.attendee_ids.len() as i64;
        if actual < 0 || actual > expected {
            return Err(AppError::Validation(format!(
                "Actual attendees must be between 0 and {}",
                expected
            )));
        }

        session.actual_attendees = actual;
        session.updated_at = Utc::now().to_rfc3339();
        db::save_session(&mut tx, &session).await?;
        tx.commit().await?;
        Ok(session)
    }

    pub async fn add_notes(&self, id: &str, notes: &str) -> Result<Session, AppError> {
        let mut tx = self.repo.begin().await?;
        let mut session = db::fetch_session(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::session_not_found(id))?;

        session.notes = Some(notes.to_string());
        session.updated_at = Utc::now().to_rfc3339();
        db::save_session(&mut tx, &session).await?;
        tx.commit().await?;
        Ok(session)
    }

    /// Send SESSION_REMINDER for scheduled sessions starting within `lead_minutes`.
    ///
    /// Returns how many sessions were reminded.
    pub async fn send_due_reminders(&self, lead_minutes: i64) -> Result<usize, AppError> {
        let now = (self.clock)();
        let until = chrono::Duration::try_minutes(lead_minutes)
            .and_then(|lead| now.checked_add_signed(lead))
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "Reminder lead of {} minutes is out of range",
                    lead_minutes
                ))
            })?;
        let due = self.repo.due_reminders(now, until).await?;

        for session in &due {
            let members = self.repo.group_members(&session.group_id).await?;
            notify_members(
                self.notifier.as_ref(),
                session,
                &members,
                NotificationKind::SessionReminder,
            );
            self.repo.mark_reminder_sent(&session.id).await?;
        }
        Ok(due.len())
    }

    // ==================== HELPERS ====================

    async fn require_group(&self, group_id: &str) -> Result<StudyGroup, AppError> {
        self.repo
            .get_group(group_id)
            .await?
            .ok_or_else(|| AppError::group_not_found(group_id))
    }

    /// Run the detector against a snapshot covering everything it may look at.
    async fn evaluate(
        &self,
        conn: &mut sqlx::SqliteConnection,
        session: &Session,
        today: NaiveDate,
    ) -> Result<Vec<Conflict>, AppError> {
        let windows = [
            self.session_window(session),
            self.horizon_window(today, session.duration_minutes),
        ];
        let snapshot = db::load_snapshot(conn, &session.group_id, &windows).await?;
        let conflicts = ConflictDetector::new(&snapshot, self.rules, today).evaluate(session);
        tracing::debug!(
            session_id = %session.id,
            kinds = ?conflicts.iter().map(Conflict::kind).collect::<Vec<_>>(),
            "Evaluated session"
        );
        Ok(conflicts)
    }

    /// The session's calendar day plus its buffered interval.
    fn session_window(&self, session: &Session) -> (NaiveDateTime, NaiveDateTime) {
        let buffer = self.rules.overlap_buffer();
        let (day_start, day_end) = db::day_window(session.scheduled_time.date(), buffer);
        (
            day_start.min(session.scheduled_time - buffer),
            day_end.max(session.end_time() + buffer),
        )
    }

    /// Every busy window the search may check for a `duration` minute candidate.
    fn horizon_window(&self, today: NaiveDate, duration: i64) -> (NaiveDateTime, NaiveDateTime) {
        let buffer = self.rules.overlap_buffer();
        let first = today + Days::new(1);
        let after_last = today + Days::new(self.rules.horizon_days + 1);
        (
            first.and_time(NaiveTime::MIN) - buffer,
            after_last.and_time(NaiveTime::MIN) + chrono::Duration::minutes(duration) + buffer,
        )
    }
}

fn validate_title(title: &str) -> Result<String, AppError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("Session title is required".to_string()));
    }
    Ok(title.to_string())
}

fn validate_duration(minutes: i64) -> Result<i64, AppError> {
    if minutes <= 0 {
        return Err(AppError::Validation(
            "Duration must be a positive number of minutes".to_string(),
        ));
    }
    if minutes > MAX_DURATION_MINUTES {
        return Err(AppError::Validation(format!(
            "Duration must not exceed {} minutes",
            MAX_DURATION_MINUTES
        )));
    }
    Ok(minutes)
}

fn validate_scheduled_time(time: NaiveDateTime) -> Result<NaiveDateTime, AppError> {
    if !SCHEDULABLE_YEARS.contains(&time.year()) {
        return Err(AppError::Validation(format!(
            "Scheduled time {} is out of range",
            time
        )));
    }
    Ok(time)
}
