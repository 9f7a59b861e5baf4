//! Database repository for read access and transaction handles.
//!
//! Reads run on a pooled connection. Mutations go through [`Repository::begin`] so the
//! read-evaluate-write cycle of a scheduling change commits as one unit.

use chrono::NaiveDateTime;
use sqlx::{Sqlite, SqlitePool, Transaction};

use super::queries;
use crate::errors::AppError;
use crate::models::{Session, Student, StudyGroup};

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Start a write transaction. Dropping it without commit rolls back.
    ///
    /// `BEGIN IMMEDIATE` takes the write lock up front, so concurrent writers wait on the
    /// busy timeout instead of failing when their read snapshot goes stale.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, AppError> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }

    /// Cheap connectivity probe for health checks.
    pub async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // ==================== STUDENT OPERATIONS ====================

    pub async fn list_students(&self) -> Result<Vec<Student>, AppError> {
        let mut conn = self.pool.acquire().await?;
        queries::fetch_students(&mut conn).await
    }

    pub async fn get_student(&self, id: &str) -> Result<Option<Student>, AppError> {
        let mut conn = self.pool.acquire().await?;
        queries::fetch_student(&mut conn, id).await
    }

    // ==================== GROUP OPERATIONS ====================

    pub async fn group_members(&self, group_id: &str) -> Result<Vec<Student>, AppError> {
        let mut conn = self.pool.acquire().await?;
        queries::fetch_group_members(&mut conn, group_id).await
    }

    pub async fn list_groups(&self) -> Result<Vec<StudyGroup>, AppError> {
        let mut conn = self.pool.acquire().await?;
        queries::fetch_groups(&mut conn).await
    }

    pub async fn get_group(&self, id: &str) -> Result<Option<StudyGroup>, AppError> {
        let mut conn = self.pool.acquire().await?;
        queries::fetch_group(&mut conn, id).await
    }

    // ==================== SESSION OPERATIONS ====================

    pub async fn get_session(&self, id: &str) -> Result<Option<Session>, AppError> {
        let mut conn = self.pool.acquire().await?;
        queries::fetch_session(&mut conn, id).await
    }

    pub async fn group_sessions(&self, group_id: &str) -> Result<Vec<Session>, AppError> {
        let mut conn = self.pool.acquire().await?;
        queries::fetch_group_sessions(&mut conn, group_id).await
    }

    pub async fn student_sessions(&self, student_id: &str) -> Result<Vec<Session>, AppError> {
        let mut conn = self.pool.acquire().await?;
        queries::fetch_student_sessions(&mut conn, student_id).await
    }

    pub async fn upcoming_sessions(&self, from: NaiveDateTime) -> Result<Vec<Session>, AppError> {
        let mut conn = self.pool.acquire().await?;
        queries::fetch_upcoming_sessions(&mut conn, from).await
    }

    pub async fn sessions_with_conflicts(&self) -> Result<Vec<Session>, AppError> {
        let mut conn = self.pool.acquire().await?;
        queries::fetch_sessions_with_conflicts(&mut conn).await
    }

    pub async fn due_reminders(
        &self,
        from: NaiveDateTime,
        until: NaiveDateTime,
    ) -> Result<Vec<Session>, AppError> {
        let mut conn = self.pool.acquire().await?;
        queries::fetch_due_reminders(&mut conn, from, until).await
    }

    pub async fn mark_reminder_sent(&self, id: &str) -> Result<(), AppError> {
        let mut conn = self.pool.acquire().await?;
        queries::mark_reminder_sent(&mut conn, id).await
    }
}
