//! Students, study groups and membership.
//!
//! Every roster or availability change recomputes the affected groups' common slots
//! inside the same transaction.

use std::collections::BTreeSet;

use chrono::Utc;
use sqlx::SqliteConnection;

use crate::db::{self, Repository};
use crate::errors::AppError;
use crate::models::{
    normalize_availability, CreateGroupRequest, CreateStudentRequest, GroupStatus, JoinOutcome,
    Student, StudyGroup, UpdateAvailabilityRequest, DEFAULT_MAX_MEMBERS,
};
use crate::scheduling::availability::is_valid_slot;

#[derive(Clone)]
pub struct GroupService {
    repo: Repository,
}

impl GroupService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    // ==================== STUDENTS ====================

    pub async fn list_students(&self) -> Result<Vec<Student>, AppError> {
        self.repo.list_students().await
    }

    pub async fn get_student(&self, id: &str) -> Result<Student, AppError> {
        self.repo
            .get_student(id)
            .await?
            .ok_or_else(|| AppError::student_not_found(id))
    }

    pub async fn create_student(&self, request: &CreateStudentRequest) -> Result<Student, AppError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Student name is required".to_string()));
        }

        let now = Utc::now().to_rfc3339();
        let student = Student {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            email: request.email.clone().filter(|e| !e.trim().is_empty()),
            availability: checked_availability(&request.availability),
            created_at: now.clone(),
            updated_at: now,
        };

        let mut tx = self.repo.begin().await?;
        db::insert_student(&mut tx, &student).await?;
        tx.commit().await?;

        tracing::info!(student_id = %student.id, "Created student {}", student.name);
        Ok(student)
    }

    /// Replace a student's availability and refresh every group they belong to.
    pub async fn update_availability(
        &self,
        student_id: &str,
        request: &UpdateAvailabilityRequest,
    ) -> Result<Student, AppError> {
        let mut tx = self.repo.begin().await?;

        let mut student = db::fetch_student(&mut tx, student_id)
            .await?
            .ok_or_else(|| AppError::student_not_found(student_id))?;
        student.availability = checked_availability(&request.availability);
        student.updated_at = Utc::now().to_rfc3339();
        db::update_student_availability(&mut tx, &student).await?;

        let group_ids = db::fetch_group_ids_for_student(&mut tx, student_id).await?;
        for group_id in &group_ids {
            if let Some(mut group) = db::fetch_group(&mut tx, group_id).await? {
                refresh_and_save(&mut tx, &mut group).await?;
            }
        }

        tx.commit().await?;

        tracing::info!(
            student_id = %student.id,
            slots = student.availability.len(),
            groups = group_ids.len(),
            "Updated availability"
        );
        Ok(student)
    }

    // ==================== GROUPS ====================

    pub async fn list_groups(&self) -> Result<Vec<StudyGroup>, AppError> {
        self.repo.list_groups().await
    }

    pub async fn get_group(&self, id: &str) -> Result<StudyGroup, AppError> {
        self.repo
            .get_group(id)
            .await?
            .ok_or_else(|| AppError::group_not_found(id))
    }

    pub async fn common_slots(&self, group_id: &str) -> Result<BTreeSet<String>, AppError> {
        Ok(self.get_group(group_id).await?.common_slots)
    }

    /// Create a group; initial members join through the same checks as [`GroupService::join`].
    pub async fn create_group(&self, request: &CreateGroupRequest) -> Result<StudyGroup, AppError> {
        let name = request.name.trim();
        let subject = request.subject.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Group name is required".to_string()));
        }
        if subject.is_empty() {
            return Err(AppError::Validation("Group subject is required".to_string()));
        }
        let max_members = request.max_members.unwrap_or(DEFAULT_MAX_MEMBERS);
        if max_members < 1 {
            return Err(AppError::Validation(
                "Maximum members must be at least 1".to_string(),
            ));
        }

        let now = Utc::now().to_rfc3339();
        let mut group = StudyGroup {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            subject: subject.to_string(),
            description: request.description.clone(),
            max_members,
            current_members: 0,
            status: GroupStatus::Active,
            member_ids: BTreeSet::new(),
            common_slots: BTreeSet::new(),
            created_at: now.clone(),
            updated_at: now,
        };

        let mut tx = self.repo.begin().await?;
        db::insert_group(&mut tx, &group).await?;
        for student_id in &request.member_ids {
            add_member(&mut tx, &mut group, student_id).await?;
        }
        tx.commit().await?;

        tracing::info!(
            group_id = %group.id,
            members = group.current_members,
            "Created group {} ({})",
            group.name,
            group.subject
        );
        Ok(group)
    }

    /// Add a student to a group. Joining twice is a no-op.
    pub async fn join(&self, group_id: &str, student_id: &str) -> Result<StudyGroup, AppError> {
        let mut tx = self.repo.begin().await?;
        let mut group = db::fetch_group(&mut tx, group_id)
            .await?
            .ok_or_else(|| AppError::group_not_found(group_id))?;

        let joined = add_member(&mut tx, &mut group, student_id).await?;
        tx.commit().await?;

        if joined {
            tracing::info!(
                group_id = %group.id,
                student_id = %student_id,
                status = group.status.as_str(),
                "Student joined group"
            );
        }
        Ok(group)
    }

    /// Remove a student from a group. Leaving a group one is not in is a no-op.
    pub async fn leave(&self, group_id: &str, student_id: &str) -> Result<StudyGroup, AppError> {
        let mut tx = self.repo.begin().await?;
        let mut group = db::fetch_group(&mut tx, group_id)
            .await?
            .ok_or_else(|| AppError::group_not_found(group_id))?;
        if db::fetch_student(&mut tx, student_id).await?.is_none() {
            return Err(AppError::student_not_found(student_id));
        }

        if group.remove_member(student_id) {
            refresh_and_save(&mut tx, &mut group).await?;
            tx.commit().await?;
            tracing::info!(group_id = %group.id, student_id = %student_id, "Student left group");
        }
        Ok(group)
    }

    /// Delete a group together with its sessions and membership rows.
    pub async fn delete_group(&self, group_id: &str) -> Result<(), AppError> {
        let mut tx = self.repo.begin().await?;
        if !db::delete_group(&mut tx, group_id).await? {
            return Err(AppError::group_not_found(group_id));
        }
        tx.commit().await?;

        tracing::info!(group_id = %group_id, "Deleted group");
        Ok(())
    }
}

/// Returns true when the student was newly added.
async fn add_member(
    conn: &mut SqliteConnection,
    group: &mut StudyGroup,
    student_id: &str,
) -> Result<bool, AppError> {
    if db::fetch_student(conn, student_id).await?.is_none() {
        return Err(AppError::student_not_found(student_id));
    }

    match group.add_member(student_id) {
        JoinOutcome::Joined => {
            refresh_and_save(conn, group).await?;
            Ok(true)
        }
        JoinOutcome::AlreadyMember => Ok(false),
        JoinOutcome::Full => Err(AppError::Validation(format!(
            "Group {} is full ({} of {} members)",
            group.name, group.current_members, group.max_members
        ))),
        JoinOutcome::Closed => Err(AppError::Validation(format!(
            "Group {} is {} and not accepting members",
            group.name,
            group.status.as_str().to_lowercase()
        ))),
    }
}

/// Recompute common slots from the in-memory roster and persist the group.
async fn refresh_and_save(
    conn: &mut SqliteConnection,
    group: &mut StudyGroup,
) -> Result<(), AppError> {
    let mut members = Vec::with_capacity(group.member_ids.len());
    for id in &group.member_ids {
        if let Some(student) = db::fetch_student(conn, id).await? {
            members.push(student);
        }
    }
    group.refresh_common_slots(&members);
    group.updated_at = Utc::now().to_rfc3339();
    db::save_group(conn, group).await
}

fn checked_availability(tokens: &[String]) -> BTreeSet<String> {
    let availability = normalize_availability(tokens);
    for token in availability.iter().filter(|t| !is_valid_slot(t)) {
        tracing::warn!("Storing unparsable availability slot {:?}; it will never be scheduled", token);
    }
    availability
}
