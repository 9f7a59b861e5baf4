//! Connection-level queries.
//!
//! Every function takes a `&mut SqliteConnection` so it can run either on a pooled
//! connection or inside a transaction (`&mut *tx`).

use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use crate::errors::AppError;
use crate::models::{GroupStatus, Session, SessionStatus, SessionType, Student, StudyGroup};
use crate::scheduling::ScheduleSnapshot;

/// Storage format for session times. Fixed width, so text comparison orders correctly.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const STUDENT_COLUMNS: &str = "id, name, email, availability, created_at, updated_at";

const GROUP_COLUMNS: &str = "id, name, subject, description, max_members, current_members, status, common_slots, created_at, updated_at";

const SESSION_COLUMNS: &str = "id, group_id, title, description, scheduled_time, duration_minutes, session_type, status, notes, recommendation, conflicts, attendee_ids, actual_attendees, reminder_sent, created_at, updated_at";

pub fn format_datetime(dt: NaiveDateTime) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

pub fn parse_datetime(s: &str) -> Result<NaiveDateTime, AppError> {
    NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
        .map_err(|e| AppError::Internal(format!("Invalid stored datetime {:?}: {}", s, e)))
}

// ==================== STUDENTS ====================

pub async fn fetch_students(conn: &mut SqliteConnection) -> Result<Vec<Student>, AppError> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM students ORDER BY name",
        STUDENT_COLUMNS
    ))
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.iter().map(student_from_row).collect())
}

pub async fn fetch_student(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<Student>, AppError> {
    let row = sqlx::query(&format!("SELECT {} FROM students WHERE id = ?", STUDENT_COLUMNS))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.as_ref().map(student_from_row))
}

/// Current members of a group, in name order.
pub async fn fetch_group_members(
    conn: &mut SqliteConnection,
    group_id: &str,
) -> Result<Vec<Student>, AppError> {
    let rows = sqlx::query(
        "SELECT s.id, s.name, s.email, s.availability, s.created_at, s.updated_at
         FROM students s
         JOIN group_members gm ON gm.student_id = s.id
         WHERE gm.group_id = ?
         ORDER BY s.name",
    )
    .bind(group_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.iter().map(student_from_row).collect())
}

pub async fn insert_student(conn: &mut SqliteConnection, student: &Student) -> Result<(), AppError> {
    let availability_json = serde_json::to_string(&student.availability)?;

    sqlx::query(
        "INSERT INTO students (id, name, email, availability, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&student.id)
    .bind(&student.name)
    .bind(&student.email)
    .bind(&availability_json)
    .bind(&student.created_at)
    .bind(&student.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn update_student_availability(
    conn: &mut SqliteConnection,
    student: &Student,
) -> Result<(), AppError> {
    let availability_json = serde_json::to_string(&student.availability)?;

    sqlx::query("UPDATE students SET availability = ?, updated_at = ? WHERE id = ?")
        .bind(&availability_json)
        .bind(&student.updated_at)
        .bind(&student.id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

// ==================== GROUPS ====================

pub async fn fetch_groups(conn: &mut SqliteConnection) -> Result<Vec<StudyGroup>, AppError> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM study_groups ORDER BY name",
        GROUP_COLUMNS
    ))
    .fetch_all(&mut *conn)
    .await?;

    let mut groups: Vec<StudyGroup> = rows.iter().map(group_from_row).collect();
    for group in &mut groups {
        group.member_ids = fetch_member_ids(conn, &group.id).await?;
    }
    Ok(groups)
}

/// Load a group together with its roster.
pub async fn fetch_group(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<StudyGroup>, AppError> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM study_groups WHERE id = ?",
        GROUP_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let mut group = group_from_row(&row);
    group.member_ids = fetch_member_ids(conn, id).await?;
    Ok(Some(group))
}

/// Ids of every group the student belongs to.
pub async fn fetch_group_ids_for_student(
    conn: &mut SqliteConnection,
    student_id: &str,
) -> Result<Vec<String>, AppError> {
    let rows = sqlx::query("SELECT group_id FROM group_members WHERE student_id = ? ORDER BY group_id")
        .bind(student_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows.iter().map(|row| row.get("group_id")).collect())
}

async fn fetch_member_ids(
    conn: &mut SqliteConnection,
    group_id: &str,
) -> Result<BTreeSet<String>, AppError> {
    let rows = sqlx::query("SELECT student_id FROM group_members WHERE group_id = ?")
        .bind(group_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows.iter().map(|row| row.get("student_id")).collect())
}

pub async fn insert_group(conn: &mut SqliteConnection, group: &StudyGroup) -> Result<(), AppError> {
    let common_slots_json = serde_json::to_string(&group.common_slots)?;

    sqlx::query(
        "INSERT INTO study_groups (id, name, subject, description, max_members, current_members, status, common_slots, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&group.id)
    .bind(&group.name)
    .bind(&group.subject)
    .bind(&group.description)
    .bind(group.max_members)
    .bind(group.current_members)
    .bind(group.status.as_str())
    .bind(&common_slots_json)
    .bind(&group.created_at)
    .bind(&group.updated_at)
    .execute(&mut *conn)
    .await?;

    replace_members(conn, group).await
}

/// Persist roster, counters, status and common slots of an existing group.
pub async fn save_group(conn: &mut SqliteConnection, group: &StudyGroup) -> Result<(), AppError> {
    let common_slots_json = serde_json::to_string(&group.common_slots)?;

    sqlx::query(
        "UPDATE study_groups SET current_members = ?, status = ?, common_slots = ?, updated_at = ? WHERE id = ?",
    )
    .bind(group.current_members)
    .bind(group.status.as_str())
    .bind(&common_slots_json)
    .bind(&group.updated_at)
    .bind(&group.id)
    .execute(&mut *conn)
    .await?;

    replace_members(conn, group).await
}

async fn replace_members(conn: &mut SqliteConnection, group: &StudyGroup) -> Result<(), AppError> {
    sqlx::query("DELETE FROM group_members WHERE group_id = ?")
        .bind(&group.id)
        .execute(&mut *conn)
        .await?;

    for student_id in &group.member_ids {
        sqlx::query("INSERT INTO group_members (group_id, student_id) VALUES (?, ?)")
            .bind(&group.id)
            .bind(student_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Delete a group. Members and sessions go with it through the foreign keys.
pub async fn delete_group(conn: &mut SqliteConnection, id: &str) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM study_groups WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

// ==================== SESSIONS ====================

pub async fn fetch_session(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<Session>, AppError> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM group_sessions WHERE id = ?",
        SESSION_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(session_from_row).transpose()
}

/// Sessions whose `[scheduled_time, ends_at)` intersects `[start, end)`.
pub async fn fetch_sessions_in_window(
    conn: &mut SqliteConnection,
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Result<Vec<Session>, AppError> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM group_sessions WHERE scheduled_time < ? AND ends_at > ? ORDER BY scheduled_time",
        SESSION_COLUMNS
    ))
    .bind(format_datetime(end))
    .bind(format_datetime(start))
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(session_from_row).collect()
}

pub async fn fetch_group_sessions(
    conn: &mut SqliteConnection,
    group_id: &str,
) -> Result<Vec<Session>, AppError> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM group_sessions WHERE group_id = ? ORDER BY scheduled_time",
        SESSION_COLUMNS
    ))
    .bind(group_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(session_from_row).collect()
}

/// Scheduled sessions starting at or after `from`, soonest first.
pub async fn fetch_upcoming_sessions(
    conn: &mut SqliteConnection,
    from: NaiveDateTime,
) -> Result<Vec<Session>, AppError> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM group_sessions WHERE status = 'SCHEDULED' AND scheduled_time >= ? ORDER BY scheduled_time",
        SESSION_COLUMNS
    ))
    .bind(format_datetime(from))
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(session_from_row).collect()
}

/// Sessions of every group the student belongs to.
pub async fn fetch_student_sessions(
    conn: &mut SqliteConnection,
    student_id: &str,
) -> Result<Vec<Session>, AppError> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM group_sessions WHERE group_id IN (SELECT group_id FROM group_members WHERE student_id = ?) ORDER BY scheduled_time",
        SESSION_COLUMNS
    ))
    .bind(student_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(session_from_row).collect()
}

pub async fn fetch_sessions_with_conflicts(
    conn: &mut SqliteConnection,
) -> Result<Vec<Session>, AppError> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM group_sessions WHERE conflicts != '[]' ORDER BY scheduled_time",
        SESSION_COLUMNS
    ))
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(session_from_row).collect()
}

/// Scheduled sessions starting in `[from, until]` that have not been reminded yet.
pub async fn fetch_due_reminders(
    conn: &mut SqliteConnection,
    from: NaiveDateTime,
    until: NaiveDateTime,
) -> Result<Vec<Session>, AppError> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM group_sessions WHERE status = 'SCHEDULED' AND reminder_sent = 0 AND scheduled_time >= ? AND scheduled_time <= ? ORDER BY scheduled_time",
        SESSION_COLUMNS
    ))
    .bind(format_datetime(from))
    .bind(format_datetime(until))
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(session_from_row).collect()
}

pub async fn mark_reminder_sent(conn: &mut SqliteConnection, id: &str) -> Result<(), AppError> {
    sqlx::query("UPDATE group_sessions SET reminder_sent = 1 WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn insert_session(conn: &mut SqliteConnection, session: &Session) -> Result<(), AppError> {
    let conflicts_json = serde_json::to_string(&session.conflicts)?;
    let attendees_json = serde_json::to_string(&session.attendee_ids)?;

    sqlx::query(
        "INSERT INTO group_sessions (id, group_id, title, description, scheduled_time, ends_at, duration_minutes, session_type, status, notes, recommendation, conflicts, attendee_ids, actual_attendees, reminder_sent, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&session.id)
    .bind(&session.group_id)
    .bind(&session.title)
    .bind(&session.description)
    .bind(format_datetime(session.scheduled_time))
    .bind(format_datetime(session.end_time()))
    .bind(session.duration_minutes)
    .bind(session.session_type.as_str())
    .bind(session.status.as_str())
    .bind(&session.notes)
    .bind(&session.recommendation)
    .bind(&conflicts_json)
    .bind(&attendees_json)
    .bind(session.actual_attendees)
    .bind(session.reminder_sent as i32)
    .bind(&session.created_at)
    .bind(&session.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Overwrite every mutable column of an existing session.
pub async fn save_session(conn: &mut SqliteConnection, session: &Session) -> Result<(), AppError> {
    let conflicts_json = serde_json::to_string(&session.conflicts)?;
    let attendees_json = serde_json::to_string(&session.attendee_ids)?;

    sqlx::query(
        r#"UPDATE group_sessions SET
            title = ?, description = ?, scheduled_time = ?, ends_at = ?, duration_minutes = ?,
            session_type = ?, status = ?, notes = ?, recommendation = ?, conflicts = ?,
            attendee_ids = ?, actual_attendees = ?, reminder_sent = ?, updated_at = ?
        WHERE id = ?"#,
    )
    .bind(&session.title)
    .bind(&session.description)
    .bind(format_datetime(session.scheduled_time))
    .bind(format_datetime(session.end_time()))
    .bind(session.duration_minutes)
    .bind(session.session_type.as_str())
    .bind(session.status.as_str())
    .bind(&session.notes)
    .bind(&session.recommendation)
    .bind(&conflicts_json)
    .bind(&attendees_json)
    .bind(session.actual_attendees)
    .bind(session.reminder_sent as i32)
    .bind(&session.updated_at)
    .bind(&session.id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn delete_session(conn: &mut SqliteConnection, id: &str) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM group_sessions WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

// ==================== SNAPSHOTS ====================

/// Load what the scheduling engine needs to judge sessions of `group_id`: the group,
/// its members, every session intersecting one of `windows`, and the groups owning
/// those sessions.
///
/// A missing group yields an empty snapshot; callers decide whether that is an error.
pub async fn load_snapshot(
    conn: &mut SqliteConnection,
    group_id: &str,
    windows: &[(NaiveDateTime, NaiveDateTime)],
) -> Result<ScheduleSnapshot, AppError> {
    let mut snapshot = ScheduleSnapshot::new();

    let Some(group) = fetch_group(conn, group_id).await? else {
        return Ok(snapshot);
    };
    for student in fetch_group_members(conn, group_id).await? {
        snapshot.put_student(student);
    }
    snapshot.put_group(group);

    for (start, end) in windows {
        for session in fetch_sessions_in_window(conn, *start, *end).await? {
            if !snapshot.has_group(&session.group_id) {
                if let Some(owner) = fetch_group(conn, &session.group_id).await? {
                    snapshot.put_group(owner);
                }
            }
            snapshot.put_session(session);
        }
    }

    Ok(snapshot)
}

/// Window covering the whole calendar day of `day`, widened by `margin` minutes.
pub fn day_window(day: NaiveDate, margin: chrono::Duration) -> (NaiveDateTime, NaiveDateTime) {
    let start = day.and_time(chrono::NaiveTime::MIN);
    (start - margin, start + chrono::Duration::days(1) + margin)
}

// ==================== ROW MAPPING ====================

fn student_from_row(row: &SqliteRow) -> Student {
    let availability_str: String = row.get("availability");
    Student {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        availability: parse_json_array(&availability_str).into_iter().collect(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn group_from_row(row: &SqliteRow) -> StudyGroup {
    let status_str: String = row.get("status");
    let common_slots_str: String = row.get("common_slots");
    StudyGroup {
        id: row.get("id"),
        name: row.get("name"),
        subject: row.get("subject"),
        description: row.get("description"),
        max_members: row.get("max_members"),
        current_members: row.get("current_members"),
        status: GroupStatus::from_str(&status_str).unwrap_or(GroupStatus::Active),
        member_ids: BTreeSet::new(),
        common_slots: parse_json_array(&common_slots_str).into_iter().collect(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn session_from_row(row: &SqliteRow) -> Result<Session, AppError> {
    let id: String = row.get("id");
    let scheduled_str: String = row.get("scheduled_time");
    let type_str: String = row.get("session_type");
    let status_str: String = row.get("status");
    let conflicts_str: String = row.get("conflicts");
    let attendees_str: String = row.get("attendee_ids");
    let reminder_sent: i32 = row.get("reminder_sent");

    let status = SessionStatus::from_str(&status_str).ok_or_else(|| {
        AppError::Internal(format!("Session {} has unknown status {:?}", id, status_str))
    })?;

    Ok(Session {
        group_id: row.get("group_id"),
        title: row.get("title"),
        description: row.get("description"),
        scheduled_time: parse_datetime(&scheduled_str)?,
        duration_minutes: row.get("duration_minutes"),
        session_type: SessionType::from_str(&type_str).unwrap_or_default(),
        status,
        notes: row.get("notes"),
        recommendation: row.get("recommendation"),
        conflicts: serde_json::from_str(&conflicts_str)?,
        attendee_ids: parse_json_array(&attendees_str),
        actual_attendees: row.get("actual_attendees"),
        reminder_sent: reminder_sent != 0,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        id,
    })
}

fn parse_json_array(s: &str) -> Vec<String> {
    serde_json::from_str(s).unwrap_or_default()
}
