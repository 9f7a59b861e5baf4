//! Member notifications.
//!
//! Delivery is fire-and-forget: callers send after their transaction commits and only
//! log failures.

use serde::Serialize;

use crate::errors::AppError;
use crate::models::{Session, Student};

/// Why a member is being notified.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    SessionCreated,
    SessionReminder,
    ForceScheduled,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::SessionCreated => "SESSION_CREATED",
            NotificationKind::SessionReminder => "SESSION_REMINDER",
            NotificationKind::ForceScheduled => "FORCE_SCHEDULED",
        }
    }
}

/// Delivers a notification about `session` to one member.
pub trait Notifier: Send + Sync {
    fn notify(
        &self,
        session: &Session,
        member: &Student,
        kind: NotificationKind,
    ) -> Result<(), AppError>;
}

/// Writes one structured log event per notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(
        &self,
        session: &Session,
        member: &Student,
        kind: NotificationKind,
    ) -> Result<(), AppError> {
        tracing::info!(
            kind = kind.as_str(),
            session_id = %session.id,
            member_id = %member.id,
            scheduled_time = %session.scheduled_time,
            "Notify {}: {}",
            member.name,
            message_for(session, kind)
        );
        Ok(())
    }
}

/// Human-readable notification body.
pub fn message_for(session: &Session, kind: NotificationKind) -> String {
    let when = session.scheduled_time.format("%a %b %d, %H:%M");
    match kind {
        NotificationKind::SessionCreated => {
            format!("New session '{}' scheduled for {}", session.title, when)
        }
        NotificationKind::SessionReminder => {
            format!("Reminder: '{}' starts at {}", session.title, when)
        }
        NotificationKind::ForceScheduled => format!(
            "Session '{}' has been force-scheduled despite conflicts. Please check your calendar.",
            session.title
        ),
    }
}

/// Notify every member, logging failures instead of returning them.
pub fn notify_members(
    notifier: &dyn Notifier,
    session: &Session,
    members: &[Student],
    kind: NotificationKind,
) -> usize {
    let mut delivered = 0;
    for member in members {
        match notifier.notify(session, member, kind) {
            Ok(()) => delivered += 1,
            Err(e) => tracing::warn!(
                session_id = %session.id,
                member_id = %member.id,
                "Failed to send {} notification: {}",
                kind.as_str(),
                e
            ),
        }
    }
    delivered
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingNotifier;
    use super::*;
    use crate::models::fixtures::{at, session, student};

    #[test]
    fn test_failures_do_not_stop_delivery() {
        let notifier = RecordingNotifier {
            failing: vec!["bob".to_string()],
            ..Default::default()
        };
        let s = session("s1", "g1", at(2024, 5, 6, 10, 0), 60);
        let members = vec![student("alice", &[]), student("bob", &[]), student("carol", &[])];

        let delivered = notify_members(&notifier, &s, &members, NotificationKind::SessionCreated);
        assert_eq!(delivered, 2);
        let recipients: Vec<String> = notifier.sent().into_iter().map(|(_, m, _)| m).collect();
        assert_eq!(recipients, vec!["alice", "carol"]);
    }

    #[test]
    fn test_messages_name_the_session() {
        let mut s = session("s1", "g1", at(2024, 5, 6, 10, 0), 60);
        s.title = "Linear algebra".to_string();
        assert_eq!(
            message_for(&s, NotificationKind::SessionReminder),
            "Reminder: 'Linear algebra' starts at Mon May 06, 10:00"
        );
        assert!(message_for(&s, NotificationKind::ForceScheduled).contains("force-scheduled"));
    }

    #[test]
    fn test_log_notifier_never_fails() {
        let s = session("s1", "g1", at(2024, 5, 6, 10, 0), 60);
        assert!(LogNotifier
            .notify(&s, &student("alice", &[]), NotificationKind::SessionCreated)
            .is_ok());
    }
}
