//! Conflict detection for a proposed session.

use chrono::NaiveDate;

use super::availability::{is_available, slot_token};
use super::{touches_group, ScheduleSource, SchedulingRules, TimeSlotSearch};
use crate::models::{Conflict, Session, SessionStatus, StudyGroup};

/// Evaluates a session against member availability, other sessions and daily load.
///
/// Evaluation is a pure function of the session and the source; it never fails.
pub struct ConflictDetector<'a, S: ScheduleSource + ?Sized> {
    source: &'a S,
    rules: SchedulingRules,
    today: NaiveDate,
}

impl<'a, S: ScheduleSource + ?Sized> ConflictDetector<'a, S> {
    pub fn new(source: &'a S, rules: SchedulingRules, today: NaiveDate) -> Self {
        Self {
            source,
            rules,
            today,
        }
    }

    /// Every conflict the session currently has, followed by advisory alternatives
    /// when there is at least one.
    pub fn evaluate(&self, session: &Session) -> Vec<Conflict> {
        let Some(group) = self.source.group(&session.group_id) else {
            return Vec::new();
        };

        let mut conflicts = self.unavailable_members(session, group);

        let overlapping = self.overlapping_sessions(session, group);
        if overlapping > 0 {
            conflicts.push(Conflict::Overlap { count: overlapping });
        }

        let same_day = self.sessions_same_day(session);
        if same_day >= self.rules.daily_session_limit {
            conflicts.push(Conflict::Overload { count: same_day });
        }

        if !conflicts.is_empty() {
            let alternatives = TimeSlotSearch::new(self.source, self.rules, self.today)
                .suggest_excluding(
                    group,
                    session.duration_minutes,
                    self.rules.alternative_count,
                    Some(&session.id),
                );
            if !alternatives.is_empty() {
                conflicts.push(Conflict::Alternatives {
                    times: alternatives,
                });
            }
        }

        conflicts
    }

    fn unavailable_members(&self, session: &Session, group: &StudyGroup) -> Vec<Conflict> {
        let (start, end) = (session.scheduled_time, session.end_time());
        let slot = slot_token(start, end);
        group
            .member_ids
            .iter()
            .filter_map(|id| self.source.student(id))
            .filter(|member| !is_available(member, start, end))
            .map(|member| Conflict::Unavailable {
                member_id: member.id.clone(),
                member_name: member.name.clone(),
                slot: slot.clone(),
            })
            .collect()
    }

    fn overlapping_sessions(&self, session: &Session, group: &StudyGroup) -> usize {
        let buffer = self.rules.overlap_buffer();
        self.source
            .sessions_in_window(
                session.scheduled_time - buffer,
                session.end_time() + buffer,
            )
            .into_iter()
            .filter(|other| other.id != session.id)
            .filter(|other| touches_group(self.source, other, group))
            .count()
    }

    fn sessions_same_day(&self, session: &Session) -> usize {
        let day = session.scheduled_time.date();
        self.source
            .sessions_for_group(&session.group_id)
            .into_iter()
            .filter(|other| other.id != session.id)
            .filter(|other| other.status != SessionStatus::Cancelled)
            .filter(|other| other.scheduled_time.date() == day)
            .count()
    }
}
