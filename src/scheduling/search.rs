//! Forward search for free meeting times.

use chrono::{Days, Duration, NaiveDate, NaiveDateTime, NaiveTime};

use super::availability::slot_to_datetime;
use super::{scoring, touches_group, ScheduleSource, SchedulingRules};
use crate::models::StudyGroup;

/// Scans the horizon after `today` for times when the whole group is free.
pub struct TimeSlotSearch<'a, S: ScheduleSource + ?Sized> {
    source: &'a S,
    rules: SchedulingRules,
    today: NaiveDate,
}

impl<'a, S: ScheduleSource + ?Sized> TimeSlotSearch<'a, S> {
    pub fn new(source: &'a S, rules: SchedulingRules, today: NaiveDate) -> Self {
        Self {
            source,
            rules,
            today,
        }
    }

    /// Up to `count` start times in `[today + 1, today + horizon]`, best score first.
    pub fn suggest(
        &self,
        group: &StudyGroup,
        duration_minutes: i64,
        count: usize,
    ) -> Vec<NaiveDateTime> {
        self.suggest_excluding(group, duration_minutes, count, None)
    }

    /// Same as [`TimeSlotSearch::suggest`], ignoring the session with id `exclude`
    /// when checking for clashes.
    pub fn suggest_excluding(
        &self,
        group: &StudyGroup,
        duration_minutes: i64,
        count: usize,
        exclude: Option<&str>,
    ) -> Vec<NaiveDateTime> {
        if count == 0 || duration_minutes <= 0 {
            return Vec::new();
        }

        let mut found: Vec<NaiveDateTime> = Vec::new();
        for offset in 1..=self.rules.horizon_days {
            if found.len() >= count {
                break;
            }
            let Some(day) = self.today.checked_add_days(Days::new(offset)) else {
                break;
            };
            let midnight = day.and_time(NaiveTime::MIN);

            // A started day is always scanned to the end.
            for token in &group.common_slots {
                let Some(candidate) = slot_to_datetime(token, midnight) else {
                    continue;
                };
                if candidate.date() != day || found.contains(&candidate) {
                    continue;
                }
                if self.is_free(group, candidate, duration_minutes, exclude) {
                    found.push(candidate);
                }
            }
        }

        // Stable sort: ties keep discovery order.
        found.sort_by(|a, b| scoring::score(*b).total_cmp(&scoring::score(*a)));
        found.truncate(count);

        tracing::debug!(
            group_id = %group.id,
            suggestions = found.len(),
            "Searched {} day horizon",
            self.rules.horizon_days
        );
        found
    }

    fn is_free(
        &self,
        group: &StudyGroup,
        start: NaiveDateTime,
        duration_minutes: i64,
        exclude: Option<&str>,
    ) -> bool {
        let buffer = self.rules.overlap_buffer();
        let window_start = start - buffer;
        let window_end = start + Duration::minutes(duration_minutes) + buffer;

        !self
            .source
            .sessions_in_window(window_start, window_end)
            .into_iter()
            .filter(|s| Some(s.id.as_str()) != exclude)
            .any(|s| touches_group(self.source, s, group))
    }
}
