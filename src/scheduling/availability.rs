//! Recurring weekly availability slots and their intersections.
//!
//! A slot is a token such as `MON_10:00-11:30`. Tokens are compared as opaque keys;
//! they are only parsed when a concrete date is needed. Tokens that do not parse
//! are ignored, never fatal.

use std::collections::BTreeSet;

use chrono::{Datelike, Days, NaiveDateTime, NaiveTime, Weekday};

use crate::models::Student;

const TIME_FORMAT: &str = "%H:%M";

/// A parsed availability slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilitySlot {
    pub day: Weekday,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl AvailabilitySlot {
    /// Parse a `DAY_HH:MM-HH:MM` token.
    pub fn parse(token: &str) -> Option<Self> {
        let (day, range) = token.split_once('_')?;
        let (start, end) = range.split_once('-')?;
        Some(Self {
            day: parse_day(day)?,
            start: NaiveTime::parse_from_str(start, TIME_FORMAT).ok()?,
            end: NaiveTime::parse_from_str(end, TIME_FORMAT).ok()?,
        })
    }

    #[cfg(test)]
    pub fn token(&self) -> String {
        format!(
            "{}_{}-{}",
            day_abbrev(self.day),
            self.start.format(TIME_FORMAT),
            self.end.format(TIME_FORMAT)
        )
    }

    /// Next start of this slot at or after `reference`.
    pub fn next_occurrence(&self, reference: NaiveDateTime) -> NaiveDateTime {
        let current = reference.weekday().num_days_from_monday();
        let target = self.day.num_days_from_monday();
        let mut days_ahead = (target + 7 - current) % 7;
        if days_ahead == 0 && reference.time() > self.start {
            days_ahead = 7;
        }
        let date = reference.date() + Days::new(u64::from(days_ahead));
        date.and_time(self.start)
    }
}

/// The slot token covering `[start, end)`.
pub fn slot_token(start: NaiveDateTime, end: NaiveDateTime) -> String {
    format!(
        "{}_{}-{}",
        day_abbrev(start.weekday()),
        start.format(TIME_FORMAT),
        end.format(TIME_FORMAT)
    )
}

/// Map a recurring slot to its next concrete occurrence on or after `reference`.
///
/// Returns `None` for malformed tokens; callers treat that as unschedulable.
pub fn slot_to_datetime(token: &str, reference: NaiveDateTime) -> Option<NaiveDateTime> {
    match AvailabilitySlot::parse(token) {
        Some(slot) => Some(slot.next_occurrence(reference)),
        None => {
            tracing::debug!("Ignoring unparsable availability slot {:?}", token);
            None
        }
    }
}

/// Intersection of every member's availability. An empty roster has no common slots.
pub fn common_slots(members: &[&Student]) -> BTreeSet<String> {
    let Some((first, rest)) = members.split_first() else {
        return BTreeSet::new();
    };

    first
        .availability
        .iter()
        .filter(|slot| rest.iter().all(|m| m.availability.contains(*slot)))
        .filter(|slot| {
            let parsed = AvailabilitySlot::parse(slot).is_some();
            if !parsed {
                tracing::debug!("Dropping unparsable common slot {:?}", slot);
            }
            parsed
        })
        .cloned()
        .collect()
}

/// True when the student is free for the whole of `[start, end)`.
///
/// The exact slot token always matches; otherwise a slot on the same weekday
/// must span the window, which must not run past midnight.
pub fn is_available(student: &Student, start: NaiveDateTime, end: NaiveDateTime) -> bool {
    if student.is_available_at(&slot_token(start, end)) {
        return true;
    }
    if end.date() != start.date() {
        return false;
    }
    student
        .availability
        .iter()
        .filter_map(|token| AvailabilitySlot::parse(token))
        .any(|slot| {
            slot.day == start.weekday() && slot.start <= start.time() && end.time() <= slot.end
        })
}

/// True when the token can be turned into a concrete time.
pub fn is_valid_slot(token: &str) -> bool {
    AvailabilitySlot::parse(token).is_some()
}

fn day_abbrev(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MON",
        Weekday::Tue => "TUE",
        Weekday::Wed => "WED",
        Weekday::Thu => "THU",
        Weekday::Fri => "FRI",
        Weekday::Sat => "SAT",
        Weekday::Sun => "SUN",
    }
}

fn parse_day(s: &str) -> Option<Weekday> {
    match s {
        "MON" => Some(Weekday::Mon),
        "TUE" => Some(Weekday::Tue),
        "WED" => Some(Weekday::Wed),
        "THU" => Some(Weekday::Thu),
        "FRI" => Some(Weekday::Fri),
        "SAT" => Some(Weekday::Sat),
        "SUN" => Some(Weekday::Sun),
        _ => None,
    }
}
