//! Time-of-day productivity heuristic.

use chrono::{NaiveDateTime, Timelike};

/// Score used when no band matches.
const FALLBACK_SCORE: f64 = 30.0;

/// Inclusive hour bands; the first matching band wins.
const HOUR_BANDS: &[(u32, u32, f64)] = &[
    (9, 11, 100.0),  // peak morning
    (14, 16, 90.0),  // post-lunch focus
    (19, 21, 80.0),  // evening review
    (7, 9, 70.0),    // early morning
    (16, 18, 60.0),  // late afternoon
];

/// Productivity score of a start time. Depends on the hour of day only.
pub fn score(time: NaiveDateTime) -> f64 {
    let hour = time.hour();
    HOUR_BANDS
        .iter()
        .find(|(from, to, _)| (*from..=*to).contains(&hour))
        .map(|(_, _, score)| *score)
        .unwrap_or(FALLBACK_SCORE)
}
