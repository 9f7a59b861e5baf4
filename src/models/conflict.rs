//! Scheduling conflicts attached to a session.
//!
//! Conflicts are kept as tagged variants and rendered to text only at the API boundary.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Format used when listing alternative meeting times.
pub const ALTERNATIVE_TIME_FORMAT: &str = "%b %d, %H:%M";

/// A detected reason why a session is problematic. Advisory, never blocking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Conflict {
    /// A group member's availability does not contain the session's slot.
    #[serde(rename_all = "camelCase")]
    Unavailable {
        member_id: String,
        member_name: String,
        slot: String,
    },
    /// The session falls inside the buffer of sessions sharing a member.
    Overlap { count: usize },
    /// The group already has too many sessions that day.
    Overload { count: usize },
    /// A human override committed the session anyway.
    Forced { reason: String },
    /// Advisory list of free meeting times.
    Alternatives { times: Vec<NaiveDateTime> },
}

impl Conflict {
    /// Stable name of the conflict cause.
    pub fn kind(&self) -> &'static str {
        match self {
            Conflict::Unavailable { .. } => "UNAVAILABLE",
            Conflict::Overlap { .. } => "OVERLAP",
            Conflict::Overload { .. } => "OVERLOAD",
            Conflict::Forced { .. } => "FORCED",
            Conflict::Alternatives { .. } => "ALTERNATIVES",
        }
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conflict::Unavailable {
                member_name, slot, ..
            } => write!(f, "{} is not available at {}", member_name, slot),
            Conflict::Overlap { count } => {
                write!(f, "Conflicts with {} existing session(s)", count)
            }
            Conflict::Overload { count } => {
                write!(f, "Group already has {} sessions scheduled for this day", count)
            }
            Conflict::Forced { reason } => write!(f, "FORCE SCHEDULED: {}", reason),
            Conflict::Alternatives { times } => {
                let listed: Vec<String> = times
                    .iter()
                    .map(|t| t.format(ALTERNATIVE_TIME_FORMAT).to_string())
                    .collect();
                write!(f, "Suggested alternatives: {}", listed.join(", "))
            }
        }
    }
}

/// Render a conflict list into its human-readable form.
pub fn render_conflicts(conflicts: &[Conflict]) -> Vec<String> {
    conflicts.iter().map(ToString::to_string).collect()
}
