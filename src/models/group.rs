//! Study group model: roster, capacity and derived common availability.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::Student;
use crate::scheduling::availability;

/// Lifecycle status of a study group.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupStatus {
    Active,
    Full,
    Archived,
    Suspended,
}

impl GroupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupStatus::Active => "ACTIVE",
            GroupStatus::Full => "FULL",
            GroupStatus::Archived => "ARCHIVED",
            GroupStatus::Suspended => "SUSPENDED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(GroupStatus::Active),
            "FULL" => Some(GroupStatus::Full),
            "ARCHIVED" => Some(GroupStatus::Archived),
            "SUSPENDED" => Some(GroupStatus::Suspended),
            _ => None,
        }
    }
}

/// Result of asking a group to take on a new member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    AlreadyMember,
    Full,
    Closed,
}

/// A study group owning its roster and sessions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StudyGroup {
    pub id: String,
    pub name: String,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub max_members: i64,
    pub current_members: i64,
    pub status: GroupStatus,
    #[serde(default)]
    pub member_ids: BTreeSet<String>,
    /// Intersection of all members' availability, recomputed on every roster change
    #[serde(default)]
    pub common_slots: BTreeSet<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub const DEFAULT_MAX_MEMBERS: i64 = 6;

impl StudyGroup {
    pub fn has_member(&self, student_id: &str) -> bool {
        self.member_ids.contains(student_id)
    }

    pub fn is_full(&self) -> bool {
        self.current_members >= self.max_members
    }

    /// Add a member, flipping to FULL exactly when capacity is reached.
    ///
    /// The caller must follow a `Joined` outcome with [`StudyGroup::refresh_common_slots`].
    pub fn add_member(&mut self, student_id: &str) -> JoinOutcome {
        if self.has_member(student_id) {
            return JoinOutcome::AlreadyMember;
        }
        if matches!(self.status, GroupStatus::Archived | GroupStatus::Suspended) {
            return JoinOutcome::Closed;
        }
        if self.is_full() {
            return JoinOutcome::Full;
        }

        self.member_ids.insert(student_id.to_string());
        self.current_members = self.member_ids.len() as i64;
        if self.is_full() {
            self.status = GroupStatus::Full;
        }
        JoinOutcome::Joined
    }

    /// Remove a member; any removal from a FULL group reopens it.
    ///
    /// Returns false when the student was not on the roster.
    pub fn remove_member(&mut self, student_id: &str) -> bool {
        if !self.member_ids.remove(student_id) {
            return false;
        }
        self.current_members = self.member_ids.len() as i64;
        if self.status == GroupStatus::Full {
            self.status = GroupStatus::Active;
        }
        true
    }

    /// Recompute the derived common availability from the current roster.
    pub fn refresh_common_slots(&mut self, members: &[Student]) {
        let roster: Vec<&Student> = members
            .iter()
            .filter(|s| self.member_ids.contains(&s.id))
            .collect();
        self.common_slots = availability::common_slots(&roster);
    }

    /// True when both groups have at least one student in common.
    pub fn shares_member_with(&self, other: &StudyGroup) -> bool {
        self.member_ids
            .iter()
            .any(|id| other.member_ids.contains(id))
    }
}

/// Request body for creating a study group.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupRequest {
    pub name: String,
    pub subject: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub max_members: Option<i64>,
    #[serde(default)]
    pub member_ids: Vec<String>,
}

/// Request body for adding a member to a group.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinGroupRequest {
    pub student_id: String,
}


#[cfg(test)]
mod tests {
    use super::fixtures::{group, student};
    use super::*;

    #[test]
    fn test_add_member_flips_to_full_at_capacity() {
        let mut g = group("g1", 2);
        assert_eq!(g.add_member("alice"), JoinOutcome::Joined);
        assert_eq!(g.status, GroupStatus::Active);
        assert_eq!(g.add_member("bob"), JoinOutcome::Joined);
        assert_eq!(g.status, GroupStatus::Full);
        assert_eq!(g.current_members, 2);
        assert_eq!(g.add_member("carol"), JoinOutcome::Full);
    }

    #[test]
    fn test_add_member_is_idempotent() {
        let mut g = group("g1", 3);
        g.add_member("alice");
        assert_eq!(g.add_member("alice"), JoinOutcome::AlreadyMember);
        assert_eq!(g.current_members, 1);
    }

    #[test]
    fn test_remove_member_reopens_full_group() {
        let mut g = group("g1", 1);
        g.add_member("alice");
        assert_eq!(g.status, GroupStatus::Full);
        assert!(g.remove_member("alice"));
        assert_eq!(g.status, GroupStatus::Active);
        assert_eq!(g.current_members, 0);
        assert!(!g.remove_member("alice"));
    }

    #[test]
    fn test_closed_group_rejects_members() {
        let mut g = group("g1", 4);
        g.status = GroupStatus::Archived;
        assert_eq!(g.add_member("alice"), JoinOutcome::Closed);
    }

    #[test]
    fn test_refresh_common_slots_tracks_roster() {
        let alice = student("alice", &["MON_10:00-11:30", "WED_14:00-15:30"]);
        let bob = student("bob", &["MON_10:00-11:30"]);
        let mut g = group("g1", 4);

        g.add_member("alice");
        g.refresh_common_slots(&[alice.clone(), bob.clone()]);
        assert_eq!(g.common_slots.len(), 2);

        g.add_member("bob");
        g.refresh_common_slots(&[alice.clone(), bob.clone()]);
        assert_eq!(
            g.common_slots.iter().collect::<Vec<_>>(),
            vec!["MON_10:00-11:30"]
        );

        g.remove_member("alice");
        g.remove_member("bob");
        g.refresh_common_slots(&[alice, bob]);
        assert!(g.common_slots.is_empty());
    }

    #[test]
    fn test_status_round_trip_strings() {
        assert_eq!(GroupStatus::from_str("FULL"), Some(GroupStatus::Full));
        assert_eq!(GroupStatus::Suspended.as_str(), "SUSPENDED");
        assert_eq!(GroupStatus::from_str("full"), None);
    }
}
