//! Student model with recurring weekly availability.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A student who can join study groups.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Weekly availability slot tokens such as `MON_10:00-11:30`
    #[serde(default)]
    pub availability: BTreeSet<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Student {
    pub fn is_available_at(&self, slot: &str) -> bool {
        self.availability.contains(slot)
    }
}

/// Request body for registering a student.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStudentRequest {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub availability: Vec<String>,
}

/// Request body for replacing a student's availability.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAvailabilityRequest {
    pub availability: Vec<String>,
}

/// Trim tokens and collapse duplicates; blank entries are dropped.
pub fn normalize_availability<I, S>(tokens: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tokens
        .into_iter()
        .map(|t| t.as_ref().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}
