//! Data models for the study group backend.
//!
//! Field names serialize as camelCase for the HTTP boundary.

mod conflict;
mod group;
mod session;
mod student;

pub use conflict::*;
pub use group::*;
pub use session::*;
pub use student::*;
