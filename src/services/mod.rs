//! Transactional services on top of the scheduling engine.

pub mod advice;
pub mod groups;
pub mod notifier;
pub mod reminders;
pub mod scheduler;

pub use advice::{AdviceProvider, StaticAdvice, SubjectAdvice};
pub use groups::GroupService;
pub use notifier::{LogNotifier, NotificationKind, Notifier};
pub use scheduler::SessionScheduler;
