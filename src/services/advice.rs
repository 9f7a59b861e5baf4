//! Subject-specific study advice used to annotate new sessions.

use serde::Serialize;

use crate::models::SessionType;

/// Advice for studying one subject.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAdvice {
    pub technique: &'static str,
    pub duration: &'static str,
    pub best_time: &'static str,
    pub tip: &'static str,
}

/// Source of subject advice.
pub trait AdviceProvider: Send + Sync {
    fn advice(&self, subject: &str) -> SubjectAdvice;
}

const DEFAULT_ADVICE: SubjectAdvice = SubjectAdvice {
    technique: "Pomodoro technique with 25 minute focus blocks",
    duration: "75 minutes",
    best_time: "Morning, when focus is highest",
    tip: "Agree on a goal for the session before you start",
};

/// Keyed by lower-cased subject keyword. First keyword contained in the subject wins.
const SUBJECT_ADVICE: &[(&str, SubjectAdvice)] = &[
    (
        "mathematics",
        SubjectAdvice {
            technique: "Worked examples followed by spaced practice problems",
            duration: "90 minutes",
            best_time: "Morning (9-11am)",
            tip: "Solve problems on the board and explain each step aloud",
        },
    ),
    (
        "physics",
        SubjectAdvice {
            technique: "Derive formulas together, then apply them to problems",
            duration: "90 minutes",
            best_time: "Morning (9-11am)",
            tip: "Sketch the setup before writing any equation",
        },
    ),
    (
        "chemistry",
        SubjectAdvice {
            technique: "Concept maps linking reactions and mechanisms",
            duration: "90 minutes",
            best_time: "Early afternoon (2-4pm)",
            tip: "Quiz each other on reaction conditions with flashcards",
        },
    ),
    (
        "computer science",
        SubjectAdvice {
            technique: "Pair programming with rotating driver",
            duration: "120 minutes",
            best_time: "Afternoon (2-4pm)",
            tip: "Trace algorithms by hand on small inputs",
        },
    ),
    (
        "programming",
        SubjectAdvice {
            technique: "Hands-on coding exercises with code review",
            duration: "120 minutes",
            best_time: "Afternoon (2-4pm)",
            tip: "Keep a shared list of bugs you hit and how you fixed them",
        },
    ),
    (
        "biology",
        SubjectAdvice {
            technique: "Diagrams and active recall",
            duration: "60 minutes",
            best_time: "Morning (9-11am)",
            tip: "Redraw processes from memory and compare",
        },
    ),
    (
        "history",
        SubjectAdvice {
            technique: "Timelines and cause-effect discussion",
            duration: "60 minutes",
            best_time: "Evening (7-9pm)",
            tip: "Assign each member an era to present",
        },
    ),
    (
        "literature",
        SubjectAdvice {
            technique: "Close reading with guided discussion",
            duration: "60 minutes",
            best_time: "Evening (7-9pm)",
            tip: "Bring one quote each that supports your reading",
        },
    ),
    (
        "languages",
        SubjectAdvice {
            technique: "Conversation practice and spaced vocabulary review",
            duration: "60 minutes",
            best_time: "Morning (7-9am)",
            tip: "Speak only the target language for the first 15 minutes",
        },
    ),
];

/// Constant lookup table with a default row.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticAdvice;

impl AdviceProvider for StaticAdvice {
    fn advice(&self, subject: &str) -> SubjectAdvice {
        let subject = subject.trim().to_lowercase();
        SUBJECT_ADVICE
            .iter()
            .find(|(keyword, _)| subject.contains(keyword))
            .map(|(_, advice)| *advice)
            .unwrap_or(DEFAULT_ADVICE)
    }
}

/// Recommendation text stored on a new session.
pub fn recommendation(advice: &SubjectAdvice, session_type: SessionType) -> String {
    let mut text = format!(
        "Recommended duration: {}. Best technique: {}. Best time: {}. Tip: {}",
        advice.duration, advice.technique, advice.best_time, advice.tip
    );
    match session_type {
        SessionType::ExamPrep => {
            text.push_str(" Focus on practice problems and review key concepts.")
        }
        SessionType::ProjectWork => text.push_str(
            " Allocate time for planning, individual work, and group coordination.",
        ),
        SessionType::Review => text.push_str(" Use active recall and teach-back methods."),
        SessionType::Study => {}
    }
    text
}
