//! Configuration module for the study group backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::scheduling::SchedulingRules;

const DEFAULT_BIND_ADDR: ([u8; 4], u16) = ([127, 0, 0, 1], 8080);
const DEFAULT_REMINDER_LEAD_MINUTES: i64 = 30;
/// Longest reminder lead accepted, one week.
const MAX_REMINDER_LEAD_MINUTES: i64 = 7 * 24 * 60;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key for API authentication (required in production)
    pub api_psk: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Seconds between reminder sweeps, 0 disables them
    pub reminder_interval_secs: u64,
    /// Reminders go out for sessions starting within this many minutes
    pub reminder_lead_minutes: i64,
    /// Scheduling heuristics
    pub rules: SchedulingRules,
    /// Rejected settings, logged once tracing is up
    pub warnings: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let api_psk = env::var("STUDY_API_PSK").ok().filter(|k| !k.is_empty());

        let db_path = env::var("STUDY_DB_PATH")
            .unwrap_or_else(|_| "./data/study.sqlite".to_string())
            .into();

        let mut warnings = Vec::new();
        let bind_addr = parse_bind_addr(env::var("STUDY_BIND_ADDR").ok(), &mut warnings);

        let log_level = env::var("STUDY_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let reminder_interval_secs = env_number("STUDY_REMINDER_INTERVAL_SECS", 600);
        let reminder_lead_minutes = checked_lead_minutes(
            env_number("STUDY_REMINDER_LEAD_MINUTES", DEFAULT_REMINDER_LEAD_MINUTES),
            &mut warnings,
        );

        Self {
            api_psk,
            db_path,
            bind_addr,
            log_level,
            reminder_interval_secs,
            reminder_lead_minutes,
            rules: SchedulingRules::default(),
            warnings,
        }
    }
}

fn parse_bind_addr(raw: Option<String>, warnings: &mut Vec<String>) -> SocketAddr {
    raw.and_then(|addr| match addr.parse() {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warnings.push(format!("Ignoring invalid STUDY_BIND_ADDR {:?}: {}", addr, e));
            None
        }
    })
    .unwrap_or_else(|| SocketAddr::from(DEFAULT_BIND_ADDR))
}

fn checked_lead_minutes(minutes: i64, warnings: &mut Vec<String>) -> i64 {
    if (0..=MAX_REMINDER_LEAD_MINUTES).contains(&minutes) {
        return minutes;
    }
    warnings.push(format!(
        "Ignoring STUDY_REMINDER_LEAD_MINUTES={} outside 0..={}, using {}",
        minutes, MAX_REMINDER_LEAD_MINUTES, DEFAULT_REMINDER_LEAD_MINUTES
    ));
    DEFAULT_REMINDER_LEAD_MINUTES
}

fn env_number<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
