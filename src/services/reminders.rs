use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::SessionScheduler;

/// Spawn a background task that wakes up every `interval_secs` and reminds members of
/// sessions starting within the next `lead_minutes`. An interval of 0 disables it.
pub fn start(scheduler: Arc<SessionScheduler>, interval_secs: u64, lead_minutes: i64) {
    if interval_secs == 0 {
        info!("Session reminders disabled");
        return;
    }

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            ticker.tick().await;

            match scheduler.send_due_reminders(lead_minutes).await {
                Ok(0) => {}
                Ok(n) => info!("Session reminders: {} session(s) reminded", n),
                Err(e) => warn!("Session reminders: sweep failed: {}", e),
            }
        }
    });
}
