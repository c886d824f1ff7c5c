use std::time::Duration;

use bucket_api::AppState;
use chrono::Utc;
use tracing::{debug, warn};

/// Background task that deletes expired verification tokens and OAuth
/// handshakes. Reads already ignore expired rows; this only keeps tables small.
pub async fn run_purge_loop(state: AppState, every: Duration) {
    let mut interval = tokio::time::interval(every);

    loop {
        interval.tick().await;

        match state.db.purge_expired(Utc::now().timestamp()) {
            Ok((0, 0)) => {}
            Ok((tokens, sessions)) => {
                debug!(
                    "Purge: removed {} verification tokens, {} OAuth sessions",
                    tokens, sessions
                );
            }
            Err(e) => {
                warn!("Purge error: {:#}", e);
            }
        }
    }
}
