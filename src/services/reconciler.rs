//! Periodic recomputation of every user's blocked balances.

use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, warn};

use crate::{error::ServiceError, services::user_service, state::SharedState};

/// Reconcile every `period` for as long as the task runs.
pub async fn run(state: SharedState, period: Duration) {
    if period.is_zero() {
        debug!("blocked balance reconciler disabled");
        return;
    }
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        match user_service::reconcile_all(&state).await {
            Ok(corrections) => debug!(corrections = corrections.len(), "reconciliation pass done"),
            Err(ServiceError::Degraded) => debug!("reconciliation skipped while degraded"),
            Err(err) => warn!(error = %err, "reconciliation pass failed"),
        }
    }
}
