use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report whether the booking store is reachable, logging connectivity issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "booking store health check failed");
            }
        }
        Err(_) => warn!("booking store unavailable (degraded mode)"),
    }

    if state.is_degraded() {
        HealthResponse::degraded()
    } else {
        HealthResponse::ok()
    }
}
