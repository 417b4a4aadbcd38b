use std::convert::Infallible;

use axum::{
    Router,
    extract::State,
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/sse/slots",
    tag = "sse",
    responses((status = 200, description = "Slot SSE stream: slot.updated, slot.confirmed, slot.removed, booking.cancelled", content_type = "text/event-stream", body = String))
)]
/// Stream slot changes to connected clients.
pub async fn slot_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = sse_service::subscribe_slots(&state);
    info!("new slot SSE connection");
    sse_service::to_sse_stream(receiver, sse_service::handshake(&state))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sse/slots", get(slot_stream))
}
