use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::booking::{CancelBookingRequest, CancelResponse},
    error::AppError,
    services::cancellation,
    state::SharedState,
};

pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/bookings/{id}/cancel", post(cancel_booking))
}

/// Leave a slot. Pending bookings are refunded; confirmed ones are repaid in points.
#[utoipa::path(
    post,
    path = "/bookings/{id}/cancel",
    tag = "bookings",
    params(("id" = Uuid, Path, description = "Booking identifier")),
    request_body = CancelBookingRequest,
    responses(
        (status = 200, description = "Booking cancelled", body = CancelResponse),
        (status = 403, description = "Booking belongs to another user"),
        (status = 404, description = "Booking not found"),
        (status = 409, description = "Booking already cancelled")
    )
)]
pub async fn cancel_booking(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<CancelBookingRequest>>,
) -> Result<Json<CancelResponse>, AppError> {
    Ok(Json(
        cancellation::cancel(&state, id, payload.user_id).await?,
    ))
}
