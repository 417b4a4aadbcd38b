use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::{
        booking::{JoinResponse, JoinSlotRequest},
        slot::{CreateSlotRequest, SlotListQuery, SlotState},
    },
    error::AppError,
    services::{
        race_engine::{self, JoinRequest},
        slot_service,
    },
    state::SharedState,
};

/// Slot proposal, listing and join endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/slots", get(list_slots).post(create_slot))
        .route("/slots/{id}", get(get_slot))
        .route("/slots/{id}/join", post(join_slot))
}

/// Propose a new slot priced from the configured tiers.
#[utoipa::path(
    post,
    path = "/slots",
    tag = "slots",
    request_body = CreateSlotRequest,
    responses(
        (status = 201, description = "Slot proposed", body = SlotState),
        (status = 400, description = "Invalid payload or no price configured"),
        (status = 404, description = "Club or instructor not found"),
        (status = 409, description = "Instructor already booked at that time")
    )
)]
pub async fn create_slot(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateSlotRequest>>,
) -> Result<(StatusCode, Json<SlotState>), AppError> {
    let slot = slot_service::create_slot(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(slot)))
}

/// List slots, optionally restricted to one club and one club day.
#[utoipa::path(
    get,
    path = "/slots",
    tag = "slots",
    params(SlotListQuery),
    responses(
        (status = 200, description = "Matching slots ordered by start", body = [SlotState]),
        (status = 400, description = "Malformed date")
    )
)]
pub async fn list_slots(
    State(state): State<SharedState>,
    Query(query): Query<SlotListQuery>,
) -> Result<Json<Vec<SlotState>>, AppError> {
    Ok(Json(slot_service::list_slots(&state, query).await?))
}

/// Current state of a slot: phase, occupancy per option and recycled spots.
#[utoipa::path(
    get,
    path = "/slots/{id}",
    tag = "slots",
    params(("id" = Uuid, Path, description = "Slot identifier")),
    responses(
        (status = 200, description = "Slot state", body = SlotState),
        (status = 404, description = "Slot not found")
    )
)]
pub async fn get_slot(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SlotState>, AppError> {
    Ok(Json(slot_service::get_slot_state(&state, id).await?))
}

/// Join one option of a slot, or take a recycled spot of a confirmed slot.
#[utoipa::path(
    post,
    path = "/slots/{id}/join",
    tag = "slots",
    params(("id" = Uuid, Path, description = "Slot identifier")),
    request_body = JoinSlotRequest,
    responses(
        (status = 200, description = "Booking recorded; confirmed when the option filled", body = JoinResponse),
        (status = 400, description = "Invalid group size or spot"),
        (status = 402, description = "Insufficient funds or points"),
        (status = 404, description = "Slot or user not found"),
        (status = 409, description = "Slot already confirmed, classification mismatch, already booked that day or no court available"),
        (status = 503, description = "Storage unavailable or timed out")
    )
)]
pub async fn join_slot(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<JoinSlotRequest>>,
) -> Result<Json<JoinResponse>, AppError> {
    let request = JoinRequest {
        slot_id: id,
        user_id: payload.user_id,
        group_size: payload.group_size,
        payment: payload.payment.into(),
        spot_index: payload.spot_index,
    };
    Ok(Json(race_engine::join(&state, request).await?))
}
