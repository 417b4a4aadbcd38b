use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::{common::CancelReasonDto, slot::SlotState};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Plain text event.
    pub fn new<E>(event: E, data: String) -> Self
    where
        E: Into<Option<String>>,
    {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Identifier of the SSE stream.
    pub stream: String,
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when an option fills and the slot gets a court.
pub struct SlotConfirmedEvent {
    pub slot: SlotState,
    /// Bookings settled by the promotion.
    pub winners: Vec<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a proposal is deleted in favour of a confirmed slot.
pub struct SlotRemovedEvent {
    pub slot_id: Uuid,
    pub confirmed_slot_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast for every booking cancelled by a user or by the engine.
pub struct BookingCancelledEvent {
    pub booking_id: Uuid,
    pub slot_id: Uuid,
    pub user_id: Uuid,
    pub reason: CancelReasonDto,
}
