use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::dto::{
    common::{BookingStatusDto, PaymentKindDto},
    slot::SlotState,
};

/// Request to join one option of a slot.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinSlotRequest {
    pub user_id: Uuid,
    #[validate(range(min = 1, max = 4))]
    pub group_size: u8,
    #[serde(default)]
    pub payment: PaymentKindDto,
    /// Recycled spot to take on a confirmed slot; the lowest one otherwise.
    #[serde(default)]
    #[validate(range(max = 3))]
    pub spot_index: Option<u8>,
}

/// Result of a join.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JoinResponse {
    pub booking_id: Uuid,
    /// `pending` while the option is racing, `confirmed` once it won.
    pub status: BookingStatusDto,
    pub payment: PaymentKindDto,
    /// Amount blocked or paid, in units of `payment`.
    pub amount: u64,
    pub spot_index: u8,
    pub is_recycled: bool,
    pub slot: SlotState,
}

/// Request to leave a slot.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CancelBookingRequest {
    pub user_id: Uuid,
}

/// Result of a cancellation.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CancelResponse {
    pub booking_id: Uuid,
    pub status: BookingStatusDto,
    /// Points credited when leaving a confirmed slot.
    pub points_awarded: Option<u64>,
    /// Whether the slot went back to a proposal.
    pub slot_reverted: bool,
    /// Spot index opened for points rebooking.
    pub recycled_spot_index: Option<u8>,
    pub slot: SlotState,
}
