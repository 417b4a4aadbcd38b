use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{common::ClassificationDto, validation::validate_option_sizes},
    state::lifecycle::SlotPhase,
};

/// Payload used to propose a new slot.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateSlotRequest {
    pub club_id: Uuid,
    pub instructor_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub start: OffsetDateTime,
    #[validate(range(min = 15, max = 240))]
    pub duration_minutes: u32,
    /// Competing group sizes; defaults to 1, 2, 3 and 4.
    #[serde(default)]
    #[validate(custom(function = "validate_option_sizes"))]
    pub option_sizes: Option<Vec<u8>>,
    /// When true the slot never fixes a classification.
    #[serde(default)]
    pub classification_open: bool,
}

/// Filters for the slot listing.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct SlotListQuery {
    /// Only slots of this club.
    pub club_id: Option<Uuid>,
    /// Only slots on this club day, formatted `YYYY-MM-DD`.
    pub date: Option<String>,
}

/// Occupancy of one competing option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct OptionOccupancy {
    pub group_size: u8,
    pub occupancy: usize,
    pub per_person_price: u64,
}

/// Vacated spots of the winning option, bookable with points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct RecycledSpots {
    pub group_size: u8,
    pub spot_indices: Vec<u8>,
    /// Points charged for each of these spots.
    pub points_cost: u64,
}

/// Current state of a slot as seen by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SlotState {
    pub id: Uuid,
    pub club_id: Uuid,
    pub instructor_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub start: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub end: OffsetDateTime,
    pub phase: SlotPhase,
    pub confirmed: bool,
    pub court_id: Option<Uuid>,
    pub classification_open: bool,
    pub classification: Option<ClassificationDto>,
    pub unit_price: u64,
    pub occupancy_by_option: Vec<OptionOccupancy>,
    pub recycled_slots: Vec<RecycledSpots>,
    pub available_recycled_slots: u32,
    pub recycled_slots_only_points: bool,
}
