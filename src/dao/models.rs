use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Club owning courts and instructors; defines the reference day for bookings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClubEntity {
    /// Stable identifier for the club.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Offset from UTC, in minutes, used to compute calendar days.
    #[serde(default)]
    pub utc_offset_minutes: i16,
}

/// Physical court that a confirmed slot occupies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CourtEntity {
    /// Stable identifier for the court.
    pub id: Uuid,
    /// Club the court belongs to.
    pub club_id: Uuid,
    /// Court number; lower numbers are assigned first.
    pub number: u32,
}

/// Skill band configured on an instructor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LevelRangeEntity {
    /// Inclusive lower bound.
    pub min_level: f32,
    /// Inclusive upper bound.
    pub max_level: f32,
    /// Label stored on the slot once the band is fixed.
    pub label: String,
}

/// Instructor providing slots at a club.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstructorEntity {
    /// Stable identifier for the instructor.
    pub id: Uuid,
    /// Club the instructor works at.
    pub club_id: Uuid,
    /// Display name.
    pub name: String,
    /// Skill bands used to classify participants.
    #[serde(default)]
    pub level_ranges: Vec<LevelRangeEntity>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

/// User profile and balances. Balances are only mutated by the ledger gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserEntity {
    /// Stable identifier for the user.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Playing level used for band lookup.
    pub level: f32,
    /// Gender used for the slot gender category.
    pub gender: Gender,
    /// Total funds in minor currency units.
    pub credit: u64,
    /// Funds held for pending bookings (derived, see the ledger gateway).
    #[serde(default)]
    pub blocked_credit: u64,
    /// Total loyalty points.
    #[serde(default)]
    pub points: u64,
    /// Points held for pending bookings (derived, see the ledger gateway).
    #[serde(default)]
    pub blocked_points: u64,
}

/// Classification fixed by the first participant of a slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Classification {
    /// Skill band label, `None` when the instructor has no matching band.
    pub level_band: Option<String>,
    /// Gender category of the slot.
    pub gender: Gender,
}

/// A bookable unit of time for one instructor at one club.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlotEntity {
    /// Primary key of the slot.
    pub id: Uuid,
    /// Club hosting the slot.
    pub club_id: Uuid,
    /// Instructor running the slot.
    pub instructor_id: Uuid,
    /// Start of the slot.
    #[serde(with = "time::serde::rfc3339")]
    pub start: OffsetDateTime,
    /// Current end; extended to the full block duration on confirmation.
    #[serde(with = "time::serde::rfc3339")]
    pub end: OffsetDateTime,
    /// End as proposed, restored when the slot reverts.
    #[serde(with = "time::serde::rfc3339")]
    pub base_end: OffsetDateTime,
    /// Group sizes competing for this slot.
    pub option_sizes: Vec<u8>,
    /// Price of the whole slot in minor currency units.
    pub unit_price: u64,
    /// Assigned court; `None` while the slot is a proposal.
    pub court_id: Option<Uuid>,
    /// When true the slot never fixes nor enforces a classification.
    #[serde(default)]
    pub classification_open: bool,
    /// Classification fixed by the first join.
    pub classification: Option<Classification>,
    /// Vacated spot indices keyed by option size.
    #[serde(default)]
    pub recycled_spots: BTreeMap<u8, BTreeSet<u8>>,
    /// Number of recycled spots currently open.
    #[serde(default)]
    pub available_recycled_slots: u32,
    /// Whether the slot has any recycled spot.
    #[serde(default)]
    pub has_recycled_slots: bool,
    /// Whether recycled spots can only be paid with points.
    #[serde(default)]
    pub recycled_slots_only_points: bool,
    /// Creation timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentKind {
    Funds,
    Points,
}

/// Why a booking ended up cancelled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// The user left a slot that was still racing.
    Withdrawn,
    /// A sibling option filled first.
    OptionLost,
    /// Another booking of the same user confirmed on the same day.
    SameDayConfirmed,
    /// The user left a confirmed slot.
    ParticipantLeft,
    /// The proposal was removed because the instructor got confirmed elsewhere.
    ProposalRemoved,
}

/// One user's claim on an option of a slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookingEntity {
    /// Primary key of the booking.
    pub id: Uuid,
    /// Owner of the booking.
    pub user_id: Uuid,
    /// Target slot.
    pub slot_id: Uuid,
    /// Option (group size) the booking belongs to.
    pub group_size: u8,
    /// Position inside the option, `0..group_size`.
    pub spot_index: u8,
    /// Current status.
    pub status: BookingStatus,
    /// How the booking is paid.
    pub payment: PaymentKind,
    /// Amount blocked at join time, in units of `payment`.
    pub amount_blocked: u64,
    /// Whether the booking took a recycled spot.
    #[serde(default)]
    pub is_recycled: bool,
    /// Set once the booking is cancelled.
    #[serde(default)]
    pub cancel_reason: Option<CancelReason>,
    /// Creation timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Last status change.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl BookingEntity {
    /// Pending and confirmed bookings occupy a spot.
    pub fn is_active(&self) -> bool {
        self.status != BookingStatus::Cancelled
    }
}

/// Owner of a schedule block.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ScheduleOwner {
    Court(Uuid),
    Instructor(Uuid),
}

/// Reserved interval on a court or instructor schedule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleBlockEntity {
    /// Primary key of the block.
    pub id: Uuid,
    /// Court or instructor the block belongs to.
    pub owner: ScheduleOwner,
    #[serde(with = "time::serde::rfc3339")]
    pub start: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end: OffsetDateTime,
    /// Slot that created the block; `None` for manual blocks.
    pub slot_id: Option<Uuid>,
    /// Free-form reason.
    pub reason: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LedgerAction {
    Block,
    Settle,
    Release,
    Credit,
}

/// Append-only audit record of a balance mutation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerEntryEntity {
    /// Primary key of the entry.
    pub id: Uuid,
    /// User whose balance changed.
    pub user_id: Uuid,
    /// Funds or points.
    pub kind: PaymentKind,
    /// What happened to the amount.
    pub action: LedgerAction,
    /// Amount in units of `kind`.
    pub amount: u64,
    /// Human readable concept.
    pub concept: String,
    /// Booking the entry relates to.
    pub booking_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub at: OffsetDateTime,
}
