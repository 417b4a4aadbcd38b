//! Side-effect free queries over slots, options and bookings.
//!
//! An option is not stored: it is the partition of a slot's active bookings
//! by group size. An option wins once its occupancy reaches its size.

use std::collections::BTreeMap;

use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::{
    dao::{
        models::{BookingEntity, BookingStatus, ClubEntity, SlotEntity, UserEntity},
        tables::Tables,
    },
    error::ServiceError,
    services::pricing::club_local,
    state::lifecycle::SlotPhase,
};

/// Group sizes an option may have.
pub const MAX_GROUP_SIZE: u8 = 4;

pub fn require_slot(tables: &Tables, slot_id: Uuid) -> Result<&SlotEntity, ServiceError> {
    tables
        .slots
        .get(&slot_id)
        .ok_or_else(|| ServiceError::NotFound(format!("slot `{slot_id}` not found")))
}

pub fn require_user(tables: &Tables, user_id: Uuid) -> Result<&UserEntity, ServiceError> {
    tables
        .users
        .get(&user_id)
        .ok_or_else(|| ServiceError::NotFound(format!("user `{user_id}` not found")))
}

pub fn require_booking(tables: &Tables, booking_id: Uuid) -> Result<&BookingEntity, ServiceError> {
    tables
        .bookings
        .get(&booking_id)
        .ok_or_else(|| ServiceError::NotFound(format!("booking `{booking_id}` not found")))
}

pub fn require_club(tables: &Tables, club_id: Uuid) -> Result<&ClubEntity, ServiceError> {
    tables
        .clubs
        .get(&club_id)
        .ok_or_else(|| ServiceError::NotFound(format!("club `{club_id}` not found")))
}

/// Pending and confirmed bookings of the slot.
pub fn active_bookings(tables: &Tables, slot_id: Uuid) -> impl Iterator<Item = &BookingEntity> {
    tables
        .slot_bookings(slot_id)
        .filter(|booking| booking.is_active())
}

/// Number of active bookings in the option of `group_size`.
pub fn occupancy(tables: &Tables, slot_id: Uuid, group_size: u8) -> usize {
    active_bookings(tables, slot_id)
        .filter(|booking| booking.group_size == group_size)
        .count()
}

pub fn is_full(tables: &Tables, slot_id: Uuid, group_size: u8) -> bool {
    occupancy(tables, slot_id, group_size) >= usize::from(group_size)
}

pub fn is_confirmed(slot: &SlotEntity) -> bool {
    slot.court_id.is_some()
}

/// Occupancy of every option offered by the slot.
pub fn occupancy_by_option(tables: &Tables, slot: &SlotEntity) -> BTreeMap<u8, usize> {
    slot.option_sizes
        .iter()
        .map(|size| (*size, occupancy(tables, slot.id, *size)))
        .collect()
}

/// Option that won the race, read from the confirmed bookings.
pub fn winning_size(tables: &Tables, slot: &SlotEntity) -> Option<u8> {
    if !is_confirmed(slot) {
        return None;
    }
    tables
        .slot_bookings(slot.id)
        .find(|booking| booking.status == BookingStatus::Confirmed)
        .map(|booking| booking.group_size)
        .or_else(|| slot.recycled_spots.keys().next().copied())
}

/// Lifecycle phase derived from the stored slot.
pub fn phase(tables: &Tables, slot: &SlotEntity) -> SlotPhase {
    match (is_confirmed(slot), slot.has_recycled_slots) {
        (true, true) => SlotPhase::ConfirmedWithRecycled,
        (true, false) => SlotPhase::Confirmed,
        (false, _) if active_bookings(tables, slot.id).next().is_some() => SlotPhase::Racing,
        (false, _) => SlotPhase::Open,
    }
}

/// Lowest spot index of the option not held by an active booking.
pub fn free_spot_index(tables: &Tables, slot_id: Uuid, group_size: u8) -> Option<u8> {
    let taken: Vec<u8> = active_bookings(tables, slot_id)
        .filter(|booking| booking.group_size == group_size)
        .map(|booking| booking.spot_index)
        .collect();
    (0..group_size).find(|index| !taken.contains(index))
}

/// Fail unless the slot offers an option of `group_size`.
pub fn ensure_option(slot: &SlotEntity, group_size: u8) -> Result<(), ServiceError> {
    if group_size == 0 || group_size > MAX_GROUP_SIZE {
        return Err(ServiceError::InvalidInput(format!(
            "group size must be between 1 and {MAX_GROUP_SIZE}"
        )));
    }
    if !slot.option_sizes.contains(&group_size) {
        return Err(ServiceError::InvalidInput(format!(
            "slot `{}` does not offer groups of {group_size}",
            slot.id
        )));
    }
    Ok(())
}

/// Start of the slot in its club's reference offset.
pub fn local_start(tables: &Tables, slot: &SlotEntity) -> OffsetDateTime {
    let offset = tables
        .clubs
        .get(&slot.club_id)
        .map(|club| club.utc_offset_minutes)
        .unwrap_or_default();
    club_local(slot.start, offset)
}

/// Calendar day of the slot in its club's reference offset.
pub fn slot_day(tables: &Tables, slot: &SlotEntity) -> Date {
    local_start(tables, slot).date()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::Fixture;

    #[test]
    fn options_partition_active_bookings() {
        let mut fx = Fixture::new();
        let slot = fx.slot_at(10, 0);
        let (a, b, c) = (fx.user(10_000), fx.user(10_000), fx.user(10_000));
        fx.pending(slot, a, 2);
        fx.pending(slot, b, 4);
        let cancelled = fx.pending(slot, c, 2);
        fx.tables.bookings[&cancelled].status = BookingStatus::Cancelled;

        let tables = &fx.tables;
        assert_eq!(occupancy(tables, slot, 2), 1);
        assert_eq!(occupancy(tables, slot, 4), 1);
        assert!(!is_full(tables, slot, 2));
        assert_eq!(free_spot_index(tables, slot, 2), Some(1));
        assert_eq!(free_spot_index(tables, slot, 4), Some(1));

        let by_option = occupancy_by_option(tables, &tables.slots[&slot]);
        assert_eq!(by_option.get(&1), Some(&0));
        assert_eq!(by_option.get(&2), Some(&1));
        assert_eq!(phase(tables, &tables.slots[&slot]), SlotPhase::Racing);
    }

    #[test]
    fn unsupported_group_sizes_are_rejected() {
        let mut fx = Fixture::new();
        let slot = fx.slot_at(10, 0);
        fx.tables.slots[&slot].option_sizes = vec![2, 4];
        let slot = &fx.tables.slots[&slot];

        assert!(ensure_option(slot, 2).is_ok());
        assert!(matches!(
            ensure_option(slot, 3),
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(matches!(
            ensure_option(slot, 5),
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[test]
    fn empty_proposal_is_open() {
        let mut fx = Fixture::new();
        let slot = fx.slot_at(10, 0);
        assert_eq!(phase(&fx.tables, &fx.tables.slots[&slot]), SlotPhase::Open);
        assert!(!is_confirmed(&fx.tables.slots[&slot]));
    }
}
