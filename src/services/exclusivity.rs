//! At most one confirmed booking per user and club day.

use time::{Date, OffsetDateTime};
use tracing::info;
use uuid::Uuid;

use crate::{
    dao::{
        models::{BookingStatus, CancelReason},
        tables::Tables,
    },
    error::ServiceError,
    services::{classification, ledger, slot_model},
};

/// Pending booking cancelled because another one confirmed the same day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SameDayCancellation {
    pub booking_id: Uuid,
    pub slot_id: Uuid,
}

fn bookings_on_day(
    tables: &Tables,
    user_id: Uuid,
    day: Date,
    status: BookingStatus,
) -> impl Iterator<Item = (Uuid, Uuid)> + '_ {
    tables
        .user_bookings(user_id)
        .filter(move |booking| booking.status == status)
        .filter(move |booking| {
            tables
                .slots
                .get(&booking.slot_id)
                .is_some_and(|slot| slot_model::slot_day(tables, slot) == day)
        })
        .map(|booking| (booking.id, booking.slot_id))
}

/// Fail when the user already holds a confirmed booking on `day`.
pub fn check_eligible(tables: &Tables, user_id: Uuid, day: Date) -> Result<(), ServiceError> {
    match bookings_on_day(tables, user_id, day, BookingStatus::Confirmed).next() {
        Some(_) => Err(ServiceError::AlreadyBookedToday(day)),
        None => Ok(()),
    }
}

/// Cancel and refund the user's other pending bookings on `day`.
pub fn cancel_other_pending_same_day(
    tables: &mut Tables,
    user_id: Uuid,
    winning_slot_id: Uuid,
    day: Date,
    at: OffsetDateTime,
) -> Result<Vec<SameDayCancellation>, ServiceError> {
    let targets: Vec<SameDayCancellation> =
        bookings_on_day(tables, user_id, day, BookingStatus::Pending)
            .filter(|(_, slot_id)| *slot_id != winning_slot_id)
            .map(|(booking_id, slot_id)| SameDayCancellation {
                booking_id,
                slot_id,
            })
            .collect();

    for target in &targets {
        ledger::release(tables, target.booking_id, CancelReason::SameDayConfirmed, at)?;
        classification::clear_when_idle(tables, target.slot_id);
        info!(
            %user_id,
            booking_id = %target.booking_id,
            slot_id = %target.slot_id,
            "same-day pending booking cancelled"
        );
    }
    Ok(targets)
}
