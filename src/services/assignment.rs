//! Court assignment and the schedule blocks that keep confirmed slots apart.

use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::info;
use uuid::Uuid;

use crate::{
    config::EngineSettings,
    dao::{
        models::{CancelReason, ScheduleBlockEntity, ScheduleOwner, SlotEntity},
        tables::Tables,
    },
    error::ServiceError,
    services::{ledger, slot_model},
    state::lifecycle::{SlotEvent, transition},
};

#[derive(Debug, Error)]
pub enum AssignmentError {
    #[error("slot `{0}` not found")]
    UnknownSlot(Uuid),
    #[error("no free court at club `{club_id}` between {start} and {end}")]
    NoResourceAvailable {
        club_id: Uuid,
        start: OffsetDateTime,
        end: OffsetDateTime,
    },
    #[error("instructor `{instructor_id}` is busy between {start} and {end}")]
    InstructorBusy {
        instructor_id: Uuid,
        start: OffsetDateTime,
        end: OffsetDateTime,
    },
}

/// Half-open time interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
}

impl Interval {
    pub fn new(start: OffsetDateTime, end: OffsetDateTime) -> Self {
        Self { start, end }
    }

    pub fn overlaps(&self, start: OffsetDateTime, end: OffsetDateTime) -> bool {
        self.start < end && start < self.end
    }

    pub fn contains(&self, at: OffsetDateTime) -> bool {
        self.start <= at && at < self.end
    }
}

/// Interval a slot occupies once confirmed, at least `confirmed_block_minutes` long.
pub fn confirmed_interval(slot: &SlotEntity, settings: EngineSettings) -> Interval {
    let minimum = slot.start + Duration::minutes(i64::from(settings.confirmed_block_minutes));
    Interval::new(slot.start, slot.end.max(minimum))
}

fn block_overlaps(
    tables: &Tables,
    owner: ScheduleOwner,
    interval: Interval,
    exclude_slot: Option<Uuid>,
) -> bool {
    tables.schedule.iter().any(|block| {
        block.owner == owner
            && (block.slot_id.is_none() || block.slot_id != exclude_slot)
            && interval.overlaps(block.start, block.end)
    })
}

fn confirmed_overlaps<P>(
    tables: &Tables,
    interval: Interval,
    exclude_slot: Option<Uuid>,
    predicate: P,
) -> bool
where
    P: Fn(&SlotEntity) -> bool,
{
    tables.slots.values().any(|slot| {
        slot.court_id.is_some()
            && Some(slot.id) != exclude_slot
            && predicate(slot)
            && interval.overlaps(slot.start, slot.end)
    })
}

/// Whether the instructor already has a confirmed slot or a schedule block in `interval`.
pub fn instructor_busy(
    tables: &Tables,
    instructor_id: Uuid,
    interval: Interval,
    exclude_slot: Option<Uuid>,
) -> bool {
    confirmed_overlaps(tables, interval, exclude_slot, |slot| {
        slot.instructor_id == instructor_id
    }) || block_overlaps(
        tables,
        ScheduleOwner::Instructor(instructor_id),
        interval,
        exclude_slot,
    )
}

fn court_busy(
    tables: &Tables,
    court_id: Uuid,
    interval: Interval,
    exclude_slot: Option<Uuid>,
) -> bool {
    confirmed_overlaps(tables, interval, exclude_slot, |slot| {
        slot.court_id == Some(court_id)
    }) || block_overlaps(tables, ScheduleOwner::Court(court_id), interval, exclude_slot)
}

/// Lowest-numbered court of the club free for `interval`.
pub fn find_free_resource(
    tables: &Tables,
    club_id: Uuid,
    instructor_id: Uuid,
    interval: Interval,
    exclude_slot: Option<Uuid>,
) -> Result<Uuid, AssignmentError> {
    if instructor_busy(tables, instructor_id, interval, exclude_slot) {
        return Err(AssignmentError::InstructorBusy {
            instructor_id,
            start: interval.start,
            end: interval.end,
        });
    }

    let mut courts: Vec<_> = tables
        .courts
        .values()
        .filter(|court| court.club_id == club_id)
        .collect();
    courts.sort_by_key(|court| court.number);

    courts
        .into_iter()
        .find(|court| !court_busy(tables, court.id, interval, exclude_slot))
        .map(|court| court.id)
        .ok_or(AssignmentError::NoResourceAvailable {
            club_id,
            start: interval.start,
            end: interval.end,
        })
}

/// Record the court on the slot and reserve the interval for court and instructor.
pub fn assign(
    tables: &mut Tables,
    slot_id: Uuid,
    court_id: Uuid,
    interval: Interval,
) -> Result<(), AssignmentError> {
    let slot = tables
        .slots
        .get_mut(&slot_id)
        .ok_or(AssignmentError::UnknownSlot(slot_id))?;
    slot.court_id = Some(court_id);
    slot.end = interval.end;
    let instructor_id = slot.instructor_id;

    for owner in [
        ScheduleOwner::Court(court_id),
        ScheduleOwner::Instructor(instructor_id),
    ] {
        tables.schedule.push(ScheduleBlockEntity {
            id: Uuid::new_v4(),
            owner,
            start: interval.start,
            end: interval.end,
            slot_id: Some(slot_id),
            reason: format!("slot {slot_id} confirmed"),
        });
    }
    info!(%slot_id, %court_id, start = %interval.start, end = %interval.end, "court assigned");
    Ok(())
}

/// Give the court back and restore the proposed end of the slot.
pub fn release_resource(tables: &mut Tables, slot_id: Uuid) -> Result<(), AssignmentError> {
    let slot = tables
        .slots
        .get_mut(&slot_id)
        .ok_or(AssignmentError::UnknownSlot(slot_id))?;
    let court_id = slot.court_id.take();
    slot.end = slot.base_end;
    tables.schedule.retain(|block| block.slot_id != Some(slot_id));
    info!(%slot_id, court_id = ?court_id, "court released");
    Ok(())
}

/// Proposal deleted because a confirmed slot took its instructor time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedProposal {
    pub slot_id: Uuid,
    pub cancelled_bookings: Vec<Uuid>,
}

/// Delete proposals of the instructor starting inside `interval`, refunding their bookings.
pub fn remove_overlapping_proposals(
    tables: &mut Tables,
    confirmed_slot_id: Uuid,
    instructor_id: Uuid,
    interval: Interval,
    at: OffsetDateTime,
) -> Result<Vec<RemovedProposal>, ServiceError> {
    let doomed: Vec<Uuid> = tables
        .slots
        .values()
        .filter(|slot| {
            slot.id != confirmed_slot_id
                && slot.instructor_id == instructor_id
                && slot.court_id.is_none()
                && interval.contains(slot.start)
        })
        .map(|slot| slot.id)
        .collect();

    let mut removed = Vec::with_capacity(doomed.len());
    for slot_id in doomed {
        let slot = slot_model::require_slot(tables, slot_id)?;
        transition(slot_model::phase(tables, slot), SlotEvent::Removed)?;

        let cancelled_bookings = tables.slot_booking_ids(slot_id, |booking| booking.is_active());
        for booking_id in &cancelled_bookings {
            ledger::release(tables, *booking_id, CancelReason::ProposalRemoved, at)?;
        }
        tables.slots.shift_remove(&slot_id);
        info!(
            %slot_id,
            %confirmed_slot_id,
            refunded = cancelled_bookings.len(),
            "overlapping proposal removed"
        );
        removed.push(RemovedProposal {
            slot_id,
            cancelled_bookings,
        });
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::models::{BookingStatus, PaymentKind},
        services::test_support::{Fixture, now},
    };

    fn interval_of(fx: &Fixture, slot_id: Uuid) -> Interval {
        confirmed_interval(fx.slot(slot_id), fx.settings)
    }

    #[test]
    fn short_slots_block_a_full_hour() {
        let mut fx = Fixture::new();
        let slot = fx.slot_for(fx.instructor, 10, 0, 30);
        let interval = interval_of(&fx, slot);
        assert_eq!(interval.end - interval.start, Duration::minutes(60));

        let long = fx.slot_for(fx.instructor, 12, 0, 90);
        let interval = interval_of(&fx, long);
        assert_eq!(interval.end - interval.start, Duration::minutes(90));
    }

    #[test]
    fn lowest_free_court_is_picked() {
        let mut fx = Fixture::new();
        let other_instructor = Uuid::new_v4();
        let first = fx.slot_for(other_instructor, 10, 0, 60);
        let interval = interval_of(&fx, first);
        let court = find_free_resource(&fx.tables, fx.club, other_instructor, interval, None)
            .unwrap();
        assert_eq!(court, fx.courts[0]);
        assign(&mut fx.tables, first, court, interval).unwrap();

        let second = fx.slot_at(10, 30);
        let interval = interval_of(&fx, second);
        let court = find_free_resource(&fx.tables, fx.club, fx.instructor, interval, None).unwrap();
        assert_eq!(court, fx.courts[1]);
        assign(&mut fx.tables, second, court, interval).unwrap();

        let third = fx.slot_for(Uuid::new_v4(), 10, 45, 60);
        let interval = interval_of(&fx, third);
        assert!(matches!(
            find_free_resource(&fx.tables, fx.club, Uuid::new_v4(), interval, None),
            Err(AssignmentError::NoResourceAvailable { .. })
        ));
    }

    #[test]
    fn manual_court_blocks_are_respected() {
        let mut fx = Fixture::new();
        let slot = fx.slot_at(10, 0);
        let interval = interval_of(&fx, slot);
        fx.tables.schedule.push(ScheduleBlockEntity {
            id: Uuid::new_v4(),
            owner: ScheduleOwner::Court(fx.courts[0]),
            start: interval.start,
            end: interval.end,
            slot_id: None,
            reason: "maintenance".into(),
        });
        let court = find_free_resource(&fx.tables, fx.club, fx.instructor, interval, None).unwrap();
        assert_eq!(court, fx.courts[1]);
    }

    #[test]
    fn busy_instructor_cannot_be_assigned() {
        let mut fx = Fixture::new();
        let first = fx.slot_at(10, 0);
        let interval = interval_of(&fx, first);
        assign(&mut fx.tables, first, fx.courts[0], interval).unwrap();

        let overlapping = fx.slot_at(10, 30);
        let interval = interval_of(&fx, overlapping);
        assert!(matches!(
            find_free_resource(&fx.tables, fx.club, fx.instructor, interval, None),
            Err(AssignmentError::InstructorBusy { .. })
        ));
    }

    #[test]
    fn release_restores_the_proposal_interval() {
        let mut fx = Fixture::new();
        let slot = fx.slot_for(fx.instructor, 10, 0, 30);
        let interval = interval_of(&fx, slot);
        assign(&mut fx.tables, slot, fx.courts[0], interval).unwrap();
        assert_eq!(fx.tables.schedule.len(), 2);

        release_resource(&mut fx.tables, slot).unwrap();
        assert_eq!(fx.slot(slot).court_id, None);
        assert_eq!(fx.slot(slot).end, fx.slot(slot).base_end);
        assert!(fx.tables.schedule.is_empty());
    }

    #[test]
    fn overlapping_proposals_are_removed_and_refunded() {
        let mut fx = Fixture::new();
        let winner = fx.slot_at(10, 0);
        let inside = fx.slot_at(10, 30);
        let outside = fx.slot_at(11, 0);
        let user = fx.user(10_000);
        let booking = fx.pending(inside, user, 2);
        ledger::block(
            &mut fx.tables,
            user,
            PaymentKind::Funds,
            2_000,
            booking,
            inside,
            "join",
            now(),
        )
        .unwrap();

        let interval = interval_of(&fx, winner);
        assign(&mut fx.tables, winner, fx.courts[0], interval).unwrap();
        let removed =
            remove_overlapping_proposals(&mut fx.tables, winner, fx.instructor, interval, now())
                .unwrap();

        assert_eq!(
            removed,
            vec![RemovedProposal {
                slot_id: inside,
                cancelled_bookings: vec![booking],
            }]
        );
        assert!(!fx.tables.slots.contains_key(&inside));
        assert!(fx.tables.slots.contains_key(&outside));
        assert_eq!(fx.booking(booking).status, BookingStatus::Cancelled);
        assert_eq!(
            fx.booking(booking).cancel_reason,
            Some(CancelReason::ProposalRemoved)
        );
        assert_eq!(fx.user_entity(user).blocked_credit, 0);
    }
}
