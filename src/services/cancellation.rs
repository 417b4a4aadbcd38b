//! A participant leaving a slot, and what happens to the spot they leave.

use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::{
    config::EngineSettings,
    dao::{
        models::{BookingStatus, CancelReason, PaymentKind},
        tables::Tables,
    },
    dto::booking::CancelResponse,
    error::ServiceError,
    services::{
        assignment, classification, ledger, pricing::points_award, slot_model, slot_service,
        sse_events,
    },
    state::{
        SharedState,
        lifecycle::{SlotEvent, transition},
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelOutcome {
    pub booking_id: Uuid,
    pub slot_id: Uuid,
    pub user_id: Uuid,
    pub reason: CancelReason,
    /// Points credited for leaving a confirmed slot.
    pub points_awarded: Option<u64>,
    /// The slot lost its last participant and went back to a proposal.
    pub slot_reverted: bool,
    /// Spot opened for points rebooking.
    pub recycled_spot_index: Option<u8>,
}

fn already_cancelled(booking_id: Uuid) -> ServiceError {
    ServiceError::InvalidState(format!("booking `{booking_id}` is already cancelled"))
}

/// Cancel `booking_id` on behalf of `user_id`.
///
/// A pending booking is refunded. A confirmed booking is paid back in points
/// only; its spot is recycled, or the slot reverts when nobody is left.
pub fn cancel_booking(
    tables: &mut Tables,
    settings: EngineSettings,
    booking_id: Uuid,
    user_id: Uuid,
    at: OffsetDateTime,
) -> Result<CancelOutcome, ServiceError> {
    let booking = slot_model::require_booking(tables, booking_id)?;
    if booking.user_id != user_id {
        return Err(ServiceError::Unauthorized(format!(
            "booking `{booking_id}` belongs to another user"
        )));
    }
    let slot_id = booking.slot_id;
    let status = booking.status;
    if status == BookingStatus::Cancelled {
        return Err(already_cancelled(booking_id));
    }
    let slot = slot_model::require_slot(tables, slot_id)?;
    let remaining = slot_model::active_bookings(tables, slot_id)
        .filter(|other| other.id != booking_id)
        .count();
    let phase = slot_model::phase(tables, slot);

    match status {
        BookingStatus::Cancelled => Err(already_cancelled(booking_id)),
        BookingStatus::Pending => {
            if !slot_model::is_confirmed(slot) {
                transition(phase, SlotEvent::Withdrawn { remaining })?;
            }
            ledger::release(tables, booking_id, CancelReason::Withdrawn, at)?;
            classification::clear_when_idle(tables, slot_id);
            info!(%booking_id, %slot_id, %user_id, remaining, "pending booking withdrawn");
            Ok(CancelOutcome {
                booking_id,
                slot_id,
                user_id,
                reason: CancelReason::Withdrawn,
                points_awarded: None,
                slot_reverted: false,
                recycled_spot_index: None,
            })
        }
        BookingStatus::Confirmed => {
            transition(phase, SlotEvent::ParticipantLeft { remaining })?;
            leave_confirmed(tables, settings, booking_id, remaining, at)
        }
    }
}

fn leave_confirmed(
    tables: &mut Tables,
    settings: EngineSettings,
    booking_id: Uuid,
    remaining: usize,
    at: OffsetDateTime,
) -> Result<CancelOutcome, ServiceError> {
    let booking = tables
        .bookings
        .get_mut(&booking_id)
        .ok_or_else(|| ServiceError::NotFound(format!("booking `{booking_id}` not found")))?;
    booking.status = BookingStatus::Cancelled;
    booking.cancel_reason = Some(CancelReason::ParticipantLeft);
    booking.updated_at = at;
    let (user_id, slot_id, group_size, spot_index) = (
        booking.user_id,
        booking.slot_id,
        booking.group_size,
        booking.spot_index,
    );

    // Leaving a confirmed slot never returns currency.
    let points = match booking.payment {
        PaymentKind::Funds => points_award(booking.amount_blocked, settings.minor_units_per_point),
        PaymentKind::Points => booking.amount_blocked,
    };
    ledger::credit_points(
        tables,
        user_id,
        points,
        Some(booking_id),
        format!("left confirmed slot {slot_id}"),
        at,
    )?;

    let mut outcome = CancelOutcome {
        booking_id,
        slot_id,
        user_id,
        reason: CancelReason::ParticipantLeft,
        points_awarded: Some(points),
        slot_reverted: false,
        recycled_spot_index: None,
    };

    if remaining == 0 {
        assignment::release_resource(tables, slot_id)?;
        if let Some(slot) = tables.slots.get_mut(&slot_id) {
            slot.classification = None;
            slot.recycled_spots.clear();
            slot.available_recycled_slots = 0;
            slot.has_recycled_slots = false;
            slot.recycled_slots_only_points = false;
        }
        outcome.slot_reverted = true;
        info!(%slot_id, %booking_id, %user_id, points, "last participant left; slot reverted");
    } else if let Some(slot) = tables.slots.get_mut(&slot_id) {
        slot.recycled_spots
            .entry(group_size)
            .or_default()
            .insert(spot_index);
        slot.available_recycled_slots += 1;
        slot.has_recycled_slots = true;
        slot.recycled_slots_only_points = true;
        outcome.recycled_spot_index = Some(spot_index);
        info!(%slot_id, %booking_id, %user_id, points, spot_index, "participant left; spot recycled");
    }
    Ok(outcome)
}

/// Cancel a booking in its own transaction and publish the resulting events.
pub async fn cancel(
    state: &SharedState,
    booking_id: Uuid,
    user_id: Uuid,
) -> Result<CancelResponse, ServiceError> {
    let settings = state.engine();
    let snapshot = state.read_tables().await?;
    let slot_id = slot_model::require_booking(&snapshot, booking_id)?.slot_id;

    let (outcome, slot, notices) = state
        .transact(Some(slot_id), move |tables| {
            let outcome =
                cancel_booking(tables, settings, booking_id, user_id, OffsetDateTime::now_utc())?;
            let slot = slot_service::slot_state_of(tables, outcome.slot_id, settings)?;
            let notices = sse_events::cancel_notices(tables, settings, &outcome);
            Ok((outcome, slot, notices))
        })
        .await?;

    sse_events::publish(state, notices);
    Ok(CancelResponse {
        booking_id: outcome.booking_id,
        status: BookingStatus::Cancelled.into(),
        points_awarded: outcome.points_awarded,
        slot_reverted: outcome.slot_reverted,
        recycled_spot_index: outcome.recycled_spot_index,
        slot,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::models::{Classification, Gender},
        services::test_support::{Fixture, now},
        state::lifecycle::SlotPhase,
    };

    /// Slot confirmed by `users.len()` settled bookings of that size.
    fn confirmed_slot(fx: &mut Fixture, users: &[Uuid]) -> (Uuid, Vec<Uuid>) {
        let slot = fx.slot_for(fx.instructor, 10, 0, 30);
        let size = users.len() as u8;
        let bookings: Vec<Uuid> = users
            .iter()
            .map(|user| {
                let booking = fx.pending(slot, *user, size);
                let amount = fx.booking(booking).amount_blocked;
                let kind = PaymentKind::Funds;
                ledger::block(&mut fx.tables, *user, kind, amount, booking, slot, "join", now())
                    .unwrap();
                booking
            })
            .collect();
        let interval = assignment::confirmed_interval(fx.slot(slot), fx.settings);
        assignment::assign(&mut fx.tables, slot, fx.courts[0], interval).unwrap();
        for booking in &bookings {
            ledger::settle(&mut fx.tables, *booking, now()).unwrap();
        }
        (slot, bookings)
    }

    #[test]
    fn withdrawing_refunds_and_reopens() {
        let mut fx = Fixture::new();
        let slot = fx.slot_at(10, 0);
        let user = fx.user(10_000);
        let booking = fx.pending(slot, user, 2);
        let kind = PaymentKind::Funds;
        ledger::block(&mut fx.tables, user, kind, 2_000, booking, slot, "join", now()).unwrap();
        fx.tables.slots[&slot].classification = Some(Classification {
            level_band: Some("beginner".into()),
            gender: Gender::Male,
        });

        let outcome = cancel_booking(&mut fx.tables, fx.settings, booking, user, now()).unwrap();
        assert_eq!(outcome.reason, CancelReason::Withdrawn);
        assert_eq!(outcome.points_awarded, None);
        assert_eq!(fx.user_entity(user).blocked_credit, 0);
        assert_eq!(fx.user_entity(user).credit, 10_000);
        assert_eq!(fx.slot(slot).classification, None);
        assert_eq!(slot_model::phase(&fx.tables, fx.slot(slot)), SlotPhase::Open);

        assert!(matches!(
            cancel_booking(&mut fx.tables, fx.settings, booking, user, now()),
            Err(ServiceError::InvalidState(_))
        ));
    }

    #[test]
    fn booking_on_a_removed_proposal_is_already_cancelled() {
        let mut fx = Fixture::new();
        let winner = fx.slot_at(10, 0);
        let shadow = fx.slot_at(10, 30);
        let user = fx.user(10_000);
        let booking = fx.pending(shadow, user, 2);
        let kind = PaymentKind::Funds;
        ledger::block(&mut fx.tables, user, kind, 2_000, booking, shadow, "join", now()).unwrap();

        let interval = assignment::confirmed_interval(fx.slot(winner), fx.settings);
        assignment::assign(&mut fx.tables, winner, fx.courts[0], interval).unwrap();
        let instructor = fx.instructor;
        let removed = assignment::remove_overlapping_proposals(
            &mut fx.tables,
            winner,
            instructor,
            interval,
            now(),
        )
        .unwrap();
        assert_eq!(removed.len(), 1);
        assert!(!fx.tables.slots.contains_key(&shadow));

        let err = cancel_booking(&mut fx.tables, fx.settings, booking, user, now()).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
        assert_eq!(fx.user_entity(user).credit, 10_000);
        assert_eq!(fx.user_entity(user).blocked_credit, 0);
    }

    #[test]
    fn only_the_owner_can_cancel() {
        let mut fx = Fixture::new();
        let slot = fx.slot_at(10, 0);
        let (owner, intruder) = (fx.user(10_000), fx.user(10_000));
        let booking = fx.pending(slot, owner, 2);

        assert!(matches!(
            cancel_booking(&mut fx.tables, fx.settings, booking, intruder, now()),
            Err(ServiceError::Unauthorized(_))
        ));
        assert_eq!(fx.booking(booking).status, BookingStatus::Pending);
    }

    #[test]
    fn leaving_a_confirmed_slot_pays_points_and_recycles_the_spot() {
        let mut fx = Fixture::new();
        let users: Vec<Uuid> = (0..3).map(|_| fx.user(5_000)).collect();
        let (slot, bookings) = confirmed_slot(&mut fx, &users);
        assert_eq!(fx.user_entity(users[1]).credit, 5_000 - 1_333);

        let outcome =
            cancel_booking(&mut fx.tables, fx.settings, bookings[1], users[1], now()).unwrap();
        assert_eq!(outcome.points_awarded, Some(13));
        assert_eq!(outcome.recycled_spot_index, Some(1));
        assert!(!outcome.slot_reverted);
        assert_eq!(fx.user_entity(users[1]).points, 13);
        assert_eq!(fx.user_entity(users[1]).credit, 5_000 - 1_333);

        let slot = fx.slot(slot);
        assert!(slot.court_id.is_some());
        assert_eq!(slot.available_recycled_slots, 1);
        assert!(slot.has_recycled_slots);
        assert!(slot.recycled_slots_only_points);
        assert_eq!(
            slot_model::phase(&fx.tables, slot),
            SlotPhase::ConfirmedWithRecycled
        );
    }

    #[test]
    fn last_participant_out_reverts_the_slot() {
        let mut fx = Fixture::new();
        let users: Vec<Uuid> = (0..2).map(|_| fx.user(5_000)).collect();
        let (slot, bookings) = confirmed_slot(&mut fx, &users);
        assert_eq!(fx.slot(slot).end - fx.slot(slot).start, time::Duration::hours(1));

        cancel_booking(&mut fx.tables, fx.settings, bookings[0], users[0], now()).unwrap();
        let outcome =
            cancel_booking(&mut fx.tables, fx.settings, bookings[1], users[1], now()).unwrap();

        assert!(outcome.slot_reverted);
        assert_eq!(outcome.recycled_spot_index, None);
        let reverted = fx.slot(slot);
        assert_eq!(reverted.court_id, None);
        assert_eq!(reverted.classification, None);
        assert_eq!(reverted.end, reverted.base_end);
        assert_eq!(reverted.available_recycled_slots, 0);
        assert!(reverted.recycled_spots.is_empty());
        assert!(fx.tables.schedule.is_empty());
        assert_eq!(slot_model::phase(&fx.tables, reverted), SlotPhase::Open);
    }
}
