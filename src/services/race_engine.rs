//! Join handling and promotion of the first option that fills.
//!
//! Everything here runs inside one store transaction scoped to the slot; an
//! error anywhere drops the transaction, so a failed promotion leaves no
//! trace of the join that triggered it.

use time::{Date, OffsetDateTime};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    config::EngineSettings,
    dao::{
        models::{BookingEntity, BookingStatus, CancelReason, Classification, PaymentKind},
        tables::Tables,
    },
    dto::booking::JoinResponse,
    error::ServiceError,
    services::{
        assignment::{self, RemovedProposal},
        classification::{self, BandLookup},
        exclusivity::{self, SameDayCancellation},
        ledger,
        pricing::{per_person_price, points_cost},
        slot_model, slot_service, sse_events,
    },
    state::{
        SharedState,
        lifecycle::{SlotEvent, transition},
    },
};

/// Collaborators and settings a join needs.
pub struct EngineContext<'a> {
    pub settings: EngineSettings,
    pub bands: &'a dyn BandLookup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinRequest {
    pub slot_id: Uuid,
    pub user_id: Uuid,
    pub group_size: u8,
    pub payment: PaymentKind,
    /// Recycled spot to take on a confirmed slot.
    pub spot_index: Option<u8>,
}

/// Side effects of an option winning the race.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Promotion {
    pub court_id: Uuid,
    /// Settled bookings of the winning option.
    pub winners: Vec<Uuid>,
    /// Bookings of sibling options, cancelled and refunded.
    pub option_lost: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    pub booking_id: Uuid,
    pub slot_id: Uuid,
    pub status: BookingStatus,
    pub payment: PaymentKind,
    /// Amount blocked (pending) or paid (confirmed), in units of `payment`.
    pub amount: u64,
    pub spot_index: u8,
    pub is_recycled: bool,
    pub promotion: Option<Promotion>,
    pub same_day_cancelled: Vec<SameDayCancellation>,
    pub removed_proposals: Vec<RemovedProposal>,
}

/// Record a join and promote the option when it fills.
pub fn join_slot(
    tables: &mut Tables,
    ctx: &EngineContext<'_>,
    request: &JoinRequest,
    at: OffsetDateTime,
) -> Result<JoinOutcome, ServiceError> {
    let slot = slot_model::require_slot(tables, request.slot_id)?;
    let user = slot_model::require_user(tables, request.user_id)?;
    slot_model::ensure_option(slot, request.group_size)?;

    let confirmed = slot_model::is_confirmed(slot);
    if confirmed
        && slot
            .recycled_spots
            .get(&request.group_size)
            .is_none_or(|spots| spots.is_empty())
    {
        debug!(slot_id = %slot.id, user_id = %user.id, "join lost the race");
        return Err(ServiceError::SlotAlreadyConfirmed);
    }

    if slot_model::active_bookings(tables, slot.id).any(|booking| booking.user_id == user.id) {
        return Err(ServiceError::AlreadyJoined);
    }

    let day = slot_model::slot_day(tables, slot);
    exclusivity::check_eligible(tables, user.id, day)?;

    let candidate = if slot.classification_open {
        None
    } else {
        let instructor = tables.instructors.get(&slot.instructor_id).ok_or_else(|| {
            ServiceError::NotFound(format!("instructor `{}` not found", slot.instructor_id))
        })?;
        let candidate = classification::classify(ctx.bands, user, instructor);
        classification::ensure_matches(slot, &candidate)?;
        Some(candidate)
    };

    if confirmed {
        join_recycled(tables, ctx, request, day, at)
    } else {
        join_racing(tables, ctx, request, candidate, at)
    }
}

fn join_racing(
    tables: &mut Tables,
    ctx: &EngineContext<'_>,
    request: &JoinRequest,
    candidate: Option<Classification>,
    at: OffsetDateTime,
) -> Result<JoinOutcome, ServiceError> {
    let JoinRequest {
        slot_id,
        user_id,
        group_size,
        payment,
        ..
    } = *request;
    let slot = slot_model::require_slot(tables, slot_id)?;
    transition(slot_model::phase(tables, slot), SlotEvent::Joined)?;
    let spot_index = slot_model::free_spot_index(tables, slot_id, group_size).ok_or_else(|| {
        ServiceError::InvalidState(format!("option of {group_size} is already full"))
    })?;

    let price = per_person_price(slot.unit_price, group_size);
    let amount = match payment {
        PaymentKind::Funds => price,
        PaymentKind::Points => points_cost(price, ctx.settings.minor_units_per_point),
    };

    let booking_id = Uuid::new_v4();
    ledger::block(
        tables,
        user_id,
        payment,
        amount,
        booking_id,
        slot_id,
        format!("join slot {slot_id} as group of {group_size}"),
        at,
    )?;
    tables.bookings.insert(
        booking_id,
        BookingEntity {
            id: booking_id,
            user_id,
            slot_id,
            group_size,
            spot_index,
            status: BookingStatus::Pending,
            payment,
            amount_blocked: amount,
            is_recycled: false,
            cancel_reason: None,
            created_at: at,
            updated_at: at,
        },
    );
    if let (Some(candidate), Some(slot)) = (candidate, tables.slots.get_mut(&slot_id)) {
        classification::fix_once(slot, candidate)?;
    }
    debug!(%slot_id, %user_id, %booking_id, group_size, amount, "pending booking recorded");

    let mut outcome = JoinOutcome {
        booking_id,
        slot_id,
        status: BookingStatus::Pending,
        payment,
        amount,
        spot_index,
        is_recycled: false,
        promotion: None,
        same_day_cancelled: Vec::new(),
        removed_proposals: Vec::new(),
    };

    if slot_model::is_full(tables, slot_id, group_size) {
        promote(tables, ctx, slot_id, group_size, at, &mut outcome)?;
        outcome.status = BookingStatus::Confirmed;
    }
    Ok(outcome)
}

/// Confirm the option of `group_size`: court, settlement, refunds and cleanup as one unit.
fn promote(
    tables: &mut Tables,
    ctx: &EngineContext<'_>,
    slot_id: Uuid,
    group_size: u8,
    at: OffsetDateTime,
    outcome: &mut JoinOutcome,
) -> Result<(), ServiceError> {
    let slot = slot_model::require_slot(tables, slot_id)?;
    transition(slot_model::phase(tables, slot), SlotEvent::Promoted)?;
    let interval = assignment::confirmed_interval(slot, ctx.settings);
    let (club_id, instructor_id) = (slot.club_id, slot.instructor_id);
    let day = slot_model::slot_day(tables, slot);

    let court_id =
        assignment::find_free_resource(tables, club_id, instructor_id, interval, Some(slot_id))?;
    assignment::assign(tables, slot_id, court_id, interval)?;

    let winners = tables.slot_booking_ids(slot_id, |booking| {
        booking.status == BookingStatus::Pending && booking.group_size == group_size
    });
    for booking_id in &winners {
        ledger::settle(tables, *booking_id, at)?;
    }

    let option_lost =
        tables.slot_booking_ids(slot_id, |booking| booking.status == BookingStatus::Pending);
    for booking_id in &option_lost {
        ledger::release(tables, *booking_id, CancelReason::OptionLost, at)?;
    }

    let winner_users: Vec<Uuid> = winners
        .iter()
        .filter_map(|booking_id| tables.bookings.get(booking_id))
        .map(|booking| booking.user_id)
        .collect();
    for user_id in winner_users {
        let cancelled =
            exclusivity::cancel_other_pending_same_day(tables, user_id, slot_id, day, at)?;
        outcome.same_day_cancelled.extend(cancelled);
    }

    outcome.removed_proposals =
        assignment::remove_overlapping_proposals(tables, slot_id, instructor_id, interval, at)?;

    info!(
        %slot_id,
        %court_id,
        group_size,
        winners = winners.len(),
        option_lost = option_lost.len(),
        same_day_cancelled = outcome.same_day_cancelled.len(),
        removed_proposals = outcome.removed_proposals.len(),
        "option filled; slot confirmed"
    );
    outcome.promotion = Some(Promotion {
        court_id,
        winners,
        option_lost,
    });
    Ok(())
}

/// Take a vacated spot of a confirmed slot; the booking is paid on the spot.
fn join_recycled(
    tables: &mut Tables,
    ctx: &EngineContext<'_>,
    request: &JoinRequest,
    day: Date,
    at: OffsetDateTime,
) -> Result<JoinOutcome, ServiceError> {
    let JoinRequest {
        slot_id,
        user_id,
        group_size,
        payment,
        spot_index: requested,
    } = *request;
    let slot = slot_model::require_slot(tables, slot_id)?;
    let spots = slot
        .recycled_spots
        .get(&group_size)
        .ok_or(ServiceError::SlotAlreadyConfirmed)?;
    let spot_index = match requested {
        Some(index) if spots.contains(&index) => index,
        Some(index) => {
            return Err(ServiceError::InvalidInput(format!(
                "spot {index} is not open for rebooking"
            )));
        }
        None => spots
            .first()
            .copied()
            .ok_or(ServiceError::SlotAlreadyConfirmed)?,
    };

    if slot.recycled_slots_only_points && payment == PaymentKind::Funds {
        return Err(ServiceError::RecycledSpotRequiresPoints);
    }
    let amount = match payment {
        PaymentKind::Points => ctx.settings.recycled_spot_points_cost,
        PaymentKind::Funds => per_person_price(slot.unit_price, group_size),
    };
    let recycled_left = slot.available_recycled_slots.saturating_sub(1);
    transition(
        slot_model::phase(tables, slot),
        SlotEvent::RecycledSpotTaken { recycled_left },
    )?;

    let booking_id = Uuid::new_v4();
    ledger::block(
        tables,
        user_id,
        payment,
        amount,
        booking_id,
        slot_id,
        format!("rebook spot {spot_index} of slot {slot_id}"),
        at,
    )?;
    tables.bookings.insert(
        booking_id,
        BookingEntity {
            id: booking_id,
            user_id,
            slot_id,
            group_size,
            spot_index,
            status: BookingStatus::Pending,
            payment,
            amount_blocked: amount,
            is_recycled: true,
            cancel_reason: None,
            created_at: at,
            updated_at: at,
        },
    );
    ledger::settle(tables, booking_id, at)?;

    if let Some(slot) = tables.slots.get_mut(&slot_id) {
        if let Some(spots) = slot.recycled_spots.get_mut(&group_size) {
            spots.remove(&spot_index);
            if spots.is_empty() {
                slot.recycled_spots.remove(&group_size);
            }
        }
        slot.available_recycled_slots = recycled_left;
        slot.has_recycled_slots = recycled_left > 0;
        slot.recycled_slots_only_points = slot.has_recycled_slots;
    }

    let same_day_cancelled =
        exclusivity::cancel_other_pending_same_day(tables, user_id, slot_id, day, at)?;
    info!(%slot_id, %user_id, %booking_id, spot_index, recycled_left, "recycled spot rebooked");

    Ok(JoinOutcome {
        booking_id,
        slot_id,
        status: BookingStatus::Confirmed,
        payment,
        amount,
        spot_index,
        is_recycled: true,
        promotion: None,
        same_day_cancelled,
        removed_proposals: Vec::new(),
    })
}

/// Join a slot in its own transaction and publish the resulting events.
pub async fn join(state: &SharedState, request: JoinRequest) -> Result<JoinResponse, ServiceError> {
    let settings = state.engine();
    let bands = state.bands();

    let (outcome, slot, notices) = state
        .transact(Some(request.slot_id), move |tables| {
            let ctx = EngineContext {
                settings,
                bands: bands.as_ref(),
            };
            let outcome = join_slot(tables, &ctx, &request, OffsetDateTime::now_utc())?;
            let slot = slot_service::slot_state_of(tables, outcome.slot_id, settings)?;
            let notices = sse_events::join_notices(tables, settings, &outcome);
            Ok((outcome, slot, notices))
        })
        .await?;

    sse_events::publish(state, notices);
    Ok(JoinResponse {
        booking_id: outcome.booking_id,
        status: outcome.status.into(),
        payment: outcome.payment.into(),
        amount: outcome.amount,
        spot_index: outcome.spot_index,
        is_recycled: outcome.is_recycled,
        slot,
    })
}
