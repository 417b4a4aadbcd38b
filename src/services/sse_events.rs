use indexmap::IndexSet;
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::{
    config::EngineSettings,
    dao::tables::Tables,
    dto::{
        slot::SlotState,
        sse::{BookingCancelledEvent, ServerEvent, SlotConfirmedEvent, SlotRemovedEvent},
    },
    services::{cancellation::CancelOutcome, race_engine::JoinOutcome, slot_service},
    state::SharedState,
};

const EVENT_SLOT_UPDATED: &str = "slot.updated";
const EVENT_SLOT_CONFIRMED: &str = "slot.confirmed";
const EVENT_SLOT_REMOVED: &str = "slot.removed";
const EVENT_BOOKING_CANCELLED: &str = "booking.cancelled";

/// Event collected inside a transaction and published once it commits.
#[derive(Debug)]
pub enum SlotNotice {
    Updated(SlotState),
    Confirmed(SlotConfirmedEvent),
    Removed(SlotRemovedEvent),
    BookingCancelled(BookingCancelledEvent),
}

fn booking_cancelled(tables: &Tables, booking_id: Uuid) -> Option<SlotNotice> {
    let booking = tables.bookings.get(&booking_id)?;
    let reason = booking.cancel_reason?;
    Some(SlotNotice::BookingCancelled(BookingCancelledEvent {
        booking_id,
        slot_id: booking.slot_id,
        user_id: booking.user_id,
        reason: reason.into(),
    }))
}

fn slot_updated(tables: &Tables, settings: EngineSettings, slot_id: Uuid) -> Option<SlotNotice> {
    slot_service::slot_state_of(tables, slot_id, settings)
        .ok()
        .map(SlotNotice::Updated)
}

/// Notices describing everything a join changed.
pub fn join_notices(
    tables: &Tables,
    settings: EngineSettings,
    outcome: &JoinOutcome,
) -> Vec<SlotNotice> {
    let mut notices = Vec::new();
    let mut touched = IndexSet::new();

    if let Some(promotion) = &outcome.promotion {
        notices.extend(
            promotion
                .option_lost
                .iter()
                .filter_map(|booking_id| booking_cancelled(tables, *booking_id)),
        );
    }
    for cancelled in &outcome.same_day_cancelled {
        notices.extend(booking_cancelled(tables, cancelled.booking_id));
        touched.insert(cancelled.slot_id);
    }
    for removed in &outcome.removed_proposals {
        notices.extend(
            removed
                .cancelled_bookings
                .iter()
                .filter_map(|booking_id| booking_cancelled(tables, *booking_id)),
        );
        notices.push(SlotNotice::Removed(SlotRemovedEvent {
            slot_id: removed.slot_id,
            confirmed_slot_id: outcome.slot_id,
        }));
        touched.shift_remove(&removed.slot_id);
    }
    notices.extend(
        touched
            .into_iter()
            .filter_map(|slot_id| slot_updated(tables, settings, slot_id)),
    );

    match (&outcome.promotion, slot_service::slot_state_of(tables, outcome.slot_id, settings)) {
        (Some(promotion), Ok(slot)) => notices.push(SlotNotice::Confirmed(SlotConfirmedEvent {
            slot,
            winners: promotion.winners.clone(),
        })),
        (None, Ok(slot)) => notices.push(SlotNotice::Updated(slot)),
        (_, Err(err)) => warn!(slot_id = %outcome.slot_id, error = %err, "joined slot vanished"),
    }
    notices
}

/// Notices describing a cancellation.
pub fn cancel_notices(
    tables: &Tables,
    settings: EngineSettings,
    outcome: &CancelOutcome,
) -> Vec<SlotNotice> {
    booking_cancelled(tables, outcome.booking_id)
        .into_iter()
        .chain(slot_updated(tables, settings, outcome.slot_id))
        .collect()
}

/// Broadcast committed notices on the slot stream.
pub fn publish(state: &SharedState, notices: Vec<SlotNotice>) {
    for notice in notices {
        match notice {
            SlotNotice::Updated(slot) => send_slot_event(state, EVENT_SLOT_UPDATED, &slot),
            SlotNotice::Confirmed(event) => send_slot_event(state, EVENT_SLOT_CONFIRMED, &event),
            SlotNotice::Removed(event) => send_slot_event(state, EVENT_SLOT_REMOVED, &event),
            SlotNotice::BookingCancelled(event) => {
                send_slot_event(state, EVENT_BOOKING_CANCELLED, &event)
            }
        }
    }
}

fn send_slot_event(state: &SharedState, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.slot_events().broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize slot SSE payload"),
    }
}
