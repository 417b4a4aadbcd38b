//! Ledger gateway: the only code allowed to touch user balances.
//!
//! Every operation appends a [`LedgerEntryEntity`] and leaves `blocked_credit`
//! and `blocked_points` equal to the amount held by pending bookings on slots
//! without a court, per payment kind. Only one booking per club day can win,
//! so each day holds its largest amount and the days add up.

use std::collections::BTreeMap;

use thiserror::Error;
use time::{Date, OffsetDateTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        models::{BookingStatus, CancelReason, LedgerAction, LedgerEntryEntity, PaymentKind},
        tables::Tables,
    },
    services::slot_model,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("insufficient funds: {required} required, {available} available")]
    InsufficientFunds { required: u64, available: u64 },
    #[error("insufficient points: {required} required, {available} available")]
    InsufficientPoints { required: u64, available: u64 },
    #[error("user `{0}` not found")]
    UnknownUser(Uuid),
    #[error("booking `{0}` not found")]
    UnknownBooking(Uuid),
    #[error("booking `{booking_id}` is not pending")]
    NotBlocked { booking_id: Uuid },
}

/// Blocked amounts a user should carry, derived from live bookings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockedBalance {
    pub credit: u64,
    pub points: u64,
}

/// A blocked field that did not match its derived value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Correction {
    pub user_id: Uuid,
    pub kind: PaymentKind,
    pub recorded: u64,
    pub expected: u64,
}

/// Largest pending amount per club day and kind, skipping `except`.
fn holds_by_day(
    tables: &Tables,
    user_id: Uuid,
    except: Option<Uuid>,
) -> BTreeMap<(PaymentKind, Date), u64> {
    let mut holds = BTreeMap::new();
    for booking in tables.user_bookings(user_id) {
        if booking.status != BookingStatus::Pending || Some(booking.id) == except {
            continue;
        }
        let Some(slot) = tables.slots.get(&booking.slot_id) else {
            continue;
        };
        if slot.court_id.is_some() {
            continue;
        }
        let day = slot_model::slot_day(tables, slot);
        let held = holds.entry((booking.payment, day)).or_insert(0u64);
        *held = (*held).max(booking.amount_blocked);
    }
    holds
}

fn total_held(holds: &BTreeMap<(PaymentKind, Date), u64>, kind: PaymentKind) -> u64 {
    holds
        .iter()
        .filter(|((held_kind, _), _)| *held_kind == kind)
        .map(|(_, amount)| *amount)
        .sum()
}

fn shortfall(kind: PaymentKind, required: u64, available: u64) -> LedgerError {
    match kind {
        PaymentKind::Funds => LedgerError::InsufficientFunds {
            required,
            available,
        },
        PaymentKind::Points => LedgerError::InsufficientPoints {
            required,
            available,
        },
    }
}

#[allow(clippy::too_many_arguments)]
fn record(
    tables: &mut Tables,
    user_id: Uuid,
    kind: PaymentKind,
    action: LedgerAction,
    amount: u64,
    concept: String,
    booking_id: Option<Uuid>,
    at: OffsetDateTime,
) {
    tables.ledger.push(LedgerEntryEntity {
        id: Uuid::new_v4(),
        user_id,
        kind,
        action,
        amount,
        concept,
        booking_id,
        at,
    });
}

/// Blocked amounts derived from the user's pending bookings on court-less slots:
/// the sum over club days of each day's largest pending amount.
pub fn expected_blocked(tables: &Tables, user_id: Uuid) -> BlockedBalance {
    let holds = holds_by_day(tables, user_id, None);
    BlockedBalance {
        credit: total_held(&holds, PaymentKind::Funds),
        points: total_held(&holds, PaymentKind::Points),
    }
}

/// Overwrite the blocked fields with their derived values, returning what changed.
fn refresh_blocked(tables: &mut Tables, user_id: Uuid) -> Result<Vec<Correction>, LedgerError> {
    let expected = expected_blocked(tables, user_id);
    let user = tables
        .users
        .get_mut(&user_id)
        .ok_or(LedgerError::UnknownUser(user_id))?;

    let mut corrections = Vec::new();
    if user.blocked_credit != expected.credit {
        corrections.push(Correction {
            user_id,
            kind: PaymentKind::Funds,
            recorded: user.blocked_credit,
            expected: expected.credit,
        });
        user.blocked_credit = expected.credit;
    }
    if user.blocked_points != expected.points {
        corrections.push(Correction {
            user_id,
            kind: PaymentKind::Points,
            recorded: user.blocked_points,
            expected: expected.points,
        });
        user.blocked_points = expected.points;
    }
    Ok(corrections)
}

/// Hold `amount` against the user for a booking on `slot_id` about to be recorded.
///
/// Must run before the booking is inserted. The user's total has to cover
/// every club day that can still be charged once this booking joins its day;
/// otherwise it fails without side effects.
#[allow(clippy::too_many_arguments)]
pub fn block(
    tables: &mut Tables,
    user_id: Uuid,
    kind: PaymentKind,
    amount: u64,
    booking_id: Uuid,
    slot_id: Uuid,
    concept: impl Into<String>,
    at: OffsetDateTime,
) -> Result<(), LedgerError> {
    let day = tables
        .slots
        .get(&slot_id)
        .map(|slot| slot_model::slot_day(tables, slot));
    let mut holds = holds_by_day(tables, user_id, Some(booking_id));
    let same_day = day
        .and_then(|day| holds.remove(&(kind, day)))
        .unwrap_or_default();
    let other_days = total_held(&holds, kind);

    let user = tables
        .users
        .get_mut(&user_id)
        .ok_or(LedgerError::UnknownUser(user_id))?;
    let total = match kind {
        PaymentKind::Funds => user.credit,
        PaymentKind::Points => user.points,
    };

    let free = total.saturating_sub(other_days);
    if free < amount.max(same_day) {
        debug!(%user_id, ?kind, amount, available = free, "block rejected");
        return Err(shortfall(kind, amount, free));
    }

    let held = other_days + amount.max(same_day);
    match kind {
        PaymentKind::Funds => user.blocked_credit = held,
        PaymentKind::Points => user.blocked_points = held,
    }
    record(
        tables,
        user_id,
        kind,
        LedgerAction::Block,
        amount,
        concept.into(),
        Some(booking_id),
        at,
    );
    Ok(())
}

/// Turn the amount blocked by a pending booking into a debit and confirm it.
pub fn settle(
    tables: &mut Tables,
    booking_id: Uuid,
    at: OffsetDateTime,
) -> Result<(), LedgerError> {
    let booking = tables
        .bookings
        .get(&booking_id)
        .ok_or(LedgerError::UnknownBooking(booking_id))?;
    if booking.status != BookingStatus::Pending {
        return Err(LedgerError::NotBlocked { booking_id });
    }
    let (user_id, kind, amount, slot_id) = (
        booking.user_id,
        booking.payment,
        booking.amount_blocked,
        booking.slot_id,
    );

    let user = tables
        .users
        .get_mut(&user_id)
        .ok_or(LedgerError::UnknownUser(user_id))?;
    let total = match kind {
        PaymentKind::Funds => &mut user.credit,
        PaymentKind::Points => &mut user.points,
    };
    if *total < amount {
        return Err(shortfall(kind, amount, *total));
    }
    *total -= amount;

    if let Some(booking) = tables.bookings.get_mut(&booking_id) {
        booking.status = BookingStatus::Confirmed;
        booking.updated_at = at;
    }
    record(
        tables,
        user_id,
        kind,
        LedgerAction::Settle,
        amount,
        format!("slot {slot_id} confirmed"),
        Some(booking_id),
        at,
    );
    refresh_blocked(tables, user_id)?;
    Ok(())
}

/// Give back the amount blocked by a pending booking and cancel it.
pub fn release(
    tables: &mut Tables,
    booking_id: Uuid,
    reason: CancelReason,
    at: OffsetDateTime,
) -> Result<(), LedgerError> {
    let booking = tables
        .bookings
        .get_mut(&booking_id)
        .ok_or(LedgerError::UnknownBooking(booking_id))?;
    if booking.status != BookingStatus::Pending {
        return Err(LedgerError::NotBlocked { booking_id });
    }
    booking.status = BookingStatus::Cancelled;
    booking.cancel_reason = Some(reason);
    booking.updated_at = at;
    let (user_id, kind, amount, slot_id) = (
        booking.user_id,
        booking.payment,
        booking.amount_blocked,
        booking.slot_id,
    );

    record(
        tables,
        user_id,
        kind,
        LedgerAction::Release,
        amount,
        format!("slot {slot_id}: {reason:?}"),
        Some(booking_id),
        at,
    );
    refresh_blocked(tables, user_id)?;
    Ok(())
}

/// Award loyalty points unconditionally.
pub fn credit_points(
    tables: &mut Tables,
    user_id: Uuid,
    amount: u64,
    booking_id: Option<Uuid>,
    concept: impl Into<String>,
    at: OffsetDateTime,
) -> Result<(), LedgerError> {
    let user = tables
        .users
        .get_mut(&user_id)
        .ok_or(LedgerError::UnknownUser(user_id))?;
    user.points = user.points.saturating_add(amount);
    record(
        tables,
        user_id,
        PaymentKind::Points,
        LedgerAction::Credit,
        amount,
        concept.into(),
        booking_id,
        at,
    );
    refresh_blocked(tables, user_id)?;
    Ok(())
}

/// Recompute one user's blocked fields, returning the corrections applied.
pub fn reconcile_user(tables: &mut Tables, user_id: Uuid) -> Result<Vec<Correction>, LedgerError> {
    let corrections = refresh_blocked(tables, user_id)?;
    for correction in &corrections {
        warn!(
            user_id = %correction.user_id,
            kind = ?correction.kind,
            recorded = correction.recorded,
            expected = correction.expected,
            "blocked balance drifted; corrected"
        );
    }
    Ok(corrections)
}

/// Recompute the blocked fields of every user.
pub fn reconcile_all(tables: &mut Tables) -> Vec<Correction> {
    let user_ids: Vec<Uuid> = tables.users.keys().copied().collect();
    let corrections: Vec<Correction> = user_ids
        .into_iter()
        .filter_map(|user_id| reconcile_user(tables, user_id).ok())
        .flatten()
        .collect();
    if !corrections.is_empty() {
        info!(count = corrections.len(), "reconciled blocked balances");
    }
    corrections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{Fixture, now};

    fn entries(fx: &Fixture, user: Uuid, action: LedgerAction) -> u64 {
        fx.tables
            .user_ledger(user)
            .filter(|entry| entry.action == action && entry.kind == PaymentKind::Funds)
            .map(|entry| entry.amount)
            .sum()
    }

    #[test]
    fn block_reports_shortfall_without_side_effects() {
        let mut fx = Fixture::new();
        let user = fx.user(500);
        let err = block(
            &mut fx.tables,
            user,
            PaymentKind::Funds,
            1_000,
            Uuid::new_v4(),
            Uuid::new_v4(),
            "join",
            now(),
        )
        .unwrap_err();

        assert_eq!(
            err,
            LedgerError::InsufficientFunds {
                required: 1_000,
                available: 500
            }
        );
        assert_eq!(fx.user_entity(user).blocked_credit, 0);
        assert_eq!(fx.tables.ledger.len(), 0);
    }

    #[test]
    fn blocked_balance_is_the_largest_pending_amount_of_the_day() {
        let mut fx = Fixture::new();
        let user = fx.user(10_000);
        let morning = fx.slot_at(9, 0);
        let evening = fx.slot_at(18, 0);

        let small = fx.pending(morning, user, 4);
        let kind = PaymentKind::Funds;
        block(&mut fx.tables, user, kind, 1_000, small, morning, "join", now()).unwrap();
        let large = fx.pending(evening, user, 2);
        block(&mut fx.tables, user, kind, 2_000, large, evening, "join", now()).unwrap();
        assert_eq!(fx.user_entity(user).blocked_credit, 2_000);

        release(&mut fx.tables, large, CancelReason::Withdrawn, now()).unwrap();
        assert_eq!(fx.user_entity(user).blocked_credit, 1_000);
        assert_eq!(fx.booking(large).status, BookingStatus::Cancelled);

        release(&mut fx.tables, small, CancelReason::Withdrawn, now()).unwrap();
        assert_eq!(fx.user_entity(user).blocked_credit, 0);
    }

    #[test]
    fn holds_on_different_days_add_up() {
        let mut fx = Fixture::new();
        let user = fx.user(3_000);
        let monday = fx.slot_on(0, 10);
        let tuesday = fx.slot_on(1, 10);
        let wednesday = fx.slot_on(2, 10);
        let kind = PaymentKind::Funds;

        let first = Uuid::new_v4();
        block(&mut fx.tables, user, kind, 2_000, first, monday, "join", now()).unwrap();
        fx.pending(monday, user, 2);
        let second = Uuid::new_v4();
        block(&mut fx.tables, user, kind, 1_000, second, tuesday, "join", now()).unwrap();
        fx.pending(tuesday, user, 4);
        assert_eq!(fx.user_entity(user).blocked_credit, 3_000);
        assert_eq!(expected_blocked(&fx.tables, user).credit, 3_000);

        let third = Uuid::new_v4();
        assert_eq!(
            block(&mut fx.tables, user, kind, 1_000, third, wednesday, "join", now()),
            Err(LedgerError::InsufficientFunds {
                required: 1_000,
                available: 0
            })
        );
        assert_eq!(fx.user_entity(user).blocked_credit, 3_000);
    }

    #[test]
    fn settle_debits_the_blocked_amount_once() {
        let mut fx = Fixture::new();
        let user = fx.user(10_000);
        let slot = fx.slot_at(9, 0);
        let booking = fx.pending(slot, user, 4);
        let kind = PaymentKind::Funds;
        block(&mut fx.tables, user, kind, 1_000, booking, slot, "join", now()).unwrap();
        fx.tables.slots[&slot].court_id = Some(fx.courts[0]);

        settle(&mut fx.tables, booking, now()).unwrap();
        assert_eq!(fx.user_entity(user).credit, 9_000);
        assert_eq!(fx.user_entity(user).blocked_credit, 0);
        assert_eq!(fx.booking(booking).status, BookingStatus::Confirmed);

        assert_eq!(
            settle(&mut fx.tables, booking, now()),
            Err(LedgerError::NotBlocked {
                booking_id: booking
            })
        );
        assert_eq!(entries(&fx, user, LedgerAction::Block), 1_000);
        assert_eq!(entries(&fx, user, LedgerAction::Settle), 1_000);
    }

    #[test]
    fn reconcile_repairs_drift() {
        let mut fx = Fixture::new();
        let user = fx.user(10_000);
        let slot = fx.slot_at(9, 0);
        fx.pending(slot, user, 2);
        fx.tables.users[&user].blocked_credit = 7;

        let corrections = reconcile_all(&mut fx.tables);
        assert_eq!(
            corrections,
            vec![Correction {
                user_id: user,
                kind: PaymentKind::Funds,
                recorded: 7,
                expected: 2_000,
            }]
        );
        assert_eq!(fx.user_entity(user).blocked_credit, 2_000);
        assert!(reconcile_user(&mut fx.tables, user).unwrap().is_empty());
    }

    #[test]
    fn credit_points_is_unconditional() {
        let mut fx = Fixture::new();
        let user = fx.user(0);
        credit_points(&mut fx.tables, user, 40, None, "goodwill", now()).unwrap();
        assert_eq!(fx.user_entity(user).points, 40);
        let ghost = Uuid::new_v4();
        assert_eq!(
            credit_points(&mut fx.tables, ghost, 1, None, "ghost", now()),
            Err(LedgerError::UnknownUser(ghost))
        );
    }
}
