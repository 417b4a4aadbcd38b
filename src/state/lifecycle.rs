use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Phases a slot goes through between proposal and confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SlotPhase {
    /// Proposal without participants; classification unset.
    Open,
    /// Proposal with pending bookings competing across options.
    Racing,
    /// One option filled and a court is assigned.
    Confirmed,
    /// Confirmed, with at least one vacated spot open for points rebooking.
    ConfirmedWithRecycled,
    /// Proposal deleted because its instructor got confirmed over it. Terminal.
    Removed,
}

impl SlotPhase {
    /// Whether a court is assigned in this phase.
    pub fn is_confirmed(self) -> bool {
        matches!(self, SlotPhase::Confirmed | SlotPhase::ConfirmedWithRecycled)
    }
}

/// Events that can be applied to a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotEvent {
    /// A pending booking was recorded.
    Joined,
    /// A pending booking was withdrawn or lost; `remaining` active bookings are left.
    Withdrawn { remaining: usize },
    /// An option filled.
    Promoted,
    /// A confirmed participant left; `remaining` active bookings are left.
    ParticipantLeft { remaining: usize },
    /// A recycled spot was booked; `recycled_left` spots remain open.
    RecycledSpotTaken { recycled_left: u32 },
    /// The proposal is deleted.
    Removed,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the slot was in when the invalid event was received.
    pub from: SlotPhase,
    /// The event that cannot be applied from this phase.
    pub event: SlotEvent,
}

/// Compute the phase reached by applying `event` from `from`.
pub fn transition(from: SlotPhase, event: SlotEvent) -> Result<SlotPhase, InvalidTransition> {
    let next = match (from, event) {
        (SlotPhase::Open | SlotPhase::Racing, SlotEvent::Joined) => SlotPhase::Racing,
        (SlotPhase::Racing, SlotEvent::Withdrawn { remaining: 0 }) => SlotPhase::Open,
        (SlotPhase::Racing, SlotEvent::Withdrawn { .. }) => SlotPhase::Racing,
        (SlotPhase::Racing, SlotEvent::Promoted) => SlotPhase::Confirmed,
        (phase, SlotEvent::ParticipantLeft { remaining: 0 }) if phase.is_confirmed() => {
            SlotPhase::Open
        }
        (phase, SlotEvent::ParticipantLeft { .. }) if phase.is_confirmed() => {
            SlotPhase::ConfirmedWithRecycled
        }
        (SlotPhase::ConfirmedWithRecycled, SlotEvent::RecycledSpotTaken { recycled_left: 0 }) => {
            SlotPhase::Confirmed
        }
        (SlotPhase::ConfirmedWithRecycled, SlotEvent::RecycledSpotTaken { .. }) => {
            SlotPhase::ConfirmedWithRecycled
        }
        (SlotPhase::Open | SlotPhase::Racing, SlotEvent::Removed) => SlotPhase::Removed,
        (from, event) => return Err(InvalidTransition { from, event }),
    };

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(phase: SlotPhase, event: SlotEvent) -> SlotPhase {
        transition(phase, event).unwrap()
    }

    #[test]
    fn full_happy_path_through_slot() {
        let mut phase = SlotPhase::Open;
        phase = apply(phase, SlotEvent::Joined);
        assert_eq!(phase, SlotPhase::Racing);
        phase = apply(phase, SlotEvent::Joined);
        phase = apply(phase, SlotEvent::Promoted);
        assert_eq!(phase, SlotPhase::Confirmed);
        phase = apply(phase, SlotEvent::ParticipantLeft { remaining: 1 });
        assert_eq!(phase, SlotPhase::ConfirmedWithRecycled);
        phase = apply(phase, SlotEvent::RecycledSpotTaken { recycled_left: 0 });
        assert_eq!(phase, SlotPhase::Confirmed);
        phase = apply(phase, SlotEvent::ParticipantLeft { remaining: 1 });
        phase = apply(phase, SlotEvent::ParticipantLeft { remaining: 0 });
        assert_eq!(phase, SlotPhase::Open);
    }

    #[test]
    fn last_withdrawal_reopens_proposal() {
        assert_eq!(
            apply(SlotPhase::Racing, SlotEvent::Withdrawn { remaining: 0 }),
            SlotPhase::Open
        );
        assert_eq!(
            apply(SlotPhase::Racing, SlotEvent::Withdrawn { remaining: 2 }),
            SlotPhase::Racing
        );
    }

    #[test]
    fn confirmed_slot_cannot_be_promoted_or_joined() {
        for event in [SlotEvent::Promoted, SlotEvent::Joined, SlotEvent::Removed] {
            let err = transition(SlotPhase::Confirmed, event).unwrap_err();
            assert_eq!(err.from, SlotPhase::Confirmed);
            assert_eq!(err.event, event);
        }
    }

    #[test]
    fn removed_is_terminal() {
        for event in [
            SlotEvent::Joined,
            SlotEvent::Promoted,
            SlotEvent::Removed,
            SlotEvent::Withdrawn { remaining: 0 },
        ] {
            assert!(transition(SlotPhase::Removed, event).is_err());
        }
    }

    #[test]
    fn empty_proposal_cannot_be_promoted() {
        let err = transition(SlotPhase::Open, SlotEvent::Promoted).unwrap_err();
        assert_eq!(err.from, SlotPhase::Open);
    }
}
