//! Slot proposals and the slot views served to clients.

use time::{Date, Duration, OffsetDateTime, macros::format_description};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    config::EngineSettings,
    dao::{models::SlotEntity, tables::Tables},
    dto::slot::{CreateSlotRequest, OptionOccupancy, RecycledSpots, SlotListQuery, SlotState},
    error::ServiceError,
    services::{
        assignment::{self, AssignmentError, Interval},
        pricing::{PricingPolicy, club_local, per_person_price},
        slot_model::{self, MAX_GROUP_SIZE},
        sse_events::{self, SlotNotice},
    },
    state::SharedState,
};

const DEFAULT_OPTION_SIZES: [u8; 4] = [1, 2, 3, 4];

/// Client view of `slot`.
pub fn slot_state(tables: &Tables, slot: &SlotEntity, settings: EngineSettings) -> SlotState {
    let occupancy = slot_model::occupancy_by_option(tables, slot);
    let occupancy_by_option = slot
        .option_sizes
        .iter()
        .map(|size| OptionOccupancy {
            group_size: *size,
            occupancy: occupancy.get(size).copied().unwrap_or_default(),
            per_person_price: per_person_price(slot.unit_price, *size),
        })
        .collect();
    let recycled_slots = slot
        .recycled_spots
        .iter()
        .filter(|(_, spots)| !spots.is_empty())
        .map(|(size, spots)| RecycledSpots {
            group_size: *size,
            spot_indices: spots.iter().copied().collect(),
            points_cost: settings.recycled_spot_points_cost,
        })
        .collect();

    SlotState {
        id: slot.id,
        club_id: slot.club_id,
        instructor_id: slot.instructor_id,
        start: slot.start,
        end: slot.end,
        phase: slot_model::phase(tables, slot),
        confirmed: slot_model::is_confirmed(slot),
        court_id: slot.court_id,
        classification_open: slot.classification_open,
        classification: slot.classification.clone().map(Into::into),
        unit_price: slot.unit_price,
        occupancy_by_option,
        recycled_slots,
        available_recycled_slots: slot.available_recycled_slots,
        recycled_slots_only_points: slot.recycled_slots_only_points,
    }
}

pub fn slot_state_of(
    tables: &Tables,
    slot_id: Uuid,
    settings: EngineSettings,
) -> Result<SlotState, ServiceError> {
    let slot = slot_model::require_slot(tables, slot_id)?;
    Ok(slot_state(tables, slot, settings))
}

/// Record a new open proposal priced at its club-local start.
pub fn propose_slot(
    tables: &mut Tables,
    pricing: &dyn PricingPolicy,
    request: &CreateSlotRequest,
    at: OffsetDateTime,
) -> Result<Uuid, ServiceError> {
    let club = slot_model::require_club(tables, request.club_id)?;
    let instructor = tables.instructors.get(&request.instructor_id).ok_or_else(|| {
        ServiceError::NotFound(format!("instructor `{}` not found", request.instructor_id))
    })?;
    if instructor.club_id != club.id {
        return Err(ServiceError::InvalidInput(format!(
            "instructor `{}` does not teach at club `{}`",
            instructor.id, club.id
        )));
    }
    let (club_id, utc_offset_minutes, instructor_id) =
        (club.id, club.utc_offset_minutes, instructor.id);
    if !tables.courts.values().any(|court| court.club_id == club_id) {
        return Err(ServiceError::InvalidInput(format!(
            "club `{club_id}` has no courts"
        )));
    }

    let option_sizes = normalize_option_sizes(request.option_sizes.as_deref())?;
    let end = request.start + Duration::minutes(i64::from(request.duration_minutes));
    let interval = Interval::new(request.start, end);
    if assignment::instructor_busy(tables, instructor_id, interval, None) {
        debug!(%instructor_id, "proposal overlaps a confirmed slot");
        return Err(AssignmentError::InstructorBusy {
            instructor_id,
            start: interval.start,
            end: interval.end,
        }
        .into());
    }

    let local_start = club_local(request.start, utc_offset_minutes);
    let unit_price = pricing
        .price_for_instant(club_id, instructor_id, local_start)
        .ok_or_else(|| {
            ServiceError::InvalidInput(format!(
                "no price configured for instructor `{instructor_id}` at {}",
                local_start.time()
            ))
        })?;

    let id = Uuid::new_v4();
    tables.slots.insert(
        id,
        SlotEntity {
            id,
            club_id,
            instructor_id,
            start: request.start,
            end,
            base_end: end,
            option_sizes,
            unit_price,
            court_id: None,
            classification_open: request.classification_open,
            classification: None,
            recycled_spots: Default::default(),
            available_recycled_slots: 0,
            has_recycled_slots: false,
            recycled_slots_only_points: false,
            created_at: at,
        },
    );
    info!(slot_id = %id, %instructor_id, unit_price, "slot proposed");
    Ok(id)
}

fn normalize_option_sizes(sizes: Option<&[u8]>) -> Result<Vec<u8>, ServiceError> {
    let Some(sizes) = sizes else {
        return Ok(DEFAULT_OPTION_SIZES.to_vec());
    };
    if sizes.is_empty() {
        return Err(ServiceError::InvalidInput(
            "a slot needs at least one option".into(),
        ));
    }
    if let Some(size) = sizes
        .iter()
        .find(|size| **size == 0 || **size > MAX_GROUP_SIZE)
    {
        return Err(ServiceError::InvalidInput(format!(
            "option size {size} is outside 1..={MAX_GROUP_SIZE}"
        )));
    }
    let mut sizes = sizes.to_vec();
    sizes.sort_unstable();
    sizes.dedup();
    Ok(sizes)
}

fn parse_day(raw: &str) -> Result<Date, ServiceError> {
    Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .map_err(|err| ServiceError::InvalidInput(format!("invalid date `{raw}`: {err}")))
}

/// Slots matching `query`, ordered by start.
pub fn filter_slots(
    tables: &Tables,
    query: &SlotListQuery,
    settings: EngineSettings,
) -> Result<Vec<SlotState>, ServiceError> {
    let day = query.date.as_deref().map(parse_day).transpose()?;
    let mut slots: Vec<&SlotEntity> = tables
        .slots
        .values()
        .filter(|slot| query.club_id.is_none_or(|club_id| slot.club_id == club_id))
        .filter(|slot| day.is_none_or(|day| slot_model::slot_day(tables, slot) == day))
        .collect();
    slots.sort_by_key(|slot| (slot.start, slot.id));
    Ok(slots
        .into_iter()
        .map(|slot| slot_state(tables, slot, settings))
        .collect())
}

/// Create a proposal and announce it.
pub async fn create_slot(
    state: &SharedState,
    request: CreateSlotRequest,
) -> Result<SlotState, ServiceError> {
    let settings = state.engine();
    let pricing = state.pricing();
    let slot = state
        .transact(None, move |tables| {
            let slot_id =
                propose_slot(tables, pricing.as_ref(), &request, OffsetDateTime::now_utc())?;
            slot_state_of(tables, slot_id, settings)
        })
        .await?;
    sse_events::publish(state, vec![SlotNotice::Updated(slot.clone())]);
    Ok(slot)
}

pub async fn get_slot_state(state: &SharedState, slot_id: Uuid) -> Result<SlotState, ServiceError> {
    let tables = state.read_tables().await?;
    slot_state_of(&tables, slot_id, state.engine())
}

pub async fn list_slots(
    state: &SharedState,
    query: SlotListQuery,
) -> Result<Vec<SlotState>, ServiceError> {
    let tables = state.read_tables().await?;
    filter_slots(&tables, &query, state.engine())
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::{
        config::PriceTier,
        services::{
            pricing::TieredPricing,
            test_support::{Fixture, UNIT_PRICE, now},
        },
        state::lifecycle::SlotPhase,
    };

    fn pricing(fx: &Fixture) -> TieredPricing {
        TieredPricing::new(vec![
            PriceTier {
                instructor_id: fx.instructor,
                from_minute: 8 * 60,
                to_minute: 18 * 60,
                unit_price: 4_000,
            },
            PriceTier {
                instructor_id: fx.instructor,
                from_minute: 18 * 60,
                to_minute: 22 * 60,
                unit_price: 5_500,
            },
        ])
    }

    fn request(fx: &Fixture, start: OffsetDateTime) -> CreateSlotRequest {
        CreateSlotRequest {
            club_id: fx.club,
            instructor_id: fx.instructor,
            start,
            duration_minutes: 60,
            option_sizes: None,
            classification_open: false,
        }
    }

    #[test]
    fn proposal_takes_the_tier_price() {
        let mut fx = Fixture::new();
        let pricing = pricing(&fx);
        let evening = request(&fx, datetime!(2026-10-21 19:00 UTC));

        let slot_id = propose_slot(&mut fx.tables, &pricing, &evening, now()).unwrap();
        let slot = fx.slot(slot_id);
        assert_eq!(slot.unit_price, 5_500);
        assert_eq!(slot.option_sizes, vec![1, 2, 3, 4]);
        assert_eq!(slot.end, datetime!(2026-10-21 20:00 UTC));
        assert_eq!(slot.court_id, None);

        let state = slot_state(&fx.tables, slot, fx.settings);
        assert_eq!(state.phase, SlotPhase::Open);
        assert_eq!(state.occupancy_by_option[1].per_person_price, 2_750);

        let mut unpriced = request(&fx, datetime!(2026-10-21 23:00 UTC));
        unpriced.option_sizes = Some(vec![4, 2, 2]);
        assert!(matches!(
            propose_slot(&mut fx.tables, &pricing, &unpriced, now()),
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[test]
    fn proposal_is_rejected_while_the_instructor_is_booked() {
        let mut fx = Fixture::new();
        let pricing = pricing(&fx);
        let confirmed = fx.slot_at(10, 0);
        let interval = assignment::confirmed_interval(fx.slot(confirmed), fx.settings);
        assignment::assign(&mut fx.tables, confirmed, fx.courts[0], interval).unwrap();

        let clash = request(&fx, datetime!(2026-10-20 10:30 UTC));
        assert!(matches!(
            propose_slot(&mut fx.tables, &pricing, &clash, now()),
            Err(ServiceError::NoResourceAvailable(_))
        ));

        let mut after = request(&fx, datetime!(2026-10-20 11:00 UTC));
        after.option_sizes = Some(vec![4, 2, 2]);
        let slot_id = propose_slot(&mut fx.tables, &pricing, &after, now()).unwrap();
        assert_eq!(fx.slot(slot_id).option_sizes, vec![2, 4]);
    }

    #[test]
    fn listing_filters_by_club_day() {
        let mut fx = Fixture::new();
        fx.tables.clubs[&fx.club].utc_offset_minutes = 120;
        let morning = fx.slot_at(10, 0);
        let late = fx.slot_at(23, 0);
        let user = fx.user(10_000);
        fx.pending(morning, user, 2);

        let query = |date: &str| SlotListQuery {
            club_id: Some(fx.club),
            date: Some(date.to_string()),
        };
        let tuesday = filter_slots(&fx.tables, &query("2026-10-20"), fx.settings).unwrap();
        assert_eq!(tuesday.len(), 1);
        assert_eq!(tuesday[0].id, morning);
        assert_eq!(tuesday[0].phase, SlotPhase::Racing);
        assert_eq!(tuesday[0].occupancy_by_option[1].occupancy, 1);
        assert_eq!(tuesday[0].unit_price, UNIT_PRICE);

        let wednesday = filter_slots(&fx.tables, &query("2026-10-21"), fx.settings).unwrap();
        assert_eq!(wednesday.iter().map(|slot| slot.id).collect::<Vec<_>>(), vec![late]);

        assert!(matches!(
            filter_slots(&fx.tables, &query("21/10/2026"), fx.settings),
            Err(ServiceError::InvalidInput(_))
        ));
    }
}
