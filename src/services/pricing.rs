//! Price lookup consulted when a slot is created and when a join is priced.

use time::{OffsetDateTime, UtcOffset};
use uuid::Uuid;

use crate::config::PriceTier;

/// Pure price function for a whole slot starting at `at` (club-local time).
pub trait PricingPolicy: Send + Sync {
    fn price_for_instant(
        &self,
        club_id: Uuid,
        instructor_id: Uuid,
        at: OffsetDateTime,
    ) -> Option<u64>;
}

/// Price tiers keyed by instructor and minute of the club day.
#[derive(Debug, Clone, Default)]
pub struct TieredPricing {
    tiers: Vec<PriceTier>,
}

impl TieredPricing {
    pub fn new(tiers: Vec<PriceTier>) -> Self {
        Self { tiers }
    }
}

impl PricingPolicy for TieredPricing {
    fn price_for_instant(
        &self,
        _club_id: Uuid,
        instructor_id: Uuid,
        at: OffsetDateTime,
    ) -> Option<u64> {
        let minute = u16::from(at.hour()) * 60 + u16::from(at.minute());
        self.tiers
            .iter()
            .find(|tier| {
                tier.instructor_id == instructor_id
                    && tier.from_minute <= minute
                    && minute < tier.to_minute
            })
            .map(|tier| tier.unit_price)
    }
}

/// Per-person share of `unit_price`, rounded half up to the minor unit.
pub fn per_person_price(unit_price: u64, group_size: u8) -> u64 {
    let size = u64::from(group_size.max(1));
    unit_price / size + u64::from(unit_price % size * 2 >= size)
}

/// Points needed to pay `amount` minor units; partial points round up.
pub fn points_cost(amount: u64, minor_units_per_point: u64) -> u64 {
    amount.div_ceil(minor_units_per_point.max(1))
}

/// Points awarded for `amount` minor units paid; partial points are dropped.
pub fn points_award(amount: u64, minor_units_per_point: u64) -> u64 {
    amount / minor_units_per_point.max(1)
}

/// Convert `at` into the club's reference offset.
pub fn club_local(at: OffsetDateTime, utc_offset_minutes: i16) -> OffsetDateTime {
    let offset = UtcOffset::from_whole_seconds(i32::from(utc_offset_minutes) * 60)
        .unwrap_or(UtcOffset::UTC);
    at.to_offset(offset)
}

#[cfg(test)]
mod tests {
    use time::macros::{date, datetime};

    use super::*;

    #[test]
    fn per_person_price_rounds_half_up() {
        assert_eq!(per_person_price(4_000, 4), 1_000);
        assert_eq!(per_person_price(1_000, 3), 333);
        assert_eq!(per_person_price(1_001, 2), 501);
        assert_eq!(per_person_price(1_000, 1), 1_000);
        assert_eq!(per_person_price(5, 2), 3);
    }

    #[test]
    fn per_person_price_handles_the_largest_prices() {
        assert_eq!(per_person_price(u64::MAX, 1), u64::MAX);
        assert_eq!(per_person_price(u64::MAX, 2), u64::MAX / 2 + 1);
        assert_eq!(per_person_price(u64::MAX - 1, 4), u64::MAX / 4);
    }

    #[test]
    fn points_round_in_the_house_favour() {
        assert_eq!(points_cost(1_050, 100), 11);
        assert_eq!(points_award(1_050, 100), 10);
        assert_eq!(points_cost(1_000, 100), 10);
    }

    #[test]
    fn tiers_match_club_minutes() {
        let instructor = Uuid::new_v4();
        let pricing = TieredPricing::new(vec![
            PriceTier {
                instructor_id: instructor,
                from_minute: 8 * 60,
                to_minute: 17 * 60,
                unit_price: 3_600,
            },
            PriceTier {
                instructor_id: instructor,
                from_minute: 17 * 60,
                to_minute: 22 * 60,
                unit_price: 4_800,
            },
        ]);

        let club = Uuid::new_v4();
        assert_eq!(
            pricing.price_for_instant(club, instructor, datetime!(2026-10-17 16:59 UTC)),
            Some(3_600)
        );
        assert_eq!(
            pricing.price_for_instant(club, instructor, datetime!(2026-10-17 17:00 UTC)),
            Some(4_800)
        );
        assert_eq!(
            pricing.price_for_instant(club, Uuid::new_v4(), datetime!(2026-10-17 17:00 UTC)),
            None
        );
    }

    #[test]
    fn club_local_shifts_day_boundary() {
        let late = datetime!(2026-10-17 23:30 UTC);
        assert_eq!(club_local(late, 120).date(), date!(2026-10-18));
        assert_eq!(club_local(late, 0).date(), date!(2026-10-17));
    }
}
