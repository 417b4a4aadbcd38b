//! Table fixtures shared by the service unit tests.

use std::sync::Arc;

use time::{Duration, OffsetDateTime, macros::datetime};
use uuid::Uuid;

use crate::{
    config::{AppConfig, EngineSettings},
    dao::{
        booking_store::memory::MemoryBookingStore,
        models::{
            BookingEntity, BookingStatus, ClubEntity, CourtEntity, Gender, InstructorEntity,
            LevelRangeEntity, PaymentKind, SlotEntity, UserEntity,
        },
        tables::Tables,
    },
    services::{pricing::per_person_price, slot_model},
    state::{AppState, SharedState},
};

pub const UNIT_PRICE: u64 = 4_000;

pub fn now() -> OffsetDateTime {
    datetime!(2026-10-17 08:00 UTC)
}

pub struct Fixture {
    pub tables: Tables,
    pub club: Uuid,
    pub instructor: Uuid,
    pub courts: Vec<Uuid>,
    pub settings: EngineSettings,
}

impl Fixture {
    /// One club at UTC with two courts and an instructor with two bands.
    pub fn new() -> Self {
        let mut tables = Tables::default();
        let club = Uuid::new_v4();
        tables.clubs.insert(
            club,
            ClubEntity {
                id: club,
                name: "Club".into(),
                utc_offset_minutes: 0,
            },
        );

        let courts: Vec<Uuid> = (1..=2)
            .map(|number| {
                let id = Uuid::new_v4();
                tables.courts.insert(
                    id,
                    CourtEntity {
                        id,
                        club_id: club,
                        number,
                    },
                );
                id
            })
            .collect();

        let instructor = Uuid::new_v4();
        tables.instructors.insert(
            instructor,
            InstructorEntity {
                id: instructor,
                club_id: club,
                name: "Coach".into(),
                level_ranges: vec![
                    LevelRangeEntity {
                        min_level: 0.0,
                        max_level: 2.99,
                        label: "beginner".into(),
                    },
                    LevelRangeEntity {
                        min_level: 3.0,
                        max_level: 7.0,
                        label: "advanced".into(),
                    },
                ],
            },
        );

        Self {
            tables,
            club,
            instructor,
            courts,
            settings: EngineSettings::default(),
        }
    }

    pub fn user(&mut self, credit: u64) -> Uuid {
        self.user_with(2.0, Gender::Male, credit, 0)
    }

    pub fn user_with(&mut self, level: f32, gender: Gender, credit: u64, points: u64) -> Uuid {
        let id = Uuid::new_v4();
        self.tables.users.insert(
            id,
            UserEntity {
                id,
                name: format!("user-{}", self.tables.users.len()),
                level,
                gender,
                credit,
                blocked_credit: 0,
                points,
                blocked_points: 0,
            },
        );
        id
    }

    /// One-hour proposal on 2026-10-20 for the fixture instructor.
    pub fn slot_at(&mut self, hour: i64, minute: i64) -> Uuid {
        self.slot_for(self.instructor, hour, minute, 60)
    }

    /// One-hour proposal `days` after 2026-10-20.
    pub fn slot_on(&mut self, days: i64, hour: i64) -> Uuid {
        self.slot_at(days * 24 + hour, 0)
    }

    pub fn slot_for(&mut self, instructor: Uuid, hour: i64, minute: i64, minutes: i64) -> Uuid {
        let id = Uuid::new_v4();
        let start =
            datetime!(2026-10-20 00:00 UTC) + Duration::hours(hour) + Duration::minutes(minute);
        let end = start + Duration::minutes(minutes);
        self.tables.slots.insert(
            id,
            SlotEntity {
                id,
                club_id: self.club,
                instructor_id: instructor,
                start,
                end,
                base_end: end,
                option_sizes: vec![1, 2, 3, 4],
                unit_price: UNIT_PRICE,
                court_id: None,
                classification_open: false,
                classification: None,
                recycled_spots: Default::default(),
                available_recycled_slots: 0,
                has_recycled_slots: false,
                recycled_slots_only_points: false,
                created_at: now(),
            },
        );
        id
    }

    /// Raw pending booking; balances are left untouched.
    pub fn pending(&mut self, slot_id: Uuid, user_id: Uuid, group_size: u8) -> Uuid {
        let id = Uuid::new_v4();
        let spot_index =
            slot_model::free_spot_index(&self.tables, slot_id, group_size).unwrap_or_default();
        self.tables.bookings.insert(
            id,
            BookingEntity {
                id,
                user_id,
                slot_id,
                group_size,
                spot_index,
                status: BookingStatus::Pending,
                payment: PaymentKind::Funds,
                amount_blocked: per_person_price(UNIT_PRICE, group_size),
                is_recycled: false,
                cancel_reason: None,
                created_at: now(),
                updated_at: now(),
            },
        );
        id
    }

    pub fn user_entity(&self, user_id: Uuid) -> &UserEntity {
        &self.tables.users[&user_id]
    }

    pub fn booking(&self, booking_id: Uuid) -> &BookingEntity {
        &self.tables.bookings[&booking_id]
    }

    pub fn slot(&self, slot_id: Uuid) -> &SlotEntity {
        &self.tables.slots[&slot_id]
    }

    /// Shared state backed by an in-memory store seeded with the fixture tables.
    pub async fn into_state(self) -> SharedState {
        let state = AppState::new(AppConfig::new(self.settings, Vec::new()));
        state
            .set_store(Arc::new(MemoryBookingStore::seeded(self.tables)))
            .await;
        state
    }
}
