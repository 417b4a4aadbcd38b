use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{
    BookingEntity, ClubEntity, CourtEntity, InstructorEntity, LedgerEntryEntity,
    ScheduleBlockEntity, SlotEntity, UserEntity,
};

/// Complete set of tables the engine reads and writes.
///
/// A transaction works on its own copy of the tables, so every mutation done
/// through `&mut Tables` is either committed as a whole or dropped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tables {
    #[serde(default)]
    pub clubs: IndexMap<Uuid, ClubEntity>,
    #[serde(default)]
    pub courts: IndexMap<Uuid, CourtEntity>,
    #[serde(default)]
    pub instructors: IndexMap<Uuid, InstructorEntity>,
    #[serde(default)]
    pub users: IndexMap<Uuid, UserEntity>,
    #[serde(default)]
    pub slots: IndexMap<Uuid, SlotEntity>,
    #[serde(default)]
    pub bookings: IndexMap<Uuid, BookingEntity>,
    #[serde(default)]
    pub schedule: Vec<ScheduleBlockEntity>,
    #[serde(default)]
    pub ledger: Vec<LedgerEntryEntity>,
}

impl Tables {
    /// Bookings recorded against `slot_id`, in insertion order.
    pub fn slot_bookings(&self, slot_id: Uuid) -> impl Iterator<Item = &BookingEntity> {
        self.bookings
            .values()
            .filter(move |booking| booking.slot_id == slot_id)
    }

    /// Bookings owned by `user_id`, in insertion order.
    pub fn user_bookings(&self, user_id: Uuid) -> impl Iterator<Item = &BookingEntity> {
        self.bookings
            .values()
            .filter(move |booking| booking.user_id == user_id)
    }

    /// Identifiers of the bookings on `slot_id` matching `predicate`.
    pub fn slot_booking_ids<P>(&self, slot_id: Uuid, predicate: P) -> Vec<Uuid>
    where
        P: Fn(&BookingEntity) -> bool,
    {
        self.slot_bookings(slot_id)
            .filter(|booking| predicate(booking))
            .map(|booking| booking.id)
            .collect()
    }

    /// Ledger entries of `user_id`, oldest first.
    pub fn user_ledger(&self, user_id: Uuid) -> impl Iterator<Item = &LedgerEntryEntity> {
        self.ledger
            .iter()
            .filter(move |entry| entry.user_id == user_id)
    }
}
