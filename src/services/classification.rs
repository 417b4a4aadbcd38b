//! Skill band lookup and the first-join-wins classification rule.

use uuid::Uuid;

use crate::{
    dao::{
        models::{Classification, InstructorEntity, SlotEntity, UserEntity},
        tables::Tables,
    },
    error::ServiceError,
    services::slot_model,
};

/// Resolves the band label of `user` within `instructor`'s configured ranges.
pub trait BandLookup: Send + Sync {
    fn band_for(&self, user: &UserEntity, instructor: &InstructorEntity) -> Option<String>;
}

/// Picks the first instructor range containing the user's level.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstructorBands;

impl BandLookup for InstructorBands {
    fn band_for(&self, user: &UserEntity, instructor: &InstructorEntity) -> Option<String> {
        instructor
            .level_ranges
            .iter()
            .find(|range| range.min_level <= user.level && user.level <= range.max_level)
            .map(|range| range.label.clone())
    }
}

/// Classification `user` would give (or must match on) a slot of `instructor`.
pub fn classify(
    bands: &dyn BandLookup,
    user: &UserEntity,
    instructor: &InstructorEntity,
) -> Classification {
    Classification {
        level_band: bands.band_for(user, instructor),
        gender: user.gender,
    }
}

/// Fail when `candidate` does not fit the classification fixed on `slot`.
pub fn ensure_matches(slot: &SlotEntity, candidate: &Classification) -> Result<(), ServiceError> {
    if slot.classification_open {
        return Ok(());
    }

    match &slot.classification {
        None => Ok(()),
        Some(fixed) => {
            if fixed.gender != candidate.gender {
                return Err(ServiceError::ClassificationMismatch(format!(
                    "slot is reserved for {:?} players",
                    fixed.gender
                )));
            }
            match &fixed.level_band {
                Some(band) if candidate.level_band.as_ref() != Some(band) => {
                    Err(ServiceError::ClassificationMismatch(format!(
                        "slot is reserved for level band `{band}`"
                    )))
                }
                _ => Ok(()),
            }
        }
    }
}

/// Set the slot classification if it is still unset; otherwise require a match.
pub fn fix_once(slot: &mut SlotEntity, candidate: Classification) -> Result<(), ServiceError> {
    if slot.classification_open {
        return Ok(());
    }
    ensure_matches(slot, &candidate)?;
    if slot.classification.is_none() {
        slot.classification = Some(candidate);
    }
    Ok(())
}

/// Clear the classification of a court-less slot left without active bookings.
pub fn clear_when_idle(tables: &mut Tables, slot_id: Uuid) {
    let idle = slot_model::active_bookings(tables, slot_id).next().is_none();
    if let Some(slot) = tables.slots.get_mut(&slot_id)
        && idle
        && slot.court_id.is_none()
    {
        slot.classification = None;
    }
}
