/// Court and instructor allocation for confirmed slots.
pub mod assignment;
/// Leaving slots and recycling vacated spots.
pub mod cancellation;
/// Skill band and gender classification of slots.
pub mod classification;
/// OpenAPI documentation generation.
pub mod documentation;
/// One confirmed booking per user and club day.
pub mod exclusivity;
/// Health check service.
pub mod health_service;
/// Funds and points blocking, settlement and refunds.
pub mod ledger;
/// Slot price lookup and rounding.
pub mod pricing;
/// Join handling and option promotion.
pub mod race_engine;
/// Periodic blocked balance reconciliation.
pub mod reconciler;
/// Queries over slots, options and bookings.
pub mod slot_model;
/// Slot proposals and slot views.
pub mod slot_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Storage connection supervisor.
pub mod storage_supervisor;
/// Balance views and reconciliation endpoints.
pub mod user_service;

#[cfg(test)]
mod test_support;
