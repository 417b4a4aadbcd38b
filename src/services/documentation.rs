use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the slot race backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::slot_stream,
        crate::routes::slots::create_slot,
        crate::routes::slots::list_slots,
        crate::routes::slots::get_slot,
        crate::routes::slots::join_slot,
        crate::routes::bookings::cancel_booking,
        crate::routes::users::balance,
        crate::routes::users::ledger,
        crate::routes::users::reconcile,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::slot::CreateSlotRequest,
            crate::dto::slot::SlotState,
            crate::dto::slot::OptionOccupancy,
            crate::dto::slot::RecycledSpots,
            crate::dto::booking::JoinSlotRequest,
            crate::dto::booking::JoinResponse,
            crate::dto::booking::CancelBookingRequest,
            crate::dto::booking::CancelResponse,
            crate::dto::user::BalanceResponse,
            crate::dto::user::LedgerEntryDto,
            crate::dto::user::ReconcileResponse,
            crate::dto::user::CorrectionDto,
            crate::dto::sse::Handshake,
            crate::dto::sse::SlotConfirmedEvent,
            crate::dto::sse::SlotRemovedEvent,
            crate::dto::sse::BookingCancelledEvent,
            crate::state::lifecycle::SlotPhase,
        )
    ),
    tags(
        (name = "slots", description = "Slot proposals and joins"),
        (name = "bookings", description = "Booking cancellation"),
        (name = "users", description = "Balances, ledger and reconciliation"),
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
    )
)]
pub struct ApiDoc;
