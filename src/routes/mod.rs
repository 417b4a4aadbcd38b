use axum::Router;

use crate::state::SharedState;

pub mod bookings;
pub mod docs;
pub mod health;
pub mod slots;
pub mod sse;
pub mod users;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(sse::router())
        .merge(slots::router())
        .merge(bookings::router())
        .merge(users::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
