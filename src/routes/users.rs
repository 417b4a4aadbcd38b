use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::user::{BalanceResponse, LedgerEntryDto, ReconcileResponse},
    error::AppError,
    services::user_service,
    state::SharedState,
};

/// Balance, ledger and reconciliation endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/users/{id}/balance", get(balance))
        .route("/users/{id}/ledger", get(ledger))
        .route("/users/{id}/reconcile", post(reconcile))
}

#[utoipa::path(
    get,
    path = "/users/{id}/balance",
    tag = "users",
    params(("id" = Uuid, Path, description = "User identifier")),
    responses(
        (status = 200, description = "Funds and points with their blocked shares", body = BalanceResponse),
        (status = 404, description = "User not found")
    )
)]
pub async fn balance(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BalanceResponse>, AppError> {
    Ok(Json(user_service::user_balance(&state, id).await?))
}

/// Ledger entries of a user, newest first.
#[utoipa::path(
    get,
    path = "/users/{id}/ledger",
    tag = "users",
    params(("id" = Uuid, Path, description = "User identifier")),
    responses(
        (status = 200, description = "Ledger entries", body = [LedgerEntryDto]),
        (status = 404, description = "User not found")
    )
)]
pub async fn ledger(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<LedgerEntryDto>>, AppError> {
    Ok(Json(user_service::user_ledger(&state, id).await?))
}

/// Recompute the blocked balances of a user from their pending bookings.
#[utoipa::path(
    post,
    path = "/users/{id}/reconcile",
    tag = "users",
    params(("id" = Uuid, Path, description = "User identifier")),
    responses(
        (status = 200, description = "Balance after reconciliation", body = ReconcileResponse),
        (status = 404, description = "User not found")
    )
)]
pub async fn reconcile(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReconcileResponse>, AppError> {
    Ok(Json(user_service::reconcile_user(&state, id).await?))
}
