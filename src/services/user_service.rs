//! Balance views and blocked balance reconciliation for users.

use uuid::Uuid;

use crate::{
    dto::user::{BalanceResponse, CorrectionDto, LedgerEntryDto, ReconcileResponse},
    error::ServiceError,
    services::{
        ledger::{self, Correction},
        slot_model,
    },
    state::SharedState,
};

pub async fn user_balance(
    state: &SharedState,
    user_id: Uuid,
) -> Result<BalanceResponse, ServiceError> {
    let tables = state.read_tables().await?;
    slot_model::require_user(&tables, user_id).map(BalanceResponse::from)
}

/// Ledger entries of the user, newest first.
pub async fn user_ledger(
    state: &SharedState,
    user_id: Uuid,
) -> Result<Vec<LedgerEntryDto>, ServiceError> {
    let tables = state.read_tables().await?;
    slot_model::require_user(&tables, user_id)?;
    let mut entries: Vec<LedgerEntryDto> =
        tables.user_ledger(user_id).map(LedgerEntryDto::from).collect();
    entries.reverse();
    Ok(entries)
}

/// Recompute the blocked balances of one user from their pending bookings.
pub async fn reconcile_user(
    state: &SharedState,
    user_id: Uuid,
) -> Result<ReconcileResponse, ServiceError> {
    state
        .transact(None, move |tables| {
            let corrections = ledger::reconcile_user(tables, user_id)?;
            let balance = slot_model::require_user(tables, user_id).map(BalanceResponse::from)?;
            Ok(ReconcileResponse {
                balance,
                corrections: corrections.into_iter().map(CorrectionDto::from).collect(),
            })
        })
        .await
}

/// Recompute the blocked balances of every user.
pub async fn reconcile_all(state: &SharedState) -> Result<Vec<Correction>, ServiceError> {
    state
        .transact(None, |tables| Ok(ledger::reconcile_all(tables)))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::models::PaymentKind,
        dto::common::PaymentKindDto,
        services::test_support::{Fixture, now},
    };

    #[tokio::test]
    async fn reconcile_restores_the_blocked_balance() {
        let mut fx = Fixture::new();
        let slot = fx.slot_at(10, 0);
        let user = fx.user(10_000);
        let booking = fx.pending(slot, user, 2);
        let kind = PaymentKind::Funds;
        ledger::block(&mut fx.tables, user, kind, 2_000, booking, slot, "join", now()).unwrap();
        fx.tables.users[&user].blocked_credit = 7_000;
        let state = fx.into_state().await;

        let response = reconcile_user(&state, user).await.unwrap();
        assert_eq!(response.balance.blocked_credit, 2_000);
        assert_eq!(response.balance.available_credit, 8_000);
        assert_eq!(
            response.corrections,
            vec![CorrectionDto {
                kind: PaymentKindDto::Funds,
                recorded: 7_000,
                expected: 2_000,
            }]
        );

        assert!(reconcile_all(&state).await.unwrap().is_empty());
        let ledger = user_ledger(&state, user).await.unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].amount, 2_000);
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let state = Fixture::new().into_state().await;
        assert!(matches!(
            user_balance(&state, Uuid::new_v4()).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
