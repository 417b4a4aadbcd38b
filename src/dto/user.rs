use serde::Serialize;
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::{LedgerEntryEntity, UserEntity},
    dto::common::{LedgerActionDto, PaymentKindDto},
    services::ledger::Correction,
};

/// Funds and points of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct BalanceResponse {
    pub user_id: Uuid,
    pub credit: u64,
    pub blocked_credit: u64,
    pub available_credit: u64,
    pub points: u64,
    pub blocked_points: u64,
    pub available_points: u64,
}

impl From<&UserEntity> for BalanceResponse {
    fn from(user: &UserEntity) -> Self {
        Self {
            user_id: user.id,
            credit: user.credit,
            blocked_credit: user.blocked_credit,
            available_credit: user.credit.saturating_sub(user.blocked_credit),
            points: user.points,
            blocked_points: user.blocked_points,
            available_points: user.points.saturating_sub(user.blocked_points),
        }
    }
}

/// Audit record of a balance mutation.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LedgerEntryDto {
    pub id: Uuid,
    pub kind: PaymentKindDto,
    pub action: LedgerActionDto,
    pub amount: u64,
    pub concept: String,
    pub booking_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub at: OffsetDateTime,
}

impl From<&LedgerEntryEntity> for LedgerEntryDto {
    fn from(entry: &LedgerEntryEntity) -> Self {
        Self {
            id: entry.id,
            kind: entry.kind.into(),
            action: entry.action.into(),
            amount: entry.amount,
            concept: entry.concept.clone(),
            booking_id: entry.booking_id,
            at: entry.at,
        }
    }
}

/// Blocked field corrected by reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CorrectionDto {
    pub kind: PaymentKindDto,
    pub recorded: u64,
    pub expected: u64,
}

impl From<Correction> for CorrectionDto {
    fn from(value: Correction) -> Self {
        Self {
            kind: value.kind.into(),
            recorded: value.recorded,
            expected: value.expected,
        }
    }
}

/// Outcome of a blocked balance reconciliation.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReconcileResponse {
    pub balance: BalanceResponse,
    pub corrections: Vec<CorrectionDto>,
}
