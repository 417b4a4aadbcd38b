use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::dao::models::{
    BookingStatus, CancelReason, Classification, Gender, LedgerAction, PaymentKind,
};

/// Gender category exposed over the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GenderDto {
    Male,
    Female,
}

impl From<Gender> for GenderDto {
    fn from(value: Gender) -> Self {
        match value {
            Gender::Male => GenderDto::Male,
            Gender::Female => GenderDto::Female,
        }
    }
}

/// How a booking is paid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentKindDto {
    #[default]
    Funds,
    Points,
}

impl From<PaymentKind> for PaymentKindDto {
    fn from(value: PaymentKind) -> Self {
        match value {
            PaymentKind::Funds => PaymentKindDto::Funds,
            PaymentKind::Points => PaymentKindDto::Points,
        }
    }
}

impl From<PaymentKindDto> for PaymentKind {
    fn from(value: PaymentKindDto) -> Self {
        match value {
            PaymentKindDto::Funds => PaymentKind::Funds,
            PaymentKindDto::Points => PaymentKind::Points,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatusDto {
    Pending,
    Confirmed,
    Cancelled,
}

impl From<BookingStatus> for BookingStatusDto {
    fn from(value: BookingStatus) -> Self {
        match value {
            BookingStatus::Pending => BookingStatusDto::Pending,
            BookingStatus::Confirmed => BookingStatusDto::Confirmed,
            BookingStatus::Cancelled => BookingStatusDto::Cancelled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CancelReasonDto {
    Withdrawn,
    OptionLost,
    SameDayConfirmed,
    ParticipantLeft,
    ProposalRemoved,
}

impl From<CancelReason> for CancelReasonDto {
    fn from(value: CancelReason) -> Self {
        match value {
            CancelReason::Withdrawn => CancelReasonDto::Withdrawn,
            CancelReason::OptionLost => CancelReasonDto::OptionLost,
            CancelReason::SameDayConfirmed => CancelReasonDto::SameDayConfirmed,
            CancelReason::ParticipantLeft => CancelReasonDto::ParticipantLeft,
            CancelReason::ProposalRemoved => CancelReasonDto::ProposalRemoved,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LedgerActionDto {
    Block,
    Settle,
    Release,
    Credit,
}

impl From<LedgerAction> for LedgerActionDto {
    fn from(value: LedgerAction) -> Self {
        match value {
            LedgerAction::Block => LedgerActionDto::Block,
            LedgerAction::Settle => LedgerActionDto::Settle,
            LedgerAction::Release => LedgerActionDto::Release,
            LedgerAction::Credit => LedgerActionDto::Credit,
        }
    }
}

/// Classification fixed on a slot by its first participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ClassificationDto {
    pub level_band: Option<String>,
    pub gender: GenderDto,
}

impl From<Classification> for ClassificationDto {
    fn from(value: Classification) -> Self {
        Self {
            level_band: value.level_band,
            gender: value.gender.into(),
        }
    }
}
