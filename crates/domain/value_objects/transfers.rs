use serde::Serialize;

use crate::domain::entities::{
    payment_calculations::PaymentCalculationEntity, transfers::TransferEntity,
};

#[derive(Debug, Serialize)]
pub struct TransferDto {
    pub transfer: TransferEntity,
    pub calculation: Option<PaymentCalculationEntity>,
}
