use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::entities::payment_calculations::{
    InsertPaymentCalculationEntity, PaymentCalculationEntity,
};

#[automock]
#[async_trait]
pub trait PaymentCalculationRepository {
    /// Writes the row unless one already exists for the payment intent.
    /// Returns whether a row was written.
    async fn insert_if_absent(&self, calculation: InsertPaymentCalculationEntity) -> Result<bool>;

    async fn find_by_payment_intent_id(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<PaymentCalculationEntity>>;
}
