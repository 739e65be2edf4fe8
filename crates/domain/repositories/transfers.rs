use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::{
    entities::transfers::{InsertTransferEntity, TransferEntity},
    value_objects::enums::transfer_statuses::TransferStatus,
};

#[automock]
#[async_trait]
pub trait TransferRepository {
    /// Inserts the claim row unless a transfer already exists for the payment
    /// intent. `None` means another delivery got there first.
    async fn claim(&self, transfer: InsertTransferEntity) -> Result<Option<TransferEntity>>;

    /// Flips a `failed` transfer back to `pending` and bumps `attempts`.
    /// `None` when the transfer is missing or not `failed`.
    async fn claim_retry(&self, payment_intent_id: &str) -> Result<Option<TransferEntity>>;

    async fn find_by_payment_intent_id(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<TransferEntity>>;

    /// Records a Stripe transfer id; a reversed transfer is left untouched.
    async fn mark_succeeded(&self, payment_intent_id: &str, stripe_transfer_id: &str)
    -> Result<bool>;

    async fn mark_failed(&self, payment_intent_id: &str, reason: &str) -> Result<()>;

    async fn update_status_by_stripe_transfer_id(
        &self,
        stripe_transfer_id: &str,
        status: TransferStatus,
    ) -> Result<bool>;
}
