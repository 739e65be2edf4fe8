use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::orders::OrderEntity, value_objects::enums::order_statuses::OrderStatus,
};

#[automock]
#[async_trait]
pub trait OrderRepository {
    async fn find_by_id(&self, order_id: Uuid) -> Result<Option<OrderEntity>>;

    async fn attach_payment_intent(
        &self,
        order_id: Uuid,
        payment_intent_id: &str,
        total_minor: i64,
    ) -> Result<()>;

    /// Moves the order to `to` only while its current status is one of `from`.
    /// Returns whether a row changed.
    async fn transition_status(
        &self,
        order_id: Uuid,
        from: Vec<OrderStatus>,
        to: OrderStatus,
    ) -> Result<bool>;
}
