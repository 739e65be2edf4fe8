use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::entities::processed_webhook_events::InsertProcessedWebhookEventEntity;

#[automock]
#[async_trait]
pub trait WebhookEventRepository {
    async fn is_processed(&self, stripe_event_id: &str) -> Result<bool>;

    async fn mark_processed(&self, event: InsertProcessedWebhookEventEntity) -> Result<()>;
}
