use anyhow::Result;
use async_trait::async_trait;
use diesel::{RunQueryDsl, dsl::exists, insert_into, prelude::*, select};
use std::sync::Arc;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::processed_webhook_events},
};
use domain::{
    entities::processed_webhook_events::InsertProcessedWebhookEventEntity,
    repositories::webhook_events::WebhookEventRepository,
};

pub struct WebhookEventPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl WebhookEventPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl WebhookEventRepository for WebhookEventPostgres {
    async fn is_processed(&self, stripe_event_id: &str) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let processed = select(exists(
            processed_webhook_events::table
                .filter(processed_webhook_events::stripe_event_id.eq(stripe_event_id)),
        ))
        .get_result::<bool>(&mut conn)?;

        Ok(processed)
    }

    async fn mark_processed(&self, event: InsertProcessedWebhookEventEntity) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        insert_into(processed_webhook_events::table)
            .values(&event)
            .on_conflict(processed_webhook_events::stripe_event_id)
            .do_nothing()
            .execute(&mut conn)?;

        Ok(())
    }
}
