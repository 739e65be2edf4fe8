use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::infra::db::postgres::schema::processed_webhook_events;

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = processed_webhook_events)]
pub struct InsertProcessedWebhookEventEntity {
    pub stripe_event_id: String,
    pub event_type: String,
    pub event_created_at: Option<DateTime<Utc>>,
}
