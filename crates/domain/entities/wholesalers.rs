use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::wholesalers;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = wholesalers)]
pub struct WholesalerEntity {
    pub id: Uuid,
    pub business_name: String,
    pub email: String,
    pub stripe_account_id: Option<String>,
    pub onboarding_completed: bool,
    pub charges_enabled: bool,
    pub payouts_enabled: bool,
    pub details_submitted: bool,
    pub transfers_capability: Option<String>,
    pub requirements_due: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
