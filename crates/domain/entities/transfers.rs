use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::infra::db::postgres::schema::transfers;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable, Serialize)]
#[diesel(table_name = transfers)]
pub struct TransferEntity {
    pub id: Uuid,
    pub payment_intent_id: String,
    pub order_id: Uuid,
    pub wholesaler_id: Uuid,
    pub stripe_transfer_id: Option<String>,
    pub amount_minor: i64,
    pub currency: String,
    pub destination_account: String,
    pub source_charge: Option<String>,
    pub status: String,
    pub failure_reason: Option<String>,
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Claim row written before the Stripe transfer call; `payment_intent_id` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Insertable)]
#[diesel(table_name = transfers)]
pub struct InsertTransferEntity {
    pub payment_intent_id: String,
    pub order_id: Uuid,
    pub wholesaler_id: Uuid,
    pub amount_minor: i64,
    pub currency: String,
    pub destination_account: String,
    pub source_charge: Option<String>,
    pub status: String,
    pub attempts: i32,
}
