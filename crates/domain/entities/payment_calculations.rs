use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    domain::value_objects::fees::FeeBreakdown,
    infra::db::postgres::schema::payment_calculations,
};

/// Audit row describing how a payment intent's total was split. Never updated.
#[derive(Debug, Clone, Identifiable, Selectable, Queryable, Serialize)]
#[diesel(table_name = payment_calculations)]
pub struct PaymentCalculationEntity {
    pub id: Uuid,
    pub payment_intent_id: String,
    pub order_id: Uuid,
    pub total_amount_minor: i64,
    pub product_subtotal_minor: i64,
    pub delivery_fee_minor: i64,
    pub transaction_fee_minor: i64,
    pub customer_platform_fee_minor: i64,
    pub wholesaler_platform_fee_minor: i64,
    pub wholesaler_share_minor: i64,
    pub platform_total_minor: i64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Insertable)]
#[diesel(table_name = payment_calculations)]
pub struct InsertPaymentCalculationEntity {
    pub payment_intent_id: String,
    pub order_id: Uuid,
    pub total_amount_minor: i64,
    pub product_subtotal_minor: i64,
    pub delivery_fee_minor: i64,
    pub transaction_fee_minor: i64,
    pub customer_platform_fee_minor: i64,
    pub wholesaler_platform_fee_minor: i64,
    pub wholesaler_share_minor: i64,
    pub platform_total_minor: i64,
    pub currency: String,
}

impl InsertPaymentCalculationEntity {
    pub fn from_breakdown(
        payment_intent_id: &str,
        order_id: Uuid,
        currency: &str,
        breakdown: &FeeBreakdown,
    ) -> Self {
        Self {
            payment_intent_id: payment_intent_id.to_string(),
            order_id,
            total_amount_minor: breakdown.customer_total_minor,
            product_subtotal_minor: breakdown.product_subtotal_minor,
            delivery_fee_minor: breakdown.delivery_fee_minor,
            transaction_fee_minor: breakdown.transaction_fee_minor,
            customer_platform_fee_minor: breakdown.customer_platform_fee_minor,
            wholesaler_platform_fee_minor: breakdown.wholesaler_platform_fee_minor,
            wholesaler_share_minor: breakdown.wholesaler_share_minor,
            platform_total_minor: breakdown.platform_total_minor,
            currency: currency.to_string(),
        }
    }
}
