use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::fees::FeeBreakdown;

#[derive(Debug, Deserialize)]
pub struct FeeQuoteRequest {
    pub product_subtotal_minor: i64,
    #[serde(default)]
    pub delivery_fee_minor: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreatePaymentIntentRequest {
    pub order_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct PaymentIntentDto {
    pub payment_intent_id: String,
    pub client_secret: String,
    pub currency: String,
    pub breakdown: FeeBreakdown,
}

#[derive(Debug, Serialize)]
pub struct FeeQuoteDto {
    pub currency: String,
    pub breakdown: FeeBreakdown,
}
