use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::value_objects::{enums::payment_types::PaymentType, fees::FeeBreakdown};

pub const PAYMENT_TYPE_KEY: &str = "payment_type";
pub const ORDER_ID_KEY: &str = "order_id";
pub const WHOLESALER_ID_KEY: &str = "wholesaler_id";
pub const CUSTOMER_ID_KEY: &str = "customer_id";
pub const WHOLESALER_ACCOUNT_KEY: &str = "wholesaler_account_id";
pub const PRODUCT_SUBTOTAL_KEY: &str = "product_subtotal";
pub const DELIVERY_FEE_KEY: &str = "delivery_fee";
pub const CUSTOMER_PLATFORM_FEE_KEY: &str = "customer_platform_fee";
pub const TRANSACTION_FEE_KEY: &str = "transaction_fee";
pub const WHOLESALER_PLATFORM_FEE_KEY: &str = "wholesaler_platform_fee";
pub const CUSTOMER_TOTAL_KEY: &str = "total_amount";
pub const WHOLESALER_SHARE_KEY: &str = "wholesaler_share";
pub const PLATFORM_TOTAL_KEY: &str = "platform_total";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MetadataError {
    #[error("metadata key `{0}` is missing")]
    Missing(&'static str),
    #[error("metadata key `{0}` is not valid")]
    Invalid(&'static str),
    #[error("split amounts do not add up to the charged total")]
    Unbalanced,
}

/// The split recorded on a platform-first payment intent, as written to and
/// read back from Stripe metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentSplitMetadata {
    pub payment_type: PaymentType,
    pub order_id: Uuid,
    pub wholesaler_id: Uuid,
    pub customer_id: Uuid,
    pub wholesaler_account_id: String,
    pub breakdown: FeeBreakdown,
}

impl PaymentSplitMetadata {
    pub fn to_metadata(&self) -> HashMap<String, String> {
        let b = &self.breakdown;
        [
            (PAYMENT_TYPE_KEY, self.payment_type.to_string()),
            (ORDER_ID_KEY, self.order_id.to_string()),
            (WHOLESALER_ID_KEY, self.wholesaler_id.to_string()),
            (CUSTOMER_ID_KEY, self.customer_id.to_string()),
            (WHOLESALER_ACCOUNT_KEY, self.wholesaler_account_id.clone()),
            (PRODUCT_SUBTOTAL_KEY, b.product_subtotal_minor.to_string()),
            (DELIVERY_FEE_KEY, b.delivery_fee_minor.to_string()),
            (CUSTOMER_PLATFORM_FEE_KEY, b.customer_platform_fee_minor.to_string()),
            (TRANSACTION_FEE_KEY, b.transaction_fee_minor.to_string()),
            (WHOLESALER_PLATFORM_FEE_KEY, b.wholesaler_platform_fee_minor.to_string()),
            (CUSTOMER_TOTAL_KEY, b.customer_total_minor.to_string()),
            (WHOLESALER_SHARE_KEY, b.wholesaler_share_minor.to_string()),
            (PLATFORM_TOTAL_KEY, b.platform_total_minor.to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    pub fn from_metadata(metadata: &HashMap<String, String>) -> Result<Self, MetadataError> {
        let payment_type = PaymentType::from_str(required(metadata, PAYMENT_TYPE_KEY)?)
            .ok_or(MetadataError::Invalid(PAYMENT_TYPE_KEY))?;

        let breakdown = FeeBreakdown {
            product_subtotal_minor: amount(metadata, PRODUCT_SUBTOTAL_KEY)?,
            delivery_fee_minor: amount(metadata, DELIVERY_FEE_KEY)?,
            customer_platform_fee_minor: amount(metadata, CUSTOMER_PLATFORM_FEE_KEY)?,
            transaction_fee_minor: amount(metadata, TRANSACTION_FEE_KEY)?,
            wholesaler_platform_fee_minor: amount(metadata, WHOLESALER_PLATFORM_FEE_KEY)?,
            customer_total_minor: amount(metadata, CUSTOMER_TOTAL_KEY)?,
            wholesaler_share_minor: amount(metadata, WHOLESALER_SHARE_KEY)?,
            platform_total_minor: amount(metadata, PLATFORM_TOTAL_KEY)?,
        };

        if !breakdown.is_balanced() {
            return Err(MetadataError::Unbalanced);
        }

        Ok(Self {
            payment_type,
            order_id: uuid(metadata, ORDER_ID_KEY)?,
            wholesaler_id: uuid(metadata, WHOLESALER_ID_KEY)?,
            customer_id: uuid(metadata, CUSTOMER_ID_KEY)?,
            wholesaler_account_id: required(metadata, WHOLESALER_ACCOUNT_KEY)?.to_string(),
            breakdown,
        })
    }

    /// True when the intent was issued under the platform-first split model.
    pub fn is_platform_first(metadata: &HashMap<String, String>) -> bool {
        metadata
            .get(PAYMENT_TYPE_KEY)
            .and_then(|v| PaymentType::from_str(v))
            .is_some_and(|t| t == PaymentType::PlatformFirstV2)
    }
}

fn required<'a>(
    metadata: &'a HashMap<String, String>,
    key: &'static str,
) -> Result<&'a str, MetadataError> {
    metadata
        .get(key)
        .map(String::as_str)
        .filter(|v| !v.trim().is_empty())
        .ok_or(MetadataError::Missing(key))
}

fn amount(metadata: &HashMap<String, String>, key: &'static str) -> Result<i64, MetadataError> {
    required(metadata, key)?
        .parse::<i64>()
        .ok()
        .filter(|v| *v >= 0)
        .ok_or(MetadataError::Invalid(key))
}

fn uuid(metadata: &HashMap<String, String>, key: &'static str) -> Result<Uuid, MetadataError> {
    Uuid::parse_str(required(metadata, key)?).map_err(|_| MetadataError::Invalid(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::fees::{FeeRates, calculate_fees};
    use rust_decimal_macros::dec;

    fn sample() -> PaymentSplitMetadata {
        let rates = FeeRates::new(dec!(0.055), dec!(0.033), 50).unwrap();
        PaymentSplitMetadata {
            payment_type: PaymentType::PlatformFirstV2,
            order_id: Uuid::new_v4(),
            wholesaler_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            wholesaler_account_id: "acct_123".to_string(),
            breakdown: calculate_fees(10_000, 500, &rates).unwrap(),
        }
    }

    #[test]
    fn metadata_carries_split_as_strings() {
        let split = sample();
        let metadata = split.to_metadata();

        assert_eq!(metadata[PAYMENT_TYPE_KEY], "platform_first_v2");
        assert_eq!(metadata[CUSTOMER_TOTAL_KEY], "11100");
        assert_eq!(metadata[WHOLESALER_SHARE_KEY], "9670");
        assert!(PaymentSplitMetadata::is_platform_first(&metadata));

        let decoded = PaymentSplitMetadata::from_metadata(&metadata).unwrap();
        assert_eq!(decoded, split);
    }

    #[test]
    fn missing_keys_are_reported() {
        let mut metadata = sample().to_metadata();
        metadata.remove(ORDER_ID_KEY);

        assert_eq!(
            PaymentSplitMetadata::from_metadata(&metadata),
            Err(MetadataError::Missing(ORDER_ID_KEY))
        );
    }

    #[test]
    fn tampered_share_is_rejected() {
        let mut metadata = sample().to_metadata();
        metadata.insert(WHOLESALER_SHARE_KEY.to_string(), "10000".to_string());

        assert_eq!(
            PaymentSplitMetadata::from_metadata(&metadata),
            Err(MetadataError::Unbalanced)
        );
    }

    #[test]
    fn other_payment_types_are_not_platform_first() {
        let mut metadata = HashMap::new();
        assert!(!PaymentSplitMetadata::is_platform_first(&metadata));

        metadata.insert(PAYMENT_TYPE_KEY.to_string(), "direct_charge".to_string());
        assert!(!PaymentSplitMetadata::is_platform_first(&metadata));
        assert_eq!(
            PaymentSplitMetadata::from_metadata(&metadata),
            Err(MetadataError::Invalid(PAYMENT_TYPE_KEY))
        );
    }
}
