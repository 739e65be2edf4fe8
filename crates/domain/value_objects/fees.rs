//! Fee calculation for platform-first payments.
//!
//! All amounts are integer minor units (pence, cents). Percentage fees are
//! rounded half away from zero to a whole minor unit before they are summed,
//! so every figure in a [`FeeBreakdown`] is exactly what Stripe is asked to
//! charge or transfer.

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FeeError {
    #[error("product subtotal must be positive, got {0}")]
    NonPositiveSubtotal(i64),
    #[error("delivery fee must not be negative, got {0}")]
    NegativeDeliveryFee(i64),
    #[error("{name} must be within [0, 1), got {value}")]
    RateOutOfRange { name: &'static str, value: Decimal },
    #[error("fixed transaction fee must not be negative, got {0}")]
    NegativeFixedFee(i64),
    #[error("wholesaler platform fee of {fee} leaves nothing of a {subtotal} subtotal")]
    NoWholesalerShare { subtotal: i64, fee: i64 },
    #[error("fee arithmetic overflowed")]
    Overflow,
}

/// Rates applied to every platform-first order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeRates {
    customer_rate: Decimal,
    wholesaler_rate: Decimal,
    fixed_fee_minor: i64,
}

impl FeeRates {
    /// `customer_rate` is charged to the customer on top of the subtotal,
    /// `wholesaler_rate` is withheld from the wholesaler's proceeds and
    /// `fixed_fee_minor` is a flat transaction fee added to the customer total.
    pub fn new(
        customer_rate: Decimal,
        wholesaler_rate: Decimal,
        fixed_fee_minor: i64,
    ) -> Result<Self, FeeError> {
        check_rate("customer transaction fee rate", customer_rate)?;
        check_rate("wholesaler platform fee rate", wholesaler_rate)?;
        if fixed_fee_minor < 0 {
            return Err(FeeError::NegativeFixedFee(fixed_fee_minor));
        }

        Ok(Self {
            customer_rate,
            wholesaler_rate,
            fixed_fee_minor,
        })
    }

    pub fn customer_rate(&self) -> Decimal {
        self.customer_rate
    }

    pub fn wholesaler_rate(&self) -> Decimal {
        self.wholesaler_rate
    }

    pub fn fixed_fee_minor(&self) -> i64 {
        self.fixed_fee_minor
    }
}

fn check_rate(name: &'static str, value: Decimal) -> Result<(), FeeError> {
    if value < Decimal::ZERO || value >= Decimal::ONE {
        return Err(FeeError::RateOutOfRange { name, value });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub product_subtotal_minor: i64,
    pub delivery_fee_minor: i64,
    /// Percentage fee charged to the customer.
    pub customer_platform_fee_minor: i64,
    /// Flat fee charged to the customer.
    pub transaction_fee_minor: i64,
    /// Percentage fee withheld from the wholesaler.
    pub wholesaler_platform_fee_minor: i64,
    pub customer_total_minor: i64,
    pub wholesaler_share_minor: i64,
    pub platform_total_minor: i64,
}

impl FeeBreakdown {
    /// `wholesaler_share + platform_total == customer_total`.
    pub fn is_balanced(&self) -> bool {
        self.wholesaler_share_minor
            .checked_add(self.platform_total_minor)
            .is_some_and(|sum| sum == self.customer_total_minor)
    }
}

pub fn calculate_fees(
    product_subtotal_minor: i64,
    delivery_fee_minor: i64,
    rates: &FeeRates,
) -> Result<FeeBreakdown, FeeError> {
    if product_subtotal_minor <= 0 {
        return Err(FeeError::NonPositiveSubtotal(product_subtotal_minor));
    }
    if delivery_fee_minor < 0 {
        return Err(FeeError::NegativeDeliveryFee(delivery_fee_minor));
    }

    let customer_platform_fee_minor = percentage_of(product_subtotal_minor, rates.customer_rate)?;
    let wholesaler_platform_fee_minor =
        percentage_of(product_subtotal_minor, rates.wholesaler_rate)?;

    let customer_total_minor = product_subtotal_minor
        .checked_add(delivery_fee_minor)
        .and_then(|v| v.checked_add(customer_platform_fee_minor))
        .and_then(|v| v.checked_add(rates.fixed_fee_minor))
        .ok_or(FeeError::Overflow)?;

    // Stripe rejects zero-amount transfers, so an order that leaves the
    // wholesaler nothing cannot be paid out.
    let wholesaler_share_minor = product_subtotal_minor - wholesaler_platform_fee_minor;
    if wholesaler_share_minor <= 0 {
        return Err(FeeError::NoWholesalerShare {
            subtotal: product_subtotal_minor,
            fee: wholesaler_platform_fee_minor,
        });
    }
    let platform_total_minor = customer_total_minor - wholesaler_share_minor;

    Ok(FeeBreakdown {
        product_subtotal_minor,
        delivery_fee_minor,
        customer_platform_fee_minor,
        transaction_fee_minor: rates.fixed_fee_minor,
        wholesaler_platform_fee_minor,
        customer_total_minor,
        wholesaler_share_minor,
        platform_total_minor,
    })
}

fn percentage_of(amount_minor: i64, rate: Decimal) -> Result<i64, FeeError> {
    Decimal::from(amount_minor)
        .checked_mul(rate)
        .ok_or(FeeError::Overflow)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(FeeError::Overflow)
}
