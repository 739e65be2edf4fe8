use std::sync::Arc;

use crates::{
    domain::{
        entities::{orders::OrderEntity, payment_calculations::InsertPaymentCalculationEntity},
        repositories::{
            orders::OrderRepository, payment_calculations::PaymentCalculationRepository,
            wholesalers::WholesalerRepository,
        },
        value_objects::{
            enums::{order_statuses::OrderStatus, payment_types::PaymentType},
            fees::{FeeBreakdown, FeeError, FeeRates, calculate_fees},
            payment_intents::{FeeQuoteDto, PaymentIntentDto},
            payment_split::PaymentSplitMetadata,
        },
    },
    payments::stripe_client::CreatePaymentIntentParams,
};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::stripe_gateway::StripeGateway;

#[derive(Debug, Error)]
pub enum PaymentSplitError {
    #[error("order not found")]
    OrderNotFound,
    #[error("order is not awaiting payment (status: {0})")]
    OrderNotPayable(String),
    #[error("wholesaler not found")]
    WholesalerNotFound,
    #[error("wholesaler has no connected Stripe account")]
    WholesalerNotConnected,
    #[error(transparent)]
    InvalidAmount(#[from] FeeError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl PaymentSplitError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            PaymentSplitError::OrderNotFound | PaymentSplitError::WholesalerNotFound => {
                StatusCode::NOT_FOUND
            }
            PaymentSplitError::OrderNotPayable(_) => StatusCode::CONFLICT,
            PaymentSplitError::WholesalerNotConnected | PaymentSplitError::InvalidAmount(_) => {
                StatusCode::BAD_REQUEST
            }
            PaymentSplitError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, PaymentSplitError>;

pub struct PaymentSplitUseCase<O, W, C, Stripe>
where
    O: OrderRepository + Send + Sync + 'static,
    W: WholesalerRepository + Send + Sync + 'static,
    C: PaymentCalculationRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    order_repo: Arc<O>,
    wholesaler_repo: Arc<W>,
    calculation_repo: Arc<C>,
    stripe_client: Arc<Stripe>,
    fee_rates: FeeRates,
    default_currency: String,
}

impl<O, W, C, Stripe> PaymentSplitUseCase<O, W, C, Stripe>
where
    O: OrderRepository + Send + Sync + 'static,
    W: WholesalerRepository + Send + Sync + 'static,
    C: PaymentCalculationRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    pub fn new(
        order_repo: Arc<O>,
        wholesaler_repo: Arc<W>,
        calculation_repo: Arc<C>,
        stripe_client: Arc<Stripe>,
        fee_rates: FeeRates,
        default_currency: String,
    ) -> Self {
        Self {
            order_repo,
            wholesaler_repo,
            calculation_repo,
            stripe_client,
            fee_rates,
            default_currency,
        }
    }

    /// Checkout preview. Nothing is persisted.
    pub fn quote(
        &self,
        product_subtotal_minor: i64,
        delivery_fee_minor: i64,
    ) -> UseCaseResult<FeeQuoteDto> {
        let breakdown =
            calculate_fees(product_subtotal_minor, delivery_fee_minor, &self.fee_rates)?;

        Ok(FeeQuoteDto {
            currency: self.default_currency.clone(),
            breakdown,
        })
    }

    pub async fn create_payment_intent(&self, order_id: Uuid) -> UseCaseResult<PaymentIntentDto> {
        let order = self
            .order_repo
            .find_by_id(order_id)
            .await
            .map_err(|err| {
                error!(%order_id, db_error = ?err, "payment_split: failed to load order");
                PaymentSplitError::Internal(err)
            })?
            .ok_or_else(|| {
                warn!(%order_id, "payment_split: order not found");
                PaymentSplitError::OrderNotFound
            })?;

        // A declined card leaves the order payable; the idempotency key returns
        // the same intent while the amount is unchanged.
        let payable = matches!(
            OrderStatus::from_str(&order.status),
            Some(OrderStatus::Pending | OrderStatus::PaymentFailed)
        );
        if !payable {
            warn!(
                %order_id,
                status = %order.status,
                "payment_split: order is not awaiting payment"
            );
            return Err(PaymentSplitError::OrderNotPayable(order.status));
        }

        let wholesaler = self
            .wholesaler_repo
            .find_by_id(order.wholesaler_id)
            .await
            .map_err(|err| {
                error!(
                    %order_id,
                    wholesaler_id = %order.wholesaler_id,
                    db_error = ?err,
                    "payment_split: failed to load wholesaler"
                );
                PaymentSplitError::Internal(err)
            })?
            .ok_or(PaymentSplitError::WholesalerNotFound)?;

        let wholesaler_account_id = wholesaler.stripe_account_id.clone().ok_or_else(|| {
            warn!(
                %order_id,
                wholesaler_id = %wholesaler.id,
                "payment_split: wholesaler has no connected account"
            );
            PaymentSplitError::WholesalerNotConnected
        })?;

        if !wholesaler.onboarding_completed {
            // Stripe still accepts the charge; the transfer may fail until onboarding finishes.
            warn!(
                %order_id,
                wholesaler_id = %wholesaler.id,
                "payment_split: wholesaler onboarding is incomplete"
            );
        }

        let breakdown = calculate_fees(
            order.product_subtotal_minor,
            order.delivery_fee_minor,
            &self.fee_rates,
        )
        .map_err(|err| {
            warn!(%order_id, error = %err, "payment_split: order amounts rejected");
            PaymentSplitError::InvalidAmount(err)
        })?;

        let currency = order_currency(&order, &self.default_currency);
        let split = PaymentSplitMetadata {
            payment_type: PaymentType::PlatformFirstV2,
            order_id,
            wholesaler_id: wholesaler.id,
            customer_id: order.retailer_id,
            wholesaler_account_id,
            breakdown,
        };

        let params = CreatePaymentIntentParams {
            amount_minor: breakdown.customer_total_minor,
            currency: currency.clone(),
            description: Some(format!("Order {}", order.order_number)),
            transfer_group: Some(transfer_group(order_id)),
            metadata: split.to_metadata(),
            idempotency_key: payment_intent_idempotency_key(order_id, &breakdown),
        };

        let intent = self
            .stripe_client
            .create_payment_intent(params)
            .await
            .map_err(|err| {
                error!(
                    %order_id,
                    amount_minor = breakdown.customer_total_minor,
                    error = ?err,
                    "payment_split: stripe payment intent creation failed"
                );
                PaymentSplitError::Internal(err)
            })?;

        let client_secret = intent.client_secret.clone().ok_or_else(|| {
            error!(
                %order_id,
                payment_intent_id = %intent.id,
                "payment_split: stripe returned no client secret"
            );
            PaymentSplitError::Internal(anyhow::anyhow!("payment intent has no client secret"))
        })?;

        self.calculation_repo
            .insert_if_absent(InsertPaymentCalculationEntity::from_breakdown(
                &intent.id, order_id, &currency, &breakdown,
            ))
            .await
            .map_err(|err| {
                error!(
                    %order_id,
                    payment_intent_id = %intent.id,
                    db_error = ?err,
                    "payment_split: failed to store payment calculation"
                );
                PaymentSplitError::Internal(err)
            })?;

        self.order_repo
            .attach_payment_intent(order_id, &intent.id, breakdown.customer_total_minor)
            .await
            .map_err(|err| {
                error!(
                    %order_id,
                    payment_intent_id = %intent.id,
                    db_error = ?err,
                    "payment_split: failed to attach payment intent to order"
                );
                PaymentSplitError::Internal(err)
            })?;

        info!(
            %order_id,
            payment_intent_id = %intent.id,
            customer_total_minor = breakdown.customer_total_minor,
            wholesaler_share_minor = breakdown.wholesaler_share_minor,
            platform_total_minor = breakdown.platform_total_minor,
            "payment_split: payment intent created"
        );

        Ok(PaymentIntentDto {
            payment_intent_id: intent.id,
            client_secret,
            currency,
            breakdown,
        })
    }
}

pub(crate) fn transfer_group(order_id: Uuid) -> String {
    format!("order_{order_id}")
}

/// Same order and amount map to the same key, so a resubmitted checkout
/// gets back the intent Stripe already created.
fn payment_intent_idempotency_key(order_id: Uuid, breakdown: &FeeBreakdown) -> String {
    format!("pi_{order_id}_{}", breakdown.customer_total_minor)
}

fn order_currency(order: &OrderEntity, default_currency: &str) -> String {
    let currency = order.currency.trim();
    if currency.is_empty() {
        default_currency.to_string()
    } else {
        currency.to_ascii_lowercase()
    }
}
