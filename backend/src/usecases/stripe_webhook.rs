use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use crates::{
    domain::{
        entities::{
            payment_calculations::InsertPaymentCalculationEntity,
            processed_webhook_events::InsertProcessedWebhookEventEntity,
            transfers::{InsertTransferEntity, TransferEntity},
        },
        repositories::{
            orders::OrderRepository, payment_calculations::PaymentCalculationRepository,
            transfers::TransferRepository, webhook_events::WebhookEventRepository,
            wholesalers::WholesalerRepository,
        },
        value_objects::{
            connected_accounts::ConnectedAccountStatus,
            enums::{order_statuses::OrderStatus, transfer_statuses::TransferStatus},
            payment_split::{
                CUSTOMER_ID_KEY, ORDER_ID_KEY, PaymentSplitMetadata, WHOLESALER_ID_KEY,
            },
            transfers::TransferDto,
        },
    },
    payments::stripe_client::{
        CreateTransferParams, StripeAccount, StripeEvent, StripePaymentIntent, StripeTransfer,
    },
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{payment_split::transfer_group, stripe_gateway::StripeGateway};

const TRANSFER_PAYMENT_INTENT_KEY: &str = "payment_intent_id";

/// What happened to a verified event. Every variant is acknowledged with 200.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookOutcome {
    Processed,
    Skipped,
    Duplicate,
    Ignored,
}

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("invalid stripe signature")]
    InvalidSignature,
    #[error("invalid webhook payload: {0}")]
    InvalidPayload(String),
    #[error("transfer not found")]
    TransferNotFound,
    #[error("transfer cannot be retried (status: {0})")]
    TransferNotRetryable(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl WebhookError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            WebhookError::InvalidSignature | WebhookError::InvalidPayload(_) => {
                StatusCode::BAD_REQUEST
            }
            WebhookError::TransferNotFound => StatusCode::NOT_FOUND,
            WebhookError::TransferNotRetryable(_) => StatusCode::CONFLICT,
            WebhookError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, WebhookError>;

enum TransferAttempt {
    Succeeded(String),
    Failed(String),
}

pub struct StripeWebhookUseCase<O, W, C, T, E, Stripe>
where
    O: OrderRepository + Send + Sync + 'static,
    W: WholesalerRepository + Send + Sync + 'static,
    C: PaymentCalculationRepository + Send + Sync + 'static,
    T: TransferRepository + Send + Sync + 'static,
    E: WebhookEventRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    order_repo: Arc<O>,
    wholesaler_repo: Arc<W>,
    calculation_repo: Arc<C>,
    transfer_repo: Arc<T>,
    event_repo: Arc<E>,
    stripe_client: Arc<Stripe>,
}

impl<O, W, C, T, E, Stripe> StripeWebhookUseCase<O, W, C, T, E, Stripe>
where
    O: OrderRepository + Send + Sync + 'static,
    W: WholesalerRepository + Send + Sync + 'static,
    C: PaymentCalculationRepository + Send + Sync + 'static,
    T: TransferRepository + Send + Sync + 'static,
    E: WebhookEventRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    pub fn new(
        order_repo: Arc<O>,
        wholesaler_repo: Arc<W>,
        calculation_repo: Arc<C>,
        transfer_repo: Arc<T>,
        event_repo: Arc<E>,
        stripe_client: Arc<Stripe>,
    ) -> Self {
        Self {
            order_repo,
            wholesaler_repo,
            calculation_repo,
            transfer_repo,
            event_repo,
            stripe_client,
        }
    }

    pub async fn handle_stripe_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> UseCaseResult<WebhookOutcome> {
        let event = self
            .stripe_client
            .verify_webhook_signature(payload, signature)
            .map_err(|err| {
                warn!(error = %err, "stripe_webhook: signature verification failed");
                WebhookError::InvalidSignature
            })?;

        info!(
            event_id = %event.id,
            event_type = %event.type_,
            "stripe_webhook: event verified"
        );

        let already_processed = self.event_repo.is_processed(&event.id).await.map_err(|err| {
            error!(event_id = %event.id, db_error = ?err, "stripe_webhook: ledger lookup failed");
            WebhookError::Internal(err)
        })?;
        if already_processed {
            info!(event_id = %event.id, "stripe_webhook: event already processed");
            return Ok(WebhookOutcome::Duplicate);
        }

        let outcome = match event.type_.as_str() {
            "payment_intent.succeeded" => self.handle_payment_intent_succeeded(&event).await?,
            "payment_intent.payment_failed" => self.handle_payment_intent_failed(&event).await?,
            "transfer.created" => self.handle_transfer_created(&event).await?,
            "transfer.updated" | "transfer.reversed" => {
                self.handle_transfer_updated(&event).await?
            }
            "account.updated" => self.handle_account_updated(&event).await?,
            _ => {
                debug!(event_type = %event.type_, "stripe_webhook: unhandled event type");
                WebhookOutcome::Ignored
            }
        };

        // A failed ledger write only means a redelivery runs the handler again,
        // which the transfer claim already tolerates.
        if let Err(err) = self
            .event_repo
            .mark_processed(InsertProcessedWebhookEventEntity {
                stripe_event_id: event.id.clone(),
                event_type: event.type_.clone(),
                event_created_at: event.created.and_then(ts_to_datetime),
            })
            .await
        {
            error!(
                event_id = %event.id,
                db_error = ?err,
                "stripe_webhook: failed to record processed event"
            );
        }

        info!(
            event_id = %event.id,
            event_type = %event.type_,
            outcome = ?outcome,
            "stripe_webhook: event handled"
        );

        Ok(outcome)
    }

    /// Re-issues a failed transfer. The attempt number is part of the
    /// idempotency key so Stripe treats it as a new request.
    pub async fn retry_transfer(&self, payment_intent_id: &str) -> UseCaseResult<TransferDto> {
        let claimed = self
            .transfer_repo
            .claim_retry(payment_intent_id)
            .await
            .map_err(|err| {
                error!(
                    payment_intent_id,
                    db_error = ?err,
                    "stripe_webhook: failed to claim transfer retry"
                );
                WebhookError::Internal(err)
            })?;

        let transfer = match claimed {
            Some(transfer) => transfer,
            None => {
                let existing = self
                    .transfer_repo
                    .find_by_payment_intent_id(payment_intent_id)
                    .await?
                    .ok_or(WebhookError::TransferNotFound)?;
                warn!(
                    payment_intent_id,
                    status = %existing.status,
                    "stripe_webhook: transfer is not in a retryable state"
                );
                return Err(WebhookError::TransferNotRetryable(existing.status));
            }
        };

        info!(
            payment_intent_id,
            attempts = transfer.attempts,
            "stripe_webhook: retrying transfer"
        );

        self.issue_transfer(&transfer, HashMap::new()).await?;

        self.get_transfer(payment_intent_id).await
    }

    pub async fn get_transfer(&self, payment_intent_id: &str) -> UseCaseResult<TransferDto> {
        let transfer = self
            .transfer_repo
            .find_by_payment_intent_id(payment_intent_id)
            .await
            .map_err(|err| {
                error!(payment_intent_id, db_error = ?err, "stripe_webhook: failed to load transfer");
                WebhookError::Internal(err)
            })?
            .ok_or(WebhookError::TransferNotFound)?;

        let calculation = self
            .calculation_repo
            .find_by_payment_intent_id(payment_intent_id)
            .await
            .map_err(|err| {
                error!(
                    payment_intent_id,
                    db_error = ?err,
                    "stripe_webhook: failed to load payment calculation"
                );
                WebhookError::Internal(err)
            })?;

        Ok(TransferDto {
            transfer,
            calculation,
        })
    }

    async fn handle_payment_intent_succeeded(
        &self,
        event: &StripeEvent,
    ) -> UseCaseResult<WebhookOutcome> {
        let intent: StripePaymentIntent = decode_object(event)?;

        if !PaymentSplitMetadata::is_platform_first(&intent.metadata) {
            debug!(
                payment_intent_id = %intent.id,
                "stripe_webhook: payment intent is not platform-first"
            );
            return Ok(WebhookOutcome::Ignored);
        }

        let split = match PaymentSplitMetadata::from_metadata(&intent.metadata) {
            Ok(split) => split,
            Err(err) => {
                warn!(
                    payment_intent_id = %intent.id,
                    error = %err,
                    "stripe_webhook: payment intent metadata is unusable"
                );
                return Ok(WebhookOutcome::Skipped);
            }
        };

        if split.breakdown.customer_total_minor != intent.amount {
            warn!(
                payment_intent_id = %intent.id,
                amount = intent.amount,
                customer_total_minor = split.breakdown.customer_total_minor,
                "stripe_webhook: charged amount differs from recorded split"
            );
        }

        let order_id = split.order_id;
        let order = self.order_repo.find_by_id(order_id).await.map_err(|err| {
            error!(%order_id, db_error = ?err, "stripe_webhook: failed to load order");
            WebhookError::Internal(err)
        })?;
        if order.is_none() {
            warn!(
                %order_id,
                payment_intent_id = %intent.id,
                "stripe_webhook: order not found"
            );
            return Ok(WebhookOutcome::Skipped);
        }

        self.order_repo
            .transition_status(
                order_id,
                vec![OrderStatus::Pending, OrderStatus::PaymentFailed],
                OrderStatus::Paid,
            )
            .await
            .map_err(|err| {
                error!(%order_id, db_error = ?err, "stripe_webhook: failed to mark order paid");
                WebhookError::Internal(err)
            })?;

        self.calculation_repo
            .insert_if_absent(InsertPaymentCalculationEntity::from_breakdown(
                &intent.id,
                order_id,
                &intent.currency,
                &split.breakdown,
            ))
            .await
            .map_err(|err| {
                error!(
                    %order_id,
                    payment_intent_id = %intent.id,
                    db_error = ?err,
                    "stripe_webhook: failed to store payment calculation"
                );
                WebhookError::Internal(err)
            })?;

        let wholesaler = self
            .wholesaler_repo
            .find_by_id(split.wholesaler_id)
            .await
            .map_err(|err| {
                error!(
                    wholesaler_id = %split.wholesaler_id,
                    db_error = ?err,
                    "stripe_webhook: failed to load wholesaler"
                );
                WebhookError::Internal(err)
            })?;

        let Some(destination) = wholesaler.and_then(|w| w.stripe_account_id) else {
            error!(
                %order_id,
                payment_intent_id = %intent.id,
                wholesaler_id = %split.wholesaler_id,
                "stripe_webhook: wholesaler has no connected account; transfer skipped"
            );
            return Ok(WebhookOutcome::Skipped);
        };

        if destination != split.wholesaler_account_id {
            warn!(
                payment_intent_id = %intent.id,
                metadata_account = %split.wholesaler_account_id,
                current_account = %destination,
                "stripe_webhook: connected account changed since checkout"
            );
        }

        let claim = InsertTransferEntity {
            payment_intent_id: intent.id.clone(),
            order_id,
            wholesaler_id: split.wholesaler_id,
            amount_minor: split.breakdown.wholesaler_share_minor,
            currency: intent.currency.clone(),
            destination_account: destination,
            source_charge: intent.latest_charge.clone(),
            status: TransferStatus::Pending.to_string(),
            attempts: 1,
        };

        let Some(transfer) = self.transfer_repo.claim(claim).await.map_err(|err| {
            error!(
                payment_intent_id = %intent.id,
                db_error = ?err,
                "stripe_webhook: failed to claim transfer"
            );
            WebhookError::Internal(err)
        })?
        else {
            info!(
                payment_intent_id = %intent.id,
                "stripe_webhook: transfer already claimed"
            );
            return Ok(WebhookOutcome::Duplicate);
        };

        let mut metadata = HashMap::new();
        metadata.insert(CUSTOMER_ID_KEY.to_string(), split.customer_id.to_string());
        self.issue_transfer(&transfer, metadata).await?;

        Ok(WebhookOutcome::Processed)
    }

    /// Calls Stripe for a claimed `pending` row and records the result on
    /// both the transfer and the order.
    async fn issue_transfer(
        &self,
        transfer: &TransferEntity,
        extra_metadata: HashMap<String, String>,
    ) -> UseCaseResult<()> {
        let mut metadata = extra_metadata;
        metadata.insert(
            TRANSFER_PAYMENT_INTENT_KEY.to_string(),
            transfer.payment_intent_id.clone(),
        );
        metadata.insert(ORDER_ID_KEY.to_string(), transfer.order_id.to_string());
        metadata.insert(
            WHOLESALER_ID_KEY.to_string(),
            transfer.wholesaler_id.to_string(),
        );

        let params = CreateTransferParams {
            amount_minor: transfer.amount_minor,
            currency: transfer.currency.clone(),
            destination: transfer.destination_account.clone(),
            source_transaction: transfer.source_charge.clone(),
            transfer_group: Some(transfer_group(transfer.order_id)),
            metadata,
            idempotency_key: transfer_idempotency_key(&transfer.payment_intent_id, transfer.attempts),
        };

        let attempt = match self.stripe_client.create_transfer(params).await {
            Ok(stripe_transfer) => TransferAttempt::Succeeded(stripe_transfer.id),
            Err(err) => TransferAttempt::Failed(err.to_string()),
        };

        match attempt {
            TransferAttempt::Succeeded(stripe_transfer_id) => {
                let recorded = self
                    .transfer_repo
                    .mark_succeeded(&transfer.payment_intent_id, &stripe_transfer_id)
                    .await?;
                if !recorded {
                    warn!(
                        payment_intent_id = %transfer.payment_intent_id,
                        stripe_transfer_id = %stripe_transfer_id,
                        "stripe_webhook: transfer row was not updated"
                    );
                }
                self.order_repo
                    .transition_status(
                        transfer.order_id,
                        vec![OrderStatus::Paid, OrderStatus::TransferFailed],
                        OrderStatus::Transferred,
                    )
                    .await?;
                info!(
                    payment_intent_id = %transfer.payment_intent_id,
                    order_id = %transfer.order_id,
                    stripe_transfer_id = %stripe_transfer_id,
                    amount_minor = transfer.amount_minor,
                    destination = %transfer.destination_account,
                    "stripe_webhook: transfer created"
                );
            }
            TransferAttempt::Failed(reason) => {
                error!(
                    payment_intent_id = %transfer.payment_intent_id,
                    order_id = %transfer.order_id,
                    wholesaler_id = %transfer.wholesaler_id,
                    amount_minor = transfer.amount_minor,
                    attempts = transfer.attempts,
                    error = %reason,
                    "stripe_webhook: transfer failed; manual reconciliation required"
                );
                self.transfer_repo
                    .mark_failed(&transfer.payment_intent_id, &reason)
                    .await?;
                self.order_repo
                    .transition_status(
                        transfer.order_id,
                        vec![OrderStatus::Paid],
                        OrderStatus::TransferFailed,
                    )
                    .await?;
            }
        }

        Ok(())
    }

    async fn handle_payment_intent_failed(
        &self,
        event: &StripeEvent,
    ) -> UseCaseResult<WebhookOutcome> {
        let intent: StripePaymentIntent = decode_object(event)?;

        if !PaymentSplitMetadata::is_platform_first(&intent.metadata) {
            return Ok(WebhookOutcome::Ignored);
        }

        let Some(order_id) = intent
            .metadata
            .get(ORDER_ID_KEY)
            .and_then(|v| Uuid::parse_str(v).ok())
        else {
            warn!(
                payment_intent_id = %intent.id,
                "stripe_webhook: failed payment intent has no order id"
            );
            return Ok(WebhookOutcome::Skipped);
        };

        let changed = self
            .order_repo
            .transition_status(order_id, vec![OrderStatus::Pending], OrderStatus::PaymentFailed)
            .await
            .map_err(|err| {
                error!(%order_id, db_error = ?err, "stripe_webhook: failed to mark payment failed");
                WebhookError::Internal(err)
            })?;

        info!(
            %order_id,
            payment_intent_id = %intent.id,
            changed,
            "stripe_webhook: payment failed"
        );

        Ok(if changed {
            WebhookOutcome::Processed
        } else {
            WebhookOutcome::Skipped
        })
    }

    async fn handle_transfer_created(&self, event: &StripeEvent) -> UseCaseResult<WebhookOutcome> {
        let stripe_transfer: StripeTransfer = decode_object(event)?;

        let Some(payment_intent_id) = stripe_transfer.metadata.get(TRANSFER_PAYMENT_INTENT_KEY)
        else {
            debug!(
                stripe_transfer_id = %stripe_transfer.id,
                "stripe_webhook: transfer was not issued for a payment intent"
            );
            return Ok(WebhookOutcome::Ignored);
        };

        let recorded = self
            .transfer_repo
            .mark_succeeded(payment_intent_id, &stripe_transfer.id)
            .await?;
        if !recorded {
            warn!(
                payment_intent_id = %payment_intent_id,
                stripe_transfer_id = %stripe_transfer.id,
                "stripe_webhook: no local transfer for created stripe transfer"
            );
            return Ok(WebhookOutcome::Skipped);
        }

        if let Some(transfer) = self
            .transfer_repo
            .find_by_payment_intent_id(payment_intent_id)
            .await?
        {
            self.order_repo
                .transition_status(
                    transfer.order_id,
                    vec![OrderStatus::Paid, OrderStatus::TransferFailed],
                    OrderStatus::Transferred,
                )
                .await?;
        }

        info!(
            payment_intent_id = %payment_intent_id,
            stripe_transfer_id = %stripe_transfer.id,
            "stripe_webhook: transfer confirmed"
        );

        Ok(WebhookOutcome::Processed)
    }

    async fn handle_transfer_updated(&self, event: &StripeEvent) -> UseCaseResult<WebhookOutcome> {
        let stripe_transfer: StripeTransfer = decode_object(event)?;

        let status = if stripe_transfer.reversed || stripe_transfer.amount_reversed > 0 {
            TransferStatus::Reversed
        } else {
            TransferStatus::Succeeded
        };

        let updated = self
            .transfer_repo
            .update_status_by_stripe_transfer_id(&stripe_transfer.id, status)
            .await?;

        if !updated {
            debug!(
                stripe_transfer_id = %stripe_transfer.id,
                "stripe_webhook: updated transfer is not tracked"
            );
            return Ok(WebhookOutcome::Skipped);
        }

        if status == TransferStatus::Reversed {
            warn!(
                stripe_transfer_id = %stripe_transfer.id,
                amount_reversed = stripe_transfer.amount_reversed,
                "stripe_webhook: transfer reversed"
            );
        }

        Ok(WebhookOutcome::Processed)
    }

    async fn handle_account_updated(&self, event: &StripeEvent) -> UseCaseResult<WebhookOutcome> {
        let account: StripeAccount = decode_object(event)?;
        let status = ConnectedAccountStatus::from_stripe_account(&account);
        let onboarding_completed = status.onboarding_completed;

        let wholesaler_id = self
            .wholesaler_repo
            .update_connected_account_status(status)
            .await
            .map_err(|err| {
                error!(
                    stripe_account_id = %account.id,
                    db_error = ?err,
                    "stripe_webhook: failed to store account status"
                );
                WebhookError::Internal(err)
            })?;

        match wholesaler_id {
            Some(wholesaler_id) => {
                info!(
                    %wholesaler_id,
                    stripe_account_id = %account.id,
                    onboarding_completed,
                    "stripe_webhook: connected account updated"
                );
                Ok(WebhookOutcome::Processed)
            }
            None => {
                debug!(
                    stripe_account_id = %account.id,
                    "stripe_webhook: account is not linked to a wholesaler"
                );
                Ok(WebhookOutcome::Skipped)
            }
        }
    }
}

fn decode_object<D: serde::de::DeserializeOwned>(event: &StripeEvent) -> UseCaseResult<D> {
    event.data_object().map_err(|err| {
        warn!(
            event_id = %event.id,
            event_type = %event.type_,
            error = %err,
            "stripe_webhook: event object could not be decoded"
        );
        WebhookError::InvalidPayload(format!("unexpected {} object", event.type_))
    })
}

fn transfer_idempotency_key(payment_intent_id: &str, attempt: i32) -> String {
    format!("transfer_{payment_intent_id}_{attempt}")
}

fn ts_to_datetime(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(ts, 0)
}
