use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use crates::payments::stripe_client::{
    CreatePaymentIntentParams, CreateTransferParams, StripeAccount, StripeClient, StripeEvent,
    StripePaymentIntent, StripeTransfer,
};

/// The Stripe calls the use cases depend on, so they can be mocked in tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StripeGateway: Send + Sync {
    async fn create_payment_intent(
        &self,
        params: CreatePaymentIntentParams,
    ) -> Result<StripePaymentIntent>;

    async fn create_transfer(&self, params: CreateTransferParams) -> Result<StripeTransfer>;

    async fn create_express_account(
        &self,
        email: String,
        country: String,
        metadata: HashMap<String, String>,
    ) -> Result<StripeAccount>;

    async fn create_account_link(
        &self,
        account_id: String,
        refresh_url: String,
        return_url: String,
    ) -> Result<String>;

    async fn retrieve_account(&self, account_id: String) -> Result<StripeAccount>;

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> Result<StripeEvent>;
}

#[async_trait]
impl StripeGateway for StripeClient {
    async fn create_payment_intent(
        &self,
        params: CreatePaymentIntentParams,
    ) -> Result<StripePaymentIntent> {
        StripeClient::create_payment_intent(self, &params).await
    }

    async fn create_transfer(&self, params: CreateTransferParams) -> Result<StripeTransfer> {
        StripeClient::create_transfer(self, &params).await
    }

    async fn create_express_account(
        &self,
        email: String,
        country: String,
        metadata: HashMap<String, String>,
    ) -> Result<StripeAccount> {
        StripeClient::create_express_account(self, &email, &country, &metadata).await
    }

    async fn create_account_link(
        &self,
        account_id: String,
        refresh_url: String,
        return_url: String,
    ) -> Result<String> {
        StripeClient::create_account_link(self, &account_id, &refresh_url, &return_url).await
    }

    async fn retrieve_account(&self, account_id: String) -> Result<StripeAccount> {
        StripeClient::retrieve_account(self, &account_id).await
    }

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> Result<StripeEvent> {
        StripeClient::verify_webhook_signature(self, payload, signature)
    }
}
