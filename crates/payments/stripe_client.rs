use std::collections::HashMap;

use anyhow::Result;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, de::DeserializeOwned};
use sha2::Sha256;
use tracing::error;

type HmacSha256 = Hmac<Sha256>;

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";
const IDEMPOTENCY_KEY: &str = "Idempotency-Key";

/// Minimal Stripe client built on reqwest, covering the Payment Intents,
/// Transfers and Connect endpoints used by the platform-first flow.
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    webhook_secret: String,
    webhook_tolerance_secs: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub created: Option<i64>,
    pub livemode: Option<bool>,
    pub account: Option<String>,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

impl StripeEvent {
    pub fn data_object<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.data.object.clone())?)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripePaymentIntent {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub status: Option<String>,
    pub client_secret: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub latest_charge: Option<String>,
    pub transfer_group: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeTransfer {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub destination: Option<String>,
    #[serde(default)]
    pub reversed: bool,
    #[serde(default)]
    pub amount_reversed: i64,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub transfer_group: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeAccount {
    pub id: String,
    pub email: Option<String>,
    #[serde(default)]
    pub charges_enabled: bool,
    #[serde(default)]
    pub payouts_enabled: bool,
    #[serde(default)]
    pub details_submitted: bool,
    #[serde(default)]
    pub capabilities: StripeAccountCapabilities,
    pub requirements: Option<StripeAccountRequirements>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StripeAccountCapabilities {
    pub transfers: Option<String>,
    pub card_payments: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StripeAccountRequirements {
    #[serde(default)]
    pub currently_due: Vec<String>,
    #[serde(default)]
    pub past_due: Vec<String>,
    pub disabled_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePaymentIntentParams {
    pub amount_minor: i64,
    pub currency: String,
    pub description: Option<String>,
    pub transfer_group: Option<String>,
    pub metadata: HashMap<String, String>,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTransferParams {
    pub amount_minor: i64,
    pub currency: String,
    pub destination: String,
    pub source_transaction: Option<String>,
    pub transfer_group: Option<String>,
    pub metadata: HashMap<String, String>,
    pub idempotency_key: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
    param: Option<String>,
}

impl StripeClient {
    pub fn new(secret_key: String, webhook_secret: String, webhook_tolerance_secs: i64) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key,
            webhook_secret,
            webhook_tolerance_secs,
        }
    }

    async fn ensure_success(
        resp: reqwest::Response,
        context: &str,
    ) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("request-id")
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let details = serde_json::from_str::<StripeErrorEnvelope>(&body)
            .ok()
            .map(|envelope| envelope.error);
        let stripe_message = details.as_ref().and_then(|d| d.message.clone());

        error!(
            status = %status,
            stripe_request_id = ?request_id,
            stripe_error_type = ?details.as_ref().and_then(|d| d.type_.as_deref()),
            stripe_error_code = ?details.as_ref().and_then(|d| d.code.as_deref()),
            stripe_error_param = ?details.as_ref().and_then(|d| d.param.as_deref()),
            stripe_error_message = ?stripe_message,
            context = %context,
            "stripe api request failed"
        );

        anyhow::bail!(
            "Stripe API request failed: {} (status {}, request_id={:?}, message={:?})",
            context,
            status,
            request_id,
            stripe_message
        );
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &[(String, String)],
        idempotency_key: Option<&str>,
        context: &str,
    ) -> Result<T> {
        let mut request = self
            .http
            .post(format!("{STRIPE_API_BASE}{path}"))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(body);

        if let Some(key) = idempotency_key {
            request = request.header(IDEMPOTENCY_KEY, key);
        }

        let resp = Self::ensure_success(request.send().await?, context).await?;
        Ok(resp.json().await?)
    }

    /// Creates a payment intent charged on the platform account.
    pub async fn create_payment_intent(
        &self,
        params: &CreatePaymentIntentParams,
    ) -> Result<StripePaymentIntent> {
        // https://stripe.com/docs/api/payment_intents/create
        let mut body = vec![
            ("amount".to_string(), params.amount_minor.to_string()),
            ("currency".to_string(), params.currency.to_lowercase()),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
        ];
        if let Some(description) = &params.description {
            body.push(("description".to_string(), description.clone()));
        }
        if let Some(group) = &params.transfer_group {
            body.push(("transfer_group".to_string(), group.clone()));
        }
        push_metadata(&mut body, &params.metadata);

        self.post_form(
            "/payment_intents",
            &body,
            Some(&params.idempotency_key),
            "create payment intent",
        )
        .await
    }

    /// Moves funds from the platform balance to a connected account.
    pub async fn create_transfer(&self, params: &CreateTransferParams) -> Result<StripeTransfer> {
        // https://stripe.com/docs/connect/separate-charges-and-transfers
        let mut body = vec![
            ("amount".to_string(), params.amount_minor.to_string()),
            ("currency".to_string(), params.currency.to_lowercase()),
            ("destination".to_string(), params.destination.clone()),
        ];
        if let Some(charge) = &params.source_transaction {
            body.push(("source_transaction".to_string(), charge.clone()));
        }
        if let Some(group) = &params.transfer_group {
            body.push(("transfer_group".to_string(), group.clone()));
        }
        push_metadata(&mut body, &params.metadata);

        self.post_form(
            "/transfers",
            &body,
            Some(&params.idempotency_key),
            "create transfer",
        )
        .await
    }

    /// Creates an Express connected account with the transfers capability requested.
    pub async fn create_express_account(
        &self,
        email: &str,
        country: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<StripeAccount> {
        // https://stripe.com/docs/api/accounts/create
        let mut body = vec![
            ("type".to_string(), "express".to_string()),
            ("country".to_string(), country.to_string()),
            ("email".to_string(), email.to_string()),
            (
                "capabilities[transfers][requested]".to_string(),
                "true".to_string(),
            ),
            (
                "capabilities[card_payments][requested]".to_string(),
                "true".to_string(),
            ),
        ];
        push_metadata(&mut body, metadata);

        self.post_form("/accounts", &body, None, "create express account")
            .await
    }

    /// Returns the hosted onboarding URL for a connected account.
    pub async fn create_account_link(
        &self,
        account_id: &str,
        refresh_url: &str,
        return_url: &str,
    ) -> Result<String> {
        // https://stripe.com/docs/api/account_links/create
        let body = vec![
            ("account".to_string(), account_id.to_string()),
            ("refresh_url".to_string(), refresh_url.to_string()),
            ("return_url".to_string(), return_url.to_string()),
            ("type".to_string(), "account_onboarding".to_string()),
        ];

        #[derive(Deserialize)]
        struct AccountLinkResp {
            url: String,
        }

        let parsed: AccountLinkResp = self
            .post_form("/account_links", &body, None, "create account link")
            .await?;
        Ok(parsed.url)
    }

    pub async fn retrieve_account(&self, account_id: &str) -> Result<StripeAccount> {
        // https://stripe.com/docs/api/accounts/retrieve
        let resp = self
            .http
            .get(format!("{STRIPE_API_BASE}/accounts/{account_id}"))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "retrieve account").await?;

        Ok(resp.json().await?)
    }

    /// Verifies the webhook signature. https://stripe.com/docs/webhooks/signatures
    pub fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<StripeEvent> {
        self.verify_webhook_signature_at(payload, signature_header, Utc::now().timestamp())
    }

    pub fn verify_webhook_signature_at(
        &self,
        payload: &[u8],
        signature_header: &str,
        now: i64,
    ) -> Result<StripeEvent> {
        let mut timestamp: Option<&str> = None;
        let mut signatures: Vec<&str> = Vec::new();

        for part in signature_header.split(',') {
            let part = part.trim();
            if let Some(rest) = part.strip_prefix("t=") {
                timestamp = Some(rest);
            } else if let Some(rest) = part.strip_prefix("v1=") {
                signatures.push(rest);
            }
        }

        let timestamp =
            timestamp.ok_or_else(|| anyhow::anyhow!("missing timestamp in stripe-signature"))?;
        if signatures.is_empty() {
            anyhow::bail!("missing v1 in stripe-signature");
        }

        let signed_at: i64 = timestamp
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid timestamp in stripe-signature"))?;
        let tolerance = u64::try_from(self.webhook_tolerance_secs).unwrap_or(0);
        let within_tolerance = now
            .checked_sub(signed_at)
            .map(i64::unsigned_abs)
            .is_some_and(|skew| skew <= tolerance);
        if !within_tolerance {
            anyhow::bail!("stripe-signature timestamp outside tolerance");
        }

        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())?;
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);

        // Stripe sends one v1 entry per active secret while secrets are rolled.
        let matched = signatures.iter().any(|candidate| {
            hex::decode(candidate)
                .map(|provided| mac.clone().verify_slice(&provided).is_ok())
                .unwrap_or(false)
        });
        if !matched {
            anyhow::bail!("invalid webhook signature");
        }

        let event: StripeEvent = serde_json::from_slice(payload)?;
        Ok(event)
    }
}

fn push_metadata(body: &mut Vec<(String, String)>, metadata: &HashMap<String, String>) {
    let mut entries: Vec<_> = metadata.iter().collect();
    entries.sort();
    for (key, value) in entries {
        body.push((format!("metadata[{}]", key), value.clone()));
    }
}
