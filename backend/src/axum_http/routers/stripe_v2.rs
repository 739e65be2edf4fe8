use crate::{
    config::config_model::DotEnvyConfig,
    usecases::{
        connect_onboarding::{ConnectOnboardingUseCase, OnboardingUrls},
        payment_split::PaymentSplitUseCase,
        stripe_gateway::StripeGateway,
        stripe_webhook::{StripeWebhookUseCase, WebhookError},
    },
};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use crates::{
    domain::{
        repositories::{
            orders::OrderRepository, payment_calculations::PaymentCalculationRepository,
            transfers::TransferRepository, webhook_events::WebhookEventRepository,
            wholesalers::WholesalerRepository,
        },
        value_objects::{
            connected_accounts::WholesalerAccountRequest,
            payment_intents::{CreatePaymentIntentRequest, FeeQuoteRequest},
        },
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{
            orders::OrderPostgres, payment_calculations::PaymentCalculationPostgres,
            transfers::TransferPostgres, webhook_events::WebhookEventPostgres,
            wholesalers::WholesalerPostgres,
        },
    },
    payments::stripe_client::StripeClient,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

const STRIPE_SIGNATURE_HEADER: &str = "Stripe-Signature";

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    config: Arc<DotEnvyConfig>,
    stripe_client: Arc<StripeClient>,
) -> Router {
    let order_repository = Arc::new(OrderPostgres::new(Arc::clone(&db_pool)));
    let wholesaler_repository = Arc::new(WholesalerPostgres::new(Arc::clone(&db_pool)));
    let calculation_repository = Arc::new(PaymentCalculationPostgres::new(Arc::clone(&db_pool)));
    let transfer_repository = Arc::new(TransferPostgres::new(Arc::clone(&db_pool)));
    let webhook_event_repository = Arc::new(WebhookEventPostgres::new(Arc::clone(&db_pool)));

    let payment_split_usecase = PaymentSplitUseCase::new(
        Arc::clone(&order_repository),
        Arc::clone(&wholesaler_repository),
        Arc::clone(&calculation_repository),
        Arc::clone(&stripe_client),
        config.fees,
        config.default_currency.clone(),
    );

    let webhook_usecase = StripeWebhookUseCase::new(
        order_repository,
        Arc::clone(&wholesaler_repository),
        calculation_repository,
        transfer_repository,
        webhook_event_repository,
        Arc::clone(&stripe_client),
    );

    let onboarding_usecase = ConnectOnboardingUseCase::new(
        wholesaler_repository,
        stripe_client,
        OnboardingUrls {
            refresh_url: config.connect.refresh_url.clone(),
            return_url: config.connect.return_url.clone(),
            default_country: config.connect.default_country.clone(),
        },
    );

    Router::new()
        .merge(payment_routes(Arc::new(payment_split_usecase)))
        .merge(webhook_routes(Arc::new(webhook_usecase)))
        .merge(connect_routes(Arc::new(onboarding_usecase)))
}

pub fn payment_routes<O, W, C, S>(usecase: Arc<PaymentSplitUseCase<O, W, C, S>>) -> Router
where
    O: OrderRepository + Send + Sync + 'static,
    W: WholesalerRepository + Send + Sync + 'static,
    C: PaymentCalculationRepository + Send + Sync + 'static,
    S: StripeGateway + Send + Sync + 'static,
{
    Router::new()
        .route("/fee-quote", post(fee_quote::<O, W, C, S>))
        .route("/payment-intents", post(create_payment_intent::<O, W, C, S>))
        .with_state(usecase)
}

pub fn webhook_routes<O, W, C, T, E, S>(
    usecase: Arc<StripeWebhookUseCase<O, W, C, T, E, S>>,
) -> Router
where
    O: OrderRepository + Send + Sync + 'static,
    W: WholesalerRepository + Send + Sync + 'static,
    C: PaymentCalculationRepository + Send + Sync + 'static,
    T: TransferRepository + Send + Sync + 'static,
    E: WebhookEventRepository + Send + Sync + 'static,
    S: StripeGateway + Send + Sync + 'static,
{
    Router::new()
        .route("/webhook", post(stripe_webhook::<O, W, C, T, E, S>))
        .route(
            "/transfers/:payment_intent_id",
            get(get_transfer::<O, W, C, T, E, S>),
        )
        .route(
            "/transfers/:payment_intent_id/retry",
            post(retry_transfer::<O, W, C, T, E, S>),
        )
        .with_state(usecase)
}

pub fn connect_routes<W, S>(usecase: Arc<ConnectOnboardingUseCase<W, S>>) -> Router
where
    W: WholesalerRepository + Send + Sync + 'static,
    S: StripeGateway + Send + Sync + 'static,
{
    Router::new()
        .route("/connect/accounts", post(create_connected_account::<W, S>))
        .route("/connect/account-links", post(create_account_link::<W, S>))
        .route(
            "/connect/accounts/:wholesaler_id/status",
            get(refresh_account_status::<W, S>),
        )
        .with_state(usecase)
}

pub async fn fee_quote<O, W, C, S>(
    State(usecase): State<Arc<PaymentSplitUseCase<O, W, C, S>>>,
    Json(request): Json<FeeQuoteRequest>,
) -> Response
where
    O: OrderRepository + Send + Sync + 'static,
    W: WholesalerRepository + Send + Sync + 'static,
    C: PaymentCalculationRepository + Send + Sync + 'static,
    S: StripeGateway + Send + Sync + 'static,
{
    match usecase.quote(request.product_subtotal_minor, request.delivery_fee_minor) {
        Ok(quote) => Json(quote).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn create_payment_intent<O, W, C, S>(
    State(usecase): State<Arc<PaymentSplitUseCase<O, W, C, S>>>,
    Json(request): Json<CreatePaymentIntentRequest>,
) -> Response
where
    O: OrderRepository + Send + Sync + 'static,
    W: WholesalerRepository + Send + Sync + 'static,
    C: PaymentCalculationRepository + Send + Sync + 'static,
    S: StripeGateway + Send + Sync + 'static,
{
    info!(order_id = %request.order_id, "stripe_v2: payment intent requested");

    match usecase.create_payment_intent(request.order_id).await {
        Ok(dto) => (StatusCode::CREATED, Json(dto)).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Stripe needs the exact bytes it signed, so the body is taken raw.
pub async fn stripe_webhook<O, W, C, T, E, S>(
    State(usecase): State<Arc<StripeWebhookUseCase<O, W, C, T, E, S>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    O: OrderRepository + Send + Sync + 'static,
    W: WholesalerRepository + Send + Sync + 'static,
    C: PaymentCalculationRepository + Send + Sync + 'static,
    T: TransferRepository + Send + Sync + 'static,
    E: WebhookEventRepository + Send + Sync + 'static,
    S: StripeGateway + Send + Sync + 'static,
{
    let Some(signature) = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
    else {
        warn!("stripe_v2: webhook without Stripe-Signature header");
        return WebhookError::InvalidSignature.into_response();
    };

    match usecase.handle_stripe_webhook(&body, signature).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(json!({ "received": true, "outcome": outcome })),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn get_transfer<O, W, C, T, E, S>(
    State(usecase): State<Arc<StripeWebhookUseCase<O, W, C, T, E, S>>>,
    Path(payment_intent_id): Path<String>,
) -> Response
where
    O: OrderRepository + Send + Sync + 'static,
    W: WholesalerRepository + Send + Sync + 'static,
    C: PaymentCalculationRepository + Send + Sync + 'static,
    T: TransferRepository + Send + Sync + 'static,
    E: WebhookEventRepository + Send + Sync + 'static,
    S: StripeGateway + Send + Sync + 'static,
{
    match usecase.get_transfer(&payment_intent_id).await {
        Ok(dto) => Json(dto).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn retry_transfer<O, W, C, T, E, S>(
    State(usecase): State<Arc<StripeWebhookUseCase<O, W, C, T, E, S>>>,
    Path(payment_intent_id): Path<String>,
) -> Response
where
    O: OrderRepository + Send + Sync + 'static,
    W: WholesalerRepository + Send + Sync + 'static,
    C: PaymentCalculationRepository + Send + Sync + 'static,
    T: TransferRepository + Send + Sync + 'static,
    E: WebhookEventRepository + Send + Sync + 'static,
    S: StripeGateway + Send + Sync + 'static,
{
    info!(%payment_intent_id, "stripe_v2: manual transfer retry requested");

    match usecase.retry_transfer(&payment_intent_id).await {
        Ok(dto) => Json(dto).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn create_connected_account<W, S>(
    State(usecase): State<Arc<ConnectOnboardingUseCase<W, S>>>,
    Json(request): Json<WholesalerAccountRequest>,
) -> Response
where
    W: WholesalerRepository + Send + Sync + 'static,
    S: StripeGateway + Send + Sync + 'static,
{
    match usecase.create_account(request.wholesaler_id).await {
        Ok(dto) if dto.created => (StatusCode::CREATED, Json(dto)).into_response(),
        Ok(dto) => Json(dto).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn create_account_link<W, S>(
    State(usecase): State<Arc<ConnectOnboardingUseCase<W, S>>>,
    Json(request): Json<WholesalerAccountRequest>,
) -> Response
where
    W: WholesalerRepository + Send + Sync + 'static,
    S: StripeGateway + Send + Sync + 'static,
{
    match usecase.create_onboarding_link(request.wholesaler_id).await {
        Ok(dto) => Json(dto).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn refresh_account_status<W, S>(
    State(usecase): State<Arc<ConnectOnboardingUseCase<W, S>>>,
    Path(wholesaler_id): Path<Uuid>,
) -> Response
where
    W: WholesalerRepository + Send + Sync + 'static,
    S: StripeGateway + Send + Sync + 'static,
{
    match usecase.refresh_status(wholesaler_id).await {
        Ok(status) => Json(status).into_response(),
        Err(err) => err.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::stripe_gateway::MockStripeGateway;
    use axum::body::Body;
    use axum::http::Request;
    use crates::domain::{
        repositories::{
            orders::MockOrderRepository, payment_calculations::MockPaymentCalculationRepository,
            transfers::MockTransferRepository, webhook_events::MockWebhookEventRepository,
            wholesalers::MockWholesalerRepository,
        },
        value_objects::fees::FeeRates,
    };
    use rust_decimal_macros::dec;
    use tower::ServiceExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn payment_app() -> Router {
        payment_routes(Arc::new(PaymentSplitUseCase::new(
            Arc::new(MockOrderRepository::new()),
            Arc::new(MockWholesalerRepository::new()),
            Arc::new(MockPaymentCalculationRepository::new()),
            Arc::new(MockStripeGateway::new()),
            FeeRates::new(dec!(0.055), dec!(0.033), 50).unwrap(),
            "gbp".to_string(),
        )))
    }

    fn webhook_app(stripe: MockStripeGateway, events: MockWebhookEventRepository) -> Router {
        webhook_routes(Arc::new(StripeWebhookUseCase::new(
            Arc::new(MockOrderRepository::new()),
            Arc::new(MockWholesalerRepository::new()),
            Arc::new(MockPaymentCalculationRepository::new()),
            Arc::new(MockTransferRepository::new()),
            Arc::new(events),
            Arc::new(stripe),
        )))
    }

    #[tokio::test]
    async fn fee_quote_returns_split() {
        let request = Request::builder()
            .method("POST")
            .uri("/fee-quote")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"product_subtotal_minor":10000,"delivery_fee_minor":500}"#,
            ))
            .unwrap();

        let response = payment_app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["currency"], "gbp");
        assert_eq!(body["breakdown"]["customer_total_minor"], 11_100);
        assert_eq!(body["breakdown"]["wholesaler_share_minor"], 9_670);
        assert_eq!(body["breakdown"]["platform_total_minor"], 1_430);
    }

    #[tokio::test]
    async fn fee_quote_rejects_zero_subtotal() {
        let request = Request::builder()
            .method("POST")
            .uri("/fee-quote")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"product_subtotal_minor":0}"#))
            .unwrap();

        let response = payment_app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["code"], 400);
    }

    #[tokio::test]
    async fn webhook_without_signature_is_rejected() {
        let mut stripe = MockStripeGateway::new();
        stripe.expect_verify_webhook_signature().never();

        let request = Request::builder()
            .method("POST")
            .uri("/webhook")
            .body(Body::from(r#"{"id":"evt_1"}"#))
            .unwrap();

        let response = webhook_app(stripe, MockWebhookEventRepository::new())
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn webhook_passes_raw_body_and_reports_outcome() {
        let payload = r#"{"id":"evt_1","type":"customer.created","data":{"object":{}}}"#;

        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_verify_webhook_signature()
            .withf(move |body, signature| body == payload.as_bytes() && signature == "t=1,v1=abc")
            .times(1)
            .returning(|body, _| Ok(serde_json::from_slice(body).unwrap()));

        let mut events = MockWebhookEventRepository::new();
        events.expect_is_processed().returning(|_| Ok(false));
        events.expect_mark_processed().times(1).returning(|_| Ok(()));

        let request = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("Stripe-Signature", "t=1,v1=abc")
            .body(Body::from(payload))
            .unwrap();

        let response = webhook_app(stripe, events).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["received"], true);
        assert_eq!(body["outcome"], "ignored");
    }

    fn signed_header(secret: &str, payload: &str) -> String {
        use hmac::{Hmac, Mac};
        let timestamp = chrono::Utc::now().timestamp();
        let mut mac = Hmac::<sha2::Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.{payload}").as_bytes());
        format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
    }

    fn signed_webhook_app(events: MockWebhookEventRepository) -> Router {
        webhook_routes(Arc::new(StripeWebhookUseCase::new(
            Arc::new(MockOrderRepository::new()),
            Arc::new(MockWholesalerRepository::new()),
            Arc::new(MockPaymentCalculationRepository::new()),
            Arc::new(MockTransferRepository::new()),
            Arc::new(events),
            Arc::new(StripeClient::new(
                "sk_test_123".to_string(),
                "whsec_test".to_string(),
                300,
            )),
        )))
    }

    #[tokio::test]
    async fn real_signature_is_verified_end_to_end() {
        let payload = r#"{"id":"evt_real","type":"balance.available","data":{"object":{}}}"#;

        let mut events = MockWebhookEventRepository::new();
        events
            .expect_is_processed()
            .withf(|id| id == "evt_real")
            .returning(|_| Ok(false));
        events.expect_mark_processed().times(1).returning(|_| Ok(()));

        let request = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("Stripe-Signature", signed_header("whsec_test", payload))
            .body(Body::from(payload))
            .unwrap();

        let response = signed_webhook_app(events).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn tampered_body_fails_verification() {
        let payload = r#"{"id":"evt_real","type":"balance.available","data":{"object":{}}}"#;
        let header = signed_header("whsec_test", payload);

        let mut events = MockWebhookEventRepository::new();
        events.expect_is_processed().never();

        let request = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("Stripe-Signature", header)
            .body(Body::from(payload.replace("evt_real", "evt_forged")))
            .unwrap();

        let response = signed_webhook_app(events).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_transfer_is_not_found() {
        let mut transfers = MockTransferRepository::new();
        transfers
            .expect_find_by_payment_intent_id()
            .returning(|_| Ok(None));

        let app = webhook_routes(Arc::new(StripeWebhookUseCase::new(
            Arc::new(MockOrderRepository::new()),
            Arc::new(MockWholesalerRepository::new()),
            Arc::new(MockPaymentCalculationRepository::new()),
            Arc::new(transfers),
            Arc::new(MockWebhookEventRepository::new()),
            Arc::new(MockStripeGateway::new()),
        )));

        let request = Request::builder()
            .uri("/transfers/pi_missing")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
