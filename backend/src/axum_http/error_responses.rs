use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::usecases::{
    connect_onboarding::OnboardingError, payment_split::PaymentSplitError,
    stripe_webhook::WebhookError,
};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
}

fn render(status: StatusCode, message: String) -> Response {
    let message = if status.is_server_error() {
        // Don't leak internal error detail to client
        "Internal server error".to_string()
    } else {
        message
    };

    let body = Json(ErrorResponse {
        code: status.as_u16(),
        message,
    });

    (status, body).into_response()
}

impl IntoResponse for PaymentSplitError {
    fn into_response(self) -> Response {
        render(self.status_code(), self.to_string())
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        render(self.status_code(), self.to_string())
    }
}

impl IntoResponse for OnboardingError {
    fn into_response(self) -> Response {
        render(self.status_code(), self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn client_errors_keep_their_message() {
        let response = PaymentSplitError::OrderNotFound.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert_eq!(body["code"], 404);
        assert_eq!(body["message"], "order not found");
    }

    #[tokio::test]
    async fn internal_errors_are_masked() {
        let response =
            WebhookError::Internal(anyhow::anyhow!("connection refused: db-primary:5432"))
                .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["message"], "Internal server error");
    }
}
