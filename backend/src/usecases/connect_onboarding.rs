use std::{collections::HashMap, sync::Arc};

use crates::domain::{
    entities::wholesalers::WholesalerEntity,
    repositories::wholesalers::WholesalerRepository,
    value_objects::connected_accounts::{
        ConnectedAccountDto, ConnectedAccountStatus, OnboardingLinkDto,
    },
};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::stripe_gateway::StripeGateway;

#[derive(Debug, Error)]
pub enum OnboardingError {
    #[error("wholesaler not found")]
    WholesalerNotFound,
    #[error("wholesaler has no connected Stripe account")]
    AccountMissing,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl OnboardingError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            OnboardingError::WholesalerNotFound => StatusCode::NOT_FOUND,
            OnboardingError::AccountMissing => StatusCode::BAD_REQUEST,
            OnboardingError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, OnboardingError>;

#[derive(Debug, Clone)]
pub struct OnboardingUrls {
    pub refresh_url: String,
    pub return_url: String,
    pub default_country: String,
}

pub struct ConnectOnboardingUseCase<W, Stripe>
where
    W: WholesalerRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    wholesaler_repo: Arc<W>,
    stripe_client: Arc<Stripe>,
    urls: OnboardingUrls,
}

impl<W, Stripe> ConnectOnboardingUseCase<W, Stripe>
where
    W: WholesalerRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    pub fn new(wholesaler_repo: Arc<W>, stripe_client: Arc<Stripe>, urls: OnboardingUrls) -> Self {
        Self {
            wholesaler_repo,
            stripe_client,
            urls,
        }
    }

    /// Returns the wholesaler's Express account, creating it on first use.
    pub async fn create_account(&self, wholesaler_id: Uuid) -> UseCaseResult<ConnectedAccountDto> {
        let wholesaler = self.load_wholesaler(wholesaler_id).await?;

        if let Some(stripe_account_id) = wholesaler.stripe_account_id {
            info!(
                %wholesaler_id,
                stripe_account_id = %stripe_account_id,
                "connect_onboarding: reusing existing connected account"
            );
            return Ok(ConnectedAccountDto {
                wholesaler_id,
                stripe_account_id,
                created: false,
            });
        }

        let metadata = HashMap::from([("wholesaler_id".to_string(), wholesaler_id.to_string())]);
        let account = self
            .stripe_client
            .create_express_account(
                wholesaler.email.clone(),
                self.urls.default_country.clone(),
                metadata,
            )
            .await
            .map_err(|err| {
                error!(
                    %wholesaler_id,
                    error = ?err,
                    "connect_onboarding: stripe account creation failed"
                );
                OnboardingError::Internal(err)
            })?;

        self.wholesaler_repo
            .set_stripe_account_id(wholesaler_id, &account.id)
            .await
            .map_err(|err| {
                // The Stripe account now exists without a local link; surface it loudly.
                error!(
                    %wholesaler_id,
                    stripe_account_id = %account.id,
                    db_error = ?err,
                    "connect_onboarding: failed to store connected account id"
                );
                OnboardingError::Internal(err)
            })?;

        info!(
            %wholesaler_id,
            stripe_account_id = %account.id,
            "connect_onboarding: connected account created"
        );

        Ok(ConnectedAccountDto {
            wholesaler_id,
            stripe_account_id: account.id,
            created: true,
        })
    }

    pub async fn create_onboarding_link(
        &self,
        wholesaler_id: Uuid,
    ) -> UseCaseResult<OnboardingLinkDto> {
        let wholesaler = self.load_wholesaler(wholesaler_id).await?;
        let stripe_account_id = wholesaler.stripe_account_id.ok_or_else(|| {
            warn!(%wholesaler_id, "connect_onboarding: no connected account for onboarding link");
            OnboardingError::AccountMissing
        })?;

        let url = self
            .stripe_client
            .create_account_link(
                stripe_account_id.clone(),
                self.urls.refresh_url.clone(),
                self.urls.return_url.clone(),
            )
            .await
            .map_err(|err| {
                error!(
                    %wholesaler_id,
                    stripe_account_id = %stripe_account_id,
                    error = ?err,
                    "connect_onboarding: account link creation failed"
                );
                OnboardingError::Internal(err)
            })?;

        Ok(OnboardingLinkDto {
            wholesaler_id,
            stripe_account_id,
            url,
        })
    }

    pub async fn refresh_status(&self, wholesaler_id: Uuid) -> UseCaseResult<ConnectedAccountStatus> {
        let wholesaler = self.load_wholesaler(wholesaler_id).await?;
        let stripe_account_id = wholesaler
            .stripe_account_id
            .ok_or(OnboardingError::AccountMissing)?;

        let account = self
            .stripe_client
            .retrieve_account(stripe_account_id.clone())
            .await
            .map_err(|err| {
                error!(
                    %wholesaler_id,
                    stripe_account_id = %stripe_account_id,
                    error = ?err,
                    "connect_onboarding: failed to retrieve account"
                );
                OnboardingError::Internal(err)
            })?;

        let status = ConnectedAccountStatus::from_stripe_account(&account);
        self.wholesaler_repo
            .update_connected_account_status(status.clone())
            .await
            .map_err(|err| {
                error!(
                    %wholesaler_id,
                    db_error = ?err,
                    "connect_onboarding: failed to store account status"
                );
                OnboardingError::Internal(err)
            })?;

        if status.onboarding_completed && !wholesaler.onboarding_completed {
            info!(%wholesaler_id, "connect_onboarding: onboarding completed");
        }

        Ok(status)
    }

    async fn load_wholesaler(&self, wholesaler_id: Uuid) -> UseCaseResult<WholesalerEntity> {
        self.wholesaler_repo
            .find_by_id(wholesaler_id)
            .await
            .map_err(|err| {
                error!(%wholesaler_id, db_error = ?err, "connect_onboarding: failed to load wholesaler");
                OnboardingError::Internal(err)
            })?
            .ok_or(OnboardingError::WholesalerNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::stripe_gateway::MockStripeGateway;
    use chrono::Utc;
    use crates::{
        domain::repositories::wholesalers::MockWholesalerRepository,
        payments::stripe_client::{
            StripeAccount, StripeAccountCapabilities, StripeAccountRequirements,
        },
    };
    use mockall::predicate::eq;

    fn urls() -> OnboardingUrls {
        OnboardingUrls {
            refresh_url: "https://app.example.com/connect/refresh".to_string(),
            return_url: "https://app.example.com/connect/return".to_string(),
            default_country: "GB".to_string(),
        }
    }

    fn wholesaler(id: Uuid, account: Option<&str>) -> WholesalerEntity {
        let now = Utc::now();
        WholesalerEntity {
            id,
            business_name: "Fresh Produce Ltd".to_string(),
            email: "accounts@freshproduce.test".to_string(),
            stripe_account_id: account.map(str::to_string),
            onboarding_completed: false,
            charges_enabled: false,
            payouts_enabled: false,
            details_submitted: false,
            transfers_capability: None,
            requirements_due: serde_json::json!([]),
            created_at: now,
            updated_at: now,
        }
    }

    fn stripe_account(id: &str, transfers: &str, currently_due: Vec<&str>) -> StripeAccount {
        StripeAccount {
            id: id.to_string(),
            email: None,
            charges_enabled: true,
            payouts_enabled: true,
            details_submitted: true,
            capabilities: StripeAccountCapabilities {
                transfers: Some(transfers.to_string()),
                card_payments: None,
            },
            requirements: Some(StripeAccountRequirements {
                currently_due: currently_due.into_iter().map(str::to_string).collect(),
                past_due: Vec::new(),
                disabled_reason: None,
            }),
        }
    }

    #[tokio::test]
    async fn creates_express_account_once() {
        let wholesaler_id = Uuid::new_v4();

        let mut repo = MockWholesalerRepository::new();
        let entity = wholesaler(wholesaler_id, None);
        repo.expect_find_by_id()
            .with(eq(wholesaler_id))
            .returning(move |_| Ok(Some(entity.clone())));
        repo.expect_set_stripe_account_id()
            .withf(move |id, account| *id == wholesaler_id && account == "acct_new")
            .times(1)
            .returning(|_, _| Ok(()));

        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_create_express_account()
            .withf(move |email, country, metadata| {
                email == "accounts@freshproduce.test"
                    && country == "GB"
                    && metadata.get("wholesaler_id") == Some(&wholesaler_id.to_string())
            })
            .times(1)
            .returning(|_, _, _| Ok(stripe_account("acct_new", "inactive", vec![])));

        let dto = ConnectOnboardingUseCase::new(Arc::new(repo), Arc::new(stripe), urls())
            .create_account(wholesaler_id)
            .await
            .unwrap();

        assert!(dto.created);
        assert_eq!(dto.stripe_account_id, "acct_new");
    }

    #[tokio::test]
    async fn existing_account_is_reused() {
        let wholesaler_id = Uuid::new_v4();

        let mut repo = MockWholesalerRepository::new();
        let entity = wholesaler(wholesaler_id, Some("acct_existing"));
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(entity.clone())));
        repo.expect_set_stripe_account_id().never();

        let mut stripe = MockStripeGateway::new();
        stripe.expect_create_express_account().never();

        let dto = ConnectOnboardingUseCase::new(Arc::new(repo), Arc::new(stripe), urls())
            .create_account(wholesaler_id)
            .await
            .unwrap();

        assert!(!dto.created);
        assert_eq!(dto.stripe_account_id, "acct_existing");
    }

    #[tokio::test]
    async fn onboarding_link_requires_account() {
        let mut repo = MockWholesalerRepository::new();
        repo.expect_find_by_id()
            .returning(|id| Ok(Some(wholesaler(id, None))));

        let err = ConnectOnboardingUseCase::new(
            Arc::new(repo),
            Arc::new(MockStripeGateway::new()),
            urls(),
        )
        .create_onboarding_link(Uuid::new_v4())
        .await
        .unwrap_err();

        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn onboarding_link_uses_configured_urls() {
        let mut repo = MockWholesalerRepository::new();
        repo.expect_find_by_id()
            .returning(|id| Ok(Some(wholesaler(id, Some("acct_1")))));

        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_create_account_link()
            .withf(|account, refresh, ret| {
                account == "acct_1"
                    && refresh == "https://app.example.com/connect/refresh"
                    && ret == "https://app.example.com/connect/return"
            })
            .returning(|_, _, _| Ok("https://connect.stripe.com/setup/e/acct_1/abc".to_string()));

        let dto = ConnectOnboardingUseCase::new(Arc::new(repo), Arc::new(stripe), urls())
            .create_onboarding_link(Uuid::new_v4())
            .await
            .unwrap();

        assert_eq!(dto.url, "https://connect.stripe.com/setup/e/acct_1/abc");
    }

    #[tokio::test]
    async fn refresh_marks_onboarding_complete_when_transfers_active() {
        let mut repo = MockWholesalerRepository::new();
        repo.expect_find_by_id()
            .returning(|id| Ok(Some(wholesaler(id, Some("acct_1")))));
        repo.expect_update_connected_account_status()
            .withf(|status| status.onboarding_completed && status.requirements_due.is_empty())
            .times(1)
            .returning(|_| Ok(Some(Uuid::new_v4())));

        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_retrieve_account()
            .with(eq("acct_1".to_string()))
            .returning(|id| Ok(stripe_account(&id, "active", vec![])));

        let status = ConnectOnboardingUseCase::new(Arc::new(repo), Arc::new(stripe), urls())
            .refresh_status(Uuid::new_v4())
            .await
            .unwrap();

        assert!(status.onboarding_completed);
    }

    #[tokio::test]
    async fn pending_requirements_keep_onboarding_open() {
        let mut repo = MockWholesalerRepository::new();
        repo.expect_find_by_id()
            .returning(|id| Ok(Some(wholesaler(id, Some("acct_1")))));
        repo.expect_update_connected_account_status()
            .returning(|_| Ok(Some(Uuid::new_v4())));

        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_retrieve_account()
            .returning(|id| Ok(stripe_account(&id, "pending", vec!["external_account"])));

        let status = ConnectOnboardingUseCase::new(Arc::new(repo), Arc::new(stripe), urls())
            .refresh_status(Uuid::new_v4())
            .await
            .unwrap();

        assert!(!status.onboarding_completed);
        assert_eq!(status.requirements_due, vec!["external_account".to_string()]);
    }
}
