use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::payments::stripe_client::StripeAccount;

const CAPABILITY_ACTIVE: &str = "active";

/// Local snapshot of a wholesaler's Stripe Express account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectedAccountStatus {
    pub stripe_account_id: String,
    pub charges_enabled: bool,
    pub payouts_enabled: bool,
    pub details_submitted: bool,
    pub transfers_capability: Option<String>,
    pub requirements_due: Vec<String>,
    pub onboarding_completed: bool,
}

impl ConnectedAccountStatus {
    /// Onboarding counts as complete once the account can receive transfers.
    pub fn from_stripe_account(account: &StripeAccount) -> Self {
        let transfers_active = account.capabilities.transfers.as_deref() == Some(CAPABILITY_ACTIVE);

        let mut requirements_due = account
            .requirements
            .as_ref()
            .map(|r| {
                r.past_due
                    .iter()
                    .chain(r.currently_due.iter())
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        requirements_due.sort();
        requirements_due.dedup();

        Self {
            stripe_account_id: account.id.clone(),
            charges_enabled: account.charges_enabled,
            payouts_enabled: account.payouts_enabled,
            details_submitted: account.details_submitted,
            transfers_capability: account.capabilities.transfers.clone(),
            requirements_due,
            onboarding_completed: account.details_submitted && transfers_active,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WholesalerAccountRequest {
    pub wholesaler_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ConnectedAccountDto {
    pub wholesaler_id: Uuid,
    pub stripe_account_id: String,
    pub created: bool,
}

#[derive(Debug, Serialize)]
pub struct OnboardingLinkDto {
    pub wholesaler_id: Uuid,
    pub stripe_account_id: String,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::stripe_client::{StripeAccountCapabilities, StripeAccountRequirements};

    fn account(details_submitted: bool, transfers: Option<&str>) -> StripeAccount {
        StripeAccount {
            id: "acct_1".to_string(),
            email: None,
            charges_enabled: true,
            payouts_enabled: false,
            details_submitted,
            capabilities: StripeAccountCapabilities {
                transfers: transfers.map(str::to_string),
                card_payments: None,
            },
            requirements: Some(StripeAccountRequirements {
                currently_due: vec!["external_account".to_string(), "tos_acceptance.date".to_string()],
                past_due: vec!["external_account".to_string()],
                disabled_reason: None,
            }),
        }
    }

    #[test]
    fn completed_once_transfers_are_active() {
        let status = ConnectedAccountStatus::from_stripe_account(&account(true, Some("active")));
        assert!(status.onboarding_completed);
    }

    #[test]
    fn pending_capability_keeps_onboarding_open() {
        let status = ConnectedAccountStatus::from_stripe_account(&account(true, Some("pending")));
        assert!(!status.onboarding_completed);

        let status = ConnectedAccountStatus::from_stripe_account(&account(false, Some("active")));
        assert!(!status.onboarding_completed);
    }

    #[test]
    fn requirements_are_merged_without_duplicates() {
        let status = ConnectedAccountStatus::from_stripe_account(&account(false, None));
        assert_eq!(
            status.requirements_due,
            vec!["external_account".to_string(), "tos_acceptance.date".to_string()]
        );
    }
}
