pub mod connect_onboarding;
pub mod payment_split;
pub mod stripe_gateway;
pub mod stripe_webhook;
