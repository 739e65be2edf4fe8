use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use crates::domain::value_objects::fees::FeeRates;
use rust_decimal::Decimal;

use super::config_model::{
    BackendServer, ConnectSettings, Database, DotEnvyConfig, StripeSettings,
};

const DEFAULT_WEBHOOK_TOLERANCE_SECS: i64 = 300;
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    load_from(|key| std::env::var(key).ok())
}

pub fn load_from(lookup: impl Fn(&str) -> Option<String>) -> Result<DotEnvyConfig> {
    let env = Env { lookup };

    let backend_server = BackendServer {
        port: env.parsed("SERVER_PORT_BACKEND")?,
        body_limit: env.parsed("SERVER_BODY_LIMIT")?,
        timeout: env.parsed("SERVER_TIMEOUT")?,
    };

    let database = Database {
        url: env.required("DATABASE_URL")?,
        max_connections: env.parsed_or("DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?,
    };

    let stripe = StripeSettings {
        secret_key: env.required("STRIPE_SECRET_KEY")?,
        webhook_secret: env.required("STRIPE_WEBHOOK_SECRET")?,
        webhook_tolerance_secs: env
            .parsed_or("STRIPE_WEBHOOK_TOLERANCE_SECS", DEFAULT_WEBHOOK_TOLERANCE_SECS)?,
    };

    let connect = ConnectSettings {
        refresh_url: env.required("STRIPE_CONNECT_REFRESH_URL")?,
        return_url: env.required("STRIPE_CONNECT_RETURN_URL")?,
        default_country: env
            .optional("STRIPE_DEFAULT_COUNTRY")
            .unwrap_or_else(|| "GB".to_string())
            .to_ascii_uppercase(),
    };

    let fees = FeeRates::new(
        env.parsed_or("CUSTOMER_TRANSACTION_FEE_RATE", Decimal::new(55, 3))?,
        env.parsed_or("WHOLESALER_PLATFORM_FEE_RATE", Decimal::new(33, 3))?,
        env.parsed_or("FIXED_TRANSACTION_FEE_MINOR", 50_i64)?,
    )
    .context("fee configuration is invalid")?;

    let default_currency = env
        .optional("DEFAULT_CURRENCY")
        .unwrap_or_else(|| "gbp".to_string())
        .to_ascii_lowercase();

    Ok(DotEnvyConfig {
        backend_server,
        database,
        stripe,
        connect,
        fees,
        default_currency,
    })
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String> {
        self.optional(key).ok_or_else(|| anyhow!("{key} is missing"))
    }

    fn parsed<T>(&self, key: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        self.required(key)?
            .parse()
            .with_context(|| format!("{key} is invalid"))
    }

    fn parsed_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match self.optional(key) {
            Some(raw) => raw.parse().with_context(|| format!("{key} is invalid")),
            None => Ok(default),
        }
    }
}
