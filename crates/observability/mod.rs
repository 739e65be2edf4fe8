mod config;
mod layer;
mod notifier;
mod webhook;

use anyhow::Result;
use config::ObservabilityConfig;
use layer::AlertLayer;
use notifier::Notifier;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use webhook::ChatWebhookSink;

/// Installs the global subscriber: local-time fmt output filtered by `RUST_LOG`
/// (default `info`), plus an optional ops alert layer fed from `OPS_ALERT_*`.
///
/// Must be called from inside a tokio runtime when alerts are enabled.
pub fn init_observability(component: &str) -> Result<()> {
    let mut config = ObservabilityConfig::from_env(component);

    let alert_layer = match config.alert.as_ref() {
        Some(alert) => match ChatWebhookSink::new(alert.webhook_url.clone()) {
            Ok(sink) => {
                let notifier = Notifier::new(vec![Arc::new(sink)]);
                Some(
                    AlertLayer::new(notifier, config.service_context.clone(), alert.min_level)
                        .with_filter(LevelFilter::from_level(alert.min_level)),
                )
            }
            Err(err) => {
                config
                    .warnings
                    .push(format!("ops alert http client could not be built: {err}"));
                None
            }
        },
        None => None,
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339());

    let alerts_enabled = alert_layer.is_some();

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(alert_layer)
        .with(env_filter)
        .try_init()?;

    for warning in &config.warnings {
        warn!(
            service = %config.service_context.service_name,
            environment = %config.service_context.environment,
            component = %config.service_context.component,
            warning = %warning,
            "observability: config warning"
        );
    }

    info!(
        service = %config.service_context.service_name,
        environment = %config.service_context.environment,
        component = %config.service_context.component,
        alerts_enabled,
        "observability: initialised"
    );

    Ok(())
}
