use std::env;
use tracing::Level;
use url::Url;

#[derive(Clone, Debug)]
pub(crate) struct ServiceContext {
    pub(crate) service_name: String,
    pub(crate) environment: String,
    pub(crate) component: String,
}

#[derive(Clone, Debug)]
pub(crate) struct AlertConfig {
    pub(crate) webhook_url: Url,
    pub(crate) min_level: Level,
}

#[derive(Clone, Debug)]
pub(crate) struct ObservabilityConfig {
    pub(crate) service_context: ServiceContext,
    pub(crate) alert: Option<AlertConfig>,
    /// Logged once tracing is installed.
    pub(crate) warnings: Vec<String>,
}

impl ObservabilityConfig {
    pub(crate) fn from_env(component: &str) -> Self {
        Self::from_lookup(component, |key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(component: &str, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let component = component.trim().to_string();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let service_context = ServiceContext {
            service_name: non_empty("SERVICE_NAME").unwrap_or_else(|| component.clone()),
            environment: non_empty("STAGE").unwrap_or_else(|| "unknown".to_string()),
            component,
        };

        let mut warnings = Vec::new();
        let enabled = match non_empty("OPS_ALERT_ENABLED") {
            Some(raw) => parse_bool(&raw).unwrap_or_else(|| {
                warnings.push(format!(
                    "OPS_ALERT_ENABLED is invalid (value: {raw}); treating as enabled"
                ));
                true
            }),
            None => true,
        };

        let webhook_url = match non_empty("OPS_ALERT_WEBHOOK_URL") {
            Some(raw) if enabled => match Url::parse(raw.trim()) {
                Ok(url) => Some(url),
                Err(err) => {
                    // The URL embeds a token, so only the parse error is reported.
                    warnings.push(format!(
                        "OPS_ALERT_WEBHOOK_URL is set but invalid; ops alerts disabled (parse error: {err})"
                    ));
                    None
                }
            },
            _ => None,
        };

        let alert = webhook_url.map(|webhook_url| {
            let min_level = match non_empty("OPS_ALERT_LEVEL") {
                Some(raw) => parse_level(&raw).unwrap_or_else(|| {
                    warnings.push(format!(
                        "OPS_ALERT_LEVEL is invalid (value: {raw}); defaulting to ERROR"
                    ));
                    Level::ERROR
                }),
                None => Level::ERROR,
            };
            AlertConfig {
                webhook_url,
                min_level,
            }
        });

        Self {
            service_context,
            alert,
            warnings,
        }
    }
}

fn parse_level(input: &str) -> Option<Level> {
    match input.trim().to_ascii_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        _ => None,
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> ObservabilityConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ObservabilityConfig::from_lookup("backend", |key| vars.get(key).cloned())
    }

    #[test]
    fn alerts_disabled_without_webhook() {
        let config = config_from(&[]);
        assert!(config.alert.is_none());
        assert!(config.warnings.is_empty());
        assert_eq!(config.service_context.service_name, "backend");
        assert_eq!(config.service_context.environment, "unknown");
    }

    #[test]
    fn alerts_enabled_with_level() {
        let config = config_from(&[
            ("OPS_ALERT_WEBHOOK_URL", "https://discord.com/api/webhooks/1/abc"),
            ("OPS_ALERT_LEVEL", "warn"),
            ("STAGE", "production"),
        ]);
        let alert = config.alert.unwrap();
        assert_eq!(alert.min_level, Level::WARN);
        assert_eq!(config.service_context.environment, "production");
    }

    #[test]
    fn invalid_values_produce_warnings() {
        let config = config_from(&[
            ("OPS_ALERT_WEBHOOK_URL", "not a url"),
            ("OPS_ALERT_ENABLED", "maybe"),
        ]);
        assert!(config.alert.is_none());
        assert_eq!(config.warnings.len(), 2);
        assert!(!config.warnings.iter().any(|w| w.contains("not a url")));
    }

    #[test]
    fn explicit_disable_wins() {
        let config = config_from(&[
            ("OPS_ALERT_WEBHOOK_URL", "https://discord.com/api/webhooks/1/abc"),
            ("OPS_ALERT_ENABLED", "false"),
        ]);
        assert!(config.alert.is_none());
    }
}
