use super::notifier::{AlertEvent, AlertSink};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use url::Url;

/// Chat webhook accepting `{"content": "..."}` bodies (Discord-compatible).
pub(crate) struct ChatWebhookSink {
    webhook_url: Url,
    client: Client,
}

/// Fields listed first so the on-call engineer sees which payment is affected.
const PRIORITY_FIELDS: [&str; 4] = ["payment_intent_id", "order_id", "wholesaler_id", "event_id"];
const CONTENT_LIMIT: usize = 2000;

impl ChatWebhookSink {
    pub(crate) fn new(webhook_url: Url) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(3)).build()?;
        Ok(Self {
            webhook_url,
            client,
        })
    }
}

pub(crate) fn format_content(event: &AlertEvent) -> String {
    let mut lines = vec![format!(
        "**{}** `{}` `{}` `{}`",
        event.service_name,
        event.environment,
        event.component,
        event.level.as_str()
    )];
    lines.push(format!(
        "`{}` `{}`",
        event.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        event.target
    ));

    if let Some(message) = event.message.as_ref().filter(|m| !m.trim().is_empty()) {
        lines.push(format!("> {}", message.trim()));
    }

    if !event.spans.is_empty() {
        lines.push(format!("spans: `{}`", event.spans.join(" > ")));
    }

    let priority = PRIORITY_FIELDS
        .iter()
        .filter_map(|key| event.fields.get_key_value(*key));
    let rest = event
        .fields
        .iter()
        .filter(|(k, _)| !PRIORITY_FIELDS.contains(&k.as_str()));
    for (key, value) in priority.chain(rest) {
        lines.push(format!("- `{}` = `{}`", key, value));
    }

    truncate(lines.join("\n"))
}

fn truncate(content: String) -> String {
    const SUFFIX: &str = "\n… (truncated)";

    if content.chars().count() <= CONTENT_LIMIT {
        return content;
    }

    let allowed = CONTENT_LIMIT - SUFFIX.chars().count();
    let mut truncated: String = content.chars().take(allowed).collect();
    truncated.push_str(SUFFIX);
    truncated
}

#[async_trait]
impl AlertSink for ChatWebhookSink {
    async fn send(&self, event: &AlertEvent) -> Result<()> {
        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(&json!({ "content": format_content(event) }))
            .send()
            .await
            // reqwest errors embed the URL, which carries the webhook token.
            .map_err(|err| anyhow!("ops alert webhook request failed: {}", err.without_url()))?;

        if response.status().is_success() {
            return Ok(());
        }

        Err(anyhow!(
            "ops alert webhook returned non-success status: {}",
            response.status()
        ))
    }

    fn name(&self) -> &'static str {
        "chat_webhook"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use tracing::Level;

    fn event(fields: &[(&str, &str)]) -> AlertEvent {
        AlertEvent {
            level: Level::ERROR,
            timestamp: Utc::now(),
            service_name: "wholesale-payments".to_string(),
            environment: "production".to_string(),
            component: "backend".to_string(),
            target: "backend::usecases::stripe_webhook".to_string(),
            message: Some("stripe_webhook: transfer failed".to_string()),
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
            spans: vec!["request".to_string()],
        }
    }

    #[test]
    fn payment_identifiers_come_first() {
        let content = format_content(&event(&[
            ("amount_minor", "9670"),
            ("payment_intent_id", "pi_123"),
        ]));

        let pi = content.find("payment_intent_id").unwrap();
        let amount = content.find("amount_minor").unwrap();
        assert!(pi < amount);
        assert!(content.contains("> stripe_webhook: transfer failed"));
        assert!(content.contains("spans: `request`"));
    }

    #[test]
    fn long_content_is_truncated() {
        let long = "x".repeat(5000);
        let content = format_content(&event(&[("error", long.as_str())]));

        assert_eq!(content.chars().count(), CONTENT_LIMIT);
        assert!(content.ends_with("(truncated)"));
    }
}
