//! WhatsApp notification webhook.
//!
//! Entry/exit alerts go to templated endpoints; free text goes to the bare
//! webhook. Every request uses HTTP basic auth.

use std::collections::BTreeMap;

use async_trait::async_trait;
use gatewatch_core::config::{NotificationConfig, UNKNOWN_LOCATION};
use gatewatch_core::error::{GatewatchError, Result};
use gatewatch_core::traits::NotificationChannel;
use gatewatch_core::types::{Delta, DeltaKind};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TemplateBody<'a> {
    chat_id: String,
    full_name: &'a str,
    location: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MessageBody<'a> {
    chat_id: &'a str,
    message: &'a str,
}

/// Sends alerts through the WhatsApp bridge.
pub struct WhatsAppNotifier {
    base_url: String,
    username: String,
    password: String,
    locations: BTreeMap<String, String>,
    client: reqwest::Client,
}

impl WhatsAppNotifier {
    pub fn new(config: &NotificationConfig, locations: BTreeMap<String, String>) -> Result<Self> {
        Ok(Self {
            base_url: config.base_url.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            locations,
            client: crate::build_client(config.timeout_secs)?,
        })
    }

    fn location_label(&self, code: &str) -> &str {
        self.locations
            .get(code.trim())
            .map(String::as_str)
            .unwrap_or(UNKNOWN_LOCATION)
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<()> {
        let url = crate::join_url(&self.base_url, path);
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.username, Some(&self.password))
            .json(body)
            .send()
            .await
            .map_err(|e| GatewatchError::channel(format!("WhatsApp request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(GatewatchError::channel(format!(
                "WhatsApp webhook error {status}: {text}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationChannel for WhatsAppNotifier {
    async fn notify(&self, delta: &Delta) -> Result<()> {
        let path = match delta.kind {
            DeltaKind::Entry => "webhook/whatsapp/notify-entry",
            DeltaKind::Exit => "webhook/whatsapp/notify-exit",
        };
        let body = TemplateBody {
            chat_id: delta.chat_id.to_string(),
            full_name: &delta.display_name,
            location: self.location_label(&delta.location),
        };
        self.post(path, &body).await?;
        tracing::debug!("📤 {} alert → chat {} ({})", delta.kind, delta.chat_id, delta.run);
        Ok(())
    }

    async fn send_message(&self, chat_id: &str, message: &str) -> Result<()> {
        self.post("webhook/whatsapp", &MessageBody { chat_id, message }).await?;
        tracing::debug!("📤 message → chat {chat_id}");
        Ok(())
    }
}
