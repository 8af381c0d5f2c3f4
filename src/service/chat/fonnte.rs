//! Fonnte gateway client.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{info, instrument};

use crate::base::{
    config::Config,
    types::{Provider, ProviderStatus, Res, Void, phone},
};

use super::GenericChatClient;

/// Sends through the Fonnte REST API.
#[derive(Clone)]
pub struct FonnteChatClient {
    http: reqwest::Client,
    send_url: String,
    token: String,
}

impl FonnteChatClient {
    #[instrument(name = "FonnteChatClient::new", skip_all)]
    pub fn new(config: &Config) -> Res<Self> {
        let http = reqwest::Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            http,
            send_url: config.fonnte_api_url.clone(),
            token: config.fonnte_token.clone(),
        })
    }

    /// The device endpoint sits next to the send endpoint.
    fn device_url(&self) -> String {
        match self.send_url.strip_suffix("/send") {
            Some(base) => format!("{base}/device"),
            None => format!("{}/device", self.send_url.trim_end_matches('/')),
        }
    }

    async fn post(&self, body: Value) -> Void {
        let response: Value = self
            .http
            .post(&self.send_url)
            .header(reqwest::header::AUTHORIZATION, &self.token)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        // Fonnte answers 200 with `status: false` on delivery errors.
        if response.get("status").and_then(Value::as_bool) == Some(false) {
            let reason = response.get("reason").and_then(Value::as_str).unwrap_or("unknown reason");
            return Err(anyhow::anyhow!("Fonnte rejected the message: {reason}"));
        }

        Ok(())
    }
}

#[async_trait]
impl GenericChatClient for FonnteChatClient {
    fn provider(&self) -> Provider {
        Provider::Fonnte
    }

    #[instrument(name = "FonnteChatClient::send_message", skip(self, text))]
    async fn send_message(&self, chat_id: &str, text: &str) -> Void {
        self.post(json!({ "target": fonnte_target(chat_id), "message": text })).await?;

        info!("Message sent via Fonnte.");

        Ok(())
    }

    #[instrument(name = "FonnteChatClient::status", skip_all)]
    async fn status(&self) -> Res<ProviderStatus> {
        let result = self.http.post(self.device_url()).header(reqwest::header::AUTHORIZATION, &self.token).send().await;

        let status = match result {
            Ok(response) => {
                let body: Value = response.json().await.unwrap_or_default();
                let device_status = body.get("device_status").and_then(Value::as_str).unwrap_or("unknown").to_string();

                ProviderStatus {
                    provider: Provider::Fonnte,
                    is_connected: device_status == "connect",
                    status: device_status,
                    detail: body.get("device").and_then(Value::as_str).map(str::to_string),
                }
            }
            Err(err) => ProviderStatus {
                provider: Provider::Fonnte,
                is_connected: false,
                status: "gateway_unreachable".to_string(),
                detail: Some(err.to_string()),
            },
        };

        Ok(status)
    }
}

/// Fonnte takes bare numbers for people and full ids for groups.
fn fonnte_target(chat_id: &str) -> String {
    if chat_id.ends_with("@g.us") { chat_id.to_string() } else { phone::from_jid(chat_id) }
}

// Tests.
