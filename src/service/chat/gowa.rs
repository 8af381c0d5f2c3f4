//! GOWA (go-whatsapp-web-multidevice) client.

use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use serde_json::{Value, json};
use tracing::{info, instrument};

use crate::base::{
    config::Config,
    types::{Provider, ProviderStatus, Res, Void, phone},
};

use super::GenericChatClient;

/// Sends through a self-hosted GOWA instance.
#[derive(Clone)]
pub struct GowaChatClient {
    http: reqwest::Client,
    base_url: String,
    session_id: String,
    authorization: Option<String>,
}

impl GowaChatClient {
    #[instrument(name = "GowaChatClient::new", skip_all)]
    pub fn new(config: &Config) -> Res<Self> {
        let http = reqwest::Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            http,
            base_url: config.gowa_api_url.trim_end_matches('/').to_string(),
            session_id: config.gowa_session_id.clone(),
            authorization: config.gowa_basic_auth.as_deref().map(basic_auth_header),
        })
    }

    fn with_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.authorization {
            Some(value) => request.header(reqwest::header::AUTHORIZATION, value),
            None => request,
        }
    }

    fn check(response: &Value) -> Void {
        if response.get("code").and_then(Value::as_str).is_some_and(|code| code != "SUCCESS") {
            let message = response.get("message").and_then(Value::as_str).unwrap_or("unknown error");
            return Err(anyhow::anyhow!("GOWA rejected the message: {message}"));
        }

        Ok(())
    }
}

#[async_trait]
impl GenericChatClient for GowaChatClient {
    fn provider(&self) -> Provider {
        Provider::Gowa
    }

    #[instrument(name = "GowaChatClient::send_message", skip(self, text))]
    async fn send_message(&self, chat_id: &str, text: &str) -> Void {
        let body = json!({ "phone": phone::to_jid(chat_id), "message": text, "session": self.session_id });

        let request = self.with_auth(self.http.post(format!("{}/send/message", self.base_url))).json(&body);
        let response: Value = request.send().await?.error_for_status()?.json().await?;

        Self::check(&response)?;
        info!("Message sent via GOWA.");

        Ok(())
    }

    #[instrument(name = "GowaChatClient::status", skip_all)]
    async fn status(&self) -> Res<ProviderStatus> {
        let request = self.with_auth(self.http.get(format!("{}/app/status", self.base_url)));

        let status = match request.send().await {
            Ok(response) => {
                let body: Value = response.json().await.unwrap_or_default();
                let results = body.get("results").or_else(|| body.get("data")).cloned().unwrap_or_default();

                let is_connected = results.get("is_connected").and_then(Value::as_bool).unwrap_or_else(|| results.get("status").and_then(Value::as_str) == Some("connected"));
                let is_logged_in = results.get("is_logged_in").and_then(Value::as_bool).unwrap_or(is_connected);

                ProviderStatus {
                    provider: Provider::Gowa,
                    is_connected: is_connected && is_logged_in,
                    status: if is_connected && is_logged_in { "connected".to_string() } else { "disconnected".to_string() },
                    detail: results.get("phone").and_then(Value::as_str).map(str::to_string),
                }
            }
            Err(err) => ProviderStatus {
                provider: Provider::Gowa,
                is_connected: false,
                status: "disconnected".to_string(),
                detail: Some(err.to_string()),
            },
        };

        Ok(status)
    }
}

/// `Basic <base64(user:password)>` from a `user:password` pair.
fn basic_auth_header(credentials: &str) -> String {
    format!("Basic {}", STANDARD.encode(credentials))
}

// Tests.
