//! Integration with Large Language Model services.
//!
//! This module provides a thin wrapper around the OpenAI client for classifying
//! customer messages, writing replies, reading images and embedding text.

use std::sync::Arc;
use std::time::Duration;

use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImageArgs, ChatCompletionRequestMessageContentPartTextArgs,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs, CreateChatCompletionResponse, CreateEmbeddingRequestArgs, ImageDetail,
        ImageUrlArgs, ResponseFormat,
    },
};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use serde_json::Value;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::base::{
    config::Config,
    prompts,
    types::{HistoryEntry, HistoryRole, Intent, IntentContext, PaymentProof, ReplyContext, Res},
};

use super::{GenericLlmClient, LlmClient};

// Extra methods on `LlmClient` applied by the openai implementation.

impl LlmClient {
    pub fn openai(config: &Config) -> Self {
        let client = OpenAiLlmClient::new(config);
        Self { inner: Arc::new(client) }
    }
}

// Specific implementations.

/// OpenAI LLM client implementation.
#[derive(Clone)]
pub struct OpenAiLlmClient {
    client: Client<OpenAIConfig>,
    http: reqwest::Client,
    config: Config,
}

impl OpenAiLlmClient {
    /// Create a new OpenAI LLM client.
    #[instrument(name = "OpenAiLlmClient::new", skip_all)]
    pub fn new(config: &Config) -> Self {
        let cfg = OpenAIConfig::new().with_api_key(config.openai_api_key.clone());

        Self {
            client: Client::with_config(cfg),
            http: reqwest::Client::new(),
            config: config.clone(),
        }
    }

    /// Build the reply messages: directive, recent history, then the user turn.
    #[instrument(name = "OpenAiLlmClient::build_reply_messages", skip_all)]
    fn build_reply_messages(&self, context: &ReplyContext) -> Res<Vec<ChatCompletionRequestMessage>> {
        let system = prompts::build_reply_system(&self.config.assistant_system_directive, context.customer_name.as_deref(), &context.knowledge);

        let mut messages: Vec<ChatCompletionRequestMessage> = vec![ChatCompletionRequestSystemMessageArgs::default().content(system).build()?.into()];

        let recent = &context.history[context.history.len().saturating_sub(5)..];
        for entry in recent {
            messages.push(history_message(entry)?);
        }

        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompts::build_reply_user(&context.message, &context.knowledge))
                .build()?
                .into(),
        );

        Ok(messages)
    }

    /// Build a single vision request over an inlined image.
    async fn build_vision_messages(&self, prompt: &str, image_url: &str) -> Res<Vec<ChatCompletionRequestMessage>> {
        let data_url = self.download_as_data_url(image_url).await?;

        Ok(vec![
            ChatCompletionRequestUserMessageArgs::default()
                .content(vec![
                    ChatCompletionRequestMessageContentPartTextArgs::default().text(prompt).build()?.into(),
                    ChatCompletionRequestMessageContentPartImageArgs::default()
                        .image_url(ImageUrlArgs::default().url(data_url).detail(ImageDetail::Low).build()?)
                        .build()?
                        .into(),
                ])
                .build()?
                .into(),
        ])
    }

    /// Download an image and inline it, since gateway media URLs are often not reachable from OpenAI.
    #[instrument(skip(self))]
    async fn download_as_data_url(&self, image_url: &str) -> Res<String> {
        let response = self.http.get(image_url).timeout(Duration::from_secs(30)).send().await?.error_for_status()?;

        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();
        let bytes = response.bytes().await?;

        debug!("Downloaded {} bytes of {mime}.", bytes.len());

        Ok(format!("data:{mime};base64,{}", STANDARD.encode(&bytes)))
    }

    /// Helper function to make OpenAI API calls with retry logic and timeout handling.
    async fn call_openai_api(&self, request_builder: CreateChatCompletionRequestArgs) -> Res<CreateChatCompletionResponse> {
        const MAX_RETRIES: u32 = 3;
        const TIMEOUT: u64 = 120;
        const RETRY_DELAY_MS: u64 = 1000;

        let mut retries = 0;

        loop {
            let request = request_builder.build()?;
            let result = timeout(Duration::from_secs(TIMEOUT), self.client.chat().create(request)).await;

            match result {
                Ok(Ok(response)) => {
                    info!("OpenAI API call succeeded after {} attempts", retries + 1);
                    return Ok(response);
                }
                Ok(Err(err)) => {
                    if retries >= MAX_RETRIES {
                        return Err(anyhow::anyhow!("OpenAI API call failed after {MAX_RETRIES} retries: {err}"));
                    }
                    retries += 1;
                    warn!("OpenAI API call failed, retrying {retries}/{MAX_RETRIES}: {err}");

                    let delay = Duration::from_millis(RETRY_DELAY_MS * 2_u64.pow(retries - 1));
                    tokio::time::sleep(delay).await;
                }
                Err(_) => {
                    if retries >= MAX_RETRIES {
                        return Err(anyhow::anyhow!("OpenAI API call timed out after {MAX_RETRIES} attempts"));
                    }
                    retries += 1;
                    warn!("OpenAI API call timed out, retrying {retries}/{MAX_RETRIES}");

                    let delay = Duration::from_millis(RETRY_DELAY_MS * 2_u64.pow(retries - 1));
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[async_trait]
impl GenericLlmClient for OpenAiLlmClient {
    #[instrument(name = "OpenAiLlmClient::extract_intent", skip_all)]
    async fn extract_intent(&self, context: &IntentContext) -> Res<Intent> {
        let guidance = prompts::clarification_guidance(context.confidence, context.already_asked, context.bad_momentum);
        let prompt = prompts::build_intent_prompt(&context.products, &context.history, &guidance, &context.message);

        let mut request = CreateChatCompletionRequestArgs::default();
        request
            .model(&self.config.openai_intent_model)
            .temperature(self.config.openai_intent_temperature)
            .response_format(ResponseFormat::JsonObject)
            .messages(vec![ChatCompletionRequestUserMessageArgs::default().content(prompt).build()?.into()]);

        let response = self.call_openai_api(request).await?;
        let text = parse_openai_response(&response)?;

        let intent: Intent = serde_json::from_str(&text)?;
        info!("Intent detected: {intent:?}");

        Ok(intent)
    }

    #[instrument(name = "OpenAiLlmClient::generate_reply", skip_all)]
    async fn generate_reply(&self, context: &ReplyContext) -> Res<String> {
        let messages = self.build_reply_messages(context)?;

        let mut request = CreateChatCompletionRequestArgs::default();
        request
            .model(&self.config.openai_assistant_model)
            .temperature(self.config.openai_assistant_temperature)
            .max_completion_tokens(self.config.openai_max_tokens)
            .messages(messages);

        let response = self.call_openai_api(request).await?;

        parse_openai_response(&response)
    }

    #[instrument(name = "OpenAiLlmClient::analyze_payment_proof", skip_all)]
    async fn analyze_payment_proof(&self, image_url: &str) -> Res<PaymentProof> {
        let messages = self.build_vision_messages(prompts::PAYMENT_PROOF_PROMPT, image_url).await?;

        let mut request = CreateChatCompletionRequestArgs::default();
        request
            .model(&self.config.openai_vision_model)
            .temperature(0.0)
            .response_format(ResponseFormat::JsonObject)
            .messages(messages);

        let response = self.call_openai_api(request).await?;
        let text = parse_openai_response(&response)?;

        parse_payment_proof(&text)
    }

    #[instrument(name = "OpenAiLlmClient::extract_image_text", skip_all)]
    async fn extract_image_text(&self, image_url: &str) -> Res<String> {
        let messages = self.build_vision_messages(prompts::IMAGE_TEXT_PROMPT, image_url).await?;

        let mut request = CreateChatCompletionRequestArgs::default();
        request.model(&self.config.openai_vision_model).max_completion_tokens(self.config.openai_max_tokens).messages(messages);

        let response = self.call_openai_api(request).await?;

        parse_openai_response(&response)
    }

    #[instrument(name = "OpenAiLlmClient::embed", skip_all)]
    async fn embed(&self, text: &str) -> Res<Vec<f32>> {
        let request = CreateEmbeddingRequestArgs::default().model(&self.config.openai_embedding_model).input(text.to_string()).build()?;

        let response = timeout(Duration::from_secs(30), self.client.embeddings().create(request)).await??;

        response
            .data
            .into_iter()
            .next()
            .map(|embedding| embedding.embedding)
            .ok_or_else(|| anyhow::anyhow!("Embedding response was empty."))
    }
}

// Helpers.

fn history_message(entry: &HistoryEntry) -> Res<ChatCompletionRequestMessage> {
    Ok(match entry.role {
        HistoryRole::User => ChatCompletionRequestUserMessageArgs::default().content(entry.content.clone()).build()?.into(),
        HistoryRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default().content(entry.content.clone()).build()?.into(),
    })
}

/// Pull the text out of the first choice.
#[instrument(skip_all)]
pub fn parse_openai_response(response: &CreateChatCompletionResponse) -> Res<String> {
    let choice = response.choices.first().ok_or_else(|| anyhow::anyhow!("LLM response has no choices."))?;

    if let Some(refusal) = &choice.message.refusal {
        return Err(anyhow::anyhow!("Request refused: {refusal}"));
    }

    let text = choice.message.content.clone().unwrap_or_default();
    if text.trim().is_empty() {
        return Err(anyhow::anyhow!("LLM response was empty."));
    }

    Ok(text.trim().to_string())
}

/// Interpret the vision model's JSON verdict.
///
/// `is_payment_proof` may come back as a bool or a string; every other non-null
/// field becomes a `key: value` line of the details.
pub fn parse_payment_proof(raw: &str) -> Res<PaymentProof> {
    let value: Value = serde_json::from_str(raw)?;
    let object = value.as_object().ok_or_else(|| anyhow::anyhow!("Payment proof analysis is not a JSON object."))?;

    let is_payment_proof = match object.get("is_payment_proof") {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(flag)) => flag.eq_ignore_ascii_case("true") || flag.eq_ignore_ascii_case("ya"),
        _ => false,
    };

    let details = object
        .iter()
        .filter(|(key, _)| key.as_str() != "is_payment_proof")
        .filter_map(|(key, value)| match value {
            Value::Null => None,
            Value::String(text) if text.trim().is_empty() => None,
            Value::String(text) => Some(format!("{key}: {text}")),
            other => Some(format!("{key}: {other}")),
        })
        .collect::<Vec<_>>()
        .join("\n");

    Ok(PaymentProof { is_payment_proof, details })
}

// Tests.
