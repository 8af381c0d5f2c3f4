pub mod openai;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;

use crate::base::types::{Intent, IntentContext, PaymentProof, ReplyContext, Res};

// Traits.

/// Generic LLM client trait that clients must implement.
///
/// This trait defines the core functionality for interacting with large language models.
/// Implementing this trait allows different LLM providers to be used with the bot.
#[async_trait]
pub trait GenericLlmClient: Send + Sync + 'static {
    /// Classify a customer message.
    ///
    /// The context carries the known products, recent history and how confident the
    /// heuristics already are about the product in question.
    async fn extract_intent(&self, context: &IntentContext) -> Res<Intent>;

    /// Generate a free-form customer-service reply.
    async fn generate_reply(&self, context: &ReplyContext) -> Res<String>;

    /// Decide whether an image is a transfer receipt, and extract its details.
    async fn analyze_payment_proof(&self, image_url: &str) -> Res<PaymentProof>;

    /// Extract visible text (and some context) from an image.
    async fn extract_image_text(&self, image_url: &str) -> Res<String>;

    /// Embed text for vector search.
    async fn embed(&self, text: &str) -> Res<Vec<f32>>;
}

// Structs.

/// LLM client for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct LlmClient {
    inner: Arc<dyn GenericLlmClient>,
}

impl Deref for LlmClient {
    type Target = dyn GenericLlmClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl LlmClient {
    pub fn new(inner: Arc<dyn GenericLlmClient>) -> Self {
        Self { inner }
    }
}
