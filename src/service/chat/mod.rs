pub mod fonnte;
pub mod gateway;
pub mod gowa;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;

use crate::base::types::{Provider, ProviderStatus, Res, Void};

// Traits.

/// Generic "chat" trait that clients must implement.
///
/// This trait defines the outbound side of a WhatsApp gateway. Inbound messages arrive
/// through the HTTP webhooks instead, so there is no listener here.
#[async_trait]
pub trait GenericChatClient: Send + Sync + 'static {
    /// The provider currently carrying outbound messages.
    fn provider(&self) -> Provider;

    /// Send a text message to a chat (JID or bare phone number).
    async fn send_message(&self, chat_id: &str, text: &str) -> Void;

    /// Connectivity of the active provider.
    async fn status(&self) -> Res<ProviderStatus>;

    /// Change the active provider at runtime.
    ///
    /// Single-provider clients cannot switch.
    fn switch_provider(&self, provider: Provider) -> Void {
        Err(anyhow::anyhow!("This chat client cannot switch to {provider}."))
    }
}

// Structs.

/// WhatsApp client for the application.
///
/// It is designed to be trivially cloneable, allowing it to be passed around
/// without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct ChatClient {
    inner: Arc<dyn GenericChatClient>,
}

impl Deref for ChatClient {
    type Target = dyn GenericChatClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl ChatClient {
    pub fn new(inner: Arc<dyn GenericChatClient>) -> Self {
        Self { inner }
    }
}
