//! Provider-switching WhatsApp gateway.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use tracing::{info, instrument};

use crate::base::{
    config::Config,
    types::{Provider, ProviderStatus, Res, Void},
};

use super::{ChatClient, GenericChatClient, fonnte::FonnteChatClient, gowa::GowaChatClient};

// Extra methods on `ChatClient` applied by the gateway implementation.

impl ChatClient {
    /// Both providers behind one client, starting on the configured one.
    pub fn whatsapp(config: &Config) -> Res<Self> {
        let gateway = WhatsAppGateway::new(Arc::new(FonnteChatClient::new(config)?), Arc::new(GowaChatClient::new(config)?), config.provider()?);
        Ok(Self { inner: Arc::new(gateway) })
    }
}

// Specific implementations.

/// Delegates to whichever provider is active.
pub struct WhatsAppGateway {
    fonnte: Arc<dyn GenericChatClient>,
    gowa: Arc<dyn GenericChatClient>,
    use_gowa: AtomicBool,
}

impl WhatsAppGateway {
    pub fn new(fonnte: Arc<dyn GenericChatClient>, gowa: Arc<dyn GenericChatClient>, initial: Provider) -> Self {
        info!("WhatsApp gateway starting on {initial}.");

        Self {
            fonnte,
            gowa,
            use_gowa: AtomicBool::new(initial == Provider::Gowa),
        }
    }

    fn active(&self) -> &dyn GenericChatClient {
        if self.use_gowa.load(Ordering::SeqCst) { self.gowa.as_ref() } else { self.fonnte.as_ref() }
    }
}

#[async_trait]
impl GenericChatClient for WhatsAppGateway {
    fn provider(&self) -> Provider {
        if self.use_gowa.load(Ordering::SeqCst) { Provider::Gowa } else { Provider::Fonnte }
    }

    #[instrument(skip(self, text), fields(provider = %self.provider()))]
    async fn send_message(&self, chat_id: &str, text: &str) -> Void {
        self.active().send_message(chat_id, text).await
    }

    async fn status(&self) -> Res<ProviderStatus> {
        self.active().status().await
    }

    fn switch_provider(&self, provider: Provider) -> Void {
        self.use_gowa.store(provider == Provider::Gowa, Ordering::SeqCst);
        info!("WhatsApp provider switched to {provider}.");

        Ok(())
    }
}

// Tests.
