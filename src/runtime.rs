//! Runtime services and shared state for the digilife-bot.

use std::{path::Path, time::Duration};

use tracing::{info, instrument};

use crate::{
    base::{
        config::Config,
        types::{Res, Void},
    },
    interaction::{
        overrides::OverrideList,
        reminder::{ReminderService, spawn_scheduler},
    },
    server,
    service::{catalog::Catalog, chat::ChatClient, db::DbClient, history::HistoryStore, knowledge::KnowledgeClient, llm::LlmClient},
};

/// Runtime service context that can be shared across the application.
///
/// This struct holds every client, the cached reference data, and the configuration.
/// It is designed to be trivially cloneable, allowing it to be passed around
/// without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct Runtime {
    /// The configuration for the application.
    pub config: Config,
    /// The database client instance.
    pub db: DbClient,
    /// Cached pricing, subscriptions and groups.
    pub catalog: Catalog,
    /// Conversation history.
    pub history: HistoryStore,
    /// The LLM client instance.
    pub llm: LlmClient,
    /// The knowledge base client instance.
    pub knowledge: KnowledgeClient,
    /// The WhatsApp client instance.
    pub chat: ChatClient,
    /// Numbers the bot stays silent for.
    pub overrides: OverrideList,
}

impl Runtime {
    /// Create a new runtime instance.
    #[instrument(skip_all)]
    pub async fn new(config: Config) -> Res<Self> {
        // Initialize the database.
        let db = DbClient::postgres(&config).await?;

        // Initialize the caches on top of it.
        let catalog = Catalog::new(db.clone(), config.data_cache_ttl_secs);
        let history = HistoryStore::new(db.clone(), &config);

        // Initialize the LLM and knowledge clients.
        let llm = LlmClient::openai(&config);
        let knowledge = KnowledgeClient::qdrant(&config, llm.clone())?;

        // Initialize the WhatsApp gateway.
        let chat = ChatClient::whatsapp(&config)?;

        // Load the override list, resolving names from the subscriptions.
        let overrides = OverrideList::load(Path::new(&config.override_file), &catalog.subscriptions().await).await?;

        Ok(Self {
            config,
            db,
            catalog,
            history,
            llm,
            knowledge,
            chat,
            overrides,
        })
    }

    /// The reminder jobs, wired to this runtime's clients.
    pub fn reminders(&self) -> ReminderService {
        ReminderService::new(self.db.clone(), self.chat.clone(), self.history.clone(), Duration::from_millis(self.config.reminder_send_delay_ms))
    }

    /// Starts the reminder scheduler and serves HTTP until Ctrl-C.
    pub async fn start(&self) -> Void {
        if self.config.reminders_enabled {
            let handles = spawn_scheduler(self.reminders());
            info!("Started {} reminder job(s).", handles.len());
        }

        let address = format!("{}:{}", self.config.bind_address, self.config.port);
        let listener = tokio::net::TcpListener::bind(&address).await?;

        info!("Listening on {address} (provider: {}).", self.chat.provider());

        axum::serve(listener, server::router(self.clone()))
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                info!("Shutting down ...");
            })
            .await?;

        Ok(())
    }
}
