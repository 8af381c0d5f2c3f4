//! Load configuration via `config` crate with env-override support.

use std::{ops::Deref, sync::Arc};

use serde::Deserialize;

use crate::base::{prompts, types::Provider};

use super::types::Res;

/// Default OpenAI intent classifier model to use
fn default_openai_intent_model() -> String {
    "gpt-4o-mini".to_string()
}

/// Default OpenAI assistant model to use
fn default_openai_assistant_model() -> String {
    "gpt-4o-mini".to_string()
}

/// Default OpenAI vision model to use
fn default_openai_vision_model() -> String {
    "gpt-4o-mini".to_string()
}

/// Default OpenAI embedding model to use
fn default_openai_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

/// Default sampling temperature for the intent classifier
fn default_openai_intent_temperature() -> f32 {
    0.2
}

/// Default sampling temperature for the assistant
fn default_openai_assistant_temperature() -> f32 {
    0.7
}

/// Default max output tokens for assistant replies
fn default_openai_max_tokens() -> u32 {
    300
}

/// Default system directive for the assistant.
fn default_assistant_system_directive() -> String {
    prompts::ASSISTANT_SYSTEM_DIRECTIVE.to_string()
}

fn default_database_max_connections() -> u32 {
    5
}

fn default_qdrant_url() -> String {
    "http://localhost:6333".to_string()
}

fn default_qdrant_collection() -> String {
    "digilife_knowledge".to_string()
}

fn default_knowledge_top_k() -> usize {
    3
}

fn default_whatsapp_provider() -> String {
    "fonnte".to_string()
}

fn default_fonnte_api_url() -> String {
    "https://api.fonnte.com/send".to_string()
}

fn default_gowa_api_url() -> String {
    "http://localhost:3006".to_string()
}

fn default_gowa_session_id() -> String {
    "default".to_string()
}

fn default_admin_numbers() -> Vec<String> {
    vec!["628128933008".to_string()]
}

fn default_override_file() -> String {
    "override.txt".to_string()
}

fn default_payment_instructions() -> String {
    prompts::PAYMENT_INSTRUCTIONS.to_string()
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_data_cache_ttl_secs() -> u64 {
    300
}

fn default_history_limit() -> i64 {
    20
}

fn default_history_cache_ttl_secs() -> u64 {
    1800
}

fn default_history_cache_max_entries() -> usize {
    10
}

fn default_true() -> bool {
    true
}

fn default_reminder_send_delay_ms() -> u64 {
    1000
}

/// Configuration for the digilife-bot application.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// The shared settings.
    pub inner: Arc<ConfigInner>,
}

impl Deref for Config {
    type Target = ConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Every setting, read from `DIGILIFE_*` variables and the optional TOML file.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ConfigInner {
    /// OpenAI API key (`DIGILIFE_OPENAI_API_KEY`).
    pub openai_api_key: String,
    /// Model used to classify intents (`DIGILIFE_OPENAI_INTENT_MODEL`).
    #[serde(default = "default_openai_intent_model")]
    pub openai_intent_model: String,
    /// Model used to write free-form replies (`DIGILIFE_OPENAI_ASSISTANT_MODEL`).
    #[serde(default = "default_openai_assistant_model")]
    pub openai_assistant_model: String,
    /// Model used for OCR and payment proof analysis (`DIGILIFE_OPENAI_VISION_MODEL`).
    #[serde(default = "default_openai_vision_model")]
    pub openai_vision_model: String,
    /// Model used for knowledge base embeddings (`DIGILIFE_OPENAI_EMBEDDING_MODEL`).
    #[serde(default = "default_openai_embedding_model")]
    pub openai_embedding_model: String,
    /// Sampling temperature for the intent classifier (`DIGILIFE_OPENAI_INTENT_TEMPERATURE`).
    #[serde(default = "default_openai_intent_temperature")]
    pub openai_intent_temperature: f32,
    /// Sampling temperature for the assistant (`DIGILIFE_OPENAI_ASSISTANT_TEMPERATURE`).
    /// Value between 0 and 2.
    #[serde(default = "default_openai_assistant_temperature")]
    pub openai_assistant_temperature: f32,
    /// Max output tokens for assistant replies (`DIGILIFE_OPENAI_MAX_TOKENS`).
    #[serde(default = "default_openai_max_tokens")]
    pub openai_max_tokens: u32,
    /// Optional custom system directive to override the default (`DIGILIFE_ASSISTANT_SYSTEM_DIRECTIVE`).
    #[serde(default = "default_assistant_system_directive")]
    pub assistant_system_directive: String,
    /// Postgres connection string (`DIGILIFE_DATABASE_URL`).
    pub database_url: String,
    /// Pool size (`DIGILIFE_DATABASE_MAX_CONNECTIONS`).
    #[serde(default = "default_database_max_connections")]
    pub database_max_connections: u32,
    /// Qdrant REST endpoint (`DIGILIFE_QDRANT_URL`).
    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,
    /// Qdrant collection holding the knowledge base (`DIGILIFE_QDRANT_COLLECTION`).
    #[serde(default = "default_qdrant_collection")]
    pub qdrant_collection: String,
    /// Number of knowledge entries retrieved per message (`DIGILIFE_KNOWLEDGE_TOP_K`).
    #[serde(default = "default_knowledge_top_k")]
    pub knowledge_top_k: usize,
    /// Initial outbound provider, `fonnte` or `gowa` (`DIGILIFE_WHATSAPP_PROVIDER`).
    #[serde(default = "default_whatsapp_provider")]
    pub whatsapp_provider: String,
    /// Fonnte send endpoint (`DIGILIFE_FONNTE_API_URL`).
    #[serde(default = "default_fonnte_api_url")]
    pub fonnte_api_url: String,
    /// Fonnte device token (`DIGILIFE_FONNTE_TOKEN`).
    #[serde(default)]
    pub fonnte_token: String,
    /// GOWA base URL (`DIGILIFE_GOWA_API_URL`).
    #[serde(default = "default_gowa_api_url")]
    pub gowa_api_url: String,
    /// GOWA session (`DIGILIFE_GOWA_SESSION_ID`).
    #[serde(default = "default_gowa_session_id")]
    pub gowa_session_id: String,
    /// GOWA basic auth as `user:password` (`DIGILIFE_GOWA_BASIC_AUTH`).
    #[serde(default)]
    pub gowa_basic_auth: Option<String>,
    /// Our own JID on GOWA; inbound messages from it are ignored (`DIGILIFE_GOWA_BOT_JID`).
    #[serde(default)]
    pub gowa_bot_jid: Option<String>,
    /// Admin phone numbers, comma separated in the environment (`DIGILIFE_ADMIN_NUMBERS`).
    #[serde(default = "default_admin_numbers")]
    pub admin_numbers: Vec<String>,
    /// Password for the HTTP admin endpoints (`DIGILIFE_ADMIN_PASSWORD`).
    #[serde(default)]
    pub admin_password: Option<String>,
    /// File holding muted phone numbers (`DIGILIFE_OVERRIDE_FILE`).
    #[serde(default = "default_override_file")]
    pub override_file: String,
    /// Bank and e-wallet text sent to customers confirming a renewal (`DIGILIFE_PAYMENT_INSTRUCTIONS`).
    #[serde(default = "default_payment_instructions")]
    pub payment_instructions: String,
    /// HTTP bind address (`DIGILIFE_BIND_ADDRESS`).
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// HTTP port (`DIGILIFE_PORT`).
    #[serde(default = "default_port")]
    pub port: u16,
    /// TTL of the pricing, customer and group caches (`DIGILIFE_DATA_CACHE_TTL_SECS`).
    #[serde(default = "default_data_cache_ttl_secs")]
    pub data_cache_ttl_secs: u64,
    /// Conversation rows fetched per message (`DIGILIFE_HISTORY_LIMIT`).
    #[serde(default = "default_history_limit")]
    pub history_limit: i64,
    /// TTL of the in-memory history fallback (`DIGILIFE_HISTORY_CACHE_TTL_SECS`).
    #[serde(default = "default_history_cache_ttl_secs")]
    pub history_cache_ttl_secs: u64,
    /// Entries kept per phone in the in-memory history fallback (`DIGILIFE_HISTORY_CACHE_MAX_ENTRIES`).
    #[serde(default = "default_history_cache_max_entries")]
    pub history_cache_max_entries: usize,
    /// Whether the daily reminder scheduler runs (`DIGILIFE_REMINDERS_ENABLED`).
    #[serde(default = "default_true")]
    pub reminders_enabled: bool,
    /// Pause between reminder sends (`DIGILIFE_REMINDER_SEND_DELAY_MS`).
    #[serde(default = "default_reminder_send_delay_ms")]
    pub reminder_send_delay_ms: u64,
}

/// `DIGILIFE_*` variables, with `DIGILIFE_ADMIN_NUMBERS` split on commas.
fn environment() -> config::Environment {
    config::Environment::default()
        .prefix("DIGILIFE")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("admin_numbers")
}

impl Config {
    /// Loads and validates the configuration.
    pub fn load(explicit_path: Option<&std::path::Path>) -> Res<Self> {
        let mut cfg = config::Config::builder().add_source(environment());

        if let Some(p) = explicit_path {
            cfg = cfg.add_source(config::File::from(p.to_path_buf()));
        } else if std::path::Path::new(".hidden/config.toml").exists() {
            cfg = cfg.add_source(config::File::with_name(".hidden/config.toml"));
        }

        let result = Config {
            inner: Arc::new(cfg.build()?.try_deserialize()?),
        };

        result.validate()?;

        Ok(result)
    }

    /// Checks the ranges the rest of the application relies on.
    pub fn validate(&self) -> Res<()> {
        if self.openai_intent_temperature < 0.0 || self.openai_intent_temperature > 2.0 {
            return Err(anyhow::anyhow!("OpenAI intent temperature must be between 0 and 2."));
        }

        if self.openai_assistant_temperature < 0.0 || self.openai_assistant_temperature > 2.0 {
            return Err(anyhow::anyhow!("OpenAI assistant temperature must be between 0 and 2."));
        }

        if self.openai_max_tokens < 1 || self.openai_max_tokens > 16384 {
            return Err(anyhow::anyhow!("OpenAI max tokens must be between 1 and 16384."));
        }

        self.provider()?;

        Ok(())
    }

    /// The configured initial WhatsApp provider.
    pub fn provider(&self) -> Res<Provider> {
        self.whatsapp_provider.parse()
    }

    /// Whether `phone` belongs to an admin, comparing normalized numbers.
    pub fn is_admin(&self, phone: &str) -> bool {
        let phone = crate::base::types::phone::normalize(phone);
        !phone.is_empty() && self.admin_numbers.iter().any(|admin| crate::base::types::phone::normalize(admin) == phone)
    }
}

// Tests.
