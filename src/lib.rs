//! Library root for `digilife-bot`.
//!
//! Digilife-bot is a WhatsApp customer-service assistant for a digital-subscription reseller
//! designed to:
//! - Answer pricing, availability and "what do I have" questions from cached business data
//! - Route everything else through an OpenAI intent classifier and a knowledge-grounded assistant
//! - Let admins confirm payments and mute numbers from WhatsApp itself
//! - Remind customers before their subscriptions expire
//!
//! The bot talks to WhatsApp through Fonnte or GOWA, stores its data in Postgres and its
//! knowledge base in Qdrant. The architecture is built around extensible traits that allow for
//! different implementations of each service.

#[deny(missing_docs)]
pub mod base;
pub mod interaction;
pub mod runtime;
pub mod server;
pub mod service;

use base::{config::Config, types::Void};
use tracing::info;

/// Public async entry for the binary crate.
///
/// Sets up necessary services and starts the digilife-bot runtime:
/// - Creates the runtime context with database, LLM, knowledge and WhatsApp clients
/// - Starts the reminder scheduler and the HTTP server
pub async fn start(config: Config) -> Void {
    info!("Starting digilife-bot ...");

    // Initialize the runtime.
    let runtime = runtime::Runtime::new(config).await?;

    // Start the runtime.
    runtime.start().await?;

    Ok(())
}
