//! Message handling and customer interactions for digilife-bot.
//!
//! This module turns inbound WhatsApp messages into replies:
//! - Keyword filters and product detection that run before the language model
//! - The routing pipeline that arbitrates between templates and generated replies
//! - Admin commands (override list, payment confirmation) and expiry reminders

pub mod availability;
pub mod commands;
pub mod filters;
pub mod overrides;
pub mod payment;
pub mod pipeline;
pub mod reminder;
pub mod templates;
