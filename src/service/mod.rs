//! Service integrations for external APIs and clients.
//!
//! This module contains implementations for the services used by digilife-bot:
//! - Chat services (Fonnte and GOWA WhatsApp gateways)
//! - Database services (PostgreSQL)
//! - LLM services (OpenAI) and the Qdrant knowledge base
//!
//! Each service module defines both generic traits and concrete implementations,
//! allowing for extensibility and easy testing. The cache-backed `catalog` and
//! `history` wrappers sit on top of the database client.

pub mod catalog;
pub mod chat;
pub mod db;
pub mod history;
pub mod knowledge;
pub mod llm;
