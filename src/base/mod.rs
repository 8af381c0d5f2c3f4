//! Core components, types, and utilities for the digilife-bot.
//!
//! This module contains fundamental building blocks used throughout the application:
//! - Configuration handling and environment variables.
//! - Prompts and directives for LLM interactions.
//! - Domain types and result handling.

pub mod config;
pub mod prompts;
pub mod types;
