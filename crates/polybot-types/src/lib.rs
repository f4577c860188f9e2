//! Shared domain types for PolyBot.
//!
//! This crate contains the core domain types used across the workspace:
//! sessions, turns, LLM request/response shapes, configuration, and the
//! error taxonomy.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod error;
pub mod llm;
