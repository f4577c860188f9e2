//! Business logic and port definitions for PolyBot.
//!
//! This crate defines the `SessionStore` and `LlmProvider` ports that the
//! infrastructure layer implements, the in-memory store backend, prompt
//! construction, and the `ChatService` that processes conversational turns.
//! It depends only on `polybot-types` -- never on `polybot-infra` or any
//! database/IO crate.

pub mod chat;
pub mod llm;
