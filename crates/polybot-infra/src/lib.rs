//! Infrastructure layer for PolyBot.
//!
//! Implementations of the ports defined in `polybot-core`: the SQLite and
//! PostgREST session stores, the OpenAI-compatible model provider, plus
//! configuration and secret loading.

pub mod config;
pub mod llm;
pub mod postgrest;
pub mod sqlite;
pub mod store;
