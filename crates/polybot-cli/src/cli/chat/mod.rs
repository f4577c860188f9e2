//! Interactive CLI chat for PolyBot.
//!
//! Reads lines with an async readline, runs each one as an exchange, and
//! exposes session management as slash commands. Entry point:
//! `loop_runner::run_chat_loop`.

pub mod banner;
pub mod commands;
pub mod input;
pub mod loop_runner;
