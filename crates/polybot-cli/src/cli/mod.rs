//! CLI command definitions for the `polybot` binary.
//!
//! Uses clap derive macros for argument parsing. Session identifiers are
//! taken verbatim; `polybot new` prints a generated one.

pub mod chat;
pub mod send;
pub mod session;

use std::time::Duration;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use polybot_types::error::ChatError;

/// Chat with a language model that remembers each session and answers in
/// the language you pick.
#[derive(Parser)]
#[command(name = "polybot", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export tracing spans to stdout via OpenTelemetry.
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive chat.
    Chat {
        /// Session to resume (defaults to the most recently used one).
        #[arg(short, long)]
        session: Option<String>,

        /// Language for replies; stored on the session.
        #[arg(short, long)]
        language: Option<String>,
    },

    /// Send one or more messages and print the reply.
    Send {
        /// Target session (defaults to the most recently used one).
        #[arg(short, long)]
        session: Option<String>,

        /// Language for this and later replies.
        #[arg(short, long)]
        language: Option<String>,

        /// Messages, recorded as consecutive user turns.
        #[arg(required = true)]
        messages: Vec<String>,
    },

    /// List recently used sessions.
    #[command(alias = "ls")]
    Sessions {
        /// Listing window in days.
        #[arg(long, value_parser = clap::value_parser!(i64).range(1..))]
        days: Option<i64>,
    },

    /// Create a new session.
    New {
        /// Optional display name.
        name: Option<String>,
    },

    /// Rename a session.
    Rename {
        session: String,
        name: String,
    },

    /// Set a session's reply language.
    Language {
        session: String,
        language: String,
    },

    /// Print a session's transcript.
    History {
        session: String,
    },

    /// Delete a session and its transcript.
    #[command(alias = "rm")]
    Delete {
        session: String,

        /// Skip the confirmation prompt.
        #[arg(long)]
        force: bool,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

/// Spinner shown while waiting on the model.
pub fn thinking_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(spinner_style);
    }
    spinner.set_message("thinking...");
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// Print persistence problems that did not stop the exchange.
pub fn print_warnings(warnings: &[ChatError]) {
    for warning in warnings {
        eprintln!(
            "  {} Not saved: {warning}",
            style("!").yellow().bold()
        );
    }
}

/// One-line hint for errors the user can act on.
pub fn error_hint(err: &ChatError) -> Option<&'static str> {
    use polybot_types::llm::LlmError;

    match err {
        ChatError::Inference(LlmError::AuthenticationFailed) => Some("Check OPENAI_API_KEY."),
        ChatError::Inference(LlmError::ContextLengthExceeded) => {
            Some("This session is too long for the model. Start a new one with /new.")
        }
        e if e.is_retryable() => Some("Type a message to retry, /exit to quit."),
        _ => None,
    }
}
