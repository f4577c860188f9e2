//! PolyBot CLI entry point.
//!
//! Binary name: `polybot`
//!
//! Parses CLI arguments, loads `.env` files and configuration, opens the
//! session store, then dispatches to the command handler.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands};
use polybot_infra::config::load_env_files;
use polybot_observe::tracing_setup::{init_tracing, shutdown_tracing, verbosity_filter};
use polybot_types::chat::SessionId;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "polybot", &mut std::io::stdout());
        return Ok(());
    }

    load_env_files();

    init_tracing(verbosity_filter(cli.verbose, cli.quiet), cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let state = AppState::init().await?;
    let json = cli.json;
    let quiet = cli.quiet;

    match cli.command {
        Commands::Chat { session, language } => {
            state.require_model()?;
            cli::chat::loop_runner::run_chat_loop(
                &state,
                session.map(SessionId::from),
                language,
            )
            .await?;
        }

        Commands::Send {
            session,
            language,
            messages,
        } => {
            state.require_model()?;
            cli::send::send_messages(
                &state,
                session.map(SessionId::from),
                language.as_deref(),
                messages,
                json,
                quiet,
            )
            .await?;
        }

        Commands::Sessions { days } => {
            cli::session::list_sessions(&state, days, json).await?;
        }

        Commands::New { name } => {
            cli::session::new_session(&state, name, json).await?;
        }

        Commands::Rename { session, name } => {
            cli::session::rename_session(&state, &SessionId::from(session), &name, json).await?;
        }

        Commands::Language { session, language } => {
            cli::session::set_language(&state, &SessionId::from(session), &language, json).await?;
        }

        Commands::History { session } => {
            cli::session::show_history(&state, &SessionId::from(session), json).await?;
        }

        Commands::Delete { session, force } => {
            cli::session::delete_session(&state, &SessionId::from(session), force, json).await?;
        }

        Commands::Completions { .. } => unreachable!("handled before state init"),
    }

    Ok(())
}
