//! Main interactive chat loop.
//!
//! Each submitted line becomes one exchange with the model. Session
//! switching and settings go through slash commands; errors from either
//! are printed and the loop keeps going.

use std::slice;

use console::style;

use polybot_types::chat::{Session, SessionId};
use polybot_types::error::ChatError;

use super::banner::{print_session_line, print_welcome_banner};
use super::commands::{self, ChatCommand};
use super::input::{ChatInput, InputEvent, prompt_for};
use crate::cli::session::{print_transcript, sessions_table};
use crate::cli::{error_hint, print_warnings, thinking_spinner};
use crate::state::AppState;

/// What the loop does after a slash command.
enum Flow {
    Continue,
    Exit,
}

/// Run the chat until the user exits.
///
/// Resumes `session_id` when given (creating it if unknown), otherwise the
/// most recently used session. `language` is stored on that session before
/// the first prompt.
pub async fn run_chat_loop(
    state: &AppState,
    session_id: Option<SessionId>,
    language: Option<String>,
) -> anyhow::Result<()> {
    let service = &state.chat_service;

    let mut session = match session_id {
        Some(id) => service.get_or_create(&id).await?,
        None => service.ensure_session().await?,
    };
    if let Some(language) = language.as_deref() {
        session = service.set_language(&session.id, language).await?;
    }

    let model = state.config.llm.model.clone();
    print_welcome_banner(&model, &session);

    let (mut chat_input, _writer) = ChatInput::new(prompt_for(&session.language))
        .map_err(|e| anyhow::anyhow!("Failed to initialize input: {e}"))?;

    loop {
        match chat_input.read_line().await {
            InputEvent::Eof => {
                println!("\n  {}", style("Chat ended.").dim());
                break;
            }
            InputEvent::Interrupted => {
                println!("\n  {}", style("Press Ctrl+D to exit, or keep chatting.").dim());
                continue;
            }
            InputEvent::Message(text) => {
                if text.is_empty() {
                    continue;
                }

                if let Some(cmd) = commands::parse(&text) {
                    if let ChatCommand::Clear = cmd {
                        chat_input.clear();
                        continue;
                    }
                    let language_before = session.language.clone();
                    match handle_command(state, &model, &mut session, cmd).await {
                        Ok(Flow::Continue) => {}
                        Ok(Flow::Exit) => {
                            println!("\n  {}", style("Chat ended.").dim());
                            break;
                        }
                        Err(err) => print_error(&err),
                    }
                    if session.language != language_before {
                        chat_input.update_prompt(&prompt_for(&session.language));
                    }
                    continue;
                }

                let spinner = thinking_spinner();
                let result = service
                    .process_turn(&session.id, slice::from_ref(&text), None)
                    .await;
                spinner.finish_and_clear();

                match result {
                    Ok(outcome) => {
                        println!();
                        for line in outcome.reply.lines() {
                            println!("  {line}");
                        }
                        println!();
                        print_warnings(&outcome.warnings);
                    }
                    Err(err) => print_error(&err),
                }
            }
        }
    }

    chat_input.flush();
    Ok(())
}

async fn handle_command(
    state: &AppState,
    model: &str,
    session: &mut Session,
    cmd: ChatCommand,
) -> Result<Flow, ChatError> {
    let service = &state.chat_service;

    match cmd {
        ChatCommand::Help => commands::print_help(),
        ChatCommand::Clear => {}
        ChatCommand::Exit => return Ok(Flow::Exit),
        ChatCommand::New(name) => {
            *session = service.create_session(name).await?;
            println!("\n  {} New session started.", style("+").green().bold());
            print_session_line(model, session);
            println!();
        }
        ChatCommand::Switch(id) => match service.get_session(&id).await? {
            Some(found) => {
                *session = found;
                println!("\n  {} Switched.", style("→").green().bold());
                print_session_line(model, session);
                println!();
            }
            None => {
                println!(
                    "\n  {} No session '{}'. Use /sessions to list them or /new to start one.\n",
                    style("?").yellow().bold(),
                    style(id.as_str()).dim()
                );
            }
        },
        ChatCommand::Sessions => {
            let sessions = service.list_sessions().await?;
            println!();
            if sessions.is_empty() {
                println!("  {}", style("No recent sessions.").dim());
            } else {
                println!("{}", sessions_table(&sessions, Some(&session.id)));
            }
            println!();
        }
        ChatCommand::History => {
            let turns = service.get_transcript(&session.id).await?;
            println!();
            print_transcript(&turns);
        }
        ChatCommand::Language(language) => {
            *session = service.set_language(&session.id, &language).await?;
            println!(
                "\n  {} Replies will be in {}.\n",
                style("✓").green().bold(),
                style(&session.language).bold()
            );
        }
        ChatCommand::Rename(name) => {
            *session = service.rename_session(&session.id, &name).await?;
            println!(
                "\n  {} Renamed to '{}'.\n",
                style("✓").green().bold(),
                style(session.display_name()).cyan()
            );
        }
        ChatCommand::Delete => {
            let deleted = session.display_name().to_string();
            service.delete_session(&session.id).await?;
            *session = service.ensure_session().await?;
            println!(
                "\n  {} Session '{}' deleted. Now in:",
                style("x").red().bold(),
                deleted
            );
            print_session_line(model, session);
            println!();
        }
        ChatCommand::Usage(usage) => {
            println!(
                "\n  {} Usage: {}\n",
                style("?").yellow().bold(),
                style(usage).cyan()
            );
        }
        ChatCommand::Unknown(cmd_name) => {
            println!(
                "\n  {} Unknown command: {}. Type /help for available commands.\n",
                style("?").yellow().bold(),
                style(cmd_name).dim()
            );
        }
    }

    Ok(Flow::Continue)
}

fn print_error(err: &ChatError) {
    eprintln!("\n  {} {err}", style("!").red().bold());
    if let Some(hint) = error_hint(err) {
        eprintln!("  {}", style(hint).dim());
    }
    eprintln!();
}
