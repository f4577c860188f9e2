//! Session management CLI commands: list, new, rename, language, history, delete.
//!
//! Tables and transcript rendering here are shared with the chat loop's
//! slash commands.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use dialoguer::Confirm;

use polybot_types::chat::{SessionId, SessionSummary, Turn, TurnRole, recency_window};
use polybot_types::error::ChatError;

use crate::state::AppState;

/// List sessions used within the recency window, most recent first.
///
/// # Examples
///
/// ```bash
/// polybot sessions
/// polybot sessions --days 30 --json
/// ```
pub async fn list_sessions(state: &AppState, days: Option<i64>, json: bool) -> Result<()> {
    let sessions = match days {
        Some(days) => {
            let window = recency_window(days).context("--days must be positive")?;
            state.chat_service.list_sessions_within(window).await?
        }
        None => state.chat_service.list_sessions().await?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }

    if sessions.is_empty() {
        println!();
        println!(
            "  {} No recent sessions. Start one with: {}",
            style("i").blue().bold(),
            style("polybot chat").yellow()
        );
        println!();
        return Ok(());
    }

    println!();
    println!("{}", sessions_table(&sessions, None));
    println!();
    println!(
        "  {} session{}",
        style(sessions.len()).bold(),
        if sessions.len() == 1 { "" } else { "s" }
    );
    println!();

    Ok(())
}

/// Create a session and print its identifier.
pub async fn new_session(state: &AppState, name: Option<String>, json: bool) -> Result<()> {
    let session = state.chat_service.create_session(name).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&session)?);
    } else {
        println!(
            "  {} Created session {} ({})",
            style("+").green().bold(),
            style(session.id.as_str()).cyan(),
            session.language
        );
    }
    Ok(())
}

pub async fn rename_session(state: &AppState, session_id: &SessionId, name: &str, json: bool) -> Result<()> {
    let session = state
        .chat_service
        .rename_session(session_id, name)
        .await
        .map_err(|e| not_found_context(e, session_id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&session)?);
    } else {
        println!(
            "  {} Session {} is now '{}'",
            style("✓").green().bold(),
            style(session.id.as_str()).dim(),
            style(session.display_name()).cyan()
        );
    }
    Ok(())
}

/// Set the reply language exactly as given. Unknown sessions are created.
pub async fn set_language(state: &AppState, session_id: &SessionId, language: &str, json: bool) -> Result<()> {
    let session = state.chat_service.set_language(session_id, language).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&session)?);
    } else {
        println!(
            "  {} '{}' will reply in {}",
            style("✓").green().bold(),
            style(session.display_name()).cyan(),
            style(&session.language).bold()
        );
    }
    Ok(())
}

/// Print a session's transcript in recorded order.
pub async fn show_history(state: &AppState, session_id: &SessionId, json: bool) -> Result<()> {
    let session = state
        .chat_service
        .get_session(session_id)
        .await?
        .with_context(|| format!("Session '{session_id}' not found"))?;
    let turns = state.chat_service.get_transcript(session_id).await?;

    if json {
        let export = serde_json::json!({
            "session": session,
            "turns": turns,
        });
        println!("{}", serde_json::to_string_pretty(&export)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} {}",
        style(session.display_name()).cyan().bold(),
        style(format!("({})", session.language)).dim()
    );
    println!();
    print_transcript(&turns);
    Ok(())
}

/// Delete a session with confirmation.
///
/// The last remaining session cannot be deleted.
///
/// # Examples
///
/// ```bash
/// polybot delete <session-id>
/// polybot delete <session-id> --force
/// ```
pub async fn delete_session(state: &AppState, session_id: &SessionId, force: bool, json: bool) -> Result<()> {
    let session = state
        .chat_service
        .get_session(session_id)
        .await?
        .with_context(|| format!("Session '{session_id}' not found"))?;

    if !force && !json {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Delete session '{}' and its history?",
                style(session.display_name()).red().bold()
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            println!("  Cancelled.");
            return Ok(());
        }
    }

    state.chat_service.delete_session(session_id).await?;

    if json {
        println!(
            "{}",
            serde_json::json!({"deleted": true, "session_id": session_id})
        );
    } else {
        println!(
            "  {} Session '{}' deleted.",
            style("x").red().bold(),
            session.display_name()
        );
    }

    Ok(())
}

// --- Rendering helpers ---

/// Session table; `current` is marked with an arrow.
pub fn sessions_table(sessions: &[SessionSummary], current: Option<&SessionId>) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("").fg(Color::White),
        Cell::new("Session").fg(Color::White),
        Cell::new("Name").fg(Color::White),
        Cell::new("Language").fg(Color::White),
        Cell::new("Last active").fg(Color::White),
    ]);

    let now = Utc::now();
    for session in sessions {
        let marker = if Some(&session.id) == current { "→" } else { "" };
        table.add_row(vec![
            Cell::new(marker).fg(Color::Green),
            Cell::new(session.id.as_str()).fg(Color::DarkGrey),
            Cell::new(truncate(session.name.as_deref().unwrap_or("(unnamed)"), 40)).fg(Color::Cyan),
            Cell::new(&session.language).fg(Color::White),
            Cell::new(format_ago(now, session.last_accessed)).fg(Color::DarkGrey),
        ]);
    }

    table
}

pub fn print_transcript(turns: &[Turn]) {
    if turns.is_empty() {
        println!("  {}", style("(no messages yet)").dim());
        println!();
        return;
    }

    for turn in turns {
        let label = match turn.role {
            TurnRole::User => style("You").green().bold(),
            TurnRole::Assistant => style("Bot").cyan().bold(),
        };
        println!(
            "  {} {}",
            label,
            style(turn.created_at.format("%Y-%m-%d %H:%M")).dim()
        );
        for line in turn.content.lines() {
            println!("    {line}");
        }
        println!();
    }
}

fn not_found_context(err: ChatError, session_id: &SessionId) -> anyhow::Error {
    match err {
        ChatError::Persistence(polybot_types::error::RepositoryError::NotFound) => {
            anyhow::anyhow!("Session '{session_id}' not found")
        }
        other => other.into(),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{kept}...")
    } else {
        text.to_string()
    }
}

fn format_ago(now: DateTime<Utc>, then: DateTime<Utc>) -> String {
    let total_secs = (now - then).num_seconds().max(0);
    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3600;
    let mins = (total_secs % 3600) / 60;

    if days > 0 {
        format!("{days}d {hours}h ago")
    } else if hours > 0 {
        format!("{hours}h {mins}m ago")
    } else if mins > 0 {
        format!("{mins}m ago")
    } else {
        "just now".to_string()
    }
}
