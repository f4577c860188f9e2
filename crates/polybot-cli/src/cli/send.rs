//! One-shot exchange: `polybot send`.

use anyhow::Result;
use console::style;

use polybot_types::chat::SessionId;

use super::{error_hint, print_warnings, thinking_spinner};
use crate::state::AppState;

/// Record `messages` as user turns, ask the model, and print the reply.
///
/// Without `--session` the most recently used session is continued,
/// creating one if the store is empty.
pub async fn send_messages(
    state: &AppState,
    session_id: Option<SessionId>,
    language: Option<&str>,
    messages: Vec<String>,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let session_id = match session_id {
        Some(id) => id,
        None => state.chat_service.ensure_session().await?.id,
    };

    let spinner = (!json && !quiet).then(thinking_spinner);
    let result = state
        .chat_service
        .process_turn(&session_id, &messages, language)
        .await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(err) => {
            if let (false, Some(hint)) = (json, error_hint(&err)) {
                eprintln!("  {}", style(hint).dim());
            }
            return Err(err.into());
        }
    };

    if json {
        let warnings: Vec<String> = outcome.warnings.iter().map(ToString::to_string).collect();
        let body = serde_json::json!({
            "session_id": session_id,
            "language": outcome.language,
            "reply": outcome.reply,
            "warnings": warnings,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    println!("{}", outcome.reply);
    if !quiet {
        print_warnings(&outcome.warnings);
    }
    Ok(())
}
