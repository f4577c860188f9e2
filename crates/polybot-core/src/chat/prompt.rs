//! Prompt construction for transcript replay.
//!
//! The full transcript is replayed on every call. Each replayed turn is
//! prefixed with a language instruction; which language and which role it
//! carries is governed by a [`PromptPolicy`].

use polybot_types::chat::{Turn, TurnRole};
use polybot_types::config::{PromptPolicy, ReplayLanguage, ReplayRoles};
use polybot_types::llm::Message;

/// Prefix a turn's text with the instruction to answer in `language`.
pub fn wrap_with_language(language: &str, text: &str) -> String {
    format!("Respond in {language}: {text}")
}

/// Build the model input for `transcript` under `policy`.
///
/// `current_language` is the session's language at call time. Stored turn
/// text is never modified; wrapping happens only in the returned messages.
pub fn build_prompt(transcript: &[Turn], current_language: &str, policy: PromptPolicy) -> Vec<Message> {
    transcript
        .iter()
        .map(|turn| {
            if turn.role == TurnRole::Assistant && policy.roles == ReplayRoles::Preserve {
                return Message::assistant(turn.content.clone());
            }

            let language = match policy.language {
                ReplayLanguage::Current => current_language,
                ReplayLanguage::PerTurn => turn.language.as_deref().unwrap_or(current_language),
            };
            Message::user(wrap_with_language(language, &turn.content))
        })
        .collect()
}
