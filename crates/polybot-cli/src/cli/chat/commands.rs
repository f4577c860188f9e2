//! Slash command parsing for the chat loop.
//!
//! Commands start with `/` and cover help, session switching, and the
//! per-session settings.

use console::style;

use polybot_types::chat::SessionId;

/// Available slash commands in the chat loop.
#[derive(Debug, PartialEq)]
pub enum ChatCommand {
    /// Show available commands.
    Help,
    /// Clear the terminal screen.
    Clear,
    /// Exit the chat.
    Exit,
    /// Start a new session, optionally named.
    New(Option<String>),
    /// Switch to another existing session.
    Switch(SessionId),
    /// List recent sessions.
    Sessions,
    /// Show this session's transcript.
    History,
    /// Change the reply language for this session.
    Language(String),
    /// Rename this session.
    Rename(String),
    /// Delete this session and move to the most recent remaining one.
    Delete,
    /// Known command used without its required argument.
    Usage(String),
    /// Unknown command.
    Unknown(String),
}

/// Parse user input as a slash command.
///
/// Returns `None` if the input doesn't start with `/`.
pub fn parse(input: &str) -> Option<ChatCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let parts: Vec<&str> = trimmed.splitn(2, ' ').collect();
    let cmd = parts[0].to_lowercase();
    let arg = parts
        .get(1)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let command = match cmd.as_str() {
        "/help" | "/h" | "/?" => ChatCommand::Help,
        "/clear" | "/cls" => ChatCommand::Clear,
        "/exit" | "/quit" | "/q" => ChatCommand::Exit,
        "/new" => ChatCommand::New(arg),
        "/sessions" | "/ls" => ChatCommand::Sessions,
        "/history" => ChatCommand::History,
        "/delete" => ChatCommand::Delete,
        "/switch" | "/sw" => match arg {
            Some(id) => ChatCommand::Switch(SessionId::from(id)),
            None => ChatCommand::Usage("/switch <id>".to_string()),
        },
        "/language" | "/lang" => match arg {
            Some(language) => ChatCommand::Language(language),
            None => ChatCommand::Usage("/language <lang>".to_string()),
        },
        "/rename" => match arg {
            Some(name) => ChatCommand::Rename(name),
            None => ChatCommand::Usage("/rename <name>".to_string()),
        },
        other => ChatCommand::Unknown(other.to_string()),
    };
    Some(command)
}

/// Print the help text listing all available commands.
pub fn print_help() {
    let rows = [
        ("/help", "Show this help message"),
        ("/clear", "Clear the screen"),
        ("/exit", "End the chat"),
        ("/new [name]", "Start a new session"),
        ("/switch <id>", "Switch to another session"),
        ("/sessions", "List recent sessions"),
        ("/history", "Show this session's transcript"),
        ("/language <lang>", "Change the reply language"),
        ("/rename <name>", "Rename this session"),
        ("/delete", "Delete this session"),
    ];

    println!();
    println!("  {}", style("Available commands:").bold());
    println!();
    for (command, description) in rows {
        println!("  {:<18} {}", style(command).cyan(), description);
    }
    println!();
    println!(
        "  {}",
        style("Ctrl+D to exit. Each line you send is one message.").dim()
    );
    println!();
}
