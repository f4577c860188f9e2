//! Welcome banner display for chat sessions.

use console::style;

use polybot_types::chat::Session;

/// Print the welcome banner at the start of a chat.
pub fn print_welcome_banner(model: &str, session: &Session) {
    println!();
    println!("  {}", style("PolyBot").cyan().bold());
    println!(
        "  {}",
        style("Answers in whatever language you choose").dim()
    );
    println!();
    print_session_line(model, session);
    println!();
    println!(
        "  {}",
        style("Type /help for commands, Ctrl+D to exit").dim()
    );
    println!("  {}", style("---").dim());
    println!();
}

/// Model, session and language on one block; reused after `/switch` and `/new`.
pub fn print_session_line(model: &str, session: &Session) {
    println!("  {}     {}", style("Model:").bold(), style(model).dim());
    println!(
        "  {}   {}",
        style("Session:").bold(),
        style(session.display_name()).dim()
    );
    println!("  {}  {}", style("Language:").bold(), style(&session.language).dim());
}
