//! Slash command handling for the REPL.

use condense_core::error::format_error_with_suggestion;
use condense_core::{Error, SessionId};
use condense_session::{CompressionOutcome, ConversationManager, HistoryMode};

use super::{compression_notice, short_id, ReplState};

/// Result of command execution.
pub enum CommandResult {
    /// Continue the REPL loop
    Continue,
    /// Exit the REPL
    Exit,
    /// An error occurred
    Error(String),
}

impl From<Error> for CommandResult {
    fn from(e: Error) -> Self {
        CommandResult::Error(format_error_with_suggestion(&e))
    }
}

/// Handle a slash command.
pub async fn handle_command(input: &str, state: &mut ReplState) -> CommandResult {
    let parts: Vec<&str> = input.split_whitespace().collect();
    let command = parts.first().copied().unwrap_or("");
    let args = &parts[1..];

    match command {
        "/help" | "/h" | "/?" => {
            print_help();
            CommandResult::Continue
        }
        "/exit" | "/quit" | "/q" => {
            println!("Goodbye!");
            CommandResult::Exit
        }
        "/new" => {
            let id = state.start_new();
            println!("[New session {}]", short_id(id));
            CommandResult::Continue
        }
        "/sessions" => list_sessions(state).await,
        "/switch" => match args.first() {
            Some(prefix) => match resolve_session(state.manager(), prefix) {
                Ok(id) => {
                    println!("[Switched to session {}]", short_id(&id));
                    state.current = id;
                    CommandResult::Continue
                }
                Err(e) => CommandResult::Error(e),
            },
            None => CommandResult::Error("Usage: /switch <id-prefix>".to_string()),
        },
        "/delete" => match args.first() {
            Some(prefix) => delete_session(prefix, state),
            None => CommandResult::Error("Usage: /delete <id-prefix>".to_string()),
        },
        "/history" => print_history(args, state).await,
        "/stats" => print_stats(state).await,
        "/compare" => print_comparison(state).await,
        "/compress" => compress_now(state).await,
        "/compression" => set_compression(args, state).await,
        "/sweep" => sweep(state),
        _ => CommandResult::Error(format!(
            "Unknown command: {}. Type /help for available commands.",
            command
        )),
    }
}

fn print_help() {
    println!("Available commands:");
    println!();
    println!("  /help, /h, /?               Show this help message");
    println!("  /exit, /quit, /q            Exit the REPL");
    println!("  /new                        Start a new session");
    println!("  /sessions                   List live sessions");
    println!("  /switch <id-prefix>         Switch to another session");
    println!("  /delete <id-prefix>         Delete a session");
    println!("  /history [full|compressed]  Show the session history");
    println!("  /stats                      Show compression statistics");
    println!("  /compare                    Compare full and compressed history");
    println!("  /compress                   Compress the session now");
    println!("  /compression on|off         Toggle automatic compression");
    println!("  /sweep                      Evict idle sessions now");
}

/// Resolve a session ID or unique prefix.
pub fn resolve_session(manager: &ConversationManager, prefix: &str) -> Result<SessionId, String> {
    let matches = manager.store().find_by_prefix(prefix);
    match matches.as_slice() {
        [] => Err(format!("Session '{}' not found", prefix)),
        [id] => Ok(id.clone()),
        many => Err(format!(
            "Ambiguous session ID '{}'. Matches: {}",
            prefix,
            many.iter()
                .map(|id| short_id(id))
                .collect::<Vec<_>>()
                .join(", ")
        )),
    }
}

async fn list_sessions(state: &ReplState) -> CommandResult {
    let sessions = state.manager().list_sessions().await;
    println!("Live sessions:");
    println!();
    for s in sessions {
        let marker = if s.id == state.current { " *" } else { "  " };
        println!(
            "{}  {} | {} messages | {} summaries | compression {} | {}",
            marker,
            short_id(&s.id),
            s.message_count,
            s.summary_count,
            if s.compression_enabled { "on" } else { "off" },
            s.last_activity_at.format("%Y-%m-%d %H:%M")
        );
    }
    CommandResult::Continue
}

fn delete_session(prefix: &str, state: &mut ReplState) -> CommandResult {
    let id = match resolve_session(state.manager(), prefix) {
        Ok(id) => id,
        Err(e) => return CommandResult::Error(e),
    };

    state.manager().delete_session(&id);
    println!("[Deleted session {}]", short_id(&id));

    if id == state.current {
        let new_id = state.start_new();
        println!("[New session {}]", short_id(new_id));
    }
    CommandResult::Continue
}

async fn print_history(args: &[&str], state: &ReplState) -> CommandResult {
    let mode = match args.first().map(|s| s.parse::<HistoryMode>()) {
        None => HistoryMode::Full,
        Some(Ok(mode)) => mode,
        Some(Err(e)) => return e.into(),
    };

    match state.manager().history_view(&state.current, mode).await {
        Ok(entries) => {
            if entries.is_empty() {
                println!("(no messages)");
            }
            for (i, entry) in entries.iter().enumerate() {
                println!("[{}] {}: {}", i + 1, entry.role, entry.content);
            }
            CommandResult::Continue
        }
        Err(e) => e.into(),
    }
}

async fn print_stats(state: &ReplState) -> CommandResult {
    match state.manager().stats(&state.current).await {
        Ok(stats) => {
            println!("Session {}", short_id(&state.current));
            println!("  Messages:           {}", stats.total_messages);
            println!("  Compressions:       {}", stats.total_compressions);
            println!("  Tokens before:      {}", stats.tokens_before_compression);
            println!("  Tokens after:       {}", stats.tokens_after_compression);
            println!("  Tokens saved:       {}", stats.tokens_saved);
            CommandResult::Continue
        }
        Err(e) => e.into(),
    }
}

async fn print_comparison(state: &ReplState) -> CommandResult {
    let report = match state.manager().compare_views(&state.current).await {
        Ok(report) => report,
        Err(e) => return e.into(),
    };

    println!("                 full    compressed");
    println!(
        "  Messages   {:>8}  {:>12}",
        report.full.messages, report.compressed.messages
    );
    println!(
        "  Characters {:>8}  {:>12}",
        report.full.characters, report.compressed.characters
    );
    println!(
        "  Est. tokens{:>8}  {:>12}",
        report.full.estimated_tokens, report.compressed.estimated_tokens
    );
    println!();
    println!(
        "  Saved {} estimated tokens ({:.1}%) across {} compression(s)",
        report.savings.token_reduction, report.savings.percentage_saved, report.compressions
    );
    CommandResult::Continue
}

async fn compress_now(state: &ReplState) -> CommandResult {
    match state.manager().compress(&state.current).await {
        Ok(CompressionOutcome::Compressed(event)) => {
            println!("{}", compression_notice(&event));
            CommandResult::Continue
        }
        Ok(CompressionOutcome::EmptyHistory) => {
            println!("[Nothing to compress]");
            CommandResult::Continue
        }
        Err(e) => e.into(),
    }
}

async fn set_compression(args: &[&str], state: &ReplState) -> CommandResult {
    let enabled = match args.first() {
        Some(&"on") => true,
        Some(&"off") => false,
        _ => return CommandResult::Error("Usage: /compression on|off".to_string()),
    };

    match state
        .manager()
        .set_compression_enabled(&state.current, enabled)
        .await
    {
        Ok(()) => {
            println!("[Compression {}]", if enabled { "on" } else { "off" });
            CommandResult::Continue
        }
        Err(e) => e.into(),
    }
}

fn sweep(state: &mut ReplState) -> CommandResult {
    let removed = state
        .manager()
        .sweep_idle(state.ctx.config.sessions.idle_ttl());
    println!("[Evicted {} idle session(s)]", removed);

    if state.manager().store().get(&state.current).is_err() {
        let id = state.start_new();
        println!("[New session {}]", short_id(id));
    }
    CommandResult::Continue
}
