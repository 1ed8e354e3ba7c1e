//! Interactive chat loop.
//!
//! Provides a readline-style REPL with:
//! - Input history
//! - Slash commands for session management and compression
//! - A background sweeper evicting idle sessions

use std::path::PathBuf;
use std::sync::Arc;

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use condense_core::error::format_error_with_suggestion;
use condense_core::{CompressionEvent, Error, SessionId};
use condense_session::ConversationManager;

use crate::AppContext;

mod commands;

/// Mutable state of one REPL.
pub struct ReplState {
    ctx: Arc<AppContext>,
    current: SessionId,
}

impl ReplState {
    fn new(ctx: Arc<AppContext>) -> Self {
        let current = ctx.manager.create_session();
        Self { ctx, current }
    }

    fn manager(&self) -> &ConversationManager {
        &self.ctx.manager
    }

    /// Open a fresh session and make it current.
    fn start_new(&mut self) -> &str {
        self.current = self.ctx.manager.create_session();
        &self.current
    }
}

/// First eight characters of a session ID.
pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// One-line notice for a committed compression.
pub fn compression_notice(event: &CompressionEvent) -> String {
    format!(
        "[Compressed {} messages | tokens {} -> {} ({} saved)]",
        event.messages_compressed, event.tokens_before, event.tokens_after, event.tokens_saved
    )
}

/// Run the interactive REPL.
pub async fn run(ctx: Arc<AppContext>, history_path: PathBuf) -> anyhow::Result<()> {
    let sweeper = ctx.manager.spawn_sweeper(
        ctx.config.sessions.sweep_interval(),
        ctx.config.sessions.idle_ttl(),
    );

    let mut state = ReplState::new(ctx);
    print_welcome_banner(&state);

    // Initialize readline editor
    let mut editor = DefaultEditor::new()?;
    if history_path.exists() {
        let _ = editor.load_history(&history_path);
    }

    loop {
        let prompt = format!("[{}] >>> ", short_id(&state.current));

        match editor.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = editor.add_history_entry(line);

                if line.starts_with('/') {
                    match commands::handle_command(line, &mut state).await {
                        commands::CommandResult::Continue => continue,
                        commands::CommandResult::Exit => break,
                        commands::CommandResult::Error(e) => {
                            eprintln!("Error: {}", e);
                            continue;
                        }
                    }
                }

                if let Err(e) = process_message(line, &mut state).await {
                    eprintln!("Error: {}", format_error_with_suggestion(&e));
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    sweeper.abort();

    if let Some(parent) = history_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = editor.save_history(&history_path);

    Ok(())
}

/// Send one user message and print the reply.
async fn process_message(input: &str, state: &mut ReplState) -> Result<(), Error> {
    let result = state.manager().chat_turn(&state.current, input).await;
    let outcome = match result {
        Err(Error::SessionNotFound(_)) => {
            let id = state.start_new();
            println!("[Session expired, continuing in new session {}]", short_id(id));
            state.manager().chat_turn(&state.current, input).await?
        }
        other => other?,
    };

    if let Some(ref event) = outcome.compression {
        println!("{}", compression_notice(event));
    }
    if let Some(ref reason) = outcome.compression_error {
        println!("[Compression skipped: {}]", reason);
    }

    println!();
    println!("{}", outcome.reply);
    println!();
    Ok(())
}

fn print_welcome_banner(state: &ReplState) {
    let config = &state.ctx.config;

    println!("condense v{}", env!("CARGO_PKG_VERSION"));
    println!("Type /help for commands, or start chatting. Ctrl+D exits.");
    println!();
    println!(
        "[Providers: {} | Model: {}]",
        state.ctx.registry.list().join(", "),
        config.general.model.as_deref().unwrap_or("provider default")
    );
    if config.compression.enabled {
        println!(
            "[Compression at {} messages with {}]",
            config.compression.threshold,
            config
                .compression
                .model
                .as_deref()
                .unwrap_or("the provider's default model")
        );
    } else {
        println!("[Compression disabled for new sessions]");
    }
    println!("[Session: {}]", state.current);
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_notice_counts_summarized_messages() {
        let event = CompressionEvent {
            timestamp: chrono::Utc::now(),
            message_index_at_compression: 10,
            messages_compressed: 8,
            tokens_before: 500,
            tokens_after: 60,
            tokens_saved: 440,
        };

        assert_eq!(
            compression_notice(&event),
            "[Compressed 8 messages | tokens 500 -> 60 (440 saved)]"
        );
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("0123456789abcdef"), "01234567");
        assert_eq!(short_id("abc"), "abc");
    }
}
