//! # condense-session
//!
//! Session management and conversation compression for Condense.
//!
//! This crate provides:
//! - An in-memory session store with per-session locking and idle eviction
//! - Threshold-triggered compression of message history into summaries
//! - Full and compressed reconstructions of a session's history
//! - Token estimates and full-vs-compressed comparison reports
//! - [`ConversationManager`], the interface a request handler drives
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use condense_session::{ConversationManager, HistoryMode, ProviderReplyGenerator, ProviderSummarizer};
//!
//! let provider = registry.default_provider().unwrap();
//! let manager = ConversationManager::from_config(
//!     &config,
//!     Arc::new(ProviderSummarizer::new(provider.clone(), &config.compression)),
//!     Arc::new(ProviderReplyGenerator::new(provider, &config)),
//! );
//!
//! let id = manager.create_session();
//! let turn = manager.chat_turn(&id, "Hello!").await?;
//! let history = manager.history_view(&id, HistoryMode::Compressed).await?;
//! ```
//!
//! ## Compression
//!
//! Once a session holds `threshold` user/assistant messages, the
//! [`compaction::CompressionEngine`] sends the whole transcript to a
//! [`Summarizer`], stores the summary, and keeps only the last two messages.
//! The compressed view is every summary so far followed by the messages
//! appended since the last compression.

pub mod compaction;
pub mod context;
pub mod manager;
pub mod store;

// Re-export commonly used types
pub use compaction::{
    CompressionEngine, CompressionOutcome, HistoryMode, ProviderSummarizer, Summarizer,
    SummaryResponse, SUMMARY_MARKER, SUMMARY_PROMPT,
};
pub use context::{estimate_tokens, ComparisonReport, Savings, ViewMetrics};
pub use manager::{ConversationManager, ProviderReplyGenerator, ReplyGenerator, TurnOutcome};
pub use store::{SessionHandle, SessionStore};
