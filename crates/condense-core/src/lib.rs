//! # condense-core
//!
//! Core types and abstractions for Condense - conversation sessions with
//! summary-based history compression.
//!
//! This crate provides:
//! - Message and conversation primitives
//! - The session entity with its summaries, compression log and statistics
//! - Configuration system
//! - Common error types

pub mod config;
pub mod error;
pub mod message;
pub mod session;

pub use config::Config;
pub use error::{Error, ProviderError, Result};
pub use message::{HistoryEntry, Message, Role};
pub use session::{
    CompressionEvent, Session, SessionId, SessionStats, SessionSummary, Summary, RETENTION_WINDOW,
};
