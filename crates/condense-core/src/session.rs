//! Session and state management types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::Message;

/// Opaque session identifier.
pub type SessionId = String;

/// Number of most recent messages kept verbatim across a compression.
pub const RETENTION_WINDOW: usize = 2;

/// A generated summary standing in for compressed messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Summary text returned by the summarizer
    pub content: String,
    /// Number of messages in the snapshot that was summarized
    pub original_message_count: usize,
    /// When compression occurred
    pub compressed_at: DateTime<Utc>,
    /// Input tokens reported by the summarizer
    pub tokens_in_original: u64,
    /// Output tokens reported by the summarizer
    pub tokens_in_summary: u64,
}

/// One entry in the compression log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionEvent {
    pub timestamp: DateTime<Utc>,
    /// Length of `messages` when the snapshot was taken
    pub message_index_at_compression: usize,
    /// Messages removed from the raw history
    pub messages_compressed: usize,
    pub tokens_before: u64,
    pub tokens_after: u64,
    /// `tokens_before - tokens_after`; negative when the summary came out larger.
    pub tokens_saved: i64,
}

/// Running statistics for a session.
///
/// Updated incrementally on append and compression, never recomputed from
/// `messages` (which is truncated by compression).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Lifetime count of appended messages
    pub total_messages: u64,
    /// Number of successful compressions
    pub total_compressions: u64,
    pub tokens_before_compression: u64,
    pub tokens_after_compression: u64,
    pub tokens_saved: i64,
}

/// Full conversation session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique session ID
    pub id: SessionId,
    /// Raw messages; only compression shrinks this
    pub messages: Vec<Message>,
    /// Summaries, oldest first
    pub summaries: Vec<Summary>,
    /// Compression log, oldest first
    pub compression_events: Vec<CompressionEvent>,
    /// Running statistics
    pub stats: SessionStats,
    /// Whether the compressed view is used when building prompts
    pub compression_enabled: bool,
    /// Index of the first message appended after the most recent compression
    pub compact_boundary: usize,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last activity timestamp
    pub last_activity_at: DateTime<Utc>,
}

impl Session {
    /// Create a new session with a random ID.
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    /// Create a new session with the given ID.
    pub fn with_id(id: impl Into<SessionId>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            messages: vec![],
            summaries: vec![],
            compression_events: vec![],
            stats: SessionStats::default(),
            compression_enabled: true,
            compact_boundary: 0,
            created_at: now,
            last_activity_at: now,
        }
    }

    /// Get the session ID.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Add a message to the session.
    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
        self.stats.total_messages += 1;
        self.last_activity_at = Utc::now();
    }

    /// Number of messages that count toward the compression threshold.
    ///
    /// Every stored message is a user or assistant turn, so all of them count.
    pub fn eligible_message_count(&self) -> usize {
        self.messages.len()
    }

    /// Messages appended since the most recent compression.
    pub fn messages_since_compression(&self) -> &[Message] {
        let start = self.compact_boundary.min(self.messages.len());
        &self.messages[start..]
    }

    /// Commit a finished compression.
    ///
    /// Appends the summary and event, folds the event into the running stats
    /// and keeps only the last `retain` messages.
    pub fn apply_compression(&mut self, summary: Summary, event: CompressionEvent, retain: usize) {
        self.stats.total_compressions += 1;
        self.stats.tokens_before_compression += event.tokens_before;
        self.stats.tokens_after_compression += event.tokens_after;
        self.stats.tokens_saved += event.tokens_saved;

        self.summaries.push(summary);
        self.compression_events.push(event);

        let keep_from = self.messages.len().saturating_sub(retain);
        self.messages.drain(..keep_from);
        self.compact_boundary = self.messages.len();
    }

    /// Public listing view of this session (no message content).
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            created_at: self.created_at,
            last_activity_at: self.last_activity_at,
            message_count: self.messages.len(),
            summary_count: self.summaries.len(),
            compression_enabled: self.compression_enabled,
            stats: self.stats.clone(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary information for session listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub message_count: usize,
    pub summary_count: usize,
    pub compression_enabled: bool,
    pub stats: SessionStats,
}
