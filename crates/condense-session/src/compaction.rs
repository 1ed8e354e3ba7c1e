//! Conversation compression.
//!
//! When a session's raw history reaches the configured threshold, the whole
//! history is summarized by a [`Summarizer`] and replaced by the summary plus
//! the last [`RETENTION_WINDOW`] messages. Compression is all-or-nothing: if
//! the summarizer fails the session is not touched.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use condense_core::{
    config::CompressionConfig, CompressionEvent, Error, HistoryEntry, Message, Result, Role,
    Session, Summary, RETENTION_WINDOW,
};
use condense_providers::{CompletionRequest, Provider};

/// Prefix of the synthetic entry that carries a summary in the compressed view.
pub const SUMMARY_MARKER: &str = "[CONVERSATION SUMMARY UP TO THIS POINT]";

/// Instructions sent to the summarizer ahead of the transcript.
pub const SUMMARY_PROMPT: &str = "\
Summarize the following conversation so that it can replace the original \
messages as context for continuing the conversation. Structure the summary as:

1. Topics discussed
2. Key information exchanged
3. Decisions or conclusions reached
4. Context needed to continue the conversation
5. User preferences and requirements

Be factual and specific. Do not invent details that are not in the conversation.";

/// Which representation of a session's history to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryMode {
    /// Every message still held, verbatim
    Full,
    /// Summaries followed by messages since the last compression
    Compressed,
}

impl std::str::FromStr for HistoryMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "full" => Ok(HistoryMode::Full),
            "compressed" => Ok(HistoryMode::Compressed),
            other => Err(Error::Validation(format!(
                "Unknown history mode '{}'. Valid values: full, compressed",
                other
            ))),
        }
    }
}

/// Summary text and usage as reported by the summarizer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryResponse {
    pub summary_text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Produces a summary of a conversation transcript.
///
/// Implementations may fail for any reason (transport, auth, upstream
/// rejection); all failures are treated alike and never retried here.
#[async_trait::async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, transcript: &str, prompt: &str) -> anyhow::Result<SummaryResponse>;
}

/// Result of a compression attempt that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum CompressionOutcome {
    /// A summary was committed to the session.
    Compressed(CompressionEvent),
    /// There was nothing to summarize.
    EmptyHistory,
}

impl CompressionOutcome {
    pub fn is_compressed(&self) -> bool {
        matches!(self, CompressionOutcome::Compressed(_))
    }

    pub fn event(&self) -> Option<&CompressionEvent> {
        match self {
            CompressionOutcome::Compressed(event) => Some(event),
            CompressionOutcome::EmptyHistory => None,
        }
    }
}

/// Decides when to compress a session and performs the compression.
#[derive(Debug, Clone)]
pub struct CompressionEngine {
    threshold: usize,
}

impl CompressionEngine {
    /// Create an engine that compresses at `threshold` eligible messages.
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    pub fn from_config(config: &CompressionConfig) -> Self {
        Self::new(config.threshold)
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Whether the session has reached the compression threshold.
    pub fn should_compress(&self, session: &Session) -> bool {
        session.eligible_message_count() >= self.threshold
    }

    /// Summarize the session's whole raw history and truncate it.
    ///
    /// The caller must hold the session's exclusion scope for the duration of
    /// the call; the summarizer await happens while `session` is borrowed.
    pub async fn compress<S>(&self, session: &mut Session, summarizer: &S) -> Result<CompressionOutcome>
    where
        S: Summarizer + ?Sized,
    {
        let snapshot_len = session.messages.len();
        if snapshot_len == 0 {
            debug!(session = %session.id, "Nothing to compress");
            return Ok(CompressionOutcome::EmptyHistory);
        }

        let transcript = render_transcript(&session.messages);
        debug!(
            session = %session.id,
            messages = snapshot_len,
            transcript_chars = transcript.len(),
            "Requesting summary"
        );

        let response = summarizer
            .summarize(&transcript, SUMMARY_PROMPT)
            .await
            .map_err(|e| {
                warn!(session = %session.id, "Summarization failed: {:#}", e);
                Error::SummarizationFailed(format!("{:#}", e))
            })?;

        let now = Utc::now();
        let tokens_before = response.input_tokens;
        let tokens_after = response.output_tokens;
        let tokens_saved = tokens_before as i64 - tokens_after as i64;
        let retained = snapshot_len.min(RETENTION_WINDOW);

        let summary = Summary {
            content: response.summary_text,
            original_message_count: snapshot_len,
            compressed_at: now,
            tokens_in_original: tokens_before,
            tokens_in_summary: tokens_after,
        };

        let event = CompressionEvent {
            timestamp: now,
            message_index_at_compression: snapshot_len,
            messages_compressed: snapshot_len - retained,
            tokens_before,
            tokens_after,
            tokens_saved,
        };

        session.apply_compression(summary, event.clone(), RETENTION_WINDOW);

        info!(
            session = %session.id,
            messages = snapshot_len,
            tokens_before,
            tokens_after,
            tokens_saved,
            "Compressed conversation"
        );

        Ok(CompressionOutcome::Compressed(event))
    }

    /// Every message still held, role and content only.
    pub fn reconstruct_full(session: &Session) -> Vec<HistoryEntry> {
        session.messages.iter().map(Message::to_entry).collect()
    }

    /// Summaries as synthetic user entries, then messages since the last compression.
    pub fn reconstruct_compressed(session: &Session) -> Vec<HistoryEntry> {
        session
            .summaries
            .iter()
            .map(|s| HistoryEntry::new(Role::User, format!("{}\n\n{}", SUMMARY_MARKER, s.content)))
            .chain(session.messages_since_compression().iter().map(Message::to_entry))
            .collect()
    }

    pub fn history_view(session: &Session, mode: HistoryMode) -> Vec<HistoryEntry> {
        match mode {
            HistoryMode::Full => Self::reconstruct_full(session),
            HistoryMode::Compressed => Self::reconstruct_compressed(session),
        }
    }
}

impl Default for CompressionEngine {
    fn default() -> Self {
        Self::from_config(&CompressionConfig::default())
    }
}

/// Render messages as `ROLE: content` blocks separated by blank lines.
pub fn render_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role.as_str().to_uppercase(), m.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Default system prompt for provider-backed summarization.
const SUMMARIZER_SYSTEM_PROMPT: &str = "You are a precise summarizer. Create summaries that \
capture the essential information from conversations so they can stand in for the original \
messages.";

/// Summarizer backed by a text-generation provider.
///
/// ```rust,ignore
/// use condense_session::ProviderSummarizer;
/// use condense_providers::AnthropicProvider;
/// use std::sync::Arc;
///
/// let provider = Arc::new(AnthropicProvider::from_env().unwrap());
/// let summarizer = ProviderSummarizer::new(provider, &config.compression);
/// ```
pub struct ProviderSummarizer<P: ?Sized> {
    provider: Arc<P>,
    model: String,
    max_tokens: u32,
    temperature: f32,
    system_prompt: String,
}

impl<P: Provider + ?Sized> ProviderSummarizer<P> {
    pub fn new(provider: Arc<P>, config: &CompressionConfig) -> Self {
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| provider.default_model().to_string());

        Self {
            provider,
            model,
            max_tokens: config.max_summary_tokens,
            temperature: config.temperature,
            system_prompt: SUMMARIZER_SYSTEM_PROMPT.to_string(),
        }
    }

    fn build_request(&self, transcript: &str, prompt: &str) -> CompletionRequest {
        let body = format!("{}\n\nConversation:\n\n{}", prompt, transcript);
        CompletionRequest::new(self.model.clone(), vec![HistoryEntry::new(Role::User, body)])
            .with_system(self.system_prompt.clone())
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature)
    }
}

#[async_trait::async_trait]
impl<P: Provider + ?Sized> Summarizer for ProviderSummarizer<P> {
    async fn summarize(&self, transcript: &str, prompt: &str) -> anyhow::Result<SummaryResponse> {
        let request = self.build_request(transcript, prompt);
        let response = self.provider.complete(request).await?;

        if response.content.trim().is_empty() {
            anyhow::bail!("{} returned an empty summary", self.provider.name());
        }

        Ok(SummaryResponse {
            summary_text: response.content,
            input_tokens: response.usage.input_tokens as u64,
            output_tokens: response.usage.output_tokens as u64,
        })
    }
}
