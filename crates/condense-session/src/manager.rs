//! Conversation manager.
//!
//! Ties the session store, the compression engine and the collaborators
//! together. Every operation on a session runs under that session's lock, so
//! the threshold check, compression and history reconstruction of one turn
//! cannot interleave with another request for the same session.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use condense_core::{
    CompressionEvent, Config, Error, HistoryEntry, Message, Result, SessionId, SessionStats,
    SessionSummary,
};
use condense_providers::{CompletionRequest, Provider};

use crate::compaction::{CompressionEngine, CompressionOutcome, HistoryMode, Summarizer};
use crate::context::ComparisonReport;
use crate::store::SessionStore;

/// Shortest interval the background sweeper runs at.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Generates the assistant reply for a reconstructed history.
#[async_trait::async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate(&self, history: &[HistoryEntry]) -> anyhow::Result<String>;
}

/// Reply generator backed by a text-generation provider.
pub struct ProviderReplyGenerator<P: ?Sized> {
    provider: Arc<P>,
    model: String,
    max_tokens: u32,
    temperature: f32,
    system_prompt: Option<String>,
}

impl<P: Provider + ?Sized> ProviderReplyGenerator<P> {
    pub fn new(provider: Arc<P>, config: &Config) -> Self {
        let model = config
            .general
            .model
            .clone()
            .unwrap_or_else(|| provider.default_model().to_string());

        Self {
            provider,
            model,
            max_tokens: config.general.max_tokens,
            temperature: config.general.temperature,
            system_prompt: config.general.system_prompt.clone(),
        }
    }
}

#[async_trait::async_trait]
impl<P: Provider + ?Sized> ReplyGenerator for ProviderReplyGenerator<P> {
    async fn generate(&self, history: &[HistoryEntry]) -> anyhow::Result<String> {
        let mut request = CompletionRequest::new(self.model.clone(), history.to_vec())
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature);
        if let Some(ref system) = self.system_prompt {
            request = request.with_system(system.clone());
        }

        let response = self.provider.complete(request).await?;
        Ok(response.content)
    }
}

/// What happened during one chat turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnOutcome {
    /// Assistant reply appended to the session
    pub reply: String,
    /// History representation the reply was generated from
    pub mode: HistoryMode,
    /// Compression committed during this turn, if any
    pub compression: Option<CompressionEvent>,
    /// Why compression was due but did not happen
    pub compression_error: Option<String>,
    /// Stats after the turn
    pub stats: SessionStats,
}

/// Entry point for everything a request handler does with sessions.
pub struct ConversationManager {
    store: Arc<SessionStore>,
    engine: CompressionEngine,
    summarizer: Arc<dyn Summarizer>,
    generator: Option<Arc<dyn ReplyGenerator>>,
}

impl ConversationManager {
    pub fn new(engine: CompressionEngine, summarizer: Arc<dyn Summarizer>) -> Self {
        Self::with_store(Arc::new(SessionStore::new()), engine, summarizer)
    }

    pub fn with_store(
        store: Arc<SessionStore>,
        engine: CompressionEngine,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        Self {
            store,
            engine,
            summarizer,
            generator: None,
        }
    }

    /// Build a manager from configuration.
    pub fn from_config(
        config: &Config,
        summarizer: Arc<dyn Summarizer>,
        generator: Arc<dyn ReplyGenerator>,
    ) -> Self {
        Self::with_store(
            Arc::new(SessionStore::with_compression_default(config.compression.enabled)),
            CompressionEngine::from_config(&config.compression),
            summarizer,
        )
        .with_generator(generator)
    }

    pub fn with_generator(mut self, generator: Arc<dyn ReplyGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn engine(&self) -> &CompressionEngine {
        &self.engine
    }

    pub fn create_session(&self) -> SessionId {
        self.store.create()
    }

    pub async fn append_user_message(&self, id: &str, text: impl Into<String>) -> Result<()> {
        let handle = self.store.get(id)?;
        handle.lock().await.add_message(Message::user(text));
        Ok(())
    }

    pub async fn append_assistant_message(&self, id: &str, text: impl Into<String>) -> Result<()> {
        let handle = self.store.get(id)?;
        handle.lock().await.add_message(Message::assistant(text));
        Ok(())
    }

    pub async fn should_compress(&self, id: &str) -> Result<bool> {
        let handle = self.store.get(id)?;
        let session = handle.lock().await;
        Ok(self.engine.should_compress(&session))
    }

    /// Compress the session now, regardless of the threshold.
    pub async fn compress(&self, id: &str) -> Result<CompressionOutcome> {
        let handle = self.store.get(id)?;
        let mut session = handle.lock().await;
        self.engine.compress(&mut session, self.summarizer.as_ref()).await
    }

    pub async fn history_view(&self, id: &str, mode: HistoryMode) -> Result<Vec<HistoryEntry>> {
        let handle = self.store.get(id)?;
        let session = handle.lock().await;
        Ok(CompressionEngine::history_view(&session, mode))
    }

    pub async fn stats(&self, id: &str) -> Result<SessionStats> {
        let handle = self.store.get(id)?;
        let stats = handle.lock().await.stats.clone();
        Ok(stats)
    }

    pub async fn compare_views(&self, id: &str) -> Result<ComparisonReport> {
        let handle = self.store.get(id)?;
        let session = handle.lock().await;
        Ok(ComparisonReport::from_session(&session))
    }

    pub async fn set_compression_enabled(&self, id: &str, enabled: bool) -> Result<()> {
        let handle = self.store.get(id)?;
        handle.lock().await.compression_enabled = enabled;
        Ok(())
    }

    pub fn delete_session(&self, id: &str) -> bool {
        self.store.delete(id)
    }

    pub async fn list_sessions(&self) -> Vec<SessionSummary> {
        self.store.list().await
    }

    /// Evict sessions idle for longer than `ttl`.
    pub fn sweep_idle(&self, ttl: Duration) -> usize {
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => self.store.sweep(Utc::now(), ttl),
            Err(_) => 0,
        }
    }

    /// Run [`sweep_idle`](Self::sweep_idle) every `interval` on the runtime.
    ///
    /// Intervals shorter than one second are raised to one second.
    pub fn spawn_sweeper(&self, interval: Duration, ttl: Duration) -> JoinHandle<()> {
        let interval = interval.max(MIN_SWEEP_INTERVAL);
        let store = Arc::clone(&self.store);
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = store.sweep(Utc::now(), ttl);
                debug!(removed, remaining = store.len(), "Idle sweep finished");
            }
        })
    }

    /// Handle one user turn end to end.
    ///
    /// Compression (when enabled and due) runs before the new message is
    /// appended so the message lands after the compression boundary and is
    /// part of the compressed view. A failed compression does not fail the
    /// turn: it is reported in the outcome and the reply is generated from
    /// the uncompressed history.
    #[instrument(skip(self, id, text), fields(session = %id))]
    pub async fn chat_turn(&self, id: &str, text: &str) -> Result<TurnOutcome> {
        let generator = self
            .generator
            .as_ref()
            .ok_or_else(|| Error::Generation("no reply generator configured".to_string()))?;

        let handle = self.store.get(id)?;
        let mut session = handle.lock().await;

        let mut compression = None;
        let mut compression_error = None;
        if session.compression_enabled && self.engine.should_compress(&session) {
            match self.engine.compress(&mut session, self.summarizer.as_ref()).await {
                Ok(outcome) => compression = outcome.event().cloned(),
                Err(e) => {
                    warn!("Continuing turn without compression: {}", e);
                    compression_error = Some(e.to_string());
                }
            }
        }

        session.add_message(Message::user(text));

        let mode = if session.compression_enabled && compression_error.is_none() {
            HistoryMode::Compressed
        } else {
            HistoryMode::Full
        };
        let history = CompressionEngine::history_view(&session, mode);
        debug!(?mode, entries = history.len(), "Generating reply");

        let reply = generator
            .generate(&history)
            .await
            .map_err(|e| Error::Generation(format!("{:#}", e)))?;

        session.add_message(Message::assistant(reply.clone()));

        Ok(TurnOutcome {
            reply,
            mode,
            compression,
            compression_error,
            stats: session.stats.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use condense_providers::{CompletionResponse, FinishReason, Usage};

    use crate::compaction::ProviderSummarizer;

    /// OpenAI-style provider that records the model of every request.
    struct RecordingProvider {
        models: parking_lot::Mutex<Vec<String>>,
    }

    impl RecordingProvider {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                models: parking_lot::Mutex::new(vec![]),
            })
        }
    }

    #[async_trait::async_trait]
    impl Provider for RecordingProvider {
        fn id(&self) -> &str {
            "openai"
        }

        fn name(&self) -> &str {
            "OpenAI"
        }

        fn default_model(&self) -> &str {
            "gpt-4o-mini"
        }

        fn is_configured(&self) -> bool {
            true
        }

        async fn complete(&self, request: CompletionRequest) -> anyhow::Result<CompletionResponse> {
            self.models.lock().push(request.model);
            Ok(CompletionResponse {
                content: "ok".to_string(),
                finish_reason: FinishReason::Stop,
                usage: Usage {
                    input_tokens: 50,
                    output_tokens: 5,
                },
            })
        }
    }

    fn openai_config() -> Config {
        let mut config = Config::default();
        config.general.provider = "openai".to_string();
        config.compression.threshold = 4;
        config
    }

    fn wire(provider: &Arc<RecordingProvider>, config: &Config) -> ConversationManager {
        ConversationManager::from_config(
            config,
            Arc::new(ProviderSummarizer::new(Arc::clone(provider), &config.compression)),
            Arc::new(ProviderReplyGenerator::new(Arc::clone(provider), config)),
        )
    }

    #[tokio::test]
    async fn test_default_config_uses_provider_models() {
        let provider = RecordingProvider::new();
        let manager = wire(&provider, &openai_config());
        let id = manager.create_session();

        // The third turn starts at the threshold and compresses first.
        for _ in 0..3 {
            manager.chat_turn(&id, "hello").await.unwrap();
        }

        assert_eq!(manager.stats(&id).await.unwrap().total_compressions, 1);
        let models = provider.models.lock().clone();
        assert_eq!(models.len(), 4);
        assert!(models.iter().all(|m| m == "gpt-4o-mini"), "{:?}", models);
    }

    #[tokio::test]
    async fn test_configured_models_override_provider_default() {
        let provider = RecordingProvider::new();
        let mut config = openai_config();
        config.general.model = Some("gpt-4o".to_string());
        config.compression.model = Some("gpt-4.1-nano".to_string());
        let manager = wire(&provider, &config);
        let id = manager.create_session();

        for _ in 0..3 {
            manager.chat_turn(&id, "hello").await.unwrap();
        }

        assert_eq!(
            *provider.models.lock(),
            vec!["gpt-4o", "gpt-4o", "gpt-4.1-nano", "gpt-4o"]
        );
    }
}
