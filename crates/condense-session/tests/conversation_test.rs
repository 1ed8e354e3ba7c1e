//! End-to-end behavior of the conversation manager.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use condense_core::{Error, HistoryEntry, Role};
use condense_session::{
    CompressionEngine, CompressionOutcome, ConversationManager, HistoryMode, ReplyGenerator,
    Summarizer, SummaryResponse, SUMMARY_MARKER,
};

/// Summarizer that can be switched into a failing state.
struct ScriptedSummarizer {
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl ScriptedSummarizer {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait::async_trait]
impl Summarizer for ScriptedSummarizer {
    async fn summarize(&self, transcript: &str, _prompt: &str) -> anyhow::Result<SummaryResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("connection refused");
        }
        Ok(SummaryResponse {
            summary_text: format!("Summary ({} lines)", transcript.lines().count()),
            input_tokens: 300,
            output_tokens: 40,
        })
    }
}

/// Replies with the number of entries it was given.
struct CountingGenerator {
    last_history: parking_lot::Mutex<Vec<HistoryEntry>>,
}

impl CountingGenerator {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            last_history: parking_lot::Mutex::new(vec![]),
        })
    }
}

#[async_trait::async_trait]
impl ReplyGenerator for CountingGenerator {
    async fn generate(&self, history: &[HistoryEntry]) -> anyhow::Result<String> {
        tokio::task::yield_now().await;
        *self.last_history.lock() = history.to_vec();
        Ok(format!("reply to {} entries", history.len()))
    }
}

fn manager(summarizer: Arc<ScriptedSummarizer>) -> ConversationManager {
    ConversationManager::new(CompressionEngine::new(10), summarizer)
}

async fn append_pairs(manager: &ConversationManager, id: &str, pairs: usize) {
    for i in 0..pairs {
        manager
            .append_user_message(id, format!("user message {}", i))
            .await
            .unwrap();
        manager
            .append_assistant_message(id, format!("assistant message {}", i))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_five_pairs_then_compress() {
    let manager = manager(ScriptedSummarizer::new());
    let id = manager.create_session();

    append_pairs(&manager, &id, 5).await;
    assert!(manager.should_compress(&id).await.unwrap());

    let outcome = manager.compress(&id).await.unwrap();
    assert!(outcome.is_compressed());

    let full = manager.history_view(&id, HistoryMode::Full).await.unwrap();
    assert_eq!(full.len(), 2);

    let handle = manager.store().get(&id).unwrap();
    let session = handle.lock().await;
    assert_eq!(session.messages.len(), 2);
    assert_eq!(session.summaries.len(), 1);
    assert_eq!(session.compression_events.len(), 1);
    assert_eq!(session.stats.total_compressions, 1);
    assert_eq!(session.stats.total_messages, 10);
}

#[tokio::test]
async fn test_failed_compression_leaves_history_identical() {
    let summarizer = ScriptedSummarizer::new();
    summarizer.fail.store(true, Ordering::SeqCst);
    let manager = manager(summarizer.clone());
    let id = manager.create_session();
    append_pairs(&manager, &id, 6).await;

    let before = manager.history_view(&id, HistoryMode::Full).await.unwrap();
    let stats_before = manager.stats(&id).await.unwrap();

    let err = manager.compress(&id).await.unwrap_err();
    assert!(matches!(err, Error::SummarizationFailed(_)));

    let after = manager.history_view(&id, HistoryMode::Full).await.unwrap();
    assert_eq!(before, after);
    assert_eq!(manager.stats(&id).await.unwrap(), stats_before);
    assert!(manager.should_compress(&id).await.unwrap());
}

#[tokio::test]
async fn test_full_view_is_idempotent() {
    let manager = manager(ScriptedSummarizer::new());
    let id = manager.create_session();
    append_pairs(&manager, &id, 3).await;

    let first = manager.history_view(&id, HistoryMode::Full).await.unwrap();
    let second = manager.history_view(&id, HistoryMode::Full).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_total_messages_survives_compression() {
    let manager = manager(ScriptedSummarizer::new());
    let id = manager.create_session();

    append_pairs(&manager, &id, 5).await;
    manager.compress(&id).await.unwrap();
    append_pairs(&manager, &id, 2).await;

    let stats = manager.stats(&id).await.unwrap();
    assert_eq!(stats.total_messages, 14);
    assert_eq!(stats.tokens_saved, 260);

    let compressed = manager.history_view(&id, HistoryMode::Compressed).await.unwrap();
    let full = manager.history_view(&id, HistoryMode::Full).await.unwrap();
    assert!(compressed.len() <= full.len());
    assert!(compressed[0].content.starts_with(SUMMARY_MARKER));
}

#[tokio::test]
async fn test_compressed_view_smaller_in_tokens_across_compressions() {
    let manager = manager(ScriptedSummarizer::new()).with_generator(CountingGenerator::new());
    let id = manager.create_session();

    for i in 0..17 {
        let text = format!("turn {}: {}", i, "details ".repeat(50));
        manager.chat_turn(&id, &text).await.unwrap();
    }

    let report = manager.compare_views(&id).await.unwrap();
    assert_eq!(report.compressions, 3);

    // One entry per summary: the entry count outgrows the full view once
    // summaries accumulate, while the content stays smaller.
    assert_eq!(report.full.messages, 10);
    assert_eq!(report.compressed.messages, 11);
    assert!(report.compressed.characters < report.full.characters);
    assert!(report.compressed.estimated_tokens < report.full.estimated_tokens);
    assert!(report.savings.percentage_saved > 0.0);
}

#[tokio::test]
async fn test_compress_empty_session() {
    let summarizer = ScriptedSummarizer::new();
    let manager = manager(summarizer.clone());
    let id = manager.create_session();

    let outcome = manager.compress(&id).await.unwrap();
    assert_eq!(outcome, CompressionOutcome::EmptyHistory);
    assert_eq!(summarizer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unknown_session_operations() {
    let manager = manager(ScriptedSummarizer::new());

    assert!(matches!(
        manager.append_user_message("missing", "hi").await,
        Err(Error::SessionNotFound(_))
    ));
    assert!(matches!(
        manager.compare_views("missing").await,
        Err(Error::SessionNotFound(_))
    ));
    assert!(!manager.delete_session("missing"));
}

#[tokio::test]
async fn test_compare_views_after_compression() {
    let manager = manager(ScriptedSummarizer::new());
    let id = manager.create_session();
    append_pairs(&manager, &id, 5).await;
    manager.compress(&id).await.unwrap();

    let report = manager.compare_views(&id).await.unwrap();
    assert_eq!(report.full.messages, 2);
    assert_eq!(report.compressed.messages, 1);
    assert_eq!(report.compressions, 1);
    assert_eq!(
        report.savings.character_reduction,
        report.full.characters as i64 - report.compressed.characters as i64
    );
}

#[tokio::test]
async fn test_chat_turn_compresses_when_due() {
    let generator = CountingGenerator::new();
    let manager = manager(ScriptedSummarizer::new()).with_generator(generator.clone());
    let id = manager.create_session();

    for _ in 0..5 {
        let turn = manager.chat_turn(&id, "question").await.unwrap();
        assert!(turn.compression.is_none());
    }

    let turn = manager.chat_turn(&id, "sixth question").await.unwrap();
    let event = turn.compression.expect("sixth turn compresses");
    assert_eq!(event.message_index_at_compression, 10);
    assert_eq!(turn.mode, HistoryMode::Compressed);
    assert_eq!(turn.stats.total_messages, 12);

    // Summary plus the new user message.
    let sent = generator.last_history.lock().clone();
    assert_eq!(sent.len(), 2);
    assert!(sent[0].content.starts_with(SUMMARY_MARKER));
    assert_eq!(sent[1], HistoryEntry::new(Role::User, "sixth question"));
}

#[tokio::test]
async fn test_chat_turn_survives_summarizer_failure() {
    let summarizer = ScriptedSummarizer::new();
    let generator = CountingGenerator::new();
    let manager = manager(summarizer.clone()).with_generator(generator.clone());
    let id = manager.create_session();
    append_pairs(&manager, &id, 5).await;

    summarizer.fail.store(true, Ordering::SeqCst);
    let turn = manager.chat_turn(&id, "still there?").await.unwrap();

    assert!(turn.compression.is_none());
    assert!(turn.compression_error.unwrap().contains("connection refused"));
    assert_eq!(turn.mode, HistoryMode::Full);
    assert_eq!(generator.last_history.lock().len(), 11);
    assert_eq!(turn.stats.total_messages, 12);
}

#[tokio::test]
async fn test_chat_turn_with_compression_disabled() {
    let summarizer = ScriptedSummarizer::new();
    let manager = manager(summarizer.clone()).with_generator(CountingGenerator::new());
    let id = manager.create_session();
    manager.set_compression_enabled(&id, false).await.unwrap();

    for _ in 0..8 {
        manager.chat_turn(&id, "hello").await.unwrap();
    }

    assert_eq!(summarizer.calls.load(Ordering::SeqCst), 0);
    let listed = manager.list_sessions().await;
    assert_eq!(listed[0].message_count, 16);
    assert!(!listed[0].compression_enabled);
}

#[tokio::test]
async fn test_chat_turn_without_generator_fails() {
    let manager = manager(ScriptedSummarizer::new());
    let id = manager.create_session();
    assert!(matches!(
        manager.chat_turn(&id, "hi").await,
        Err(Error::Generation(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_turns_on_one_session_are_serialized() {
    let manager = Arc::new(manager(ScriptedSummarizer::new()).with_generator(CountingGenerator::new()));
    let id = manager.create_session();

    let tasks: Vec<_> = (0..20)
        .map(|i| {
            let manager = Arc::clone(&manager);
            let id = id.clone();
            tokio::spawn(async move { manager.chat_turn(&id, &format!("turn {}", i)).await })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let handle = manager.store().get(&id).unwrap();
    let session = handle.lock().await;
    assert_eq!(session.stats.total_messages, 40);
    assert_eq!(session.stats.total_compressions, 4);
    assert_eq!(session.summaries.len(), 4);
    assert_eq!(session.compression_events.len(), 4);
    assert_eq!(session.messages.len(), 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sessions_progress_independently() {
    let manager = Arc::new(manager(ScriptedSummarizer::new()).with_generator(CountingGenerator::new()));
    let ids: Vec<String> = (0..4).map(|_| manager.create_session()).collect();

    let tasks: Vec<_> = ids
        .iter()
        .cloned()
        .map(|id| {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move {
                for _ in 0..3 {
                    manager.chat_turn(&id, "hi").await.unwrap();
                }
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap();
    }

    for id in &ids {
        assert_eq!(manager.stats(id).await.unwrap().total_messages, 6);
    }
}

#[tokio::test]
async fn test_sweep_idle_sessions() {
    let manager = manager(ScriptedSummarizer::new());
    let stale = manager.create_session();
    let recent = manager.create_session();

    {
        let handle = manager.store().get(&stale).unwrap();
        handle.lock().await.last_activity_at = chrono::Utc::now() - chrono::Duration::hours(2);
        let handle = manager.store().get(&recent).unwrap();
        handle.lock().await.last_activity_at = chrono::Utc::now() - chrono::Duration::minutes(10);
    }

    let removed = manager.sweep_idle(Duration::from_secs(60 * 60));
    assert_eq!(removed, 1);

    let listed = manager.list_sessions().await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, recent);
}

#[tokio::test(start_paused = true)]
async fn test_background_sweeper_evicts() {
    let manager = manager(ScriptedSummarizer::new());
    let id = manager.create_session();
    {
        let handle = manager.store().get(&id).unwrap();
        handle.lock().await.last_activity_at = chrono::Utc::now() - chrono::Duration::hours(3);
    }

    let sweeper = manager.spawn_sweeper(Duration::from_secs(60), Duration::from_secs(60 * 60));
    tokio::time::sleep(Duration::from_secs(61)).await;

    assert!(manager.store().is_empty());
    sweeper.abort();
}

#[tokio::test(start_paused = true)]
async fn test_sweeper_with_zero_interval_still_runs() {
    let manager = manager(ScriptedSummarizer::new());
    let id = manager.create_session();
    {
        let handle = manager.store().get(&id).unwrap();
        handle.lock().await.last_activity_at = chrono::Utc::now() - chrono::Duration::hours(3);
    }

    let sweeper = manager.spawn_sweeper(Duration::ZERO, Duration::from_secs(60 * 60));
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert!(!sweeper.is_finished());
    assert!(manager.store().is_empty());
    sweeper.abort();
}
