//! Token estimation and full-vs-compressed comparison.
//!
//! Token counts here are estimates (`ceil(chars / 4)`), not tokenizer output.

use serde::{Deserialize, Serialize};

use condense_core::{HistoryEntry, Session};

use crate::compaction::CompressionEngine;

/// Average characters per token used for estimation.
pub const CHARS_PER_TOKEN: u64 = 4;

/// Estimate the token count of a piece of text.
pub fn estimate_tokens(text: &str) -> u64 {
    tokens_for_chars(text.chars().count() as u64)
}

fn tokens_for_chars(chars: u64) -> u64 {
    chars.div_ceil(CHARS_PER_TOKEN)
}

/// Size of one history view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewMetrics {
    pub messages: usize,
    pub characters: u64,
    pub estimated_tokens: u64,
}

impl ViewMetrics {
    /// Measure a reconstructed view.
    pub fn measure(entries: &[HistoryEntry]) -> Self {
        let characters: u64 = entries
            .iter()
            .map(|e| e.content.chars().count() as u64)
            .sum();

        Self {
            messages: entries.len(),
            characters,
            estimated_tokens: tokens_for_chars(characters),
        }
    }
}

/// Difference between the full and compressed views.
///
/// Reductions are signed: a compressed view can come out larger when the
/// summarizer produced a long summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Savings {
    pub message_reduction: i64,
    pub character_reduction: i64,
    pub token_reduction: i64,
    pub percentage_saved: f64,
}

/// Side-by-side report of a session's two history views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub session_id: String,
    pub full: ViewMetrics,
    pub compressed: ViewMetrics,
    pub savings: Savings,
    pub summaries: usize,
    pub compressions: u64,
}

impl ComparisonReport {
    /// Build a report from the two views of a session.
    pub fn from_session(session: &Session) -> Self {
        let full = ViewMetrics::measure(&CompressionEngine::reconstruct_full(session));
        let compressed = ViewMetrics::measure(&CompressionEngine::reconstruct_compressed(session));

        Self {
            session_id: session.id.clone(),
            full,
            compressed,
            savings: savings(&full, &compressed),
            summaries: session.summaries.len(),
            compressions: session.stats.total_compressions,
        }
    }
}

fn savings(full: &ViewMetrics, compressed: &ViewMetrics) -> Savings {
    let token_reduction = full.estimated_tokens as i64 - compressed.estimated_tokens as i64;

    let percentage_saved = if full.estimated_tokens == 0 {
        0.0
    } else {
        token_reduction as f64 / full.estimated_tokens as f64 * 100.0
    };

    Savings {
        message_reduction: full.messages as i64 - compressed.messages as i64,
        character_reduction: full.characters as i64 - compressed.characters as i64,
        token_reduction,
        percentage_saved,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use condense_core::{Message, Summary};

    use crate::compaction::SUMMARY_MARKER;

    #[test]
    fn test_estimate_tokens_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        // Counted in characters, not bytes
        assert_eq!(estimate_tokens("ééééé"), 2);
    }

    #[test]
    fn test_empty_session_reports_zero_percentage() {
        let session = Session::new();
        let report = ComparisonReport::from_session(&session);

        assert_eq!(report.full, ViewMetrics::default());
        assert_eq!(report.savings.percentage_saved, 0.0);
        assert_eq!(report.compressions, 0);
    }

    #[test]
    fn test_report_after_one_compression() {
        let mut session = Session::new();
        session.add_message(Message::user("u".repeat(500)));
        session.add_message(Message::assistant("a".repeat(500)));

        // Summary entry (marker + blank line + text) is exactly 300 characters.
        let text_len = 300 - SUMMARY_MARKER.chars().count() - 2;
        session.summaries.push(Summary {
            content: "s".repeat(text_len),
            original_message_count: 10,
            compressed_at: Utc::now(),
            tokens_in_original: 400,
            tokens_in_summary: 75,
        });
        session.compact_boundary = 2;
        session.stats.total_compressions = 1;

        let report = ComparisonReport::from_session(&session);

        assert_eq!(report.full.characters, 1000);
        assert_eq!(report.compressed.characters, 300);
        assert_eq!(report.savings.character_reduction, 700);
        assert_eq!(report.full.estimated_tokens, 250);
        assert_eq!(report.compressed.estimated_tokens, 75);
        assert_eq!(report.savings.token_reduction, 175);
        assert!((report.savings.percentage_saved - 70.0).abs() < 1e-9);
        assert_eq!(report.savings.message_reduction, 1);
    }

    #[test]
    fn test_report_serializes() {
        let report = ComparisonReport::from_session(&Session::with_id("s1"));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["session_id"], "s1");
        assert!(json["savings"]["percentage_saved"].is_number());
    }
}
