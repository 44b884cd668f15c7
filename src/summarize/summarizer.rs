use crate::error::{AppError, Result};
use crate::summarize::tokens::{estimate_tokens, estimate_word_tokens};
use crate::upstream::TextGenerator;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Default token threshold between single-pass and map-reduce.
pub const DEFAULT_TOKEN_BUDGET: usize = 14_000;

const INSTRUCTIONS: &str = "Summarize the following JSON data in clear, complete sentences.\n\
     Do not include any image URLs or references to images.\n\
     Ignore any fields containing URLs or media links.\n\
     Only describe textual and numeric data relevant to the company and vehicles/equipment.\n\
     Do not include any leading phrases like 'Here is a summary'. Keep the response clean and factual.\n\n";

/// Prompt for one summarization call. Every chunk gets the same instructions.
pub fn summary_prompt(query: &str, data: &str) -> String {
    format!("{INSTRUCTIONS}User Query: {query}\n\nJSON Data:\n{data}")
}

/// How oversized payloads are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SummaryMode {
    /// Token-bounded chunks summarized independently, concatenated in order.
    #[default]
    MapReduce,
    /// Lossy: keep the first `truncate_chars` characters, one call.
    Truncate,
}

impl SummaryMode {
    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "truncate" | "truncated" | "lossy" => Self::Truncate,
            _ => Self::MapReduce,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryOptions {
    pub mode: SummaryMode,
    pub token_budget: usize,
    /// Chunk summaries in flight at once.
    pub concurrency: usize,
    pub truncate_chars: usize,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            mode: SummaryMode::MapReduce,
            token_budget: DEFAULT_TOKEN_BUDGET,
            concurrency: 4,
            truncate_chars: 48_000,
        }
    }
}

/// State of one summarization call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryJob {
    pub text: String,
    pub token_budget: usize,
    pub chunks: Vec<String>,
    pub partial_summaries: Vec<String>,
}

impl SummaryJob {
    /// Plan the chunks for `text`. Text within budget stays a single chunk,
    /// untouched.
    pub fn new(text: String, token_budget: usize) -> Result<Self> {
        if token_budget == 0 {
            return Err(failure("token budget must be positive"));
        }
        let chunks = if estimate_tokens(&text) <= token_budget {
            vec![text.clone()]
        } else {
            split_into_chunks(&text, token_budget)
        };
        Ok(Self {
            text,
            token_budget,
            chunks,
            partial_summaries: Vec::new(),
        })
    }

    pub fn is_single_pass(&self) -> bool {
        self.chunks.len() <= 1
    }

    /// Partial summaries in chunk order. No second reduction pass.
    pub fn narrative(&self) -> String {
        self.partial_summaries.join("\n\n")
    }
}

/// Greedy word packing: add words until the next one would push the chunk
/// over `budget`, then start a new chunk. Boundaries fall on whitespace and
/// words inside a chunk are joined by single spaces.
///
/// A word whose own estimate exceeds `budget` becomes a chunk by itself; it is
/// never split.
pub fn split_into_chunks(text: &str, budget: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_tokens = 0;

    for word in text.split_whitespace() {
        let tokens = estimate_word_tokens(word);
        if !current.is_empty() && current_tokens + tokens > budget {
            chunks.push(current.join(" "));
            current.clear();
            current_tokens = 0;
        }
        if tokens > budget {
            tracing::warn!(tokens, budget, "Single word exceeds the summary token budget");
        }
        current.push(word);
        current_tokens += tokens;
    }
    if !current.is_empty() {
        chunks.push(current.join(" "));
    }
    chunks
}

/// Prefix of `text` holding at most `max_chars` characters, and whether
/// anything was cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => (&text[..cut], true),
        None => (text, false),
    }
}

fn failure(reason: impl ToString) -> AppError {
    AppError::SummarizationFailure {
        reason: reason.to_string(),
    }
}

/// Turns a JSON payload and the user's question into a narrative.
pub struct Summarizer {
    generator: Arc<dyn TextGenerator>,
    options: SummaryOptions,
}

impl Summarizer {
    pub fn new(generator: Arc<dyn TextGenerator>, options: SummaryOptions) -> Self {
        Self { generator, options }
    }

    pub fn options(&self) -> &SummaryOptions {
        &self.options
    }

    pub async fn summarize(&self, payload: &Value, query: &str) -> Result<String> {
        // Pretty output puts whitespace between JSON tokens for the chunker.
        let text = serde_json::to_string_pretty(payload).map_err(failure)?;
        match self.options.mode {
            SummaryMode::MapReduce => self.map_reduce(text, query).await,
            SummaryMode::Truncate => self.truncated(&text, query).await,
        }
    }

    /// Single pass when within budget, otherwise one call per chunk.
    pub async fn map_reduce(&self, text: String, query: &str) -> Result<String> {
        let mut job = SummaryJob::new(text, self.options.token_budget)?;
        metrics::counter!("summary_chunks_total").increment(job.chunks.len() as u64);

        if job.is_single_pass() {
            tracing::debug!(tokens = estimate_tokens(&job.text), "Single-pass summary");
            let data = job.chunks.first().map(String::as_str).unwrap_or_default();
            let summary = self.generate(summary_prompt(query, data)).await?;
            job.partial_summaries.push(summary);
        } else {
            tracing::info!(
                chunks = job.chunks.len(),
                budget = job.token_budget,
                "Payload over budget, summarizing in chunks"
            );
            job.partial_summaries = self.summarize_chunks(&job.chunks, query).await?;
        }
        Ok(job.narrative())
    }

    /// Lossy mode: one call over the first `truncate_chars` characters.
    pub async fn truncated(&self, text: &str, query: &str) -> Result<String> {
        if self.options.truncate_chars == 0 {
            return Err(failure("truncation budget must be positive"));
        }
        let (kept, cut) = truncate_chars(text, self.options.truncate_chars);
        if cut {
            tracing::warn!(
                kept_chars = self.options.truncate_chars,
                total_bytes = text.len(),
                "Payload truncated before summarization"
            );
        }
        metrics::counter!("summary_chunks_total").increment(1);
        self.generate(summary_prompt(query, kept)).await
    }

    /// Chunks are summarized concurrently, bounded by `concurrency`; results
    /// are placed back by index so the output follows chunk order.
    async fn summarize_chunks(&self, chunks: &[String], query: &str) -> Result<Vec<String>> {
        let permits = Arc::new(Semaphore::new(self.options.concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for (index, chunk) in chunks.iter().enumerate() {
            let generator = Arc::clone(&self.generator);
            let permits = Arc::clone(&permits);
            let prompt = summary_prompt(query, chunk);
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                (index, generator.generate(&prompt).await)
            });
        }

        let mut partials = vec![String::new(); chunks.len()];
        while let Some(joined) = tasks.join_next().await {
            let (index, reply) = joined.map_err(failure)?;
            partials[index] = reply.map_err(failure)?;
            tracing::debug!(chunk = index + 1, total = chunks.len(), "Chunk summarized");
        }
        Ok(partials)
    }

    async fn generate(&self, prompt: String) -> Result<String> {
        self.generator.generate(&prompt).await.map_err(failure)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_text() -> impl Strategy<Value = String> {
        let word = prop_oneof![
            r#"[a-z0-9"{}:,]{1,12}"#,
            "[ا-ي]{1,8}",
            "[é世界🚚]{1,4}",
        ];
        let gap = prop_oneof![Just(" "), Just("  "), Just("\n"), Just(" \t\n  ")];
        prop::collection::vec((word, gap), 0..60).prop_map(|parts| {
            parts
                .into_iter()
                .map(|(w, g)| format!("{w}{g}"))
                .collect::<String>()
        })
    }

    proptest! {
        #[test]
        fn chunks_rejoin_to_the_original_words(text in arb_text(), budget in 1usize..64) {
            let chunks = split_into_chunks(&text, budget);

            let words: Vec<&str> = text.split_whitespace().collect();
            prop_assert_eq!(chunks.join(" "), words.join(" "));
            for chunk in &chunks {
                prop_assert!(!chunk.is_empty());
                let single_word = chunk.split_whitespace().count() == 1;
                prop_assert!(single_word || estimate_tokens(chunk) <= budget);
            }
        }

        #[test]
        fn accepted_chunks_pass_the_threshold(text in arb_text(), budget in 8usize..64) {
            let job = SummaryJob::new(text, budget).unwrap();
            for chunk in job.chunks.iter().filter(|c| c.split_whitespace().count() > 1) {
                prop_assert!(estimate_tokens(chunk) <= budget);
            }
        }
    }
}
