//! Chunked summarization of JSON payloads.

pub mod summarizer;
pub mod tokens;

pub use summarizer::{
    split_into_chunks, summary_prompt, truncate_chars, Summarizer, SummaryJob, SummaryMode,
    SummaryOptions, DEFAULT_TOKEN_BUDGET,
};
pub use tokens::{estimate_tokens, estimate_word_tokens};
