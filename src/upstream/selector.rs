use crate::error::UpstreamResult;
use crate::upstream::TextGenerator;
use async_trait::async_trait;
use std::sync::Arc;

/// Semantic-retrieval service: picks the backend function that best answers
/// `query` from a descriptor `corpus`.
///
/// The reply is expected to be a JSON object
/// `{"function_name": ..., "parameters": {...}, "code": ...}` but nothing
/// guarantees it; callers validate it.
#[async_trait]
pub trait FunctionSelector: Send + Sync {
    async fn select_function(&self, query: &str, corpus: &str) -> UpstreamResult<String>;
}

/// Selector that prompts a text generator with the whole corpus.
pub struct LlmFunctionSelector {
    generator: Arc<dyn TextGenerator>,
}

impl LlmFunctionSelector {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

pub(crate) fn selection_prompt(query: &str, corpus: &str) -> String {
    format!(
        "Retrieve the most relevant function name from the provided context based on the user's query.\n\
         Respond only with a valid JSON object. Do not include any explanation or extra text.\n\
         The format must be:\n\
         {{\n  \"function_name\": \"<function_name>\",\n  \"parameters\": {{\"param1\": \"<value>\"}},\n  \"code\": \"<function_code>\"\n}}\n\n\
         Context:\n{corpus}\n\n\
         Query: {query}\n"
    )
}

#[async_trait]
impl FunctionSelector for LlmFunctionSelector {
    async fn select_function(&self, query: &str, corpus: &str) -> UpstreamResult<String> {
        tracing::debug!(query, corpus_len = corpus.len(), "Selecting function");
        self.generator.generate(&selection_prompt(query, corpus)).await
    }
}
