//! Utterance in, narrative out.
//!
//! `text → {fast-path parse | intent resolver} → router → summarizer`

use crate::dispatch::DispatchRouter;
use crate::error::{AppError, Result};
use crate::resolution::{Intent, IntentResolver, ParseStrategy, QueryParser};
use crate::summarize::Summarizer;
use serde::Serialize;
use serde_json::Value;

/// Successful answer to a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryAnswer {
    pub function_called: String,
    pub generated_response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
}

pub struct Pipeline {
    parser: QueryParser,
    intents: IntentResolver,
    router: DispatchRouter,
    summarizer: Summarizer,
}

impl Pipeline {
    pub fn new(intents: IntentResolver, router: DispatchRouter, summarizer: Summarizer) -> Self {
        Self {
            parser: QueryParser::new(ParseStrategy::KeywordAnchor),
            intents,
            router,
            summarizer,
        }
    }

    pub fn router(&self) -> &DispatchRouter {
        &self.router
    }

    pub async fn answer(&self, text: &str) -> Result<QueryAnswer> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::ValidationError("Query cannot be empty".to_string()));
        }

        let intent = self.intent_for(text).await?;
        let dispatched = self.router.dispatch(&intent, text).await?;
        if dispatched.payload == Value::Null {
            return Err(AppError::NoData(dispatched.function_called));
        }

        let generated_response = self.summarizer.summarize(&dispatched.payload, text).await?;
        tracing::info!(
            function = %dispatched.function_called,
            entity_id = ?dispatched.entity_id,
            response_len = generated_response.len(),
            "Query answered"
        );

        Ok(QueryAnswer {
            function_called: dispatched.function_called,
            generated_response,
            entity_id: dispatched.entity_id,
        })
    }

    /// The keyword parser answers "vehicle/equipment details of X of Y"
    /// without a model call, but only when it found both names. Anything
    /// else, including a lone word after the anchor, goes to the resolver.
    pub async fn intent_for(&self, text: &str) -> Result<Intent> {
        match self.parser.parse(text) {
            Some(parsed) if parsed.is_complete() => {
                tracing::debug!(
                    entity_type = parsed.entity_type.as_str(),
                    entity = ?parsed.entity_name,
                    company = ?parsed.company_name,
                    "Fast-path parse"
                );
                Ok(Intent::from_detail_query(&parsed))
            }
            Some(parsed) => {
                tracing::debug!(entity = ?parsed.entity_name, "Fast-path parse incomplete");
                self.intents.resolve(text).await
            }
            None => self.intents.resolve(text).await,
        }
    }
}
