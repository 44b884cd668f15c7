use crate::catalog::CatalogCache;
use crate::config::Config;
use crate::dispatch::{DispatchRouter, Registry};
use crate::pipeline::Pipeline;
use crate::resolution::{IntentResolver, NameResolver};
use crate::summarize::Summarizer;
use crate::upstream::{FunctionSelector, GroqClient, HttpMarketplace, LlmFunctionSelector, MarketplaceApi, TextGenerator};
use anyhow::Context;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Application state shared across all request handlers.
pub struct AppState {
    pub config: Arc<Config>,
    /// Company catalogs, shared by every request until invalidated.
    pub catalogs: Arc<CatalogCache>,
    pub pipeline: Pipeline,
    /// Set once the server is bound and accepting requests.
    pub ready: AtomicBool,
}

impl AppState {
    /// Wire the HTTP marketplace client and the Groq-backed selector and
    /// summarizer from configuration.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let api = HttpMarketplace::new(
            &config.backend_base_url,
            config.guest_token.clone(),
            config.user_token.clone(),
        )
        .context("Failed to build marketplace client")?;

        let selector_llm = GroqClient::new(
            config.groq_api_url.clone(),
            config.groq_api_key.clone(),
            config.selector_model.clone(),
        );
        let summary_llm = GroqClient::new(
            config.groq_api_url.clone(),
            config.groq_api_key.clone(),
            config.summary_model.clone(),
        )
        .with_temperature(0.2);

        let corpus = load_corpus(config.function_corpus_path.as_deref())?;
        tracing::info!(
            corpus_bytes = corpus.len(),
            selector_model = %config.selector_model,
            summary_model = %config.summary_model,
            "Upstream clients configured"
        );

        Ok(Self::with_services(
            config,
            Arc::new(api),
            Arc::new(LlmFunctionSelector::new(Arc::new(selector_llm))),
            Arc::new(summary_llm),
            corpus,
        ))
    }

    /// Build state around explicit collaborators.
    pub fn with_services(
        config: Config,
        api: Arc<dyn MarketplaceApi>,
        selector: Arc<dyn FunctionSelector>,
        generator: Arc<dyn TextGenerator>,
        corpus: String,
    ) -> Self {
        let catalogs = Arc::new(
            CatalogCache::new(Arc::clone(&api), config.catalog_page_size)
                .with_failure_retry(Duration::from_secs(config.catalog_retry_secs)),
        );
        let router = DispatchRouter::new(
            api,
            Arc::clone(&catalogs),
            NameResolver::new(config.match_policy),
        )
        .with_compaction(config.compact_payloads);
        let pipeline = Pipeline::new(
            IntentResolver::new(selector, corpus),
            router,
            Summarizer::new(generator, config.summary),
        );

        Self {
            config: Arc::new(config),
            catalogs,
            pipeline,
            ready: AtomicBool::new(false),
        }
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    /// Check if the service is ready to handle requests.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

/// Selector corpus from `path`, or the registry's own description.
pub fn load_corpus(path: Option<&Path>) -> anyhow::Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read function corpus {}", path.display())),
        None => Ok(Registry::default().describe()),
    }
}
