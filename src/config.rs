use crate::catalog::MIN_CATALOG_PAGE_SIZE;
use crate::resolution::MatchPolicy;
use crate::summarize::{SummaryMode, SummaryOptions};
use crate::upstream::groq::GROQ_API_URL;
use std::env;
use std::path::PathBuf;

impl SummaryMode {
    /// `SUMMARY_MODE`: `map-reduce` (default) or `truncate`.
    pub fn from_env() -> Self {
        Self::parse(&env::var("SUMMARY_MODE").unwrap_or_default())
    }
}

impl MatchPolicy {
    /// `MATCH_POLICY`: `first-match` (default) or `prefer-exact`.
    pub fn from_env() -> Self {
        Self::parse(&env::var("MATCH_POLICY").unwrap_or_default())
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
    /// Marketplace API root, e.g. `https://dev.api.example.com`.
    pub backend_base_url: String,
    pub guest_token: String,
    pub user_token: String,
    pub groq_api_key: String,
    pub groq_api_url: String,
    /// Model used to pick a backend function.
    pub selector_model: String,
    /// Model used to narrate payloads.
    pub summary_model: String,
    /// Optional function corpus for the selector. Without it the registry
    /// renders one.
    pub function_corpus_path: Option<PathBuf>,
    /// Page size used to fetch "every" company of a kind. Never below 100.
    pub catalog_page_size: u32,
    /// Seconds a failed catalog fetch is served from cache before a retry.
    pub catalog_retry_secs: u64,
    pub summary: SummaryOptions,
    pub match_policy: MatchPolicy,
    /// Reduce payloads to narrative fields before summarizing.
    pub compact_payloads: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout_secs: 30,
            backend_base_url: "http://localhost:3000".to_string(),
            guest_token: String::new(),
            user_token: String::new(),
            groq_api_key: String::new(),
            groq_api_url: GROQ_API_URL.to_string(),
            selector_model: "llama-3.3-70b-versatile".to_string(),
            summary_model: "meta-llama/llama-4-scout-17b-16e-instruct".to_string(),
            function_corpus_path: None,
            catalog_page_size: MIN_CATALOG_PAGE_SIZE,
            catalog_retry_secs: 30,
            summary: SummaryOptions::default(),
            match_policy: MatchPolicy::FirstMatch,
            compact_payloads: true,
        }
    }
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// `SUMMARY_MODE` and `MATCH_POLICY` select presets; every other knob has
    /// its own variable.
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let catalog_page_size: u32 = env::var("CATALOG_PAGE_SIZE")
            .unwrap_or_else(|_| defaults.catalog_page_size.to_string())
            .parse()?;
        if catalog_page_size < MIN_CATALOG_PAGE_SIZE {
            tracing::warn!(
                requested = catalog_page_size,
                used = MIN_CATALOG_PAGE_SIZE,
                "CATALOG_PAGE_SIZE below minimum, clamping"
            );
        }

        let summary = SummaryOptions {
            mode: SummaryMode::from_env(),
            token_budget: env::var("SUMMARY_TOKEN_BUDGET")
                .unwrap_or_else(|_| defaults.summary.token_budget.to_string())
                .parse()?,
            concurrency: env::var("SUMMARY_CONCURRENCY")
                .unwrap_or_else(|_| defaults.summary.concurrency.to_string())
                .parse()?,
            truncate_chars: env::var("TRUNCATE_CHARS")
                .unwrap_or_else(|_| defaults.summary.truncate_chars.to_string())
                .parse()?,
        };
        if summary.token_budget == 0 {
            anyhow::bail!("SUMMARY_TOKEN_BUDGET must be positive");
        }

        Ok(Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()?,
            shutdown_timeout_secs: env::var("SHUTDOWN_TIMEOUT")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
            backend_base_url: env::var("BACKEND_BASE_URL").unwrap_or(defaults.backend_base_url),
            guest_token: env::var("GUEST_TOKEN").unwrap_or_default(),
            user_token: env::var("USER_TOKEN").unwrap_or_default(),
            groq_api_key: env::var("GROQ_API_KEY").unwrap_or_default(),
            groq_api_url: env::var("GROQ_API_URL").unwrap_or(defaults.groq_api_url),
            selector_model: env::var("SELECTOR_MODEL").unwrap_or(defaults.selector_model),
            summary_model: env::var("SUMMARY_MODEL").unwrap_or(defaults.summary_model),
            function_corpus_path: env::var("FUNCTION_CORPUS_PATH").ok().map(PathBuf::from),
            catalog_page_size: catalog_page_size.max(MIN_CATALOG_PAGE_SIZE),
            catalog_retry_secs: env::var("CATALOG_RETRY_SECS")
                .unwrap_or_else(|_| defaults.catalog_retry_secs.to_string())
                .parse()?,
            summary,
            match_policy: MatchPolicy::from_env(),
            compact_payloads: env::var("COMPACT_PAYLOADS")
                .map(|v| !matches!(v.to_lowercase().as_str(), "0" | "false" | "no" | "off"))
                .unwrap_or(defaults.compact_payloads),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.catalog_page_size, 100);
        assert_eq!(config.catalog_retry_secs, 30);
        assert_eq!(config.summary.token_budget, 14_000);
        assert_eq!(config.summary.concurrency, 4);
        assert_eq!(config.summary.truncate_chars, 48_000);
        assert_eq!(config.summary.mode, SummaryMode::MapReduce);
        assert_eq!(config.match_policy, MatchPolicy::FirstMatch);
        assert!(config.compact_payloads);
        assert!(config.function_corpus_path.is_none());
    }
}
