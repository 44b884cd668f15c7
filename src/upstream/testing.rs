//! In-process fakes for the external collaborators.
//!
//! Used by unit and integration tests to drive the full pipeline without a
//! network: canned backend envelopes, scripted model replies, and call
//! counters for verifying cache behaviour.

use crate::catalog::{AssetKind, Catalog, CatalogQuery, CompanyKind};
use crate::error::{UpstreamError, UpstreamResult};
use crate::upstream::{FunctionSelector, MarketplaceApi, PaymentFilter, TextGenerator};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Canned marketplace backend.
///
/// Company listings honour the `search` term the way the real backend does
/// (case-insensitive substring on `name`). Anything not configured answers
/// with HTTP 404.
#[derive(Default)]
pub struct FakeMarketplace {
    companies: HashMap<CompanyKind, Value>,
    assets: HashMap<(AssetKind, String), Value>,
    details: HashMap<(AssetKind, String), Value>,
    user_data: HashMap<&'static str, Value>,
    failure: Option<UpstreamError>,
    transient: Option<UpstreamError>,
    transient_left: AtomicUsize,
    latency: Option<Duration>,
    company_fetches: AtomicUsize,
    calls: Mutex<Vec<String>>,
}

impl FakeMarketplace {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_companies(mut self, kind: CompanyKind, envelope: Value) -> Self {
        self.companies.insert(kind, envelope);
        self
    }

    #[must_use]
    pub fn with_assets(mut self, kind: AssetKind, company_id: &str, envelope: Value) -> Self {
        self.assets.insert((kind, company_id.to_string()), envelope);
        self
    }

    #[must_use]
    pub fn with_details(mut self, kind: AssetKind, asset_id: &str, envelope: Value) -> Self {
        self.details.insert((kind, asset_id.to_string()), envelope);
        self
    }

    /// Canned reply for a user endpoint: `favourites`, `bookings`,
    /// `categories`, `payments` or `profile`.
    #[must_use]
    pub fn with_user_data(mut self, endpoint: &'static str, envelope: Value) -> Self {
        self.user_data.insert(endpoint, envelope);
        self
    }

    /// Make every call fail with `err`.
    #[must_use]
    pub fn failing_with(mut self, err: UpstreamError) -> Self {
        self.failure = Some(err);
        self
    }

    /// Make the first `times` calls fail with `err`, then answer normally.
    #[must_use]
    pub fn failing_first(mut self, times: usize, err: UpstreamError) -> Self {
        self.transient = Some(err);
        self.transient_left = AtomicUsize::new(times);
        self
    }

    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn company_fetches(&self) -> usize {
        self.company_fetches.load(Ordering::SeqCst)
    }

    /// Every call made so far, as `name:argument` strings.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    async fn record(&self, call: String) -> UpstreamResult<()> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        let transient = self
            .transient_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        match &self.transient {
            Some(err) if transient => Err(err.clone()),
            _ => Ok(()),
        }
    }

    fn user(&self, endpoint: &str) -> UpstreamResult<Value> {
        self.user_data
            .get(endpoint)
            .cloned()
            .ok_or(UpstreamError::Status(404))
    }
}

#[async_trait]
impl MarketplaceApi for FakeMarketplace {
    async fn list_companies(&self, query: &CatalogQuery) -> UpstreamResult<Value> {
        self.company_fetches.fetch_add(1, Ordering::SeqCst);
        self.record(format!("companies:{}:{}", query.kind.label(), query.search.as_deref().unwrap_or("")))
            .await?;

        let envelope = self
            .companies
            .get(&query.kind)
            .cloned()
            .unwrap_or_else(|| json!({"data": {"itemList": [], "totalCount": 0}}));

        let Some(term) = &query.search else {
            return Ok(envelope);
        };
        let items: Vec<Value> = Catalog::items(&envelope)
            .iter()
            .filter(|item| {
                item.get("name")
                    .and_then(Value::as_str)
                    .is_some_and(|name| name.to_lowercase().contains(term.as_str()))
            })
            .cloned()
            .collect();
        let total = items.len();
        Ok(json!({"data": {"itemList": items, "totalCount": total}}))
    }

    async fn list_assets(&self, kind: AssetKind, company_id: &str) -> UpstreamResult<Value> {
        self.record(format!("assets:{}:{}", kind.as_str(), company_id)).await?;
        self.assets
            .get(&(kind, company_id.to_string()))
            .cloned()
            .ok_or(UpstreamError::Status(404))
    }

    async fn asset_details(&self, kind: AssetKind, asset_id: &str) -> UpstreamResult<Value> {
        self.record(format!("details:{}:{}", kind.as_str(), asset_id)).await?;
        self.details
            .get(&(kind, asset_id.to_string()))
            .cloned()
            .ok_or(UpstreamError::Status(404))
    }

    async fn list_user_favourites(
        &self,
        favourite_type: Option<&str>,
        _page: u32,
        _per_page: u32,
    ) -> UpstreamResult<Value> {
        self.record(format!("favourites:{}", favourite_type.unwrap_or(""))).await?;
        self.user("favourites")
    }

    async fn list_user_bookings(
        &self,
        status: Option<&str>,
        _page: u32,
        _per_page: u32,
    ) -> UpstreamResult<Value> {
        self.record(format!("bookings:{}", status.unwrap_or(""))).await?;
        self.user("bookings")
    }

    async fn company_categories(&self, cat_search: Option<&str>) -> UpstreamResult<Value> {
        self.record(format!("categories:{}", cat_search.unwrap_or(""))).await?;
        self.user("categories")
    }

    async fn list_payments(&self, filter: &PaymentFilter) -> UpstreamResult<Value> {
        self.record(format!(
            "payments:{}..{}",
            filter.start_date.as_deref().unwrap_or(""),
            filter.end_date.as_deref().unwrap_or("")
        ))
        .await?;
        self.user("payments")
    }

    async fn user_profile(&self) -> UpstreamResult<Value> {
        self.record("profile:".to_string()).await?;
        self.user("profile")
    }
}

/// Text generator replying from a script.
///
/// Replies are matched by the first configured pattern contained in the
/// prompt; otherwise the default reply is used, otherwise the prompt is echoed
/// back with a `summary:` prefix.
#[derive(Default)]
pub struct ScriptedGenerator {
    replies: Vec<(String, String)>,
    default_reply: Option<String>,
    failure: Option<UpstreamError>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_reply(mut self, pattern: impl Into<String>, reply: impl Into<String>) -> Self {
        self.replies.push((pattern.into(), reply.into()));
        self
    }

    #[must_use]
    pub fn with_default(mut self, reply: impl Into<String>) -> Self {
        self.default_reply = Some(reply.into());
        self
    }

    #[must_use]
    pub fn failing_with(mut self, err: UpstreamError) -> Self {
        self.failure = Some(err);
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> UpstreamResult<String> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prompt.to_string());

        if let Some(err) = &self.failure {
            return Err(err.clone());
        }

        let reply = self
            .replies
            .iter()
            .find(|(pattern, _)| prompt.contains(pattern.as_str()))
            .map(|(_, reply)| reply.clone())
            .or_else(|| self.default_reply.clone())
            .unwrap_or_else(|| format!("summary:{}", prompt.len()));
        Ok(reply)
    }
}

/// Selector that always answers with the same raw reply.
pub struct FixedSelector {
    reply: UpstreamResult<String>,
    calls: AtomicUsize,
}

impl FixedSelector {
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            reply: Ok(reply.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_with(err: UpstreamError) -> Self {
        Self {
            reply: Err(err),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FunctionSelector for FixedSelector {
    async fn select_function(&self, _query: &str, _corpus: &str) -> UpstreamResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone()
    }
}
