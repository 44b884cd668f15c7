//! External collaborators: the marketplace backend, the text-generation
//! service, and the function selector built on top of it.
//!
//! Each is consumed through a narrow async trait so the pipeline can be
//! driven by in-process fakes (the `testing` module, behind the `testing`
//! feature).

pub mod groq;
pub mod marketplace;
pub mod selector;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

use crate::error::UpstreamResult;
use async_trait::async_trait;

pub use groq::GroqClient;
pub use marketplace::{HttpMarketplace, MarketplaceApi, PaymentFilter};
pub use selector::{FunctionSelector, LlmFunctionSelector};

/// Prompt in, prose out. Synchronous from the caller's view, no streaming.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> UpstreamResult<String>;
}
