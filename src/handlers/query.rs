use crate::error::Result;
use crate::pipeline::QueryAnswer;
use crate::state::AppState;
use axum::{extract::State, Json};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

/// POST /query - Answer a natural-language question about the marketplace.
///
/// # Flow
/// 1. Fast-path parse, or ask the selector for a function
/// 2. Resolve company and asset names to ids
/// 3. Fetch the payload
/// 4. Summarize it against the question
pub async fn query_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryAnswer>> {
    let start = Instant::now();
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("query", %request_id);

    metrics::counter!("query_requests_total").increment(1);
    let result = state.pipeline.answer(&request.query).instrument(span).await;
    metrics::histogram!("query_latency_ms").record(start.elapsed().as_millis() as f64);

    result.map(Json)
}
