//! Integration tests for the marketq query service.
//!
//! The full router is driven with in-process fakes for the marketplace
//! backend, the function selector and the text generator.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use marketq::{
    catalog::{AssetKind, CompanyKind},
    router,
    summarize::SummaryMode,
    upstream::testing::{FakeMarketplace, FixedSelector, ScriptedGenerator},
    AppState, Config, UpstreamError,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

struct Harness {
    state: Arc<AppState>,
    api: Arc<FakeMarketplace>,
    selector: Arc<FixedSelector>,
    generator: Arc<ScriptedGenerator>,
}

impl Harness {
    fn new(api: FakeMarketplace, selector: FixedSelector, generator: ScriptedGenerator) -> Self {
        Self::with_config(Config::default(), api, selector, generator)
    }

    fn with_config(
        config: Config,
        api: FakeMarketplace,
        selector: FixedSelector,
        generator: ScriptedGenerator,
    ) -> Self {
        let api = Arc::new(api);
        let selector = Arc::new(selector);
        let generator = Arc::new(generator);
        let state = Arc::new(AppState::with_services(
            config,
            api.clone(),
            selector.clone(),
            generator.clone(),
            "get_booking_list(status?: string)".to_string(),
        ));
        Self {
            state,
            api,
            selector,
            generator,
        }
    }

    fn app(&self) -> Router {
        router(Arc::clone(&self.state))
    }

    async fn ask(&self, query: &str) -> (StatusCode, Value) {
        json_request(self.app(), "POST", "/query", Some(json!({ "query": query }))).await
    }
}

/// Helper to make a JSON request to the router.
async fn json_request(
    app: Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let req = match method {
        "GET" => Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
        "POST" => Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.unwrap_or(json!({})).to_string()))
            .unwrap(),
        _ => panic!("Unsupported method"),
    };

    let response = app.oneshot(req).await.unwrap();
    let status = response.status();

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&body_bytes).unwrap_or(json!({}));

    (status, body)
}

fn delivery_companies() -> Value {
    json!({"data": {"itemList": [
        {"_id": "c1", "name": "DHL Express", "city": "Riyadh"},
        {"_id": "c2", "name": "Aramex", "city": "Jeddah"}
    ], "totalCount": 2}})
}

fn dhl_vehicles() -> Value {
    json!({"data": {
        "companyDetails": {"_id": "c1", "name": "DHL Express"},
        "itemList": [
            {"city": "Riyadh", "vehicleDetails": {"_id": "v1", "sizeType": "Flatbed"}},
            {"city": "Riyadh", "vehicleDetails": {"_id": "v2", "sizeType": "Mini Truck"}}
        ],
        "totalCount": 2
    }})
}

fn marketplace() -> FakeMarketplace {
    FakeMarketplace::new()
        .with_companies(CompanyKind::Delivery, delivery_companies())
        .with_assets(AssetKind::Vehicle, "c1", dhl_vehicles())
        .with_details(
            AssetKind::Vehicle,
            "v2",
            json!({"data": {"_id": "v2", "sizeType": "Mini Truck", "available_trucks": 4}}),
        )
}

// ============================================================================
// Health Endpoint Tests
// ============================================================================

#[tokio::test]
async fn test_health_endpoint_returns_200() {
    let harness = Harness::new(
        FakeMarketplace::new(),
        FixedSelector::replying("{}"),
        ScriptedGenerator::new(),
    );
    let (status, body) = json_request(harness.app(), "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_ready_endpoint_follows_flag() {
    let harness = Harness::new(
        FakeMarketplace::new(),
        FixedSelector::replying("{}"),
        ScriptedGenerator::new(),
    );

    let (status, body) = json_request(harness.app(), "GET", "/ready", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "not_ready");
    assert_eq!(body["cached_catalogs"], 0);

    harness.state.mark_ready();
    let (status, _) = json_request(harness.app(), "GET", "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
}

// ============================================================================
// Query Pipeline Tests
// ============================================================================

#[tokio::test]
async fn test_fast_path_details_skip_the_selector() {
    let harness = Harness::new(
        marketplace(),
        FixedSelector::replying("not used"),
        ScriptedGenerator::new().with_default("The Mini Truck from DHL Express has 4 trucks available."),
    );

    let (status, body) = harness
        .ask("show vehicle details of mini truck from DHL company")
        .await;

    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_eq!(body["function_called"], "get_vehicle_details");
    assert_eq!(body["entity_id"], "v2");
    assert_eq!(
        body["generated_response"],
        "The Mini Truck from DHL Express has 4 trucks available."
    );
    assert_eq!(harness.selector.call_count(), 0);
    assert_eq!(
        harness.api.calls(),
        vec!["companies:delivery:", "assets:vehicle:c1", "details:vehicle:v2"]
    );

    // Compacted vehicle details reach the prompt, not the raw envelope.
    let prompts = harness.generator.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("\"availableTrucks\": 4"));
    assert!(prompts[0].contains("User Query: show vehicle details of mini truck from DHL company"));
}

#[tokio::test]
async fn test_selector_path_with_wrapped_intent() {
    let harness = Harness::new(
        FakeMarketplace::new().with_user_data(
            "bookings",
            json!({"data": {"itemList": [{"_id": "b1", "orderId": "O-7", "bookingStatus": "Completed"}], "totalCount": 1}}),
        ),
        FixedSelector::replying(
            r#"{"function_name": "call_user_function", "parameters": {"function_name": "get_booking_list", "arg": "completed"}, "code": ""}"#,
        ),
        ScriptedGenerator::new().with_default("You have one completed booking, O-7."),
    );

    let (status, body) = harness.ask("show my completed bookings").await;

    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_eq!(body["function_called"], "get_booking_list");
    assert!(body.get("entity_id").is_none());
    assert_eq!(harness.selector.call_count(), 1);
    assert_eq!(harness.api.calls(), vec!["bookings:Completed"]);
}

#[tokio::test]
async fn test_single_word_after_anchor_falls_through_to_selector() {
    let harness = Harness::new(
        marketplace(),
        FixedSelector::replying(r#"{"function_name": "get_vehicle_list", "parameters": {"company_id": "dhl"}}"#),
        ScriptedGenerator::new().with_default("DHL Express runs flatbeds and mini trucks."),
    );

    let (status, body) = harness.ask("vehicle details dhl").await;

    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_eq!(body["function_called"], "get_vehicle_list");
    assert_eq!(body["entity_id"], "c1");
    assert_eq!(harness.selector.call_count(), 1);
}

#[tokio::test]
async fn test_unknown_company_on_empty_catalog_is_404() {
    let harness = Harness::new(
        FakeMarketplace::new(),
        FixedSelector::replying(r#"{"function_name": "get_vehicle_list", "parameters": {"company_id": "acme"}}"#),
        ScriptedGenerator::new(),
    );

    let (status, body) = harness.ask("list vehicles of acme").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 404);
    assert!(body["error"].as_str().unwrap().starts_with("Company 'acme' not found."));
    assert!(body.get("candidates").is_none());
    assert_eq!(harness.generator.call_count(), 0);
}

#[tokio::test]
async fn test_unknown_company_lists_candidates() {
    let harness = Harness::new(
        marketplace(),
        FixedSelector::replying(r#"{"function_name": "get_vehicle_list", "parameters": {"company_name": "zajil"}}"#),
        ScriptedGenerator::new(),
    );

    let (status, body) = harness.ask("list vehicles of zajil").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["candidates"], json!(["DHL Express", "Aramex"]));
    assert_eq!(
        body["error"],
        "Company 'zajil' not found. Available companies: DHL Express, Aramex"
    );
}

#[tokio::test]
async fn test_unknown_vehicle_is_404_with_candidates() {
    let harness = Harness::new(marketplace(), FixedSelector::replying("{}"), ScriptedGenerator::new());

    let (status, body) = harness
        .ask("show vehicle details of tanker from DHL company")
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["candidates"], json!(["Flatbed", "Mini Truck"]));
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Vehicle 'tanker' not found in company 'dhl'."));
}

#[tokio::test]
async fn test_malformed_selector_reply_is_400() {
    let harness = Harness::new(
        FakeMarketplace::new(),
        FixedSelector::replying("I think you want get_booking_list"),
        ScriptedGenerator::new(),
    );

    let (status, body) = harness.ask("my bookings").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Failed to parse model response.");
    assert_eq!(harness.selector.call_count(), 1);
}

#[tokio::test]
async fn test_empty_selector_reply_is_404() {
    let harness = Harness::new(FakeMarketplace::new(), FixedSelector::replying(""), ScriptedGenerator::new());

    let (status, body) = harness.ask("what is the weather").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "No matching function retrieved from the model.");
}

#[tokio::test]
async fn test_unknown_function_is_400() {
    let harness = Harness::new(
        FakeMarketplace::new(),
        FixedSelector::replying(r#"{"function_name": "delete_account", "parameters": {}}"#),
        ScriptedGenerator::new(),
    );

    let (status, body) = harness.ask("delete my account").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Unsupported function: delete_account");
}

#[tokio::test]
async fn test_legally_unavailable_backend_is_451() {
    let harness = Harness::new(
        FakeMarketplace::new().failing_with(UpstreamError::LegallyUnavailable),
        FixedSelector::replying(r#"{"function_name": "get_user_profile_details", "parameters": {}}"#),
        ScriptedGenerator::new(),
    );

    let (status, body) = harness.ask("show my profile").await;

    assert_eq!(status, StatusCode::UNAVAILABLE_FOR_LEGAL_REASONS);
    assert_eq!(body["code"], 451);
}

#[tokio::test]
async fn test_other_backend_failure_is_no_data() {
    let harness = Harness::new(
        FakeMarketplace::new().failing_with(UpstreamError::Status(500)),
        FixedSelector::replying(r#"{"function_name": "get_user_profile_details", "parameters": {}}"#),
        ScriptedGenerator::new(),
    );

    let (status, _) = harness.ask("show my profile").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_summarizer_failure_is_500() {
    let harness = Harness::new(
        FakeMarketplace::new().with_user_data("profile", json!({"data": {"name": "Sara"}})),
        FixedSelector::replying(r#"{"function_name": "get_user_profile_details", "parameters": {}}"#),
        ScriptedGenerator::new().failing_with(UpstreamError::Transport("connection reset".into())),
    );

    let (status, body) = harness.ask("show my profile").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("connection reset"));
}

#[tokio::test]
async fn test_empty_query_is_400() {
    let harness = Harness::new(FakeMarketplace::new(), FixedSelector::replying("{}"), ScriptedGenerator::new());

    let (status, _) = harness.ask("   ").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(harness.selector.call_count(), 0);
}

#[tokio::test]
async fn test_catalog_is_shared_across_requests() {
    let harness = Harness::new(
        marketplace(),
        FixedSelector::replying(r#"{"function_name": "get_vehicle_list", "parameters": {"company_name": "dhl"}}"#),
        ScriptedGenerator::new().with_default("ok"),
    );

    let (first, _) = harness.ask("vehicles of dhl").await;
    let (second, _) = harness.ask("vehicles of dhl again").await;

    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::OK);
    assert_eq!(harness.api.company_fetches(), 1);

    harness.state.catalogs.invalidate(CompanyKind::Delivery);
    harness.ask("vehicles of dhl once more").await;
    assert_eq!(harness.api.company_fetches(), 2);
}

#[tokio::test]
async fn test_truncate_mode_is_a_single_lossy_call() {
    let mut config = Config::default();
    config.summary.mode = SummaryMode::Truncate;
    config.summary.token_budget = 5;
    config.summary.truncate_chars = 60;

    let harness = Harness::with_config(
        config,
        FakeMarketplace::new().with_user_data(
            "profile",
            json!({"data": {"bio": "word ".repeat(500), "zz_last": "TAIL_MARKER"}}),
        ),
        FixedSelector::replying(r#"{"function_name": "get_user_profile_details", "parameters": {}}"#),
        ScriptedGenerator::new().with_default("A short profile."),
    );

    let (status, body) = harness.ask("show my profile").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["generated_response"], "A short profile.");
    let prompts = harness.generator.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(!prompts[0].contains("TAIL_MARKER"));
}

#[tokio::test]
async fn test_oversized_payload_is_summarized_in_order() {
    let mut config = Config::default();
    config.summary.token_budget = 80;
    config.compact_payloads = false;

    let items: Vec<Value> = (0..30)
        .map(|i| json!({"_id": format!("b{i}"), "orderId": format!("ORDER-{i:03}")}))
        .collect();
    let harness = Harness::with_config(
        config,
        FakeMarketplace::new().with_user_data("bookings", json!({"data": {"itemList": items, "totalCount": 30}})),
        FixedSelector::replying(r#"{"function_name": "get_booking_list", "parameters": {}}"#),
        ScriptedGenerator::new()
            .with_reply("ORDER-000", "first part")
            .with_default("later part"),
    );

    let (status, body) = harness.ask("list all my bookings").await;

    assert_eq!(status, StatusCode::OK, "body: {body}");
    let calls = harness.generator.call_count();
    assert!(calls > 1);
    let response = body["generated_response"].as_str().unwrap();
    assert!(response.starts_with("first part\n\n"));
    assert_eq!(response.split("\n\n").count(), calls);
}
