//! Integration tests for the service endpoints.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server, with an in-process text generator, the in-memory
//! store, and a canned search provider.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use marcom_core::{
    CoreError, EngineContext, InMemoryStore, Researcher, SearchResult, SimulationStore, WebSearch,
};
use marcom_llm::{GenerationRequest, LlmError, PromptEngine, RetryGate, RetryPolicy, TextGenerator};
use marcom_server::ws::drive;
use marcom_server::{AppState, StreamEnd, build_router};
use marcom_types::{SimulationId, SimulationUpdate};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tower::ServiceExt;

/// Answers every prompt kind with a valid response; every agent skips.
struct Steady;

impl TextGenerator for Steady {
    async fn complete(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        let system = &request.prompt.system;
        let user = &request.prompt.user;
        let response = if system.contains("rewrite character descriptions") {
            json!({
                "description": "You are in a simulation with other agents.",
                "third_person_description": "A careful shopper."
            })
            .to_string()
        } else if user.contains("Available actions") {
            json!({"action": "SKIP", "reason": "saving money", "target_id": "", "target_content": ""})
                .to_string()
        } else if system.contains("crafting web search queries") {
            json!({"query": "spm tuition klang valley"}).to_string()
        } else {
            String::from("Nothing to add.")
        };
        Ok(response)
    }
}

struct CannedSearch;

impl WebSearch for CannedSearch {
    async fn search(&self, query: &str, _max_results: usize) -> Result<Vec<SearchResult>, CoreError> {
        Ok(vec![SearchResult {
            title: format!("Top result for {query}"),
            snippet: String::from("Group classes from RM120"),
            link: String::from("https://rival.example"),
        }])
    }
}

type TestState = AppState<Steady, InMemoryStore, CannedSearch>;

fn make_state() -> Arc<TestState> {
    let gate = RetryGate::new(Arc::new(Steady), RetryPolicy::default());
    let prompts = Arc::new(PromptEngine::builtin().unwrap());
    let ctx = EngineContext {
        gate: gate.clone(),
        prompts: Arc::clone(&prompts),
        store: Arc::new(InMemoryStore::new()),
        memory_window: 30,
    };
    let researcher = Researcher::new(gate, prompts, CannedSearch, 10);
    Arc::new(AppState::new(ctx, researcher, -1))
}

fn start_body(id: i64, total_cycles: Option<i64>) -> Value {
    let mut body = json!({
        "id": id,
        "env_desc": "A tuition market in Kuala Lumpur.",
        "agents": [
            {"id": 1, "name": "Aina", "desc": "A form five student.", "attrs": [{"key": "Budget", "value": "Low"}]},
            {"id": 2, "name": "Ben", "desc": "A parent of two."}
        ],
        "products": [
            {"id": 1, "name": "Course", "desc": "Exam preparation", "price": "350.00", "cost": 200},
            {"id": 2, "name": "Tutor", "desc": "Small groups", "price": 180.5}
        ]
    });
    if let Some(total) = total_cycles {
        body["total_cycles"] = json!(total);
    }
    body
}

async fn send(state: &Arc<TestState>, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let app = build_router(Arc::clone(state));
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn run_stream(state: &Arc<TestState>, id: i64) -> (StreamEnd, Vec<SimulationUpdate>) {
    let active = state.registry.get(SimulationId::new(id)).await.unwrap();
    let engine = active.claim().unwrap();
    let (tx, mut rx) = mpsc::channel(1024);
    let end = drive(&**state, SimulationId::new(id), engine, tx).await;
    let mut updates = Vec::new();
    while let Ok(update) = rx.try_recv() {
        updates.push(update);
    }
    (end, updates)
}

#[tokio::test]
async fn health_reports_active_simulations() {
    let state = make_state();
    let (status, body) = send(&state, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["active_simulations"], 0);
}

#[tokio::test]
async fn start_registers_then_resumes() {
    let state = make_state();

    let (status, body) = send(&state, "POST", "/api/simulations", Some(start_body(1, Some(1)))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resumed"], false);

    state.registry.pause(SimulationId::new(1)).await;
    let (status, body) = send(&state, "POST", "/api/simulations", Some(start_body(1, Some(1)))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resumed"], true);

    let active = state.registry.get(SimulationId::new(1)).await.unwrap();
    assert!(!active.control().is_paused());
    assert_eq!(state.registry.len().await, 1);
}

#[tokio::test]
async fn start_rejects_duplicate_ids() {
    let state = make_state();
    let mut body = start_body(2, None);
    body["agents"][1]["id"] = json!(1);

    let (status, response) = send(&state, "POST", "/api/simulations", Some(body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(response["error"].as_str().unwrap().contains("duplicate agent id 1"));
    assert!(state.registry.is_empty().await);
}

#[tokio::test]
async fn pause_unknown_is_not_found() {
    let state = make_state();
    let (status, body) = send(&state, "POST", "/api/simulations/42/pause", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);
}

#[tokio::test]
async fn pause_sets_the_flag() {
    let state = make_state();
    send(&state, "POST", "/api/simulations", Some(start_body(3, None))).await;

    let (status, body) = send(&state, "POST", "/api/simulations/3/pause", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Pausing the simulation gracefully...");
    let active = state.registry.get(SimulationId::new(3)).await.unwrap();
    assert!(active.control().is_paused());
}

#[tokio::test]
async fn stream_runs_bounded_simulation_to_completion() {
    let state = make_state();
    send(&state, "POST", "/api/simulations", Some(start_body(4, Some(1)))).await;

    let (end, updates) = run_stream(&state, 4).await;

    assert_eq!(end, StreamEnd::Finished);
    let actions: Vec<(i64, &str)> = updates.iter().map(|u| (u.agent_id, u.action.as_str())).collect();
    assert_eq!(
        actions,
        [
            (0, "INIT"),
            (0, "INIT"),
            (1, "SKIP"),
            (1, "ACTION_RESPONSE"),
            (2, "SKIP"),
            (2, "ACTION_RESPONSE"),
        ]
    );
    assert!(updates.iter().all(|u| u.simulation_id == 4));
    assert!(state.registry.get(SimulationId::new(4)).await.is_none());

    let (status, history) = send(&state, "GET", "/api/simulations/4/events", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().unwrap().len(), 6);
    assert_eq!(history[2]["kind"], "SKIP");
}

#[tokio::test]
async fn paused_stream_ends_and_resumes_without_duplicates() {
    let state = make_state();
    send(&state, "POST", "/api/simulations", Some(start_body(5, Some(2)))).await;
    state.registry.pause(SimulationId::new(5)).await;

    // Initialization is not affected by pause; turns are.
    let (end, first) = run_stream(&state, 5).await;
    assert_eq!(end, StreamEnd::Paused);
    assert_eq!(first.len(), 2);
    assert!(state.registry.get(SimulationId::new(5)).await.is_some());

    send(&state, "POST", "/api/simulations", Some(start_body(5, Some(2)))).await;
    let (end, rest) = run_stream(&state, 5).await;
    assert_eq!(end, StreamEnd::Finished);
    assert_eq!(rest.len(), 8);
    assert!(rest.iter().all(|u| u.action != "INIT"));

    let stored = state.ctx.store.list_events(SimulationId::new(5)).await.unwrap();
    assert_eq!(stored.len(), first.len() + rest.len());
}

#[tokio::test]
async fn second_consumer_cannot_claim_a_driven_simulation() {
    let state = make_state();
    send(&state, "POST", "/api/simulations", Some(start_body(6, None))).await;
    let active = state.registry.get(SimulationId::new(6)).await.unwrap();

    let held = active.claim();
    assert!(held.is_some());
    assert!(active.claim().is_none());
    drop(held);
    assert!(active.claim().is_some());
}

#[tokio::test]
async fn research_returns_query_and_report() {
    let state = make_state();
    let body = json!({"name": "Intensive Exam Preparation Course", "desc": "Past year papers", "price": 350});

    let (status, response) = send(&state, "POST", "/api/research", Some(body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["query"], "spm tuition klang valley");
    assert_eq!(response["report"], "Nothing to add.");
}

#[tokio::test]
async fn research_rejects_blank_name() {
    let state = make_state();
    let body = json!({"name": "  ", "desc": "x", "price": 1});
    let (status, _) = send(&state, "POST", "/api/research", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
