//! Tests for planguard-llm: reply extraction, prompts, and BrainClient against a local mock brain

use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use planguard_core::{DataType, PlanError, PluginDefinition};
use planguard_llm::prompt::{generate_prompt, repair_prompt};
use planguard_llm::*;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Seen = Arc<Mutex<Vec<(Option<String>, Value)>>>;

/// Serve `POST /chat` with a fixed status and body, recording what arrives.
async fn spawn_brain(status: StatusCode, reply: Value) -> (String, Seen) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = seen.clone();
    let app = Router::new().route(
        "/chat",
        post(move |headers: HeaderMap, Json(body): Json<Value>| {
            let recorder = recorder.clone();
            let reply = reply.clone();
            async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .map(String::from);
                recorder.lock().unwrap().push((auth, body));
                (status, Json(reply))
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), seen)
}

fn plugins() -> Vec<PluginDefinition> {
    vec![PluginDefinition::new("SEARCH")
        .with_input("query", DataType::String, true)
        .with_output("results", DataType::Array)]
}

// ===========================================================================
// extract_plan
// ===========================================================================

#[test]
fn extract_bare_array() {
    let v = extract_plan(r#"[{"number": 1, "actionVerb": "SEARCH"}]"#).unwrap();
    assert_eq!(v, json!([{"number": 1, "actionVerb": "SEARCH"}]));
}

#[test]
fn extract_from_json_fence_with_prose() {
    let text = "Here is the plan:\n```json\n[{\"number\": 1}]\n```\nLet me know.";
    assert_eq!(extract_plan(text).unwrap(), json!([{"number": 1}]));
}

#[test]
fn extract_embedded_after_prose() {
    let text = "Sure [see below]: [{\"number\": 2}] hope that helps";
    assert_eq!(extract_plan(text).unwrap(), json!([{"number": 2}]));
}

#[test]
fn extract_removes_plan_wrapper() {
    let text = r#"{"plan": [{"number": 1}]}"#;
    assert_eq!(extract_plan(text).unwrap(), json!([{"number": 1}]));
}

#[test]
fn extract_nothing_found() {
    assert!(matches!(extract_plan("no json here"), Err(PlanError::NotFound)));
    assert!(matches!(extract_plan("   "), Err(PlanError::NotFound)));
}

// ===========================================================================
// Prompts
// ===========================================================================

#[test]
fn generate_prompt_lists_goal_and_plugins() {
    let prompt = generate_prompt(&GenerateRequest::new("find rivals", plugins()));
    assert!(prompt.starts_with("Goal: find rivals"));
    assert!(prompt.contains("- SEARCH inputs [query*: string] outputs [results: array]"));
    assert!(prompt.contains("\"valueType\""));
}

#[test]
fn repair_prompt_numbers_errors_and_embeds_plan() {
    let req = RepairRequest::new(
        "find rivals",
        json!([{"number": 1, "actionVerb": "SEARCH"}]),
        vec![
            "Step 1: Missing required input 'query' for SEARCH".into(),
            "Step 1: Input 'x' must be an object".into(),
        ],
    )
    .with_attempt(2);
    let prompt = repair_prompt(&req);
    assert!(prompt.contains("repair attempt 2"));
    assert!(prompt.contains("1. Step 1: Missing required input 'query' for SEARCH"));
    assert!(prompt.contains("2. Step 1: Input 'x' must be an object"));
    assert!(prompt.contains("\"actionVerb\": \"SEARCH\""));
}

// ===========================================================================
// ReasonerError
// ===========================================================================

#[test]
fn reasoner_error_display() {
    assert_eq!(
        ReasonerError::RateLimited { retry_after_ms: 500 }.to_string(),
        "rate limited: retry after 500ms"
    );
    assert_eq!(
        ReasonerError::Timeout(Duration::from_secs(2)).to_string(),
        "timed out after 2s"
    );
}

// ===========================================================================
// BrainClient
// ===========================================================================

#[tokio::test]
async fn brain_generate_parses_text_reply() {
    let (url, seen) = spawn_brain(
        StatusCode::OK,
        json!({"response": "```json\n[{\"number\": 1, \"actionVerb\": \"SEARCH\"}]\n```"}),
    )
    .await;
    let client = BrainClient::new(url);
    assert_eq!(client.name(), "brain");

    let plan = client
        .generate(GenerateRequest::new("find rivals", plugins()))
        .await
        .unwrap();
    assert_eq!(plan, json!([{"number": 1, "actionVerb": "SEARCH"}]));

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    let (auth, body) = &seen[0];
    assert!(auth.is_none());
    assert_eq!(body["optimization"], "accuracy");
    assert_eq!(body["exchanges"][0]["role"], "system");
    assert_eq!(body["exchanges"][1]["role"], "user");
    assert!(body["exchanges"][1]["content"]
        .as_str()
        .unwrap()
        .contains("Goal: find rivals"));
}

#[tokio::test]
async fn brain_repair_sends_bearer_token_and_accepts_json_reply() {
    let (url, seen) = spawn_brain(
        StatusCode::OK,
        json!({"result": {"plan": [{"number": 1, "actionVerb": "X"}]}}),
    )
    .await;
    let client = BrainClient::new("http://127.0.0.1:9")
        .with_optimization("speed")
        .with_auth_token("fallback");
    let context = CallContext {
        auth_token: Some("secret".into()),
        brain_url: Some(url),
    };
    let plan = client
        .repair(RepairRequest::new("g", json!([]), vec!["bad".into()]).with_context(context))
        .await
        .unwrap();
    assert_eq!(plan, json!([{"number": 1, "actionVerb": "X"}]));

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].0.as_deref(), Some("Bearer secret"));
    assert_eq!(seen[0].1["optimization"], "speed");
}

#[tokio::test]
async fn brain_status_codes_map_to_errors() {
    let (url, _) = spawn_brain(StatusCode::UNAUTHORIZED, json!({"error": "nope"})).await;
    let err = BrainClient::new(url)
        .generate(GenerateRequest::new("g", vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, ReasonerError::AuthFailed(_)));

    let (url, _) = spawn_brain(StatusCode::TOO_MANY_REQUESTS, json!({})).await;
    let err = BrainClient::new(url)
        .generate(GenerateRequest::new("g", vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, ReasonerError::RateLimited { .. }));

    let (url, _) = spawn_brain(StatusCode::INTERNAL_SERVER_ERROR, json!({})).await;
    let err = BrainClient::new(url)
        .generate(GenerateRequest::new("g", vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, ReasonerError::RequestFailed(ref m) if m.starts_with("500")));
}

#[tokio::test]
async fn brain_reply_without_plan_is_invalid() {
    let (url, _) = spawn_brain(StatusCode::OK, json!({"response": "I cannot help"})).await;
    let err = BrainClient::new(url)
        .generate(GenerateRequest::new("g", vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, ReasonerError::InvalidResponse(_)));

    let (url, _) = spawn_brain(StatusCode::OK, json!({"other": 1})).await;
    let err = BrainClient::new(url)
        .generate(GenerateRequest::new("g", vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, ReasonerError::InvalidResponse(_)));
}

#[tokio::test]
async fn brain_unreachable_is_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = BrainClient::new(format!("http://{}", addr))
        .with_timeout(Duration::from_secs(5))
        .generate(GenerateRequest::new("g", vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, ReasonerError::NetworkError(_)));
}
