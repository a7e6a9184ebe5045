use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use theater_core_rs::host::DetachedHost;
use theater_core_rs::llm::{
    ExternalStrategy, GenerationStrategy, HttpTransport, Message, Prompt, ProviderClient, ProviderConfig,
    ProviderError, ProviderKind, Role,
};

#[derive(Default)]
struct Seen {
    auth: Vec<Option<String>>,
    query_keys: Vec<Option<String>>,
    bodies: Vec<Value>,
    flaky_calls: usize,
}

type Shared = Arc<Mutex<Seen>>;

fn auth_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn openai(State(seen): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let auth = auth_header(&headers);
    let ok = auth.as_deref() == Some("Bearer good-key");
    {
        let mut seen = seen.lock().unwrap();
        seen.auth.push(auth);
        seen.bodies.push(body);
    }
    if !ok {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": {"message": "bad key"}})));
    }
    (
        StatusCode::OK,
        Json(json!({"choices": [{"message": {"role": "assistant", "content": "hello from openai"}}]})),
    )
}

async fn flaky(State(seen): State<Shared>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    let mut seen = seen.lock().unwrap();
    seen.auth.push(auth_header(&headers));
    seen.flaky_calls += 1;
    if seen.flaky_calls == 1 {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"error": "overloaded"})));
    }
    (
        StatusCode::OK,
        Json(json!({"choices": [{"message": {"content": "second time lucky"}}]})),
    )
}

async fn gemini(
    State(seen): State<Shared>,
    Path(call): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    {
        let mut seen = seen.lock().unwrap();
        seen.auth.push(auth_header(&headers));
        seen.query_keys.push(query.get("key").cloned());
        seen.bodies.push(body);
    }
    if call != "test-model:generateContent" {
        return (StatusCode::NOT_FOUND, Json(json!({"error": "unknown model"})));
    }
    (
        StatusCode::OK,
        Json(json!({"candidates": [{"content": {"parts": [{"text": "hello from gemini"}]}}]})),
    )
}

fn spawn_provider() -> (String, Shared) {
    let seen: Shared = Arc::new(Mutex::new(Seen::default()));
    let app = Router::new()
        .route("/v1/chat/completions", post(openai))
        .route("/flaky/chat/completions", post(flaky))
        .route("/v1beta/models/:call", post(gemini))
        .with_state(seen.clone());
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::Server::from_tcp(listener)
            .unwrap()
            .serve(app.into_make_service())
            .await
            .unwrap();
    });
    (format!("http://{}", addr), seen)
}

fn prompt() -> Prompt {
    Prompt {
        messages: vec![
            Message::new(Role::System, "stay in character"),
            Message::new(Role::User, "write a scene"),
        ],
    }
}

fn strategy() -> ExternalStrategy {
    ExternalStrategy::new(Arc::new(HttpTransport::new()))
}

#[tokio::test]
async fn openai_compatible_uses_bearer_and_messages() {
    let (base, seen) = spawn_provider();
    let cfg = ProviderConfig {
        kind: ProviderKind::OpenAiCompatible,
        endpoint: format!("{}/v1", base),
        credential: "good-key".into(),
        model: "m1".into(),
        ..ProviderConfig::default()
    };
    let text = strategy()
        .generate(&prompt(), &cfg, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(text, "hello from openai");

    let seen = seen.lock().unwrap();
    assert_eq!(seen.bodies[0]["model"], "m1");
    assert_eq!(seen.bodies[0]["messages"].as_array().unwrap().len(), 2);
    assert_eq!(seen.bodies[0]["messages"][1]["role"], "user");
}

#[tokio::test]
async fn gemini_sends_key_as_query_parameter_only() {
    let (base, seen) = spawn_provider();
    let cfg = ProviderConfig {
        kind: ProviderKind::Gemini,
        endpoint: base,
        credential: "gkey".into(),
        model: "test-model".into(),
        ..ProviderConfig::default()
    };
    let text = strategy()
        .generate(&prompt(), &cfg, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(text, "hello from gemini");

    let seen = seen.lock().unwrap();
    assert_eq!(seen.query_keys, vec![Some("gkey".to_string())]);
    assert_eq!(seen.auth, vec![None]);
    assert!(seen.bodies[0]["contents"].is_array());
}

#[tokio::test]
async fn rejected_credential_is_not_retried() {
    let (base, seen) = spawn_provider();
    let cfg = ProviderConfig {
        kind: ProviderKind::OpenAiCompatible,
        endpoint: format!("{}/v1", base),
        credential: "wrong".into(),
        model: "m1".into(),
        retry_count: 2,
        ..ProviderConfig::default()
    };
    let err = strategy()
        .generate(&prompt(), &cfg, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err, ProviderError::InvalidCredential);
    assert_eq!(seen.lock().unwrap().auth.len(), 1);
}

#[tokio::test]
async fn unavailable_provider_is_retried_with_next_key() {
    let (base, seen) = spawn_provider();
    let cfg = ProviderConfig {
        kind: ProviderKind::OpenAiCompatible,
        endpoint: format!("{}/flaky", base),
        credential: "k1, k2".into(),
        model: "m1".into(),
        retry_count: 1,
        ..ProviderConfig::default()
    };
    let text = strategy()
        .generate(&prompt(), &cfg, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(text, "second time lucky");
    assert_eq!(
        seen.lock().unwrap().auth,
        vec![Some("Bearer k1".to_string()), Some("Bearer k2".to_string())]
    );
}

#[tokio::test]
async fn detached_host_falls_through_to_external() {
    let (base, _seen) = spawn_provider();
    let client = ProviderClient::standard(Arc::new(DetachedHost), Arc::new(HttpTransport::new()));
    let cfg = ProviderConfig {
        kind: ProviderKind::Gemini,
        endpoint: base,
        credential: "gkey".into(),
        model: "test-model".into(),
        ..ProviderConfig::default()
    };
    let generation = client
        .execute(&prompt(), &cfg, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(generation.strategy, "external");
    assert_eq!(generation.text, "hello from gemini");
}

#[tokio::test]
async fn unreachable_provider_ends_at_placeholder() {
    let client = ProviderClient::standard(Arc::new(DetachedHost), Arc::new(HttpTransport::new()));
    let cfg = ProviderConfig {
        kind: ProviderKind::OpenAiCompatible,
        endpoint: "http://127.0.0.1:9/v1".into(),
        credential: "k".into(),
        model: "m".into(),
        retry_count: 0,
        ..ProviderConfig::default()
    };
    let generation = client
        .execute(&prompt(), &cfg, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(generation.strategy, "placeholder");
}
