//! Integration tests for the HTTP API facade
//!
//! Boots the full engine against a mock serving endpoint and exercises the
//! documented endpoints over real HTTP.

use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use maestro_engine::config::Config;
use maestro_engine::server;

fn test_config(dir: &TempDir, base_url: &str) -> Config {
    let mut config = Config::default();
    config.core.data_dir = dir.path().to_path_buf();
    config.backends.base_url = base_url.to_string();
    config.routing.stage_timeout_secs = 5;
    config
}

async fn spawn_app(config: &Config) -> String {
    let state = server::build_state(config).await.unwrap();
    let app = server::build_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    format!("http://{}", addr)
}

fn chat_body(content: &str) -> serde_json::Value {
    serde_json::json!({
        "model": "phi3:mini",
        "message": { "role": "assistant", "content": content },
        "done": true
    })
}

#[tokio::test]
async fn test_liveness_probe() {
    let dir = TempDir::new().unwrap();
    let base = spawn_app(&test_config(&dir, "http://localhost:11434")).await;

    let response = reqwest::get(format!("{base}/")).await.unwrap();
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "maestro");
}

#[tokio::test]
async fn test_models_lists_catalog_entries() {
    let dir = TempDir::new().unwrap();
    let base = spawn_app(&test_config(&dir, "http://localhost:11434")).await;

    let body: serde_json::Value = reqwest::get(format!("{base}/v1/models"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["object"], "list");
    let ids: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap())
        .collect();

    assert!(ids.contains(&"orchestrated"));
    assert!(ids.contains(&"phi3"));
    assert!(ids.contains(&"gemma3"));
    assert!(ids.contains(&"qwen3"));

    let qwen = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["id"] == "qwen3")
        .unwrap();
    let caps: Vec<&str> = qwen["capabilities"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c.as_str().unwrap())
        .collect();
    assert!(caps.contains(&"multilingual"));
    assert!(caps.contains(&"complex"));
}

#[tokio::test]
async fn test_chat_completion_runs_the_workflow() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("pipeline output")))
        .mount(&backend)
        .await;

    let dir = TempDir::new().unwrap();
    let base = spawn_app(&test_config(&dir, &backend.uri())).await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{base}/v1/chat/completions"))
        .json(&serde_json::json!({
            "model": "orchestrated",
            "messages": [
                { "role": "system", "content": "be brief" },
                { "role": "user", "content": "summarize this memo" }
            ]
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();

    assert_eq!(body["object"], "chat.completion");
    assert_eq!(body["choices"][0]["message"]["role"], "assistant");
    assert_eq!(body["choices"][0]["message"]["content"], "pipeline output");
    assert_eq!(body["choices"][0]["finish_reason"], "stop");
    assert!(body["usage"]["total_tokens"].as_u64().unwrap() > 0);

    // Intermediate stage outputs are exposed for observability
    assert_eq!(body["workflow"]["status"], "done");
    assert_eq!(body["workflow"]["plan"], "pipeline output");
    assert_eq!(body["workflow"]["review"], "pipeline output");
    assert_eq!(body["workflow"]["decisions"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_chat_completion_without_user_message_is_rejected() {
    let dir = TempDir::new().unwrap();
    let base = spawn_app(&test_config(&dir, "http://localhost:11434")).await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{base}/v1/chat/completions"))
        .json(&serde_json::json!({
            "messages": [{ "role": "system", "content": "be brief" }]
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("no user messages"));
}

#[tokio::test]
async fn test_chat_completion_surfaces_the_failing_stage() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&backend)
        .await;

    let dir = TempDir::new().unwrap();
    let base = spawn_app(&test_config(&dir, &backend.uri())).await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{base}/v1/chat/completions"))
        .json(&serde_json::json!({
            "messages": [{ "role": "user", "content": "summarize this memo" }]
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 500);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"]["stage"], "planning");
}

#[tokio::test]
async fn test_feedback_rating_boundaries() {
    let dir = TempDir::new().unwrap();
    let base = spawn_app(&test_config(&dir, "http://localhost:11434")).await;
    let client = reqwest::Client::new();

    for bad in [0, 6] {
        let response = client
            .post(format!("{base}/v1/feedback"))
            .json(&serde_json::json!({
                "task": "summarize this memo",
                "selected_model": "phi3",
                "rating": bad
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
    }

    // Rejected ratings never reach the store
    let summary: serde_json::Value = reqwest::get(format!("{base}/v1/feedback/summary"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(summary["total_feedback_entries"], 0);
}

#[tokio::test]
async fn test_feedback_summary_reflects_recorded_ratings() {
    let dir = TempDir::new().unwrap();
    let base = spawn_app(&test_config(&dir, "http://localhost:11434")).await;
    let client = reqwest::Client::new();

    for _ in 0..4 {
        let response = client
            .post(format!("{base}/v1/feedback"))
            .json(&serde_json::json!({
                "task": "summarize this memo",
                "selected_model": "qwen3",
                "rating": 5,
                "comments": "spot on"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    let summary: serde_json::Value = reqwest::get(format!("{base}/v1/feedback/summary"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(summary["total_feedback_entries"], 4);
    assert_eq!(summary["backends"]["qwen3"]["count"], 4);
    assert_eq!(summary["backends"]["qwen3"]["mean_rating"], 5.0);
}

#[tokio::test]
async fn test_completed_runs_feed_later_memory_context() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("archived answer")))
        .mount(&backend)
        .await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, &backend.uri());
    let base = spawn_app(&config).await;
    let client = reqwest::Client::new();

    let first = client
        .post(format!("{base}/v1/chat/completions"))
        .json(&serde_json::json!({
            "messages": [{ "role": "user", "content": "catalog the pelican species" }]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), 200);

    // The run's result lands in the memory store used by later runs
    tokio::time::sleep(Duration::from_millis(100)).await;
    let db = maestro_engine::db::Database::new(&config.memory_db_path())
        .await
        .unwrap();
    use maestro_engine::memory::MemoryPort;
    let entries = db
        .memory()
        .retrieve("catalog the pelican species", 5)
        .await
        .unwrap();
    assert!(!entries.is_empty());
    assert!(entries[0].text.contains("archived answer"));
}
