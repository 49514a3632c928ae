//! End-to-end test against a live Ollama-compatible inference endpoint.
//!
//! Requires a running backend; set `OLLAMA_URL` (and optionally
//! `OLLAMA_MODEL`) and run with `cargo test -- --ignored`.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;

use inference_gate::config::GateConfig;
use inference_gate::core::TransientError;
use inference_gate::gate::{Backend, GateReply, InferenceGate};
use inference_gate::runtime::TokioSpawner;
use inference_gate::util::init_tracing;

#[derive(Debug, Error)]
enum OllamaError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected response shape")]
    BadResponse,
}

impl TransientError for OllamaError {
    fn breaker_worthy(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::BadResponse => false,
        }
    }
}

struct OllamaBackend {
    client: reqwest::Client,
    url: String,
    model: String,
}

#[async_trait]
impl Backend for OllamaBackend {
    type Error = OllamaError;

    async fn infer(&self, input: &str) -> Result<String, OllamaError> {
        let body = json!({
            "model": self.model,
            "prompt": input,
            "stream": false,
        });
        let resp = self
            .client
            .post(format!("{}/api/generate", self.url))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        let value: serde_json::Value = resp.json().await?;
        value["response"]
            .as_str()
            .map(str::to_owned)
            .ok_or(OllamaError::BadResponse)
    }
}

#[tokio::test]
#[ignore = "needs a live Ollama-compatible endpoint; set OLLAMA_URL"]
async fn serialized_inference_through_the_gate() {
    init_tracing();
    let url = match env::var("OLLAMA_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("Skipping test: OLLAMA_URL environment variable not set");
            return;
        }
    };
    let model = env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama3.2".to_string());

    let backend = OllamaBackend {
        client: reqwest::Client::new(),
        url,
        model,
    };
    let cfg = GateConfig {
        merge_window_ms: 100,
        request_timeout_ms: 60_000,
        ..GateConfig::default()
    };
    let gate = Arc::new(InferenceGate::new(&cfg, backend, TokioSpawner::current()));

    // Three callers at once; the single global slot serializes them.
    let mut handles = Vec::new();
    for caller in ["alice", "bob", "carol"] {
        let gate = Arc::clone(&gate);
        handles.push(tokio::spawn(async move {
            gate.handle(caller, "Reply with the single word: pong").await
        }));
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    for h in handles {
        match h.await.unwrap() {
            Ok(GateReply::Answer(text)) => assert!(!text.is_empty()),
            Ok(GateReply::Coalesced) => panic!("distinct callers must not coalesce"),
            Err(e) => panic!("live inference failed: {e}"),
        }
    }

    let snap = gate.snapshot();
    assert_eq!(snap.global_in_flight, 0);
    assert_eq!(snap.global_queue_len, 0);
}
