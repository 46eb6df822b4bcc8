#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use relay_api::config::ServerConfig;
use relay_api::router::build_app_router;
use relay_api::state::{AppState, Service};
use relay_core::error::CoreError;
use relay_core::session::Session;
use relay_pipeline::runner::JobRunner;
use tower::ServiceExt;

/// Build a test `ServerConfig` from the given variables on top of the
/// defaults.
pub fn test_config(vars: &[(&str, &str)]) -> ServerConfig {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    ServerConfig::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

pub fn test_state(vars: &[(&str, &str)]) -> AppState {
    AppState::new(test_config(vars))
}

/// Build the full application router with all middleware layers.
pub fn build_test_app(state: AppState) -> Router {
    let config = Arc::clone(&state.config);
    build_app_router(state, &config)
}

pub fn session() -> Session {
    Session {
        user_id: "user-1".into(),
        user_handle: "artist".into(),
        org_id: "org-1".into(),
        session_id: "sess-1".into(),
    }
}

/// Job runner returning a canned outcome and recording prompts.
pub struct FakeRunner {
    outcome: Result<Vec<String>, CoreError>,
    prompts: Mutex<Vec<String>>,
    shutdowns: AtomicUsize,
}

impl FakeRunner {
    pub fn succeeding(images: &[&str]) -> Arc<Self> {
        Self::with_outcome(Ok(images.iter().map(|s| s.to_string()).collect()))
    }

    pub fn failing(error: CoreError) -> Arc<Self> {
        Self::with_outcome(Err(error))
    }

    fn with_outcome(outcome: Result<Vec<String>, CoreError>) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            prompts: Mutex::new(Vec::new()),
            shutdowns: AtomicUsize::new(0),
        })
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobRunner for FakeRunner {
    async fn run(&self, prompt: String) -> Result<Vec<String>, CoreError> {
        self.prompts.lock().unwrap().push(prompt);
        self.outcome.clone()
    }

    async fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

/// Install a logged-in service backed by `runner`.
pub fn install_runner(state: &AppState, runner: Arc<FakeRunner>) {
    state
        .install(Service {
            session: Arc::new(session()),
            runner,
        })
        .unwrap();
}

pub async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    post_raw(app, uri, body.to_string()).await
}

pub async fn post_raw(app: Router, uri: &str, body: String) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// POST as if the connection came from `peer`.
pub async fn post_json_from(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    peer: SocketAddr,
) -> Response {
    let mut request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    request.extensions_mut().insert(ConnectInfo(peer));
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
