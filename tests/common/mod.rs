#![allow(dead_code)]

use admission_gate::{
    AppConfig, AppState, Authority, Identity, authority::VALIDATE_PERMISSION_PATH,
};
use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{HeaderMap, Response, StatusCode},
    routing::get,
};
use serde_json::{Value, json};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::net::TcpListener;

// --- Fixtures ---

pub fn identity(user_type: &str) -> Identity {
    Identity {
        user_id: format!("{user_type}-0001"),
        username: format!("{user_type}_user"),
        user_type: user_type.to_string(),
        role: Some(format!("{user_type}_role")),
        status: "active".to_string(),
        real_name: format!("Test {user_type}"),
    }
}

pub fn app_state(authority: impl Authority + 'static) -> AppState {
    AppState {
        authority: Arc::new(authority),
        config: AppConfig::default(),
    }
}

/// The Authority's success envelope for `identity`.
pub fn success_reply(identity: &Identity) -> Value {
    json!({ "code": 0, "message": "", "data": identity })
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// --- Network Helpers ---

/// Serves `router` on an ephemeral local port and returns its base URL.
pub async fn spawn(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://127.0.0.1:{}", port)
}

/// A base URL nothing listens on: the port is bound, read and released.
pub async fn dead_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

/// StubAuthority
///
/// A stand-in auth-service answering the validation endpoint with a canned status
/// and body, recording the headers of every call it receives.
#[derive(Clone)]
pub struct StubAuthority {
    pub status: StatusCode,
    pub body: String,
    pub delay: Duration,
    pub seen: Arc<Mutex<Vec<HeaderMap>>>,
}

impl StubAuthority {
    pub fn replying(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            delay: Duration::ZERO,
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn accepting(identity: &Identity) -> Self {
        Self::replying(StatusCode::OK, success_reply(identity).to_string())
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn last_headers(&self) -> HeaderMap {
        self.seen.lock().unwrap().last().cloned().unwrap_or_default()
    }

    /// Starts the stub and returns its base URL.
    pub async fn start(&self) -> String {
        let router = Router::new()
            .route(VALIDATE_PERMISSION_PATH, get(stub_validate))
            .with_state(self.clone());
        spawn(router).await
    }
}

async fn stub_validate(
    State(stub): State<StubAuthority>,
    headers: HeaderMap,
) -> (StatusCode, [(&'static str, &'static str); 1], String) {
    stub.seen.lock().unwrap().push(headers);
    if !stub.delay.is_zero() {
        tokio::time::sleep(stub.delay).await;
    }
    (
        stub.status,
        [("content-type", "application/json")],
        stub.body.clone(),
    )
}

/// Upstream that echoes what it received, for gateway tests.
pub fn echo_upstream() -> Router {
    async fn echo(
        method: axum::http::Method,
        uri: axum::http::Uri,
        headers: HeaderMap,
        body: String,
    ) -> (StatusCode, Json<Value>) {
        let authorization = headers
            .get("authorization")
            .map(|v| v.to_str().unwrap().to_string());
        let request_id = headers
            .get("x-request-id")
            .map(|v| v.to_str().unwrap().to_string());
        (
            StatusCode::ACCEPTED,
            Json(json!({
                "method": method.as_str(),
                "path": uri.path(),
                "query": uri.query(),
                "authorization": authorization,
                "request_id": request_id,
                "body": body,
            })),
        )
    }

    Router::new().fallback(echo)
}
