//! Shared local HTTP server for webhook tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::routing::any;
use axum::Router;

/// One request seen by the hook.
#[derive(Debug, Clone)]
pub struct Captured {
    pub method: String,
    pub headers: HeaderMap,
    pub body: String,
}

impl Captured {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Records requests and answers with scripted status codes.
#[derive(Debug)]
pub struct Hook {
    requests: Mutex<Vec<Captured>>,
    script: Mutex<VecDeque<u16>>,
    fallback: u16,
}

impl Hook {
    /// Answer every request with `status`.
    pub fn always(status: u16) -> Self {
        Self::scripted(&[], status)
    }

    /// Answer with `first` in order, then `fallback` forever.
    pub fn scripted(first: &[u16], fallback: u16) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            script: Mutex::new(first.iter().copied().collect()),
            fallback,
        }
    }

    pub fn count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<Captured> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last(&self) -> Captured {
        self.requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("hook received no request")
    }
}

async fn record(
    State(hook): State<Arc<Hook>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    hook.requests.lock().unwrap().push(Captured {
        method: method.to_string(),
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    });
    let status = hook.script.lock().unwrap().pop_front().unwrap_or(hook.fallback);
    StatusCode::from_u16(status).unwrap()
}

/// Serve `hook` on an ephemeral local port and return its URL.
pub async fn spawn_hook(hook: Hook) -> (String, Arc<Hook>) {
    let hook = Arc::new(hook);
    let app = Router::new()
        .route("/", any(record))
        .route("/{*path}", any(record))
        .with_state(hook.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    (format!("http://{addr}/hook"), hook)
}

/// URL of a local port with nothing listening on it.
pub async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/hook")
}
