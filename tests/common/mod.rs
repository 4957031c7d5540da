#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::watch;

use droidscan::scanner::http_client::{Payload, Request, Transport};
use droidscan::{ScanError, SessionState, TransportError};

/// Transport that replays scripted responses per path and records every request.
#[derive(Default)]
pub struct StubTransport {
    responses: Mutex<HashMap<String, VecDeque<Result<Payload, TransportError>>>>,
    calls: Mutex<Vec<Request>>,
    observer: Mutex<Option<watch::Receiver<SessionState>>>,
    loading_seen: Mutex<Vec<bool>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, path: &str, response: Result<Payload, TransportError>) {
        self.responses
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(response);
    }

    pub fn push_json(&self, path: &str, body: Value) {
        self.push(path, Ok(Payload::Json(body)));
    }

    pub fn push_error(&self, path: &str, status: u16, message: &str) {
        self.push(path, Err(TransportError::http(status, message)));
    }

    /// Record the controller's `loading` flag at the moment of each request.
    pub fn observe(&self, rx: watch::Receiver<SessionState>) {
        *self.observer.lock().unwrap() = Some(rx);
    }

    pub fn calls(&self) -> Vec<Request> {
        self.calls.lock().unwrap().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.calls().into_iter().map(|r| r.path).collect()
    }

    pub fn count(&self, path: &str) -> usize {
        self.calls().iter().filter(|r| r.path == path).count()
    }

    pub fn loading_seen(&self) -> Vec<bool> {
        self.loading_seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn request(&self, request: Request) -> Result<Payload, ScanError> {
        if let Some(rx) = self.observer.lock().unwrap().as_ref() {
            self.loading_seen.lock().unwrap().push(rx.borrow().loading);
        }
        let path = request.path.clone();
        self.calls.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .get_mut(&path)
            .and_then(|q| q.pop_front())
            .unwrap_or_else(|| Err(TransportError::network(format!("no scripted response for {}", path))))
            .map_err(ScanError::from)
    }
}

pub fn app(package: &str, perms: &[&str]) -> Value {
    let (installer, status) = if perms.is_empty() {
        ("com.android.vending", "Safe")
    } else {
        ("unknown", "Suspicious")
    };
    json!({
        "package": package,
        "installer": installer,
        "status": status,
        "dangerous_permissions": perms,
    })
}

pub fn scan_body(model: &str, apps: Vec<Value>) -> Value {
    json!({
        "device": {
            "model": model,
            "serial": "X1",
            "android_version": "13",
            "battery_info": "100%",
        },
        "apps": apps,
    })
}
