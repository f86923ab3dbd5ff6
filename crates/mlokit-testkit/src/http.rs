//! Scripted HTTP handler
//!
//! Responses are keyed by exact (method, url). Each route holds a queue: calls
//! consume entries in order and the final entry repeats for any further calls.
//! A request with no route fails with a transport error naming the request,
//! which keeps typos in test URLs from passing silently.

use async_trait::async_trait;
use mlokit_core::{HttpEffects, HttpMethod, HttpRequest, HttpResponse, MlokitError, Result};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;

type Route = (HttpMethod, String);

#[derive(Debug, Clone)]
enum Scripted {
    Respond(HttpResponse),
    Fail(MlokitError),
}

/// In-memory `HttpEffects` that replays canned responses and records every
/// request it receives.
#[derive(Debug, Default)]
pub struct ScriptedHttp {
    routes: Mutex<HashMap<Route, VecDeque<Scripted>>>,
    recorded: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttp {
    /// Handler with no routes
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, method: HttpMethod, url: &str, scripted: Scripted) -> Self {
        self.routes
            .get_mut()
            .entry((method, url.to_string()))
            .or_default()
            .push_back(scripted);
        self
    }

    /// Queue a raw response
    pub fn on(self, method: HttpMethod, url: &str, response: HttpResponse) -> Self {
        self.push(method, url, Scripted::Respond(response))
    }

    /// Queue a JSON response
    pub fn on_json(self, method: HttpMethod, url: &str, status: u16, body: Value) -> Self {
        let bytes = serde_json::to_vec(&body).unwrap();
        self.on(method, url, HttpResponse::new(status, bytes))
    }

    /// Queue a `200` JSON response to a GET
    pub fn on_get_json(self, url: &str, body: Value) -> Self {
        self.on_json(HttpMethod::Get, url, 200, body)
    }

    /// Queue a bodiless response with `status`
    pub fn on_status(self, method: HttpMethod, url: &str, status: u16) -> Self {
        self.on(method, url, HttpResponse::new(status, Vec::new()))
    }

    /// Queue a handler-level failure (timeout, connection error)
    pub fn on_error(self, method: HttpMethod, url: &str, error: MlokitError) -> Self {
        self.push(method, url, Scripted::Fail(error))
    }

    /// Every request received so far, in order
    pub async fn requests(&self) -> Vec<HttpRequest> {
        self.recorded.lock().await.clone()
    }

    /// Requests whose method matches and whose URL starts with `prefix`
    pub async fn requests_to(&self, method: HttpMethod, prefix: &str) -> Vec<HttpRequest> {
        self.recorded
            .lock()
            .await
            .iter()
            .filter(|request| request.method == method && request.url.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Number of requests received so far
    pub async fn request_count(&self) -> usize {
        self.recorded.lock().await.len()
    }
}

#[async_trait]
impl HttpEffects for ScriptedHttp {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let route = (request.method, request.url.clone());
        self.recorded.lock().await.push(request);

        let mut routes = self.routes.lock().await;
        let scripted = match routes.get_mut(&route) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };

        match scripted {
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::Fail(error)) => Err(error),
            None => {
                tracing::warn!(method = %route.0, url = %route.1, "Unscripted request");
                Err(MlokitError::transport(format!(
                    "no scripted response for {} {}",
                    route.0, route.1
                )))
            }
        }
    }
}
