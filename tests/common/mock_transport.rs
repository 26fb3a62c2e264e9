//! Mock HTTP Transport for Testing
//!
//! Records every request and replays a scripted response.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use furigana::core::{HttpRequest, HttpResponse, HttpTransport};

type Hook = Box<dyn FnOnce() + Send>;

/// Mock transport that records requests
pub struct MockTransport {
    /// All requests that were "sent"
    pub requests: Arc<Mutex<Vec<HttpRequest>>>,
    reply: Mutex<Result<HttpResponse, String>>,
    /// Runs once while the next request is in flight
    in_flight: Mutex<Option<Hook>>,
    /// Holds the next response back until notified
    gate: Mutex<Option<Arc<Notify>>>,
}

impl MockTransport {
    pub fn replying(status: u16, body: &str) -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            reply: Mutex::new(Ok(HttpResponse {
                status,
                body: body.to_string(),
            })),
            in_flight: Mutex::new(None),
            gate: Mutex::new(None),
        }
    }

    /// Fail at the network level
    pub fn failing(reason: &str) -> Self {
        let transport = Self::replying(0, "");
        *transport.reply.lock().unwrap() = Err(reason.to_string());
        transport
    }

    pub fn set_reply(&self, status: u16, body: &str) {
        *self.reply.lock().unwrap() = Ok(HttpResponse {
            status,
            body: body.to_string(),
        });
    }

    /// Run `hook` while the next request is in flight, e.g. to move the
    /// user's selection before the response arrives
    pub fn while_in_flight(&self, hook: impl FnOnce() + Send + 'static) {
        *self.in_flight.lock().unwrap() = Some(Box::new(hook));
    }

    /// Hold the next response until the returned gate is notified. The
    /// response is the reply scripted when the request arrives.
    pub fn hold_next(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn get_requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(request);
        let hook = self.in_flight.lock().unwrap().take();
        if let Some(hook) = hook {
            hook();
        }
        let gate = self.gate.lock().unwrap().take();
        let reply = self.reply.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        reply.map_err(|e| anyhow::anyhow!(e))
    }
}
