//! Test doubles for the transport seam.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::oneshot;

use crate::api::{ApiClient, ApiError, ApiRequest, RawResponse, Transport};
use crate::auth::{SessionData, SessionStore};
use crate::models::Student;

type Reply = Result<RawResponse, ApiError>;
type Responder = Box<dyn Fn(&ApiRequest) -> Reply + Send + Sync>;

/// A request as the transport saw it.
#[derive(Debug, Clone)]
pub struct Call {
    pub request: ApiRequest,
    pub token: Option<String>,
}

/// Answers immediately from a closure or a fixed sequence.
pub struct ScriptedTransport {
    responder: Responder,
    queue: Mutex<Option<VecDeque<Reply>>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedTransport {
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&ApiRequest) -> Reply + Send + Sync + 'static,
    {
        Arc::new(Self {
            responder: Box::new(responder),
            queue: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Every request succeeds with `data`.
    pub fn ok(data: Value) -> Arc<Self> {
        Self::new(move |_| Ok(envelope(data.clone())))
    }

    /// Replies in order; the last reply repeats once the list runs out.
    pub fn sequence(replies: Vec<Reply>) -> Arc<Self> {
        let last = replies.last().cloned().unwrap_or_else(|| Ok(envelope(Value::Null)));
        let transport = Self::new(move |_| last.clone());
        *transport.queue.lock().unwrap() = Some(replies.into());
        transport
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn count_for(&self, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.request.path == path)
            .count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &ApiRequest, token: Option<&str>) -> Reply {
        self.calls.lock().unwrap().push(Call {
            request: request.clone(),
            token: token.map(str::to_string),
        });
        let queued = self
            .queue
            .lock()
            .unwrap()
            .as_mut()
            .and_then(|q| q.pop_front());
        match queued {
            Some(reply) => reply,
            None => (self.responder)(request),
        }
    }
}

/// Holds every request open until the test answers it by index.
pub struct GatedTransport {
    pending: Mutex<Vec<(Call, Option<oneshot::Sender<Reply>>)>>,
}

impl GatedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            pending: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.pending.lock().unwrap().iter().map(|(c, _)| c.clone()).collect()
    }

    pub fn respond(&self, index: usize, reply: Reply) {
        let sender = self.pending.lock().unwrap()[index].1.take();
        if let Some(sender) = sender {
            let _ = sender.send(reply);
        }
    }
}

#[async_trait]
impl Transport for GatedTransport {
    async fn send(&self, request: &ApiRequest, token: Option<&str>) -> Reply {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().push((
            Call {
                request: request.clone(),
                token: token.map(str::to_string),
            },
            Some(tx),
        ));
        rx.await
            .unwrap_or_else(|_| Err(ApiError::Network("gate dropped".to_string())))
    }
}

/// A 200 response carrying `data` in a successful envelope.
pub fn envelope(data: Value) -> RawResponse {
    RawResponse {
        status: 200,
        body: json!({"success": true, "data": data}).to_string(),
    }
}

/// A failed response with the server's message.
pub fn failure(status: u16, message: &str) -> RawResponse {
    RawResponse {
        status,
        body: json!({"success": false, "message": message}).to_string(),
    }
}

pub fn student(name: &str) -> Student {
    Student {
        id: Some("s-1".to_string()),
        full_name: Some(name.to_string()),
        student_id_number: Some("393211100123".to_string()),
        ..Default::default()
    }
}

pub fn session_with_token(token: &str) -> Arc<SessionStore> {
    let session = SessionStore::in_memory();
    session
        .login(SessionData {
            token: token.to_string(),
            student: student("Aziza Karimova"),
        })
        .unwrap();
    Arc::new(session)
}

/// A logged-in client over the given transport.
pub fn client_with<T: Transport + 'static>(transport: Arc<T>) -> ApiClient {
    ApiClient::new(transport, session_with_token("test-token"))
}

/// Let spawned fetch tasks run to completion.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
