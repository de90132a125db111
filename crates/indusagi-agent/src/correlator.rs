//! Request/reply correlation
//!
//! Every outbound request gets a fresh `req-<N>` id and an entry in the
//! in-flight table before its line is written. The entry leaves the table
//! exactly once: when the router hands it its reply, when its deadline
//! passes, or when the process it was sent to exits. Whoever removes the
//! entry owns its completion handle, so a request can never be resolved
//! twice.

use crate::error::{AgentError, Result};
use indusagi_protocol::{Reply, RequestId, encode_request, params_to_map};
use indusagi_transport::Transport;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, oneshot};
use tokio::time::Instant;
use tracing::debug;

/// What the router does with a reply besides completing the request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestKind {
    /// Hand the reply to the caller
    #[default]
    Ordinary,
    /// The reply carries a full state snapshot that replaces the cache
    StateQuery,
}

/// An in-flight request
#[derive(Debug)]
pub struct PendingRequest {
    /// Request id
    pub id: RequestId,
    /// How the reply is treated
    pub kind: RequestKind,
    /// When the request was registered
    pub issued_at: Instant,
    /// Process generation the request was issued against
    pub generation: u64,
    tx: oneshot::Sender<Result<Reply>>,
}

impl PendingRequest {
    /// Complete the request with an agent reply
    ///
    /// Error replies (`error` present or `success: false`) reject the request.
    pub fn resolve(self, reply: Reply) {
        let result = if reply.is_error() {
            Err(AgentError::Rejected {
                id: self.id.clone(),
                message: reply.error_message().unwrap_or_default(),
                command: reply.command,
            })
        } else {
            Ok(reply)
        };
        self.complete(result);
    }

    /// Complete the request with an arbitrary outcome
    pub fn complete(self, result: Result<Reply>) {
        // The caller may have given up already.
        let _ = self.tx.send(result);
    }

    fn terminate(self) {
        let id = self.id.clone();
        self.complete(Err(AgentError::Terminated { id }));
    }
}

/// A registered request whose reply has not been awaited yet
#[derive(Debug)]
pub struct RegisteredRequest {
    id: RequestId,
    deadline: Instant,
    rx: oneshot::Receiver<Result<Reply>>,
}

impl RegisteredRequest {
    /// Id allocated for the request
    pub fn id(&self) -> &RequestId {
        &self.id
    }
}

/// Allocates request ids and matches replies to waiting callers
#[derive(Debug)]
pub struct RequestCorrelator {
    next_id: AtomicU64,
    pending: Mutex<HashMap<RequestId, PendingRequest>>,
    timeout: Duration,
}

impl RequestCorrelator {
    /// Create a correlator with the given per-request timeout
    pub fn new(timeout: Duration) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Allocate the next request id
    ///
    /// The counter is never reset, including across process restarts.
    pub fn allocate_id(&self) -> RequestId {
        RequestId::from_sequence(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Send `command` and wait for its reply
    ///
    /// `params` must be a JSON object or `null`; anything else is rejected
    /// before an id is allocated.
    pub async fn send(
        &self,
        transport: &dyn Transport,
        command: &str,
        params: Value,
    ) -> Result<Reply> {
        self.send_as(transport, RequestKind::Ordinary, command, params)
            .await
    }

    /// Like [`RequestCorrelator::send`], tagging the request with `kind`
    pub async fn send_as(
        &self,
        transport: &dyn Transport,
        kind: RequestKind,
        command: &str,
        params: Value,
    ) -> Result<Reply> {
        let params = params_to_map(params)?;
        let request = self.register(transport.generation(), kind).await;
        self.send_registered(transport, request, command, params).await
    }

    /// Allocate an id and enter it into the in-flight table
    ///
    /// The deadline starts now.
    pub async fn register(&self, generation: u64, kind: RequestKind) -> RegisteredRequest {
        let id = self.allocate_id();
        let issued_at = Instant::now();
        let (tx, rx) = oneshot::channel();

        self.pending.lock().await.insert(
            id.clone(),
            PendingRequest {
                id: id.clone(),
                kind,
                issued_at,
                generation,
                tx,
            },
        );

        RegisteredRequest {
            id,
            deadline: issued_at + self.timeout,
            rx,
        }
    }

    /// Write an already registered request and wait for its reply
    pub async fn send_registered(
        &self,
        transport: &dyn Transport,
        request: RegisteredRequest,
        command: &str,
        params: Map<String, Value>,
    ) -> Result<Reply> {
        let line = match encode_request(command, &request.id, params) {
            Ok(line) => line,
            Err(err) => {
                self.take(&request.id).await;
                return Err(err.into());
            }
        };

        // The deadline also bounds the write: an agent that stops reading
        // stdin must not hang the caller past its timeout.
        match tokio::time::timeout_at(request.deadline, transport.write_line(&line)).await {
            Ok(Ok(())) => debug!(id = %request.id, command, "Sent request"),
            Ok(Err(err)) => {
                self.take(&request.id).await;
                debug!(id = %request.id, command, error = %err, "Request write failed");
                return Err(AgentError::Write(err));
            }
            Err(_) => debug!(id = %request.id, command, "Request write stalled"),
        }

        self.wait(request).await
    }

    async fn wait(&self, request: RegisteredRequest) -> Result<Reply> {
        let RegisteredRequest { id, deadline, mut rx } = request;

        match tokio::time::timeout_at(deadline, &mut rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(AgentError::Terminated { id }),
            Err(_) => {
                if self.take(&id).await.is_some() {
                    debug!(id = %id, "Request timed out");
                    return Err(AgentError::Timeout {
                        id,
                        timeout: self.timeout,
                    });
                }
                // Lost the race: the entry was already taken, so its outcome
                // is on the way.
                match rx.await {
                    Ok(result) => result,
                    Err(_) => Err(AgentError::Terminated { id }),
                }
            }
        }
    }

    /// Remove an entry, handing its completion to the caller
    pub async fn take(&self, id: &RequestId) -> Option<PendingRequest> {
        self.pending.lock().await.remove(id)
    }

    /// Fail every request issued against `generation` or earlier
    ///
    /// Returns how many requests were failed.
    pub async fn fail_generation(&self, generation: u64) -> usize {
        let failed: Vec<PendingRequest> = {
            let mut pending = self.pending.lock().await;
            let ids: Vec<RequestId> = pending
                .values()
                .filter(|p| p.generation <= generation)
                .map(|p| p.id.clone())
                .collect();
            ids.iter().filter_map(|id| pending.remove(id)).collect()
        };

        let count = failed.len();
        for request in failed {
            request.terminate();
        }
        count
    }

    /// Fail every in-flight request
    pub async fn fail_all(&self) -> usize {
        let failed: Vec<PendingRequest> = self.pending.lock().await.drain().map(|(_, p)| p).collect();
        let count = failed.len();
        for request in failed {
            request.terminate();
        }
        count
    }

    /// Number of in-flight requests
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}

impl Default for RequestCorrelator {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_REQUEST_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;
    use serde_json::json;
    use std::sync::Arc;

    fn reply(id: &RequestId, extra: Value) -> Reply {
        let mut value = json!({"type": "response", "id": id.as_str()});
        if let (Some(obj), Value::Object(more)) = (value.as_object_mut(), extra) {
            obj.extend(more);
        }
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_ids_are_monotonic() {
        let correlator = RequestCorrelator::default();
        let ids: Vec<u64> = (0..5)
            .map(|_| correlator.allocate_id().sequence().unwrap())
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_send_resolves_with_reply() {
        let correlator = Arc::new(RequestCorrelator::default());
        let transport = Arc::new(MockTransport::new());

        let task = {
            let correlator = Arc::clone(&correlator);
            let transport = Arc::clone(&transport);
            tokio::spawn(async move {
                correlator
                    .send(&*transport, "set_model", json!({"provider": "openai", "modelId": "o3"}))
                    .await
            })
        };

        let line = transport.next_line().await;
        let sent: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(sent["type"], "set_model");
        assert_eq!(sent["id"], "req-1");
        assert_eq!(sent["modelId"], "o3");

        let id = RequestId::from_sequence(1);
        let pending = correlator.take(&id).await.unwrap();
        pending.resolve(reply(&id, json!({"success": true, "data": {"ok": 1}})));

        let result = task.await.unwrap().unwrap();
        assert_eq!(result.data, Some(json!({"ok": 1})));
        assert_eq!(correlator.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_error_reply_rejects() {
        let correlator = Arc::new(RequestCorrelator::default());
        let request = correlator.register(0, RequestKind::Ordinary).await;
        let id = request.id().clone();

        correlator.take(&id).await.unwrap().resolve(reply(
            &id,
            json!({"command": "fork", "success": false, "error": "no such entry"}),
        ));

        let err = correlator.wait(request).await.unwrap_err();
        assert!(matches!(
            err,
            AgentError::Rejected { ref message, ref command, .. }
                if message == "no such entry" && command.as_deref() == Some("fork")
        ));
    }

    #[tokio::test]
    async fn test_params_must_be_an_object() {
        let correlator = RequestCorrelator::default();
        let transport = MockTransport::new();

        let err = correlator
            .send(&transport, "bash", json!(["ls"]))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Protocol(_)));
        // No id was consumed.
        assert_eq!(correlator.allocate_id(), RequestId::from_sequence(1));
        assert!(transport.lines().await.is_empty());
    }

    #[tokio::test]
    async fn test_write_failure_removes_entry() {
        let correlator = RequestCorrelator::default();
        let transport = MockTransport::new();
        transport.fail_writes(true);

        let err = correlator
            .send(&transport, "get_state", Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Write(_)));
        assert_eq!(correlator.pending_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_removes_entry() {
        let correlator = RequestCorrelator::new(Duration::from_secs(30));
        let transport = MockTransport::new();

        let err = correlator
            .send(&transport, "get_state", Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AgentError::Timeout { ref id, timeout } if id.as_str() == "req-1" && timeout == Duration::from_secs(30)
        ));
        assert_eq!(correlator.pending_count().await, 0);
        assert!(correlator.take(&RequestId::from_sequence(1)).await.is_none());
    }

    /// Transport whose writes never complete, like a full stdin pipe
    struct StalledTransport;

    #[async_trait::async_trait]
    impl Transport for StalledTransport {
        async fn write_line(&self, _line: &str) -> indusagi_transport::Result<()> {
            std::future::pending().await
        }

        fn generation(&self) -> u64 {
            1
        }

        fn mark_ready(&self) {}

        fn state(&self) -> indusagi_transport::ProcessState {
            indusagi_transport::ProcessState::Ready
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_write_times_out() {
        let correlator = RequestCorrelator::new(Duration::from_secs(30));

        let result = tokio::time::timeout(
            Duration::from_secs(120),
            correlator.send(&StalledTransport, "prompt", json!({"message": "hi"})),
        )
        .await
        .expect("send outlived its deadline");

        assert!(matches!(
            result,
            Err(AgentError::Timeout { ref id, .. }) if id.as_str() == "req-1"
        ));
        assert_eq!(correlator.pending_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_taken_before_deadline_wins() {
        let correlator = RequestCorrelator::new(Duration::from_secs(1));
        let request = correlator.register(1, RequestKind::Ordinary).await;
        let id = request.id().clone();

        // Taken but not yet completed when the deadline passes.
        let pending = correlator.take(&id).await.unwrap();
        let completer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            pending.complete(Ok(Reply::default()));
        });

        let result = correlator.wait(request).await;
        assert!(result.is_ok());
        completer.await.unwrap();
    }

    #[tokio::test]
    async fn test_fail_generation_only_hits_older_requests() {
        let correlator = RequestCorrelator::default();
        let old = correlator.register(1, RequestKind::StateQuery).await;
        let current = correlator.register(2, RequestKind::Ordinary).await;

        assert_eq!(correlator.fail_generation(1).await, 1);
        assert_eq!(correlator.pending_count().await, 1);

        let err = correlator.wait(old).await.unwrap_err();
        assert!(matches!(err, AgentError::Terminated { .. }));

        assert_eq!(correlator.fail_all().await, 1);
        let err = correlator.wait(current).await.unwrap_err();
        assert!(matches!(err, AgentError::Terminated { .. }));
        assert_eq!(correlator.pending_count().await, 0);
    }
}
