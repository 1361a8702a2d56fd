use tokio::{sync::mpsc::UnboundedSender, task::JoinHandle, time::Duration};
use tracing::{debug, warn};

use crate::message::{AnalysisReply, AnalysisRequest};
use crate::status::CorrelatorStatus;

/// Assigns monotonic request ids, tracks the single outstanding request and
/// applies the reply/timeout policy. One instance per engine; the pending id
/// lives inside the status cell and nowhere else.
///
/// Timer cancellation here is an optimization only. A timer and a reply can
/// race for the same id through the engine inbox; whichever arrives first
/// wins because every handler re-checks the stored pending id.
pub struct Correlator {
    next_id: u64,
    status: CorrelatorStatus,
    timeout: Duration,
    timeout_tx: UnboundedSender<u64>,
    armed: Option<JoinHandle<()>>,
}

impl Correlator {
    /// `timeout_tx` carries the id of an expired request back into the
    /// owning event loop.
    pub fn new(timeout: Duration, timeout_tx: UnboundedSender<u64>) -> Self {
        Self {
            next_id: 0,
            status: CorrelatorStatus::Idle,
            timeout,
            timeout_tx,
            armed: None,
        }
    }

    pub fn status(&self) -> &CorrelatorStatus {
        &self.status
    }

    pub fn pending_id(&self) -> Option<u64> {
        match self.status {
            CorrelatorStatus::Pending(id) => Some(id),
            _ => None,
        }
    }

    /// Stamp the next request and arm its timer. Supersedes any prior
    /// pending request: a later reply or timeout for the orphaned id is a
    /// no-op.
    pub fn dispatch(&mut self, content: impl Into<String>) -> AnalysisRequest {
        self.next_id += 1;
        let id = self.next_id;
        self.status = CorrelatorStatus::Pending(id);
        self.arm(id);
        AnalysisRequest::new(id, content)
    }

    /// Apply one inbound frame. Stale replies are discarded with zero side
    /// effects; an unparseable payload settles as a recoverable processing
    /// error.
    pub fn on_reply(&mut self, frame: &str) {
        let reply = match AnalysisReply::from_frame(frame) {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "malformed analysis reply");
                self.disarm();
                self.status = CorrelatorStatus::ProcessingError;
                return;
            }
        };
        match self.pending_id() {
            Some(id) if id == reply.request_id => {
                self.disarm();
                debug!(
                    request_id = id,
                    issues = reply.suggestions.issues.len(),
                    "analysis reply correlated"
                );
                self.status = CorrelatorStatus::Ready(reply.suggestions);
            }
            pending => {
                debug!(
                    request_id = reply.request_id,
                    ?pending,
                    "ignoring stale analysis reply"
                );
            }
        }
    }

    /// Timer notice for `id`. Only the request that is still pending may
    /// time out; a superseded or answered one ignores its old timer.
    pub fn on_timeout(&mut self, id: u64) {
        if self.pending_id() == Some(id) {
            warn!(
                request_id = id,
                timeout_ms = self.timeout.as_millis() as u64,
                "analysis request timed out"
            );
            self.armed = None;
            self.status = CorrelatorStatus::TimedOut;
        }
    }

    /// Empty-content clear: forget the pending request entirely.
    pub fn clear(&mut self) {
        self.disarm();
        self.status = CorrelatorStatus::Idle;
    }

    /// User dismissal of a settled state. Never touches an in-flight
    /// request.
    pub fn dismiss(&mut self) {
        if matches!(
            self.status,
            CorrelatorStatus::Ready(_) | CorrelatorStatus::TimedOut | CorrelatorStatus::ProcessingError
        ) {
            self.status = CorrelatorStatus::Idle;
        }
    }

    fn arm(&mut self, id: u64) {
        self.disarm();
        let timeout = self.timeout;
        let tx = self.timeout_tx.clone();
        self.armed = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = tx.send(id);
        }));
    }

    fn disarm(&mut self) {
        if let Some(timer) = self.armed.take() {
            timer.abort();
        }
    }
}

impl Drop for Correlator {
    // no timer callback may outlive its correlator
    fn drop(&mut self) {
        self.disarm();
    }
}
