use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::{
    sync::{
        mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
        watch,
    },
    task::JoinHandle,
    time::sleep,
};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMsg};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::OfflinePolicy;
use crate::error::EngineError;

/// Connection lifecycle of the one duplex analysis channel.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChannelState {
    #[default]
    Connecting,
    Open,
    Closed,
}

/// Everything the connection task reports back to the engine loop.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    State(ChannelState),
    /// One inbound UTF-8 text frame. Binary/ping/pong frames never surface.
    Frame(String),
}

/// Handle to the connection task: cheap to clone, owns no IO itself.
#[derive(Clone)]
pub struct AnalysisChannel {
    out_tx: UnboundedSender<String>,
    state_rx: watch::Receiver<ChannelState>,
    policy: OfflinePolicy,
}

impl AnalysisChannel {
    /// Spawn the connection task. State changes and inbound text frames are
    /// delivered on `events`; the returned handle sends, the JoinHandle is
    /// for disposal.
    pub fn spawn(
        url: String,
        reconnect_delay: Duration,
        policy: OfflinePolicy,
        events: UnboundedSender<ChannelEvent>,
    ) -> (Self, JoinHandle<()>) {
        let (out_tx, out_rx) = unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ChannelState::Connecting);
        let task = tokio::spawn(run(url, reconnect_delay, policy, out_rx, state_tx, events));
        (
            Self {
                out_tx,
                state_rx,
                policy,
            },
            task,
        )
    }

    pub fn state(&self) -> ChannelState {
        *self.state_rx.borrow()
    }

    pub fn state_rx(&self) -> watch::Receiver<ChannelState> {
        self.state_rx.clone()
    }

    /// Fire-and-forget send: the frame is handed to the connection task,
    /// never awaited. While the channel is not open, `Drop` refuses the
    /// frame (callers are expected to check state first) and `Queue` leaves
    /// it buffered for the next open connection.
    pub fn send(&self, frame: String) -> Result<(), EngineError> {
        if self.policy == OfflinePolicy::Drop && self.state() != ChannelState::Open {
            return Err(EngineError::ChannelUnavailable);
        }
        self.out_tx
            .send(frame)
            .map_err(|_| EngineError::ChannelUnavailable)
    }
}

/// Connection task: connecting → open → closed → connecting, forever.
/// No backoff, a fixed delay between attempts.
async fn run(
    url: String,
    reconnect_delay: Duration,
    policy: OfflinePolicy,
    mut out_rx: UnboundedReceiver<String>,
    state_tx: watch::Sender<ChannelState>,
    events: UnboundedSender<ChannelEvent>,
) {
    loop {
        let attempt = Uuid::new_v4();
        set_state(&state_tx, &events, ChannelState::Connecting);
        debug!(%attempt, %url, "connecting to analysis service");

        match connect_async(url.as_str()).await {
            Ok((ws, _)) => {
                info!(%attempt, "analysis channel open");
                set_state(&state_tx, &events, ChannelState::Open);
                let (mut write, mut read) = ws.split();
                loop {
                    tokio::select! {
                        frame = out_rx.recv() => match frame {
                            Some(frame) => {
                                if let Err(e) = write.send(WsMsg::Text(frame.into())).await {
                                    warn!(%attempt, error = %e, "send failed, closing connection");
                                    break;
                                }
                            }
                            // every sender is gone: the engine was disposed
                            None => return,
                        },
                        msg = read.next() => match msg {
                            Some(Ok(WsMsg::Text(txt))) => {
                                let _ = events.send(ChannelEvent::Frame(txt.to_string()));
                            }
                            Some(Ok(WsMsg::Close(_))) | None => {
                                info!(%attempt, "analysis channel closed by remote");
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                warn!(%attempt, error = %e, "websocket error");
                                break;
                            }
                        },
                    }
                }
            }
            Err(e) => {
                warn!(%attempt, error = %e, "connect failed");
            }
        }

        set_state(&state_tx, &events, ChannelState::Closed);
        if policy == OfflinePolicy::Drop {
            // frames accepted during the open→closed race are stale now
            while out_rx.try_recv().is_ok() {}
        }
        sleep(reconnect_delay).await;
    }
}

fn set_state(
    state_tx: &watch::Sender<ChannelState>,
    events: &UnboundedSender<ChannelEvent>,
    state: ChannelState,
) {
    state_tx.send_replace(state);
    let _ = events.send(ChannelEvent::State(state));
}
