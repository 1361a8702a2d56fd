use tokio::{
    sync::{
        mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
        watch,
    },
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    channel::{AnalysisChannel, ChannelEvent, ChannelState},
    config::{EngineConfig, OfflinePolicy},
    correlator::Correlator,
    debounce::{AnalyzeIntent, debounce_loop},
    status::{AnalysisStatus, project},
};

enum Command {
    Dismiss,
}

/// A running analysis engine: feed edits in, observe [`AnalysisStatus`] out.
///
/// All state lives in one event loop; content changes, inbound frames,
/// timer notices and user commands are serialized through its inbox, so
/// every handler runs to completion without locks.
pub struct AnalysisEngine {
    content_tx: UnboundedSender<String>,
    cmd_tx: UnboundedSender<Command>,
    status_rx: watch::Receiver<AnalysisStatus>,
    channel: AnalysisChannel,
    tasks: Vec<JoinHandle<()>>,
}

impl AnalysisEngine {
    /// Spawn the connection task, the debounce loop and the event loop.
    pub fn start(config: EngineConfig) -> Self {
        let (channel_tx, channel_rx) = unbounded_channel();
        let (channel, channel_task) = AnalysisChannel::spawn(
            config.url.clone(),
            config.reconnect_delay(),
            config.offline_policy,
            channel_tx,
        );

        let (content_tx, content_rx) = unbounded_channel();
        let (intent_tx, intent_rx) = unbounded_channel();
        let debounce_task = tokio::spawn(debounce_loop(config.debounce(), content_rx, intent_tx));

        let (timeout_tx, timeout_rx) = unbounded_channel();
        let (cmd_tx, cmd_rx) = unbounded_channel();

        let correlator = Correlator::new(config.analysis_timeout(), timeout_tx);
        let channel_state = channel.state();
        let (status_tx, status_rx) = watch::channel(project(channel_state, correlator.status()));

        let event_loop = EngineLoop {
            channel: channel.clone(),
            channel_state,
            correlator,
            status_tx,
            policy: config.offline_policy,
        };
        let run_task = tokio::spawn(event_loop.run(intent_rx, channel_rx, timeout_rx, cmd_rx));

        info!(url = %config.url, "analysis engine started");
        Self {
            content_tx,
            cmd_tx,
            status_rx,
            channel,
            tasks: vec![channel_task, debounce_task, run_task],
        }
    }

    /// Feed one editor snapshot. Never blocks; the debounce window decides
    /// when (and whether) it reaches the wire.
    pub fn content_changed(&self, content: impl Into<String>) {
        let _ = self.content_tx.send(content.into());
    }

    /// Dismiss a settled ready/timed-out/processing-error status. Has no
    /// effect on an in-flight request.
    pub fn dismiss(&self) {
        let _ = self.cmd_tx.send(Command::Dismiss);
    }

    pub fn status(&self) -> watch::Receiver<AnalysisStatus> {
        self.status_rx.clone()
    }

    pub fn channel_state(&self) -> watch::Receiver<ChannelState> {
        self.channel.state_rx()
    }

    /// Abort every task this engine spawned. Armed timers die with the
    /// event loop, so no late callback can fire after disposal.
    pub fn stop(&self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

struct EngineLoop {
    channel: AnalysisChannel,
    /// Mirror of the last state event; the loop never reads the watch so
    /// that state changes and frames stay ordered through one inbox.
    channel_state: ChannelState,
    correlator: Correlator,
    status_tx: watch::Sender<AnalysisStatus>,
    policy: OfflinePolicy,
}

impl EngineLoop {
    async fn run(
        mut self,
        mut intent_rx: UnboundedReceiver<AnalyzeIntent>,
        mut channel_rx: UnboundedReceiver<ChannelEvent>,
        mut timeout_rx: UnboundedReceiver<u64>,
        mut cmd_rx: UnboundedReceiver<Command>,
    ) {
        loop {
            tokio::select! {
                Some(intent) = intent_rx.recv() => self.on_intent(intent),
                Some(event) = channel_rx.recv() => self.on_channel_event(event),
                Some(id) = timeout_rx.recv() => self.correlator.on_timeout(id),
                Some(cmd) = cmd_rx.recv() => match cmd {
                    Command::Dismiss => self.correlator.dismiss(),
                },
                else => break,
            }
            self.publish();
        }
    }

    fn on_intent(&mut self, intent: AnalyzeIntent) {
        match intent {
            AnalyzeIntent::Clear => self.correlator.clear(),
            AnalyzeIntent::Analyze(content) => {
                if self.channel_state != ChannelState::Open && self.policy == OfflinePolicy::Drop {
                    debug!("channel not open, skipping analysis dispatch");
                    return;
                }
                let request = self.correlator.dispatch(content);
                match request.to_frame() {
                    Ok(frame) => {
                        debug!(request_id = request.request_id, "dispatching analysis request");
                        if let Err(e) = self.channel.send(frame) {
                            debug!(error = %e, "analysis request not sent");
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "could not encode analysis request");
                        self.correlator.clear();
                    }
                }
            }
        }
    }

    fn on_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::State(state) => {
                if state != self.channel_state {
                    info!(?state, "analysis channel state changed");
                    self.channel_state = state;
                }
            }
            ChannelEvent::Frame(frame) => self.correlator.on_reply(&frame),
        }
    }

    fn publish(&self) {
        let status = project(self.channel_state, self.correlator.status());
        self.status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }
}
