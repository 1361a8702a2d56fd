//! End-to-end tests against a real in-process websocket reviewer.
//!
//! The fake reviewer answers every request with one canned issue, except:
//! content containing "stall" is never answered (the client times out) and
//! content containing "hangup" makes it drop the whole connection (the
//! client reconnects).

use std::time::Duration;

use draftlens::{
    AnalysisEngine, AnalysisStatus, ChannelState, EngineConfig, OfflinePolicy, Severity,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::time::timeout;
use tokio_tungstenite::{accept_async, tungstenite::Message as WsMsg};

const WAIT: Duration = Duration::from_secs(5);

async fn spawn_reviewer() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(serve_connection(stream));
        }
    });
    format!("ws://{addr}")
}

async fn serve_connection(stream: TcpStream) {
    let Ok(ws) = accept_async(stream).await else {
        return;
    };
    let (mut write, mut read) = ws.split();
    while let Some(Ok(WsMsg::Text(txt))) = read.next().await {
        let Ok(request) = serde_json::from_str::<serde_json::Value>(&txt) else {
            continue;
        };
        let content = request["content"].as_str().unwrap_or_default().to_string();
        if content.contains("stall") {
            continue;
        }
        if content.contains("hangup") {
            return;
        }
        let reply = json!({
            "suggestions": {
                "issues": [{
                    "type": "Clarity",
                    "severity": "medium",
                    "paragraph": 0,
                    "description": "Sentence is hard to follow.",
                    "suggestion": "Split it in two."
                }]
            },
            "request_id": request["request_id"],
        });
        if write.send(WsMsg::Text(reply.to_string().into())).await.is_err() {
            return;
        }
    }
}

fn quick_config(url: String) -> EngineConfig {
    EngineConfig {
        url,
        debounce_ms: 50,
        analysis_timeout_ms: 400,
        reconnect_delay_ms: 200,
        offline_policy: OfflinePolicy::Drop,
    }
}

async fn wait_state(rx: &mut watch::Receiver<ChannelState>, want: ChannelState) {
    timeout(WAIT, async {
        while *rx.borrow_and_update() != want {
            rx.changed().await.expect("channel task ended");
        }
    })
    .await
    .expect("channel state never reached");
}

async fn wait_status<F>(rx: &mut watch::Receiver<AnalysisStatus>, mut pred: F) -> AnalysisStatus
where
    F: FnMut(&AnalysisStatus) -> bool,
{
    timeout(WAIT, async {
        loop {
            {
                let current = rx.borrow_and_update();
                if pred(&current) {
                    return current.clone();
                }
            }
            rx.changed().await.expect("engine ended");
        }
    })
    .await
    .expect("status never settled")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn edits_round_trip_into_suggestions() {
    let url = spawn_reviewer().await;
    let engine = AnalysisEngine::start(quick_config(url));
    let mut state = engine.channel_state();
    let mut status = engine.status();

    wait_state(&mut state, ChannelState::Open).await;

    engine.content_changed("The apparatus comprises a sensor.");
    let settled = wait_status(&mut status, |s| matches!(s, AnalysisStatus::Ready { .. })).await;
    let AnalysisStatus::Ready { suggestions } = settled else {
        unreachable!()
    };
    assert_eq!(suggestions.issues.len(), 1);
    assert_eq!(suggestions.issues[0].severity, Severity::Medium);
    assert_eq!(suggestions.issues[0].paragraph, 0);

    engine.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn silent_reviewer_times_out_and_dismisses() {
    let url = spawn_reviewer().await;
    let engine = AnalysisEngine::start(quick_config(url));
    let mut state = engine.channel_state();
    let mut status = engine.status();

    wait_state(&mut state, ChannelState::Open).await;

    engine.content_changed("please stall on this one");
    wait_status(&mut status, |s| matches!(s, AnalysisStatus::TimedOut)).await;

    engine.dismiss();
    wait_status(&mut status, |s| matches!(s, AnalysisStatus::Idle)).await;

    engine.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn empty_content_clears_immediately() {
    let url = spawn_reviewer().await;
    let engine = AnalysisEngine::start(quick_config(url));
    let mut state = engine.channel_state();
    let mut status = engine.status();

    wait_state(&mut state, ChannelState::Open).await;

    engine.content_changed("A draft worth reviewing.");
    wait_status(&mut status, |s| matches!(s, AnalysisStatus::Ready { .. })).await;

    engine.content_changed("   ");
    wait_status(&mut status, |s| matches!(s, AnalysisStatus::Idle)).await;

    engine.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dropped_connection_reconnects_and_recovers() {
    let url = spawn_reviewer().await;
    let engine = AnalysisEngine::start(quick_config(url));
    let mut state = engine.channel_state();
    let mut status = engine.status();

    wait_state(&mut state, ChannelState::Open).await;

    // the reviewer hangs up on this request mid-flight
    engine.content_changed("hangup now");
    wait_state(&mut state, ChannelState::Closed).await;
    wait_status(&mut status, |s| matches!(s, AnalysisStatus::ChannelUnavailable)).await;

    // unconditional retry brings the channel back on a fresh connection
    wait_state(&mut state, ChannelState::Open).await;

    engine.content_changed("recovered draft");
    wait_status(&mut status, |s| matches!(s, AnalysisStatus::Ready { .. })).await;

    engine.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn queue_policy_flushes_after_the_service_comes_up() {
    // reserve a port, then leave it dark until after the first dispatch
    let probe = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = probe.local_addr().expect("local addr");
    drop(probe);

    let mut config = quick_config(format!("ws://{addr}"));
    config.offline_policy = OfflinePolicy::Queue;
    config.analysis_timeout_ms = 3000;
    let engine = AnalysisEngine::start(config);
    let mut status = engine.status();

    // dispatched into the void: the frame sits in the queue, the request is
    // pending, and the projection still reads unavailable
    engine.content_changed("written while offline");
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(matches!(
        *status.borrow_and_update(),
        AnalysisStatus::ChannelUnavailable
    ));

    // now the reviewer appears on the reserved port
    let listener = TcpListener::bind(addr).await.expect("rebind");
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(serve_connection(stream));
        }
    });

    let settled = wait_status(&mut status, |s| matches!(s, AnalysisStatus::Ready { .. })).await;
    let AnalysisStatus::Ready { suggestions } = settled else {
        unreachable!()
    };
    assert_eq!(suggestions.issues.len(), 1);

    engine.stop();
}
