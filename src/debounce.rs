use tokio::{
    sync::mpsc::{UnboundedReceiver, UnboundedSender},
    time::{Duration, Instant, sleep_until},
};
use tracing::trace;

/// What the dispatcher hands the engine once the input settles.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalyzeIntent {
    /// Analyze this snapshot: the most recent value of the quiet window.
    Analyze(String),
    /// Content became empty: drop suggestions and any pending request,
    /// without touching the channel.
    Clear,
}

/// Trailing-edge debounce loop.
///
/// Every non-empty arrival re-arms the deadline to `now + window`; when the
/// deadline elapses exactly one `Analyze` intent carrying the latest value
/// is emitted. Empty or whitespace-only content bypasses the window: the
/// armed deadline (if any) is cancelled and `Clear` goes out immediately.
/// Closing the input channel cancels any armed deadline and ends the loop
/// without emitting.
pub async fn debounce_loop(
    window: Duration,
    mut content_rx: UnboundedReceiver<String>,
    intents: UnboundedSender<AnalyzeIntent>,
) {
    let mut armed: Option<(Instant, String)> = None;
    loop {
        let deadline = armed.as_ref().map(|(deadline, _)| *deadline);
        match deadline {
            Some(deadline) => {
                tokio::select! {
                    changed = content_rx.recv() => match changed {
                        Some(content) => armed = rearm(window, content, &intents),
                        None => return,
                    },
                    _ = sleep_until(deadline) => {
                        if let Some((_, content)) = armed.take() {
                            trace!(len = content.len(), "quiet window elapsed, forwarding snapshot");
                            let _ = intents.send(AnalyzeIntent::Analyze(content));
                        }
                    }
                }
            }
            None => match content_rx.recv().await {
                Some(content) => armed = rearm(window, content, &intents),
                None => return,
            },
        }
    }
}

fn rearm(
    window: Duration,
    content: String,
    intents: &UnboundedSender<AnalyzeIntent>,
) -> Option<(Instant, String)> {
    if content.trim().is_empty() {
        trace!("empty content, clearing immediately");
        let _ = intents.send(AnalyzeIntent::Clear);
        None
    } else {
        Some((Instant::now() + window, content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;
    use tokio::time::advance;

    const WINDOW: Duration = Duration::from_millis(1000);

    fn start() -> (
        UnboundedSender<String>,
        UnboundedReceiver<AnalyzeIntent>,
        tokio::task::JoinHandle<()>,
    ) {
        let (content_tx, content_rx) = unbounded_channel();
        let (intent_tx, intent_rx) = unbounded_channel();
        let task = tokio::spawn(debounce_loop(WINDOW, content_rx, intent_tx));
        (content_tx, intent_rx, task)
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_edits_produces_one_intent_with_the_last_value() {
        let (content_tx, mut intent_rx, _task) = start();
        let started = Instant::now();

        for (at_ms, content) in [(0, "v1"), (100, "v2"), (300, "v3"), (900, "v4")] {
            tokio::time::sleep_until(started + Duration::from_millis(at_ms)).await;
            content_tx.send(content.to_string()).unwrap();
        }

        let intent = intent_rx.recv().await.unwrap();
        assert_eq!(intent, AnalyzeIntent::Analyze("v4".into()));
        // trailing edge: one window after the LAST edit, not the first
        assert_eq!(started.elapsed(), Duration::from_millis(1900));
        assert!(intent_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_content_bypasses_the_window() {
        let (content_tx, mut intent_rx, _task) = start();
        let started = Instant::now();

        content_tx.send("   \n\t".to_string()).unwrap();
        let intent = intent_rx.recv().await.unwrap();
        assert_eq!(intent, AnalyzeIntent::Clear);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_cancels_an_armed_deadline() {
        let (content_tx, mut intent_rx, _task) = start();

        content_tx.send("almost sent".to_string()).unwrap();
        content_tx.send(String::new()).unwrap();

        assert_eq!(intent_rx.recv().await.unwrap(), AnalyzeIntent::Clear);

        // the window elapsing must not resurrect the cancelled snapshot
        advance(WINDOW + Duration::from_millis(100)).await;
        tokio::task::yield_now().await;
        assert!(intent_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_fires_before_the_window_settles() {
        let (content_tx, mut intent_rx, _task) = start();

        content_tx.send("draft".to_string()).unwrap();
        tokio::task::yield_now().await; // let the loop arm its deadline
        advance(Duration::from_millis(999)).await;
        tokio::task::yield_now().await;
        assert!(intent_rx.try_recv().is_err());

        advance(Duration::from_millis(1)).await;
        assert_eq!(
            intent_rx.recv().await.unwrap(),
            AnalyzeIntent::Analyze("draft".into())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn disposal_cancels_without_emitting() {
        let (content_tx, mut intent_rx, task) = start();

        content_tx.send("never sent".to_string()).unwrap();
        drop(content_tx);

        task.await.unwrap();
        assert!(intent_rx.try_recv().is_err());
    }
}
