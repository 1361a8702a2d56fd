use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use draftlens::{
    AnalysisEngine, AnalysisStatus, EngineConfig, OfflinePolicy,
    document::{DocumentSource, HttpDocumentSource},
    logger::init_tracing,
};
use tokio::io::{AsyncBufReadExt, BufReader, stdin};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "draftlens",
    about = "Live draft analysis over a duplex channel",
    version
)]
struct Cli {
    /// Analysis service websocket URL
    #[arg(long)]
    url: Option<String>,

    /// Quiescence window before an edit is sent, in milliseconds
    #[arg(long)]
    debounce_ms: Option<u64>,

    /// Per-request reply timeout, in milliseconds
    #[arg(long)]
    analysis_timeout_ms: Option<u64>,

    /// Delay between reconnect attempts, in milliseconds
    #[arg(long)]
    reconnect_delay_ms: Option<u64>,

    /// Buffer outbound frames while disconnected instead of dropping them
    #[arg(long)]
    queue_offline: bool,

    /// Document service base URL used to seed the first snapshot
    #[arg(long)]
    document_api: Option<String>,

    /// Entity whose latest stored version seeds the editor
    #[arg(long)]
    parent_id: Option<i64>,

    /// Optional log level override (e.g. error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Optional directory for rolling log files
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> (EngineConfig, Option<(String, i64)>) {
        let mut config = EngineConfig::from_env();
        if let Some(url) = self.url {
            config.url = url;
        }
        if let Some(ms) = self.debounce_ms {
            config.debounce_ms = ms;
        }
        if let Some(ms) = self.analysis_timeout_ms {
            config.analysis_timeout_ms = ms;
        }
        if let Some(ms) = self.reconnect_delay_ms {
            config.reconnect_delay_ms = ms;
        }
        if self.queue_offline {
            config.offline_policy = OfflinePolicy::Queue;
        }
        let seed = match (self.document_api, self.parent_id) {
            (Some(base), Some(parent)) => Some((base, parent)),
            _ => None,
        };
        (config, seed)
    }
}

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let _guard = init_tracing(&cli.log_level, cli.log_dir.clone())?;

    let (config, seed) = cli.into_config();
    let engine = AnalysisEngine::start(config);

    // Render every status transition the way a host UI would.
    let mut status_rx = engine.status();
    tokio::spawn(async move {
        loop {
            render(&status_rx.borrow_and_update().clone());
            if status_rx.changed().await.is_err() {
                break;
            }
        }
    });

    if let Some((base, parent)) = seed {
        let source = HttpDocumentSource::new(base);
        match source.latest(parent).await {
            Ok(Some(record)) => {
                info!(document = record.id, "seeded from latest stored version");
                engine.content_changed(record.content);
            }
            Ok(None) => info!(parent, "no stored versions yet, starting empty"),
            Err(e) => warn!(error = %e, "could not seed initial content"),
        }
    }

    println!("draftlens: every line is one editor snapshot; an empty line clears; `/dismiss` dismisses; Ctrl-C quits");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        result = read_edits(&engine) => result?,
    }

    engine.stop();
    Ok(())
}

/// Each stdin line stands in for one editor snapshot.
async fn read_edits(engine: &AnalysisEngine) -> Result<()> {
    let mut lines = BufReader::new(stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim() == "/dismiss" {
            engine.dismiss();
        } else {
            engine.content_changed(line);
        }
    }
    Ok(())
}

fn render(status: &AnalysisStatus) {
    match status {
        AnalysisStatus::ChannelUnavailable => {
            println!("! analysis service unreachable, reconnecting")
        }
        AnalysisStatus::Idle => println!("- idle"),
        AnalysisStatus::Analyzing { request_id } => {
            println!("~ analyzing (request {request_id})")
        }
        AnalysisStatus::Ready { suggestions } => {
            println!("= {} suggestion(s)", suggestions.issues.len());
            for issue in &suggestions.issues {
                println!(
                    "  [{:?}] {} (paragraph {}): {} -> {}",
                    issue.severity, issue.kind, issue.paragraph, issue.description, issue.suggestion
                );
            }
        }
        AnalysisStatus::TimedOut => {
            println!("! analysis timed out; edit again or `/dismiss`")
        }
        AnalysisStatus::ProcessingError => {
            println!("! could not process the analysis reply; edit again or `/dismiss`")
        }
    }
}
