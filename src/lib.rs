//! draftlens: real-time draft analysis over a persistent duplex channel.
//!
//! Feed editor snapshots into an [`engine::AnalysisEngine`] and observe one
//! [`status::AnalysisStatus`] value out. The engine debounces edits, stamps
//! each outgoing request with a strictly increasing id, correlates the
//! asynchronous replies against the single pending id, enforces a
//! per-request timeout and tracks the channel's connection lifecycle.

pub mod channel;
pub mod config;
pub mod correlator;
pub mod debounce;
pub mod document;
pub mod engine;
pub mod error;
pub mod logger;
pub mod message;
pub mod status;

pub use channel::ChannelState;
pub use config::{EngineConfig, OfflinePolicy};
pub use engine::AnalysisEngine;
pub use error::EngineError;
pub use message::{AnalysisReply, AnalysisRequest, Severity, SuggestionIssue, Suggestions};
pub use status::AnalysisStatus;
