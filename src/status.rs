use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::channel::ChannelState;
use crate::message::Suggestions;

/// Correlator-side view of the single outstanding request. The `Pending`
/// variant IS the pending-id cell; there is no second copy of the id
/// anywhere, so a handler can never act on a stale one.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CorrelatorStatus {
    #[default]
    Idle,
    Pending(u64),
    Ready(Suggestions),
    TimedOut,
    ProcessingError,
}

/// What the host UI observes. Replaced wholesale on each transition, never
/// merged.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisStatus {
    /// The channel is connecting or closed; nothing can be sent. Clears on
    /// the next successful handshake.
    ChannelUnavailable,
    #[default]
    Idle,
    Analyzing {
        request_id: u64,
    },
    Ready {
        suggestions: Suggestions,
    },
    TimedOut,
    ProcessingError,
}

/// Pure projection of channel state and correlator state. Recomputed after
/// every handled event; observers never mutate it.
pub fn project(channel: ChannelState, correlator: &CorrelatorStatus) -> AnalysisStatus {
    if channel != ChannelState::Open {
        return AnalysisStatus::ChannelUnavailable;
    }
    match correlator {
        CorrelatorStatus::Idle => AnalysisStatus::Idle,
        CorrelatorStatus::Pending(id) => AnalysisStatus::Analyzing { request_id: *id },
        CorrelatorStatus::Ready(suggestions) => AnalysisStatus::Ready {
            suggestions: suggestions.clone(),
        },
        CorrelatorStatus::TimedOut => AnalysisStatus::TimedOut,
        CorrelatorStatus::ProcessingError => AnalysisStatus::ProcessingError,
    }
}
