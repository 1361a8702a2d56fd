use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Client → server frame: one snapshot of editor content, stamped with the
/// id the correlator will match the reply against.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct AnalysisRequest {
    pub content: String,
    pub request_id: u64,
}

/// Server → client frame. Transient: correlated, applied, dropped.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct AnalysisReply {
    pub suggestions: Suggestions,
    pub request_id: u64,
}

/// Payload of one reply. The issue list is unordered and may be empty.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
pub struct Suggestions {
    pub issues: Vec<SuggestionIssue>,
}

/// One flagged concern in the analyzed content.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct SuggestionIssue {
    /// Issue category, e.g. "Clarity" or "Antecedent basis".
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: Severity,
    /// Zero-based paragraph index the issue was found in.
    pub paragraph: u32,
    pub description: String,
    /// Remediation text the user can apply.
    pub suggestion: String,
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl AnalysisRequest {
    pub fn new(request_id: u64, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            request_id,
        }
    }

    /// Encode for the wire.
    pub fn to_frame(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl AnalysisReply {
    /// Decode an inbound text frame.
    pub fn from_frame(frame: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(frame)?)
    }
}
