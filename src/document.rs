use async_trait::async_trait;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EngineError;

/// One stored document version, as the persistence collaborator returns it.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct DocumentRecord {
    pub id: i64,
    /// Entity this version belongs to (a draft has many versions).
    pub parent_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Read-only boundary to document storage. The engine itself never calls
/// this; it exists to seed the first content snapshot fed to the engine.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Latest version under `parent_id`, or `None` when none exist yet.
    async fn latest(&self, parent_id: i64) -> Result<Option<DocumentRecord>, EngineError>;

    async fn get(&self, id: i64) -> Result<DocumentRecord, EngineError>;
}

/// REST implementation against the document service.
pub struct HttpDocumentSource {
    base_url: String,
    client: reqwest::Client,
}

impl HttpDocumentSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl DocumentSource for HttpDocumentSource {
    async fn latest(&self, parent_id: i64) -> Result<Option<DocumentRecord>, EngineError> {
        let url = format!("{}/drafts/{}/documents/latest", self.base_url, parent_id);
        debug!(%url, "fetching latest document version");
        let record = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(record)
    }

    async fn get(&self, id: i64) -> Result<DocumentRecord, EngineError> {
        let url = format!("{}/documents/{}", self.base_url, id);
        debug!(%url, "fetching document version");
        Ok(self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_deserializes_from_the_service_shape() {
        let record: DocumentRecord = serde_json::from_str(
            r#"{
                "id": 12,
                "parent_id": 3,
                "content": "A method for aligning widgets.",
                "created_at": "2025-11-02T09:30:00Z",
                "updated_at": "2025-11-02T10:15:00Z"
            }"#,
        )
        .unwrap();
        assert_eq!(record.id, 12);
        assert_eq!(record.parent_id, 3);
        assert!(record.updated_at > record.created_at);
    }

    #[test]
    fn null_latest_means_no_versions_yet() {
        let record: Option<DocumentRecord> = serde_json::from_str("null").unwrap();
        assert!(record.is_none());
    }

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let source = HttpDocumentSource::new("http://localhost:8000/");
        assert_eq!(source.base_url, "http://localhost:8000");
    }
}
