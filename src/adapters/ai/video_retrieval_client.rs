//! Azure Computer Vision video retrieval client.
//!
//! Used by the ChatGPT adapter's video index mode: the whole video is
//! ingested into a per-conversation index that the chat completion request
//! then references as a data source.

use std::time::Duration;

use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};

use super::http::{check_status, read_json, transport_error};
use crate::domain::foundation::{ChatError, StagingError};

/// API version of the retrieval endpoints.
pub const DEFAULT_API_VERSION: &str = "2023-05-01-preview";

/// Options of the video index mode.
#[derive(Debug, Clone)]
pub struct VideoRetrievalIndexOptions {
    /// Computer Vision resource endpoint, without a trailing slash.
    pub endpoint: String,
    pub api_key: Secret<String>,
    pub api_version: String,
    /// Index name is `{prefix}{conversation_id}`.
    pub index_name_prefix: String,
    /// Index created when the conversation starts. Defaults to a vision and
    /// speech index.
    pub create_index_options: CreateIndexOptions,
    pub delete_index_when_conversation_ends: bool,
    pub poll_interval: Duration,
    /// Ingestion is abandoned after this many polls.
    pub max_polls: u32,
}

impl VideoRetrievalIndexOptions {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: Secret::new(api_key.into()),
            api_version: DEFAULT_API_VERSION.to_string(),
            index_name_prefix: String::new(),
            create_index_options: CreateIndexOptions::default(),
            delete_index_when_conversation_ends: true,
            poll_interval: Duration::from_secs(3),
            max_polls: 200,
        }
    }

    pub fn with_index_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.index_name_prefix = prefix.into();
        self
    }

    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls;
        self
    }

    pub fn keep_index(mut self) -> Self {
        self.delete_index_when_conversation_ends = false;
        self
    }

    pub(crate) fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }
}

/// Client for `{endpoint}/computervision/retrieval`.
#[derive(Debug, Clone)]
pub struct VideoRetrievalClient {
    client: Client,
    base_url: String,
    api_key: Secret<String>,
    api_version: String,
}

impl VideoRetrievalClient {
    pub fn new(endpoint: &str, api_key: Secret<String>, api_version: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: format!("{}/computervision/retrieval", endpoint.trim_end_matches('/')),
            api_key,
            api_version: api_version.into(),
        }
    }

    pub fn from_options(options: &VideoRetrievalIndexOptions) -> Self {
        Self::new(&options.endpoint, options.api_key.clone(), options.api_version.clone())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}?api-version={}", self.base_url, path, self.api_version)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header("Ocp-Apim-Subscription-Key", self.api_key.expose_secret())
    }

    pub async fn list_indexes(&self) -> Result<Vec<IndexSummary>, ChatError> {
        let response = self
            .request(reqwest::Method::GET, "/indexes")
            .send()
            .await
            .map_err(transport_error)?;
        let page: Paginated<IndexSummary> = read_json(response).await?;
        Ok(page.value)
    }

    pub async fn get_index(&self, index_name: &str) -> Result<IndexSummary, ChatError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/indexes/{}", index_name))
            .send()
            .await
            .map_err(transport_error)?;
        read_json(response).await
    }

    pub async fn create_index(
        &self,
        index_name: &str,
        options: &CreateIndexOptions,
    ) -> Result<(), ChatError> {
        let response = self
            .request(reqwest::Method::PUT, &format!("/indexes/{}", index_name))
            .json(options)
            .send()
            .await
            .map_err(transport_error)?;
        check_status(response).await?;
        Ok(())
    }

    pub async fn delete_index(&self, index_name: &str) -> Result<(), ChatError> {
        let response = self
            .request(reqwest::Method::DELETE, &format!("/indexes/{}", index_name))
            .send()
            .await
            .map_err(transport_error)?;
        check_status(response).await?;
        Ok(())
    }

    pub async fn list_documents(&self, index_name: &str) -> Result<Vec<DocumentSummary>, ChatError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/indexes/{}/documents", index_name))
            .send()
            .await
            .map_err(transport_error)?;
        let page: Paginated<DocumentSummary> = read_json(response).await?;
        Ok(page.value)
    }

    /// Starts ingesting videos into an index.
    pub async fn create_ingestion(
        &self,
        index_name: &str,
        ingestion_name: &str,
        request: &IngestionRequest,
    ) -> Result<IngestionSummary, ChatError> {
        let response = self
            .request(
                reqwest::Method::PUT,
                &format!("/indexes/{}/ingestions/{}", index_name, ingestion_name),
            )
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;
        read_json(response).await
    }

    pub async fn get_ingestion(
        &self,
        index_name: &str,
        ingestion_name: &str,
    ) -> Result<IngestionSummary, ChatError> {
        let response = self
            .request(
                reqwest::Method::GET,
                &format!("/indexes/{}/ingestions/{}", index_name, ingestion_name),
            )
            .send()
            .await
            .map_err(transport_error)?;
        read_json(response).await
    }

    /// Polls an ingestion until it completes.
    pub async fn wait_for_ingestion(
        &self,
        index_name: &str,
        ingestion_name: &str,
        poll_interval: Duration,
        max_polls: u32,
    ) -> Result<IngestionSummary, StagingError> {
        for poll in 1..=max_polls {
            let summary = self
                .get_ingestion(index_name, ingestion_name)
                .await
                .map_err(|e| StagingError::indexing(e.to_string()))?;
            match summary.state {
                IngestionState::Completed => return Ok(summary),
                IngestionState::Failed | IngestionState::PartiallySucceeded => {
                    return Err(StagingError::indexing(format!(
                        "ingestion {} of index {} ended in state {:?}",
                        ingestion_name, index_name, summary.state
                    )));
                }
                IngestionState::NotStarted | IngestionState::Running | IngestionState::Unknown => {
                    tracing::debug!(index = index_name, poll = poll, state = ?summary.state, "Waiting for ingestion");
                    tokio::time::sleep(poll_interval).await;
                }
            }
        }
        Err(StagingError::indexing(format!(
            "ingestion {} of index {} did not complete after {} polls",
            ingestion_name, index_name, max_polls
        )))
    }
}

#[derive(Debug, Deserialize)]
struct Paginated<T> {
    value: Vec<T>,
    #[serde(default, rename = "nextLink")]
    #[allow(dead_code)]
    next_link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSummary {
    pub name: String,
    #[serde(default)]
    pub features: Vec<IndexFeature>,
    #[serde(default)]
    pub e_tag: Option<String>,
    #[serde(default)]
    pub created_date_time: Option<String>,
    #[serde(default)]
    pub last_modified_date_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub document_id: String,
    #[serde(default)]
    pub document_url: Option<String>,
    #[serde(default)]
    pub created_date_time: Option<String>,
    #[serde(default)]
    pub last_modified_date_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIndexOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_schema: Option<IndexMetadataSchema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<IndexFeature>,
}

impl Default for CreateIndexOptions {
    fn default() -> Self {
        Self {
            metadata_schema: Some(IndexMetadataSchema {
                language: None,
                fields: vec![IndexMetadataSchemaField {
                    name: "timestamp".to_string(),
                    searchable: false,
                    filterable: true,
                    field_type: "datetime".to_string(),
                }],
            }),
            features: vec![
                IndexFeature {
                    name: "vision".to_string(),
                    model_version: None,
                    domain: Some("surveillance".to_string()),
                },
                IndexFeature {
                    name: "speech".to_string(),
                    model_version: None,
                    domain: None,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexFeature {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMetadataSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub fields: Vec<IndexMetadataSchemaField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMetadataSchemaField {
    pub name: String,
    pub searchable: bool,
    pub filterable: bool,
    #[serde(rename = "type")]
    pub field_type: String,
}

/// Body of an ingestion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionRequest {
    pub videos: Vec<VideoIngestion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generate_insight_intervals: Option<bool>,
}

impl IngestionRequest {
    /// Adds a single video as one document.
    pub fn single(document_id: impl Into<String>, document_url: impl Into<String>) -> Self {
        Self {
            videos: vec![VideoIngestion {
                mode: "add".to_string(),
                document_id: document_id.into(),
                document_url: document_url.into(),
            }],
            generate_insight_intervals: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoIngestion {
    pub mode: String,
    pub document_id: String,
    pub document_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum IngestionState {
    NotStarted,
    Running,
    Completed,
    Failed,
    PartiallySucceeded,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionSummary {
    pub name: String,
    pub state: IngestionState,
    #[serde(default)]
    pub batch_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn urls_include_retrieval_path_and_api_version() {
        let client = VideoRetrievalClient::new(
            "https://vision.example.com/",
            Secret::new("key".to_string()),
            DEFAULT_API_VERSION,
        );
        assert_eq!(
            client.url("/indexes/idx"),
            "https://vision.example.com/computervision/retrieval/indexes/idx?api-version=2023-05-01-preview"
        );
    }

    #[test]
    fn default_index_options_enable_vision_and_speech() {
        let value = serde_json::to_value(CreateIndexOptions::default()).unwrap();
        assert_eq!(value["features"][0], json!({"name": "vision", "domain": "surveillance"}));
        assert_eq!(value["features"][1], json!({"name": "speech"}));
        assert_eq!(value["metadataSchema"]["fields"][0]["type"], json!("datetime"));
    }

    #[test]
    fn ingestion_request_adds_one_document() {
        let value = serde_json::to_value(IngestionRequest::single("video", "https://blob/v.mp4")).unwrap();
        assert_eq!(
            value,
            json!({"videos": [{"mode": "add", "documentId": "video", "documentUrl": "https://blob/v.mp4"}]})
        );
    }

    #[test]
    fn unknown_ingestion_state_is_tolerated() {
        let summary: IngestionSummary =
            serde_json::from_str(r#"{"name":"i","state":"Queued"}"#).unwrap();
        assert_eq!(summary.state, IngestionState::Unknown);
    }

    #[test]
    fn options_trim_trailing_slash() {
        let options = VideoRetrievalIndexOptions::new("https://vision.example.com/", "key");
        assert_eq!(options.endpoint, "https://vision.example.com");
        assert!(options.delete_index_when_conversation_ends);
    }
}
