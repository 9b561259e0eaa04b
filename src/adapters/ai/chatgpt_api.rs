//! ChatGPT Adapter - ChatApi for OpenAI-family chat completion APIs.
//!
//! Talks to OpenAI directly, or to an Azure OpenAI deployment when an
//! endpoint is configured. Media is staged in one of two ways:
//!
//! - frame mode: frames are extracted, uploaded, and referenced by URL,
//!   one user turn per image
//! - video index mode (Azure): the whole video is ingested into an Azure
//!   Computer Vision index that the request references as a data source
//!
//! # Configuration
//!
//! ```ignore
//! let options = ChatGptOptions::new(api_key, "gpt-4o", storage)
//!     .with_extract_video_frames(FrameExtractionOptions::new(extractor));
//!
//! let api = ChatGptApi::new(options)?;
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::http::{read_json, transport_error};
use super::video_retrieval_client::{IngestionRequest, VideoRetrievalClient, VideoRetrievalIndexOptions};
use crate::domain::conversation::{
    CleanupChain, CleanupObligation, CompletionOptions, GenerationParams,
};
use crate::domain::foundation::{ChatError, CleanupError, ConversationId, StagingError};
use crate::domain::media::{
    images_prompt_from_video, upload_images, FrameExtractionOptions, ImageInput, StorageOptions,
};
use crate::ports::{Appendable, BuildPromptOutput, ChatApi};

/// Default base URL of the OpenAI API.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default Azure OpenAI API version.
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-10-21";

/// Option keys that belong to the engine and are rejected by the vendor.
const ENGINE_ONLY_KEYS: &[&str] = &[
    "backoffOnThrottling",
    "backoffOnServerError",
    "backoffOnConnectivityError",
    "backoffOnDownloadError",
    "systemPromptText",
    "startPromptText",
    "maxTokens",
    "deploymentName",
    "extractVideoFrames",
];

const VIDEO_INDEX_DATA_SOURCE: &str = "AzureComputerVisionVideoIndex";

// =============================================================================
// Options
// =============================================================================

/// Configuration for [`ChatGptApi`].
#[derive(Debug, Clone)]
pub struct ChatGptOptions {
    api_key: Secret<String>,
    /// Azure OpenAI endpoint; `None` targets OpenAI.
    pub endpoint: Option<String>,
    /// Model name, or the deployment name on Azure.
    pub model: String,
    /// Azure API version.
    pub api_version: String,
    pub timeout: Duration,
    pub completion_options: CompletionOptions<ChatGptParams>,
    pub storage: StorageOptions,
    pub extract_video_frames: Option<FrameExtractionOptions>,
    pub video_retrieval_index: Option<VideoRetrievalIndexOptions>,
    /// Defaults to the OS temp directory.
    pub tmp_dir: Option<PathBuf>,
}

impl ChatGptOptions {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, storage: StorageOptions) -> Self {
        Self {
            api_key: Secret::new(api_key.into()),
            endpoint: None,
            model: model.into(),
            api_version: DEFAULT_AZURE_API_VERSION.to_string(),
            timeout: Duration::from_secs(120),
            completion_options: CompletionOptions::default(),
            storage,
            extract_video_frames: None,
            video_retrieval_index: None,
            tmp_dir: None,
        }
    }

    /// Targets an Azure OpenAI resource.
    pub fn with_azure_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_completion_options(mut self, options: CompletionOptions<ChatGptParams>) -> Self {
        self.completion_options = options;
        self
    }

    pub fn with_extract_video_frames(mut self, frames: FrameExtractionOptions) -> Self {
        self.extract_video_frames = Some(frames);
        self
    }

    pub fn with_video_retrieval_index(mut self, index: VideoRetrievalIndexOptions) -> Self {
        self.video_retrieval_index = Some(index);
        self
    }

    pub fn with_tmp_dir(mut self, tmp_dir: impl Into<PathBuf>) -> Self {
        self.tmp_dir = Some(tmp_dir.into());
        self
    }
}

/// Chat completion parameters forwarded to the vendor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatGptParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<Value>,
    /// Azure "on your data" sources, such as a video index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_sources: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhancements: Option<Value>,
    /// Any other vendor field.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatGptParams {
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

impl GenerationParams for ChatGptParams {
    fn merge(&self, overrides: &Self) -> Self {
        Self {
            model: overrides.model.clone().or_else(|| self.model.clone()),
            temperature: overrides.temperature.or(self.temperature),
            max_tokens: overrides.max_tokens.or(self.max_tokens),
            top_p: overrides.top_p.or(self.top_p),
            seed: overrides.seed.or(self.seed),
            response_format: overrides
                .response_format
                .clone()
                .or_else(|| self.response_format.clone()),
            data_sources: overrides
                .data_sources
                .clone()
                .or_else(|| self.data_sources.clone()),
            enhancements: overrides
                .enhancements
                .clone()
                .or_else(|| self.enhancements.clone()),
            extra: self.extra.merge(&overrides.extra),
        }
    }
}

// =============================================================================
// Wire types
// =============================================================================

/// One chat turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ChatGptMessage {
    System { content: String },
    User { content: UserContent },
    Assistant { content: String },
}

impl ChatGptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: UserContent::Text(content.into()),
        }
    }

    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self::User {
            content: UserContent::Parts(parts),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
    /// Reference to a document in an Azure video index.
    AcvDocumentId { acv_document_id: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
    pub detail: ImageDetail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageDetail {
    Auto,
    Low,
    High,
}

/// Chat completion response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatGptResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<ChatGptChoice>,
    #[serde(default)]
    pub usage: Option<ChatGptUsage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatGptChoice {
    #[serde(default)]
    pub index: u32,
    pub message: ChatGptResponseMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatGptResponseMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatGptUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

// =============================================================================
// Client
// =============================================================================

/// HTTP client for chat completions.
#[derive(Debug, Clone)]
pub struct ChatGptClient {
    http: Client,
    api_key: Secret<String>,
    endpoint: Option<String>,
    model: String,
    api_version: String,
}

impl ChatGptClient {
    fn new(options: &ChatGptOptions) -> Result<Self, ChatError> {
        let http = Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|e| ChatError::configuration(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            http,
            api_key: options.api_key.clone(),
            endpoint: options
                .endpoint
                .as_ref()
                .map(|e| e.trim_end_matches('/').to_string()),
            model: options.model.clone(),
            api_version: options.api_version.clone(),
        })
    }

    /// Raw reqwest client.
    pub fn http(&self) -> &Client {
        &self.http
    }

    pub fn is_azure(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Chat completions endpoint URL.
    pub fn completions_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                endpoint, self.model, self.api_version
            ),
            None => format!("{}/chat/completions", OPENAI_BASE_URL),
        }
    }

    /// Posts a fully built request body.
    pub async fn create_chat_completion(&self, body: &Value) -> Result<ChatGptResponse, ChatError> {
        let request = self.http.post(self.completions_url()).json(body);
        let request = if self.is_azure() {
            request.header("api-key", self.api_key.expose_secret())
        } else {
            request.bearer_auth(self.api_key.expose_secret())
        };
        let response = request.send().await.map_err(transport_error)?;
        read_json(response).await
    }
}

// =============================================================================
// Adapter
// =============================================================================

#[derive(Debug)]
enum VideoMode {
    Frames(FrameExtractionOptions),
    Index {
        options: VideoRetrievalIndexOptions,
        client: VideoRetrievalClient,
    },
}

/// ChatApi implementation for OpenAI-family chat completion APIs.
#[derive(Debug)]
pub struct ChatGptApi {
    client: ChatGptClient,
    defaults: CompletionOptions<ChatGptParams>,
    storage: StorageOptions,
    video: VideoMode,
    tmp_dir: PathBuf,
}

impl ChatGptApi {
    /// Creates the adapter.
    ///
    /// Exactly one of frame extraction and video index must be configured.
    pub fn new(options: ChatGptOptions) -> Result<Self, ChatError> {
        let video = match (&options.extract_video_frames, &options.video_retrieval_index) {
            (Some(frames), None) => VideoMode::Frames(frames.clone()),
            (None, Some(index)) => VideoMode::Index {
                client: VideoRetrievalClient::from_options(index),
                options: index.clone(),
            },
            (None, None) => {
                return Err(ChatError::configuration(
                    "either extract_video_frames or video_retrieval_index must be configured",
                ))
            }
            (Some(_), Some(_)) => {
                return Err(ChatError::configuration(
                    "extract_video_frames and video_retrieval_index are mutually exclusive",
                ))
            }
        };

        Ok(Self {
            client: ChatGptClient::new(&options)?,
            defaults: CompletionOptions::engine_defaults().merged_with(&options.completion_options),
            storage: options.storage,
            video,
            tmp_dir: options.tmp_dir.unwrap_or_else(std::env::temp_dir),
        })
    }

    /// Builds the request body: vendor params, the prompt, `stream: false`.
    pub fn request_body(
        &self,
        prompt: &[ChatGptMessage],
        params: &ChatGptParams,
    ) -> Result<Value, ChatError> {
        let mut body = match serde_json::to_value(params) {
            Ok(Value::Object(map)) => map,
            Ok(_) => Map::new(),
            Err(e) => return Err(ChatError::parse(format!("Failed to encode options: {}", e))),
        };
        for key in ENGINE_ONLY_KEYS {
            body.remove(*key);
        }
        if !self.client.is_azure() && !body.contains_key("model") {
            body.insert("model".to_string(), Value::String(self.client.model.clone()));
        }
        let uses_video_index = body
            .get("data_sources")
            .and_then(|sources| sources.get(0))
            .and_then(|source| source.get("type"))
            .and_then(Value::as_str)
            == Some(VIDEO_INDEX_DATA_SOURCE);
        if uses_video_index {
            body.insert("enhancements".to_string(), json!({"video": {"enabled": true}}));
        }
        let messages = serde_json::to_value(prompt)
            .map_err(|e| ChatError::parse(format!("Failed to encode prompt: {}", e)))?;
        body.insert("messages".to_string(), messages);
        body.insert("stream".to_string(), Value::Bool(false));
        Ok(Value::Object(body))
    }

    async fn video_index_prompt(
        &self,
        options: &VideoRetrievalIndexOptions,
        client: &VideoRetrievalClient,
        video_file: &Path,
        id: &ConversationId,
    ) -> Result<BuildPromptOutput<ChatGptMessage, ChatGptParams>, ChatError> {
        let staged = upload_images(&self.storage, &[ImageInput::new(video_file)], id).await?;
        let video_url = staged
            .download_urls
            .first()
            .cloned()
            .ok_or_else(|| StagingError::upload("uploader returned no URL for the video"))?;

        let index_name = format!("{}{}", options.index_name_prefix, id);
        if let Err(e) = client
            .create_index(&index_name, &options.create_index_options)
            .await
        {
            let mut chain = CleanupChain::new();
            chain.push_opt(staged.cleanup);
            chain.run_all().await;
            return Err(StagingError::indexing(e.to_string()).into());
        }
        tracing::debug!(index = %index_name, "Created video index");

        let mut chain = CleanupChain::new();
        if options.delete_index_when_conversation_ends {
            let client = client.clone();
            let name = index_name.clone();
            chain.push(CleanupObligation::new(
                format!("delete index {}", index_name),
                move || async move {
                    client
                        .delete_index(&name)
                        .await
                        .map_err(|e| CleanupError::new(format!("delete index {}", name), e))
                },
            ));
        }
        chain.push_opt(staged.cleanup);

        let document_id = id.to_string();
        let ingestion_name = format!("{}-ingestion", index_name);
        let ingested = match client
            .create_ingestion(
                &index_name,
                &ingestion_name,
                &IngestionRequest::single(document_id.clone(), video_url.clone()),
            )
            .await
        {
            Ok(_) => {
                client
                    .wait_for_ingestion(
                        &index_name,
                        &ingestion_name,
                        options.poll_interval,
                        options.max_polls,
                    )
                    .await
            }
            Err(e) => Err(StagingError::indexing(e.to_string())),
        };
        if let Err(e) = ingested {
            chain.run_all().await;
            return Err(e.into());
        }
        tracing::debug!(index = %index_name, video = %video_file.display(), "Video ingested");

        let params = ChatGptParams {
            data_sources: Some(vec![json!({
                "type": VIDEO_INDEX_DATA_SOURCE,
                "parameters": {
                    "computerVisionBaseUrl": format!("{}/computervision", options.endpoint),
                    "computerVisionApiKey": options.api_key(),
                    "indexName": index_name,
                    "videoUrls": [video_url],
                },
            })]),
            enhancements: Some(json!({"video": {"enabled": true}})),
            ..Default::default()
        };

        Ok(BuildPromptOutput::new(vec![ChatGptMessage::user_parts(vec![
            ContentPart::AcvDocumentId {
                acv_document_id: document_id,
            },
        ])])
        .with_options(params)
        .with_cleanup(chain.into_obligation(format!("video index {}", index_name))))
    }
}

#[async_trait]
impl ChatApi for ChatGptApi {
    type Client = ChatGptClient;
    type Message = ChatGptMessage;
    type Response = ChatGptResponse;
    type Params = ChatGptParams;

    fn client(&self) -> &ChatGptClient {
        &self.client
    }

    fn default_options(&self) -> &CompletionOptions<ChatGptParams> {
        &self.defaults
    }

    fn build_text_prompt(&self, text: &str, _conversation_id: Option<&ConversationId>) -> Vec<ChatGptMessage> {
        vec![ChatGptMessage::user(text)]
    }

    async fn build_video_prompt(
        &self,
        video_file: &Path,
        conversation_id: Option<&ConversationId>,
    ) -> Result<BuildPromptOutput<ChatGptMessage, ChatGptParams>, ChatError> {
        let id = conversation_id
            .cloned()
            .unwrap_or_else(ConversationId::temporary);
        match &self.video {
            VideoMode::Frames(frames) => {
                images_prompt_from_video(self, frames, &self.tmp_dir, video_file, &id).await
            }
            VideoMode::Index { options, client } => {
                self.video_index_prompt(options, client, video_file, &id).await
            }
        }
    }

    async fn build_images_prompt(
        &self,
        images: &[ImageInput],
        conversation_id: Option<&ConversationId>,
    ) -> Result<BuildPromptOutput<ChatGptMessage, ChatGptParams>, ChatError> {
        let id = conversation_id
            .cloned()
            .unwrap_or_else(ConversationId::temporary);
        let staged = upload_images(&self.storage, images, &id).await?;

        let prompt = staged
            .download_urls
            .into_iter()
            .zip(images)
            .map(|(url, image)| {
                let mut parts = Vec::with_capacity(2);
                if let Some(text) = image.prompt_text.as_ref().filter(|t| !t.is_empty()) {
                    parts.push(ContentPart::Text { text: text.clone() });
                }
                parts.push(ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url,
                        detail: ImageDetail::Auto,
                    },
                });
                ChatGptMessage::user_parts(parts)
            })
            .collect();

        Ok(BuildPromptOutput::new(prompt).with_cleanup(staged.cleanup))
    }

    fn initial_prompt(&self, options: &CompletionOptions<ChatGptParams>) -> Vec<ChatGptMessage> {
        options
            .system_prompt_text
            .iter()
            .map(|text| ChatGptMessage::system(text.clone()))
            .collect()
    }

    fn append_to_prompt(
        &self,
        addition: Appendable<'_, ChatGptMessage, ChatGptResponse>,
        existing: Option<Vec<ChatGptMessage>>,
    ) -> Vec<ChatGptMessage> {
        let mut prompt = existing.unwrap_or_else(|| self.initial_prompt(&self.defaults));
        match addition {
            Appendable::Turns(turns) => prompt.extend(turns),
            Appendable::Response(response) => prompt.push(ChatGptMessage::assistant(
                self.response_text(response).unwrap_or_default(),
            )),
        }
        prompt
    }

    async fn generate_content(
        &self,
        prompt: &[ChatGptMessage],
        options: &CompletionOptions<ChatGptParams>,
    ) -> Result<ChatGptResponse, ChatError> {
        let body = self.request_body(prompt, &options.params)?;
        self.client.create_chat_completion(&body).await
    }

    fn response_text(&self, response: &ChatGptResponse) -> Option<String> {
        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
    }

    fn is_throttling_error(&self, error: &ChatError) -> bool {
        match error.as_api_error() {
            Some(e) => {
                e.status == Some(429)
                    || matches!(e.code.as_deref(), Some("429" | "TooManyRequests"))
            }
            None => false,
        }
    }

    fn is_server_error(&self, error: &ChatError) -> bool {
        match error.as_api_error() {
            Some(e) => {
                matches!(e.status, Some(500 | 502 | 503 | 504))
                    || matches!(
                        e.code.as_deref(),
                        Some(
                            "500"
                                | "InternalServerError"
                                | "502"
                                | "BadGateway"
                                | "503"
                                | "ServiceUnavailable"
                                | "504"
                                | "GatewayTimeout"
                        )
                    )
            }
            None => false,
        }
    }

    fn is_connectivity_error(&self, error: &ChatError) -> bool {
        error.as_transport_error().is_some()
            || matches!(error.message(), Some("Request timed out." | "Connection error."))
    }

    fn is_download_error(&self, error: &ChatError) -> bool {
        match error.as_api_error() {
            Some(e) if e.status == Some(400) => {
                let message = e.message.to_lowercase();
                e.code.as_deref() == Some("invalid_image_url")
                    || message.contains("invalid image")
                    || message.contains("timeout while downloading")
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{ApiError, TransportErrorKind};
    use crate::ports::{ExtractFramesRequest, ExtractedFrames, FileBatchUploader, UploadedFiles, VideoFramesExtractor};
    use std::sync::{Arc, Mutex};

    struct RecordingUploader {
        calls: Mutex<Vec<(PathBuf, Vec<String>, String, String)>>,
    }

    #[async_trait]
    impl FileBatchUploader for RecordingUploader {
        async fn upload(
            &self,
            dir: &Path,
            relative_paths: &[String],
            container: &str,
            prefix: &str,
        ) -> Result<UploadedFiles, StagingError> {
            self.calls.lock().unwrap().push((
                dir.to_path_buf(),
                relative_paths.to_vec(),
                container.to_string(),
                prefix.to_string(),
            ));
            Ok(UploadedFiles {
                download_urls: relative_paths
                    .iter()
                    .map(|p| format!("https://blob/{}/{}{}", container, prefix, p))
                    .collect(),
                cleanup: CleanupObligation::new("delete uploads", || async { Ok(()) }),
            })
        }
    }

    struct NoFrames;

    #[async_trait]
    impl VideoFramesExtractor for NoFrames {
        async fn extract(&self, _request: &ExtractFramesRequest) -> Result<ExtractedFrames, StagingError> {
            Ok(ExtractedFrames {
                relative_paths: Vec::new(),
                cleanup: CleanupObligation::new("delete frames", || async { Ok(()) }),
            })
        }
    }

    fn uploader() -> Arc<RecordingUploader> {
        Arc::new(RecordingUploader {
            calls: Mutex::new(Vec::new()),
        })
    }

    fn options(uploader: Arc<RecordingUploader>) -> ChatGptOptions {
        ChatGptOptions::new("sk-test", "gpt-4o", StorageOptions::new(uploader, "frames").with_path_prefix("videos/"))
            .with_extract_video_frames(FrameExtractionOptions::new(Arc::new(NoFrames)))
    }

    fn api() -> ChatGptApi {
        ChatGptApi::new(options(uploader())).unwrap()
    }

    fn api_error(status: u16, code: Option<&str>, message: &str) -> ChatError {
        ChatError::Api(ApiError {
            status: Some(status),
            code: code.map(str::to_string),
            message: message.to_string(),
        })
    }

    mod construction {
        use super::*;

        #[test]
        fn requires_a_video_mode() {
            let mut options = options(uploader());
            options.extract_video_frames = None;
            let err = ChatGptApi::new(options).unwrap_err();
            assert!(matches!(err, ChatError::Configuration(_)));
            assert!(err.to_string().contains("extract_video_frames"));
        }

        #[test]
        fn rejects_both_video_modes() {
            let options = options(uploader())
                .with_video_retrieval_index(VideoRetrievalIndexOptions::new("https://cv", "key"));
            assert!(matches!(ChatGptApi::new(options), Err(ChatError::Configuration(_))));
        }

        #[test]
        fn defaults_include_engine_system_prompt() {
            let api = api();
            assert!(api
                .default_options()
                .system_prompt_text
                .as_deref()
                .unwrap()
                .starts_with("You are a helpful assistant who can understand video."));
            assert_eq!(api.default_options().backoff.on_throttling.as_ref().unwrap().len(), 9);
        }

        #[test]
        fn completions_url_for_openai_and_azure() {
            assert_eq!(api().client().completions_url(), "https://api.openai.com/v1/chat/completions");

            let azure = ChatGptApi::new(options(uploader()).with_azure_endpoint("https://res.openai.azure.com/")).unwrap();
            assert_eq!(
                azure.client().completions_url(),
                "https://res.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-10-21"
            );
        }
    }

    mod prompts {
        use super::*;

        #[test]
        fn text_prompt_is_one_user_turn() {
            let prompt = api().build_text_prompt("hello", None);
            assert_eq!(prompt, vec![ChatGptMessage::user("hello")]);
        }

        #[test]
        fn first_append_starts_from_system_turn() {
            let api = api();
            let prompt = api.append_to_prompt(Appendable::Turns(vec![ChatGptMessage::user("hi")]), None);
            assert_eq!(prompt.len(), 2);
            assert!(matches!(prompt[0], ChatGptMessage::System { .. }));
        }

        #[test]
        fn initial_prompt_follows_resolved_system_text() {
            let api = api();
            let options = api
                .default_options()
                .merged_with(&CompletionOptions::new().with_system_prompt_text("Only answer in French."));

            let prompt = api.initial_prompt(&options);

            assert_eq!(prompt, vec![ChatGptMessage::system("Only answer in French.")]);
            assert!(api
                .initial_prompt(&CompletionOptions::default())
                .is_empty());
        }

        #[test]
        fn response_becomes_assistant_turn() {
            let api = api();
            let response = ChatGptResponse {
                id: None,
                model: None,
                choices: vec![],
                usage: None,
            };
            let prompt = api.append_to_prompt(Appendable::Response(&response), Some(vec![]));
            assert_eq!(prompt, vec![ChatGptMessage::assistant("")]);
        }

        #[tokio::test]
        async fn images_prompt_has_one_turn_per_image_with_caption_first() {
            let uploader = uploader();
            let api = ChatGptApi::new(options(Arc::clone(&uploader))).unwrap();
            let id = ConversationId::from_string("conv1").unwrap();
            let images = vec![
                ImageInput::new("/data/shots/a.jpg").with_prompt_text("first shot"),
                ImageInput::new("/data/shots/b.jpg"),
            ];

            let output = api.build_images_prompt(&images, Some(&id)).await.unwrap();

            let json = serde_json::to_value(&output.prompt).unwrap();
            assert_eq!(
                json[0],
                json!({"role": "user", "content": [
                    {"type": "text", "text": "first shot"},
                    {"type": "image_url", "image_url": {"url": "https://blob/frames/videos/conv1/a.jpg", "detail": "auto"}}
                ]})
            );
            assert_eq!(json[1]["content"].as_array().unwrap().len(), 1);
            assert!(output.cleanup.is_some());

            let calls = uploader.calls.lock().unwrap();
            assert_eq!(calls[0].0, PathBuf::from("/data/shots"));
            assert_eq!(calls[0].1, vec!["a.jpg", "b.jpg"]);
            assert_eq!(calls[0].3, "videos/conv1/");
        }

        #[tokio::test]
        async fn kept_uploads_register_no_cleanup() {
            let uploader = uploader();
            let mut options = options(uploader);
            options.storage = options.storage.keep_files();
            let api = ChatGptApi::new(options).unwrap();

            let output = api
                .build_images_prompt(&[ImageInput::new("/tmp/a.png")], None)
                .await
                .unwrap();

            assert!(output.cleanup.is_none());
        }
    }

    mod request_body {
        use super::*;

        #[test]
        fn strips_engine_only_keys_and_disables_streaming() {
            let api = api();
            let mut params = ChatGptParams::default().with_temperature(0.2);
            params.extra.insert("backoffOnThrottling".into(), json!([1, 2]));
            params.extra.insert("systemPromptText".into(), json!("x"));
            params.extra.insert("user".into(), json!("caller"));

            let body = api.request_body(&[ChatGptMessage::user("hi")], &params).unwrap();

            assert_eq!(body["stream"], json!(false));
            assert_eq!(body["model"], json!("gpt-4o"));
            assert_eq!(body["user"], json!("caller"));
            assert!(body.get("backoffOnThrottling").is_none());
            assert!(body.get("systemPromptText").is_none());
            assert_eq!(body["messages"][0], json!({"role": "user", "content": "hi"}));
        }

        #[test]
        fn video_index_data_source_enables_video_enhancement() {
            let api = api();
            let params = ChatGptParams {
                data_sources: Some(vec![json!({"type": "AzureComputerVisionVideoIndex", "parameters": {}})]),
                ..Default::default()
            };

            let body = api.request_body(&[], &params).unwrap();

            assert_eq!(body["enhancements"], json!({"video": {"enabled": true}}));
        }

        #[test]
        fn params_merge_prefers_overrides() {
            let base = ChatGptParams::default().with_temperature(0.0).with_max_tokens(100);
            let merged = base.merge(&ChatGptParams::default().with_temperature(0.7));
            assert_eq!(merged.temperature, Some(0.7));
            assert_eq!(merged.max_tokens, Some(100));
        }
    }

    mod classification {
        use super::*;

        #[test]
        fn throttling_by_status_or_code() {
            let api = api();
            assert!(api.is_throttling_error(&api_error(429, None, "slow down")));
            assert!(api.is_throttling_error(&ChatError::Api(ApiError {
                status: None,
                code: Some("TooManyRequests".into()),
                message: String::new(),
            })));
            assert!(!api.is_throttling_error(&api_error(500, None, "boom")));
        }

        #[test]
        fn server_errors() {
            let api = api();
            for status in [500, 502, 503, 504] {
                assert!(api.is_server_error(&api_error(status, None, "")));
            }
            assert!(!api.is_server_error(&api_error(501, None, "")));
            assert!(!api.is_server_error(&api_error(429, None, "")));
        }

        #[test]
        fn connectivity_errors() {
            let api = api();
            assert!(api.is_connectivity_error(&ChatError::transport(TransportErrorKind::Connect, "Connection error.")));
            assert!(!api.is_connectivity_error(&api_error(500, None, "")));
        }

        #[test]
        fn download_errors() {
            let api = api();
            assert!(api.is_download_error(&api_error(400, Some("BadRequest"), "Invalid image data")));
            assert!(api.is_download_error(&api_error(400, Some("invalid_image_url"), "Timeout while downloading image")));
            assert!(!api.is_download_error(&api_error(400, None, "context too long")));
            assert!(!api.is_download_error(&api_error(500, None, "Invalid image data")));
        }

        #[test]
        fn classify_reports_first_match() {
            let api = api();
            assert_eq!(
                api.classify(&api_error(429, None, "")),
                Some(crate::domain::foundation::ErrorClass::Throttling)
            );
            assert_eq!(api.classify(&ChatError::parse("bad json")), None);
        }
    }
}
