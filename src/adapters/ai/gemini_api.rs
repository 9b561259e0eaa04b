//! Gemini Adapter - ChatApi for Google's Generative Language API.
//!
//! Images are sent inline as base64 parts, so no remote storage is needed.
//! Videos are always staged as extracted frames.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use futures::stream::{self, StreamExt, TryStreamExt};
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::http::{read_json, transport_error};
use crate::domain::conversation::{CompletionOptions, GenerationParams};
use crate::domain::foundation::{ChatError, ConversationId, StagingError};
use crate::domain::media::{images_prompt_from_video, FrameExtractionOptions, ImageInput};
use crate::ports::{Appendable, BuildPromptOutput, ChatApi};

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_API_VERSION: &str = "v1beta";

/// Images read and encoded at the same time.
const IMAGE_READ_CONCURRENCY: usize = 5;

/// Configuration for [`GeminiApi`].
#[derive(Debug, Clone)]
pub struct GeminiOptions {
    api_key: Secret<String>,
    pub model: String,
    pub base_url: String,
    pub api_version: String,
    pub timeout: Duration,
    pub completion_options: CompletionOptions<GeminiParams>,
    pub extract_video_frames: FrameExtractionOptions,
    pub tmp_dir: Option<PathBuf>,
}

impl GeminiOptions {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        extract_video_frames: FrameExtractionOptions,
    ) -> Self {
        Self {
            api_key: Secret::new(api_key.into()),
            model: model.into(),
            base_url: GEMINI_BASE_URL.to_string(),
            api_version: DEFAULT_GEMINI_API_VERSION.to_string(),
            timeout: Duration::from_secs(120),
            completion_options: CompletionOptions::default(),
            extract_video_frames,
            tmp_dir: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
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

    pub fn with_completion_options(mut self, options: CompletionOptions<GeminiParams>) -> Self {
        self.completion_options = options;
        self
    }

    pub fn with_tmp_dir(mut self, tmp_dir: impl Into<PathBuf>) -> Self {
        self.tmp_dir = Some(tmp_dir.into());
        self
    }
}

// =============================================================================
// Parameters
// =============================================================================

/// Request fields other than `contents` and `systemInstruction`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safety_settings: Option<Vec<SafetySetting>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_config: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_content: Option<String>,
}

impl GeminiParams {
    pub fn with_generation_config(mut self, config: GenerationConfig) -> Self {
        self.generation_config = Some(config);
        self
    }

    pub fn with_safety_setting(mut self, setting: SafetySetting) -> Self {
        self.safety_settings.get_or_insert_with(Vec::new).push(setting);
        self
    }
}

impl GenerationParams for GeminiParams {
    fn merge(&self, overrides: &Self) -> Self {
        let generation_config = match (&self.generation_config, &overrides.generation_config) {
            (Some(base), Some(over)) => Some(base.merge(over)),
            (base, over) => over.clone().or_else(|| base.clone()),
        };
        let safety_settings = match (&self.safety_settings, &overrides.safety_settings) {
            (Some(base), Some(over)) => Some(merge_safety_settings(base, over)),
            (base, over) => over.clone().or_else(|| base.clone()),
        };
        Self {
            generation_config,
            safety_settings,
            tools: overrides.tools.clone().or_else(|| self.tools.clone()),
            tool_config: overrides
                .tool_config
                .clone()
                .or_else(|| self.tool_config.clone()),
            cached_content: overrides
                .cached_content
                .clone()
                .or_else(|| self.cached_content.clone()),
        }
    }
}

/// Settings of the same category are replaced, new ones appended.
fn merge_safety_settings(base: &[SafetySetting], overrides: &[SafetySetting]) -> Vec<SafetySetting> {
    let mut merged = base.to_vec();
    for setting in overrides {
        match merged.iter_mut().find(|s| s.category == setting.category) {
            Some(existing) => *existing = setting.clone(),
            None => merged.push(setting.clone()),
        }
    }
    merged
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GenerationConfig {
    fn merge(&self, overrides: &Self) -> Self {
        Self {
            temperature: overrides.temperature.or(self.temperature),
            top_p: overrides.top_p.or(self.top_p),
            top_k: overrides.top_k.or(self.top_k),
            candidate_count: overrides.candidate_count.or(self.candidate_count),
            max_output_tokens: overrides.max_output_tokens.or(self.max_output_tokens),
            stop_sequences: overrides
                .stop_sequences
                .clone()
                .or_else(|| self.stop_sequences.clone()),
            response_mime_type: overrides
                .response_mime_type
                .clone()
                .or_else(|| self.response_mime_type.clone()),
            extra: self.extra.merge(&overrides.extra),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetySetting {
    /// e.g. `HARM_CATEGORY_HARASSMENT`.
    pub category: String,
    /// e.g. `BLOCK_ONLY_HIGH`.
    pub threshold: String,
}

impl SafetySetting {
    pub fn new(category: impl Into<String>, threshold: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            threshold: threshold.into(),
        }
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeminiRole {
    User,
    Model,
}

/// One conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiContent {
    pub role: GeminiRole,
    pub parts: Vec<GeminiPart>,
}

impl GeminiContent {
    pub fn user(parts: Vec<GeminiPart>) -> Self {
        Self {
            role: GeminiRole::User,
            parts,
        }
    }

    pub fn model(parts: Vec<GeminiPart>) -> Self {
        Self {
            role: GeminiRole::Model,
            parts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    /// Any other part kind (`functionCall`, `executableCode`, ...), kept as-is.
    Other(Value),
}

impl GeminiPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::InlineData { .. } | Self::Other(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    /// Base64-encoded bytes.
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: &'a [GeminiContent],
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    #[serde(flatten)]
    params: &'a GeminiParams,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    pub usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    pub prompt_feedback: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiCandidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Candidate content; the role may be missing on blocked candidates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub role: Option<GeminiRole>,
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: u32,
    #[serde(default)]
    pub total_token_count: u32,
}

// =============================================================================
// Client
// =============================================================================

/// HTTP client for `generateContent`.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    api_key: Secret<String>,
    base_url: String,
    api_version: String,
    model: String,
}

impl GeminiClient {
    fn new(options: &GeminiOptions) -> Result<Self, ChatError> {
        let http = Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|e| ChatError::configuration(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            http,
            api_key: options.api_key.clone(),
            base_url: options.base_url.trim_end_matches('/').to_string(),
            api_version: options.api_version.clone(),
            model: options.model.clone(),
        })
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn generate_content_url(&self) -> String {
        format!(
            "{}/{}/models/{}:generateContent",
            self.base_url, self.api_version, self.model
        )
    }

    async fn generate_content(&self, body: &GenerateContentRequest<'_>) -> Result<GenerateContentResponse, ChatError> {
        let response = self
            .http
            .post(self.generate_content_url())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        read_json(response).await
    }
}

// =============================================================================
// Adapter
// =============================================================================

/// ChatApi implementation for Gemini.
#[derive(Debug)]
pub struct GeminiApi {
    client: GeminiClient,
    defaults: CompletionOptions<GeminiParams>,
    frames: FrameExtractionOptions,
    tmp_dir: PathBuf,
}

impl GeminiApi {
    pub fn new(options: GeminiOptions) -> Result<Self, ChatError> {
        Ok(Self {
            client: GeminiClient::new(&options)?,
            defaults: CompletionOptions::engine_defaults().merged_with(&options.completion_options),
            frames: options.extract_video_frames,
            tmp_dir: options.tmp_dir.unwrap_or_else(std::env::temp_dir),
        })
    }

    /// Serialized request body, as sent to the vendor.
    pub fn request_body(
        &self,
        prompt: &[GeminiContent],
        options: &CompletionOptions<GeminiParams>,
    ) -> Result<Value, ChatError> {
        serde_json::to_value(Self::request(prompt, options))
            .map_err(|e| ChatError::parse(format!("Failed to encode request: {}", e)))
    }

    fn request<'a>(
        prompt: &'a [GeminiContent],
        options: &'a CompletionOptions<GeminiParams>,
    ) -> GenerateContentRequest<'a> {
        GenerateContentRequest {
            contents: prompt,
            system_instruction: options.system_prompt_text.as_ref().map(|text| SystemInstruction {
                parts: vec![GeminiPart::text(text.clone())],
            }),
            params: &options.params,
        }
    }
}

/// MIME type for an image file, from its extension.
pub fn image_mime_type(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

async fn inline_image(image: &ImageInput) -> Result<Vec<GeminiPart>, StagingError> {
    let path = &image.image_file;
    let mime_type = image_mime_type(path)
        .ok_or_else(|| StagingError::read(path.display().to_string(), "unsupported image type"))?;
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| StagingError::read(path.display().to_string(), e))?;

    let mut parts = Vec::with_capacity(2);
    if let Some(text) = image.prompt_text.as_ref().filter(|t| !t.is_empty()) {
        parts.push(GeminiPart::text(text.clone()));
    }
    parts.push(GeminiPart::InlineData {
        inline_data: InlineData {
            mime_type: mime_type.to_string(),
            data: BASE64.encode(bytes),
        },
    });
    Ok(parts)
}

#[async_trait]
impl ChatApi for GeminiApi {
    type Client = GeminiClient;
    type Message = GeminiContent;
    type Response = GenerateContentResponse;
    type Params = GeminiParams;

    fn client(&self) -> &GeminiClient {
        &self.client
    }

    fn default_options(&self) -> &CompletionOptions<GeminiParams> {
        &self.defaults
    }

    fn build_text_prompt(&self, text: &str, _conversation_id: Option<&ConversationId>) -> Vec<GeminiContent> {
        vec![GeminiContent::user(vec![GeminiPart::text(text)])]
    }

    async fn build_video_prompt(
        &self,
        video_file: &Path,
        conversation_id: Option<&ConversationId>,
    ) -> Result<BuildPromptOutput<GeminiContent, GeminiParams>, ChatError> {
        let id = conversation_id
            .cloned()
            .unwrap_or_else(ConversationId::temporary);
        images_prompt_from_video(self, &self.frames, &self.tmp_dir, video_file, &id).await
    }

    /// All images go into a single user turn.
    async fn build_images_prompt(
        &self,
        images: &[ImageInput],
        _conversation_id: Option<&ConversationId>,
    ) -> Result<BuildPromptOutput<GeminiContent, GeminiParams>, ChatError> {
        let reads: Vec<_> = images.iter().map(inline_image).collect();
        let parts: Vec<Vec<GeminiPart>> = stream::iter(reads)
            .buffered(IMAGE_READ_CONCURRENCY)
            .try_collect()
            .await?;

        let parts: Vec<GeminiPart> = parts.into_iter().flatten().collect();
        Ok(BuildPromptOutput::new(vec![GeminiContent::user(parts)]))
    }

    /// The system prompt travels as `systemInstruction`, never as a turn.
    fn initial_prompt(&self, _options: &CompletionOptions<GeminiParams>) -> Vec<GeminiContent> {
        Vec::new()
    }

    fn append_to_prompt(
        &self,
        addition: Appendable<'_, GeminiContent, GenerateContentResponse>,
        existing: Option<Vec<GeminiContent>>,
    ) -> Vec<GeminiContent> {
        let mut prompt = existing.unwrap_or_default();
        match addition {
            Appendable::Turns(turns) => prompt.extend(turns),
            Appendable::Response(response) => prompt.push(GeminiContent::model(vec![
                GeminiPart::text(self.response_text(response).unwrap_or_default()),
            ])),
        }
        prompt
    }

    async fn generate_content(
        &self,
        prompt: &[GeminiContent],
        options: &CompletionOptions<GeminiParams>,
    ) -> Result<GenerateContentResponse, ChatError> {
        self.client
            .generate_content(&Self::request(prompt, options))
            .await
    }

    fn response_text(&self, response: &GenerateContentResponse) -> Option<String> {
        let content = response.candidates.first()?.content.as_ref()?;
        let texts: Vec<&str> = content.parts.iter().filter_map(GeminiPart::as_text).collect();
        if texts.is_empty() {
            return None;
        }
        let text = texts.concat();
        Some(text.strip_suffix('\n').unwrap_or(&text).trim().to_string())
    }

    fn is_throttling_error(&self, error: &ChatError) -> bool {
        error.status() == Some(429)
    }

    fn is_server_error(&self, error: &ChatError) -> bool {
        matches!(error.status(), Some(500..=599))
    }

    fn is_connectivity_error(&self, error: &ChatError) -> bool {
        error.as_transport_error().is_some()
            || matches!(error.message(), Some("Request timed out." | "Connection error."))
    }

    /// Images are inlined, so there is nothing for the model to download.
    fn is_download_error(&self, _error: &ChatError) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::conversation::CleanupObligation;
    use crate::domain::foundation::{ErrorClass, TransportErrorKind};
    use crate::ports::{ExtractFramesRequest, ExtractedFrames, VideoFramesExtractor};
    use serde_json::json;
    use std::sync::Arc;

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

    fn api() -> GeminiApi {
        GeminiApi::new(GeminiOptions::new(
            "key",
            "gemini-1.5-flash",
            FrameExtractionOptions::new(Arc::new(NoFrames)),
        ))
        .unwrap()
    }

    fn response(text: &str) -> GenerateContentResponse {
        GenerateContentResponse {
            candidates: vec![GeminiCandidate {
                content: Some(CandidateContent {
                    role: Some(GeminiRole::Model),
                    parts: vec![GeminiPart::text(text)],
                }),
                finish_reason: Some("STOP".into()),
            }],
            ..Default::default()
        }
    }

    mod request {
        use super::*;

        #[test]
        fn url_targets_generate_content() {
            assert_eq!(
                api().client().generate_content_url(),
                "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
            );
        }

        #[test]
        fn body_carries_system_instruction_and_camel_case_params() {
            let api = api();
            let options = api.default_options().with_merged_params(
                &GeminiParams::default().with_generation_config(GenerationConfig {
                    max_output_tokens: Some(256),
                    ..Default::default()
                }),
            );
            let prompt = api.build_text_prompt("What happens?", None);

            let body = api.request_body(&prompt, &options).unwrap();

            assert_eq!(body["contents"][0], json!({"role": "user", "parts": [{"text": "What happens?"}]}));
            assert!(body["systemInstruction"]["parts"][0]["text"]
                .as_str()
                .unwrap()
                .starts_with("You are a helpful assistant"));
            assert_eq!(body["generationConfig"], json!({"maxOutputTokens": 256}));
            assert!(body.get("backoff").is_none());
        }

        #[test]
        fn body_omits_system_instruction_when_unset() {
            let api = api();
            let body = api.request_body(&[], &CompletionOptions::default()).unwrap();
            assert!(body.get("systemInstruction").is_none());
        }
    }

    mod params {
        use super::*;

        #[test]
        fn safety_settings_merge_by_category() {
            let base = GeminiParams::default()
                .with_safety_setting(SafetySetting::new("HARM_CATEGORY_HARASSMENT", "BLOCK_NONE"))
                .with_safety_setting(SafetySetting::new("HARM_CATEGORY_HATE_SPEECH", "BLOCK_NONE"));
            let overrides = GeminiParams::default()
                .with_safety_setting(SafetySetting::new("HARM_CATEGORY_HARASSMENT", "BLOCK_ONLY_HIGH"))
                .with_safety_setting(SafetySetting::new("HARM_CATEGORY_DANGEROUS_CONTENT", "BLOCK_NONE"));

            let merged = base.merge(&overrides).safety_settings.unwrap();

            assert_eq!(merged.len(), 3);
            assert_eq!(merged[0].threshold, "BLOCK_ONLY_HIGH");
            assert_eq!(merged[1].category, "HARM_CATEGORY_HATE_SPEECH");
        }

        #[test]
        fn generation_config_merges_field_by_field() {
            let base = GeminiParams::default().with_generation_config(GenerationConfig {
                temperature: Some(0.1),
                max_output_tokens: Some(100),
                ..Default::default()
            });
            let overrides = GeminiParams::default().with_generation_config(GenerationConfig {
                temperature: Some(0.9),
                ..Default::default()
            });

            let config = base.merge(&overrides).generation_config.unwrap();

            assert_eq!(config.temperature, Some(0.9));
            assert_eq!(config.max_output_tokens, Some(100));
        }
    }

    mod prompts {
        use super::*;

        #[tokio::test]
        async fn images_are_inlined_in_one_user_turn() {
            let dir = tempfile::tempdir().unwrap();
            let first = dir.path().join("a.jpg");
            let second = dir.path().join("b.PNG");
            tokio::fs::write(&first, b"jpeg-bytes").await.unwrap();
            tokio::fs::write(&second, b"png-bytes").await.unwrap();

            let output = api()
                .build_images_prompt(
                    &[ImageInput::new(&first).with_prompt_text("frame 1"), ImageInput::new(&second)],
                    None,
                )
                .await
                .unwrap();

            assert_eq!(output.prompt.len(), 1);
            let json = serde_json::to_value(&output.prompt[0]).unwrap();
            assert_eq!(json["role"], json!("user"));
            assert_eq!(json["parts"][0], json!({"text": "frame 1"}));
            assert_eq!(
                json["parts"][1],
                json!({"inlineData": {"mimeType": "image/jpeg", "data": BASE64.encode(b"jpeg-bytes")}})
            );
            assert_eq!(json["parts"][2]["inlineData"]["mimeType"], json!("image/png"));
            assert!(output.cleanup.is_none());
        }

        #[tokio::test]
        async fn missing_image_is_a_staging_error() {
            let err = api()
                .build_images_prompt(&[ImageInput::new("/nonexistent/frame.jpg")], None)
                .await
                .unwrap_err();
            assert!(matches!(err, ChatError::Staging(StagingError::Read { .. })));
        }

        #[test]
        fn unknown_extension_has_no_mime_type() {
            assert_eq!(image_mime_type(Path::new("a.JPEG")), Some("image/jpeg"));
            assert_eq!(image_mime_type(Path::new("a.webp")), Some("image/webp"));
            assert_eq!(image_mime_type(Path::new("a.bmp")), None);
        }

        #[test]
        fn response_appends_as_model_turn() {
            let api = api();
            let prompt = api.append_to_prompt(Appendable::Turns(api.build_text_prompt("hi", None)), None);
            let prompt = api.append_to_prompt(Appendable::Response(&response("hello\n")), Some(prompt));

            assert_eq!(prompt.len(), 2);
            assert_eq!(prompt[1], GeminiContent::model(vec![GeminiPart::text("hello")]));
        }

        #[test]
        fn response_text_strips_trailing_newline_and_whitespace() {
            let api = api();
            assert_eq!(api.response_text(&response("  A ball rolls.\n")).as_deref(), Some("A ball rolls."));
            assert_eq!(api.response_text(&GenerateContentResponse::default()), None);
        }

        #[test]
        fn response_text_skips_non_text_parts() {
            let api = api();
            let response: GenerateContentResponse = serde_json::from_value(json!({
                "candidates": [{
                    "content": {
                        "role": "model",
                        "parts": [
                            {"functionCall": {"name": "lookup", "args": {"q": "ball"}}},
                            {"text": "A ball rolls.\n"}
                        ]
                    },
                    "finishReason": "STOP"
                }]
            }))
            .unwrap();

            assert_eq!(api.response_text(&response).as_deref(), Some("A ball rolls."));
            let parts = &response.candidates[0].content.as_ref().unwrap().parts;
            assert!(matches!(parts[0], GeminiPart::Other(_)));
        }

        #[test]
        fn function_call_only_response_has_no_text() {
            let api = api();
            let response: GenerateContentResponse = serde_json::from_value(json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [{"functionCall": {"name": "lookup", "args": {}}}]}
                }]
            }))
            .unwrap();

            assert_eq!(api.response_text(&response), None);
        }
    }

    mod classification {
        use super::*;

        #[test]
        fn status_based_classes() {
            let api = api();
            assert_eq!(api.classify(&ChatError::api(429, "quota")), Some(ErrorClass::Throttling));
            assert_eq!(api.classify(&ChatError::api(500, "internal")), Some(ErrorClass::Server));
            assert_eq!(api.classify(&ChatError::api(599, "odd")), Some(ErrorClass::Server));
            assert_eq!(api.classify(&ChatError::api(400, "bad request")), None);
        }

        #[test]
        fn transport_failures_are_connectivity() {
            let api = api();
            assert_eq!(
                api.classify(&ChatError::transport(TransportErrorKind::Timeout, "Request timed out.")),
                Some(ErrorClass::Connectivity)
            );
        }

        #[test]
        fn never_a_download_error() {
            assert!(!api().is_download_error(&ChatError::api(400, "Invalid image")));
        }
    }
}
