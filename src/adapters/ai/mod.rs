//! Chat API Adapters.
//!
//! Implementations of the ChatApi port for vision-capable chat backends.
//!
//! ## Available Adapters
//!
//! - `ChatGptApi` - OpenAI and Azure OpenAI chat completions
//! - `GeminiApi` - Google Gemini `generateContent`
//! - `MockChatApi` - Scripted backend for testing
//! - `VideoRetrievalClient` - Azure Computer Vision video index management

mod chatgpt_api;
mod gemini_api;
mod http;
mod mock_chat_api;
mod video_retrieval_client;

pub use chatgpt_api::{
    ChatGptApi, ChatGptChoice, ChatGptClient, ChatGptMessage, ChatGptOptions, ChatGptParams,
    ChatGptResponse, ChatGptResponseMessage, ChatGptUsage, ContentPart, ImageDetail, ImageUrl,
    UserContent, DEFAULT_AZURE_API_VERSION, OPENAI_BASE_URL,
};
pub use gemini_api::{
    image_mime_type, CandidateContent, GeminiApi, GeminiCandidate, GeminiClient, GeminiContent,
    GeminiOptions, GeminiParams, GeminiPart, GeminiRole, GenerateContentResponse,
    GenerationConfig, InlineData, SafetySetting, UsageMetadata, DEFAULT_GEMINI_API_VERSION,
    GEMINI_BASE_URL,
};
pub use mock_chat_api::{MockCall, MockChatApi, MockMessage, MockParams, MockResponse, MockRole};
pub use video_retrieval_client::{
    CreateIndexOptions, DocumentSummary, IndexFeature, IndexMetadataSchema,
    IndexMetadataSchemaField, IndexSummary, IngestionRequest, IngestionState, IngestionSummary,
    VideoIngestion, VideoRetrievalClient, VideoRetrievalIndexOptions, DEFAULT_API_VERSION,
};
