//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables using the
//! `config` and `dotenvy` crates. Variables carry the `CHAT_ABOUT_VIDEO`
//! prefix and nested values are separated by double underscores.
//!
//! # Example
//!
//! ```no_run
//! use chat_about_video::application::AnyChatAboutVideo;
//! use chat_about_video::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! let options = config.into_backend_options().expect("Invalid configuration");
//! let chat = AnyChatAboutVideo::from_options(options).expect("Failed to create backend");
//! ```

mod backend;
mod error;
mod frames;
mod retry;
mod storage;

pub use backend::{BackendConfig, BackendKind, VideoIndexConfig};
pub use error::{ConfigError, ValidationError};
pub use frames::FramesConfig;
pub use retry::{PromptsConfig, RetryConfig};
pub use storage::{StorageConfig, StorageKind};

use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;

use crate::adapters::ai::{ChatGptOptions, ChatGptParams, GeminiOptions, GeminiParams, VideoRetrievalIndexOptions};
use crate::adapters::storage::{LocalDirectoryUploader, ObjectStoreUploader};
use crate::adapters::video::FfmpegFramesExtractor;
use crate::application::BackendOptions;
use crate::domain::conversation::{CompletionOptions, GenerationParams};
use crate::domain::media::{FrameExtractionOptions, StorageOptions};
use crate::ports::FileBatchUploader;

/// Environment variable prefix
const ENV_PREFIX: &str = "CHAT_ABOUT_VIDEO";

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Chat backend (ChatGPT or Gemini)
    pub backend: BackendConfig,

    /// Frame extraction
    #[serde(default)]
    pub frames: FramesConfig,

    /// Media storage (ChatGPT only)
    #[serde(default)]
    pub storage: StorageConfig,

    /// Retry backoff schedules
    #[serde(default)]
    pub retry: RetryConfig,

    /// Default prompt texts
    #[serde(default)]
    pub prompts: PromptsConfig,

    /// Scratch directory for extracted frames
    pub tmp_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `CHAT_ABOUT_VIDEO` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Splits backoff schedules on commas
    ///
    /// # Example Environment Variables
    ///
    /// ```text
    /// CHAT_ABOUT_VIDEO__BACKEND__KIND=gemini
    /// CHAT_ABOUT_VIDEO__BACKEND__API_KEY=...
    /// CHAT_ABOUT_VIDEO__FRAMES__INTERVAL_SECS=2.5
    /// CHAT_ABOUT_VIDEO__RETRY__BACKOFF_ON_THROTTLING_MS=1000,2000,5000
    /// ```
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let environment = RetryConfig::LIST_KEYS.iter().fold(
            config::Environment::default()
                .prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true)
                .list_separator(","),
            |env, key| env.with_list_parse_key(key),
        );

        let config = config::Config::builder()
            .add_source(environment)
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Validate all configuration sections
    ///
    /// Storage is only checked for ChatGPT; Gemini sends frames inline.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.backend.validate()?;
        self.frames.validate()?;
        if self.backend.kind == BackendKind::ChatGpt {
            self.storage.validate()?;
        }
        Ok(())
    }

    /// Validates and converts into the options of the selected backend
    pub fn into_backend_options(self) -> Result<BackendOptions, ConfigError> {
        self.validate()?;

        let frames = self.frame_extraction_options();
        let options = match self.backend.kind {
            BackendKind::ChatGpt => {
                let storage = self.storage_options()?;
                let mut options = ChatGptOptions::new(
                    self.backend.api_key.clone(),
                    self.backend.model(),
                    storage,
                )
                .with_timeout(self.backend.timeout())
                .with_completion_options(self.completion_options::<ChatGptParams>());
                if let Some(endpoint) = &self.backend.endpoint {
                    options = options.with_azure_endpoint(endpoint);
                }
                if let Some(api_version) = &self.backend.api_version {
                    options = options.with_api_version(api_version);
                }
                options = match &self.backend.video_index {
                    Some(index) => options.with_video_retrieval_index(video_index_options(index)),
                    None => options.with_extract_video_frames(frames),
                };
                if let Some(tmp_dir) = &self.tmp_dir {
                    options = options.with_tmp_dir(tmp_dir);
                }
                BackendOptions::ChatGpt(options)
            }
            BackendKind::Gemini => {
                let mut options = GeminiOptions::new(
                    self.backend.api_key.clone(),
                    self.backend.model(),
                    frames,
                )
                .with_timeout(self.backend.timeout())
                .with_completion_options(self.completion_options::<GeminiParams>());
                if let Some(endpoint) = &self.backend.endpoint {
                    options = options.with_base_url(endpoint);
                }
                if let Some(api_version) = &self.backend.api_version {
                    options = options.with_api_version(api_version);
                }
                if let Some(tmp_dir) = &self.tmp_dir {
                    options = options.with_tmp_dir(tmp_dir);
                }
                BackendOptions::Gemini(options)
            }
        };

        tracing::debug!(backend = options.kind(), "Backend options loaded from environment");
        Ok(options)
    }

    fn completion_options<P: GenerationParams>(&self) -> CompletionOptions<P> {
        CompletionOptions {
            system_prompt_text: self.prompts.system_prompt_text.clone(),
            start_prompt_text: self.prompts.start_prompt_text.clone(),
            backoff: self.retry.backoff(),
            params: P::default(),
        }
    }

    fn frame_extraction_options(&self) -> FrameExtractionOptions {
        let extractor = FfmpegFramesExtractor::new().with_ffmpeg_path(&self.frames.ffmpeg_path);
        let options = FrameExtractionOptions::new(Arc::new(extractor))
            .with_interval_secs(self.frames.interval_secs)
            .with_limit(self.frames.limit)
            .with_format(&self.frames.format)
            .with_size(self.frames.width, self.frames.height);
        if self.frames.delete_files_when_conversation_ends {
            options
        } else {
            options.keep_files()
        }
    }

    fn storage_options(&self) -> Result<StorageOptions, ValidationError> {
        let storage = &self.storage;
        let uploader: Arc<dyn FileBatchUploader> = match storage.kind {
            StorageKind::Local => Arc::new(LocalDirectoryUploader::new(&storage.local_root)),
            StorageKind::S3 => Arc::new(object_store_uploader(storage)?),
            StorageKind::Azblob => Arc::new(object_store_uploader(storage)?),
        };
        let options = StorageOptions::new(uploader, &storage.container_name)
            .with_path_prefix(&storage.path_prefix);
        Ok(if storage.delete_files_when_conversation_ends {
            options
        } else {
            options.keep_files()
        })
    }
}

fn video_index_options(index: &VideoIndexConfig) -> VideoRetrievalIndexOptions {
    let options = VideoRetrievalIndexOptions::new(&index.endpoint, &index.api_key)
        .with_index_name_prefix(&index.index_name_prefix);
    if index.delete_index_when_conversation_ends {
        options
    } else {
        options.keep_index()
    }
}

fn object_store_uploader(storage: &StorageConfig) -> Result<ObjectStoreUploader, ValidationError> {
    let uploader: ObjectStoreUploader = match storage.kind {
        #[cfg(feature = "s3")]
        StorageKind::S3 => ObjectStoreUploader::s3(
            storage.region.clone(),
            storage.endpoint.clone(),
            storage.account_name.clone(),
            storage.account_key.clone().map(secrecy::Secret::new),
        ),
        #[cfg(feature = "azblob")]
        StorageKind::Azblob => match (&storage.endpoint, &storage.account_name, &storage.account_key) {
            (Some(endpoint), Some(account_name), Some(account_key)) => ObjectStoreUploader::azure_blob(
                endpoint.clone(),
                account_name.clone(),
                secrecy::Secret::new(account_key.clone()),
            ),
            _ => {
                return Err(ValidationError::MissingRequired(
                    "STORAGE__ENDPOINT, STORAGE__ACCOUNT_NAME and STORAGE__ACCOUNT_KEY",
                ))
            }
        },
        #[cfg(not(feature = "s3"))]
        StorageKind::S3 => return Err(ValidationError::StorageBackendUnavailable("s3")),
        #[cfg(not(feature = "azblob"))]
        StorageKind::Azblob => return Err(ValidationError::StorageBackendUnavailable("azblob")),
        StorageKind::Local => return Err(ValidationError::StorageBackendUnavailable("local")),
    };
    let uploader = uploader.with_expiration(storage.expiration());
    Ok(match &storage.public_base_url {
        Some(base_url) => uploader.with_public_base_url(base_url),
        None => uploader,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ErrorClass;
    use std::env;
    use std::sync::Mutex;

    // Mutex to ensure env var tests don't run concurrently
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "CHAT_ABOUT_VIDEO__BACKEND__KIND",
        "CHAT_ABOUT_VIDEO__BACKEND__API_KEY",
        "CHAT_ABOUT_VIDEO__BACKEND__MODEL",
        "CHAT_ABOUT_VIDEO__BACKEND__ENDPOINT",
        "CHAT_ABOUT_VIDEO__BACKEND__TIMEOUT_SECS",
        "CHAT_ABOUT_VIDEO__FRAMES__INTERVAL_SECS",
        "CHAT_ABOUT_VIDEO__FRAMES__LIMIT",
        "CHAT_ABOUT_VIDEO__STORAGE__CONTAINER_NAME",
        "CHAT_ABOUT_VIDEO__STORAGE__PATH_PREFIX",
        "CHAT_ABOUT_VIDEO__RETRY__BACKOFF_ON_THROTTLING_MS",
        "CHAT_ABOUT_VIDEO__PROMPTS__START_PROMPT_TEXT",
    ];

    fn set_minimal_env(kind: &str) {
        env::set_var("CHAT_ABOUT_VIDEO__BACKEND__KIND", kind);
        env::set_var("CHAT_ABOUT_VIDEO__BACKEND__API_KEY", "test-key");
        env::set_var("CHAT_ABOUT_VIDEO__STORAGE__CONTAINER_NAME", "frames");
    }

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        set_minimal_env("chatgpt");

        let config = AppConfig::load().expect("Failed to load config");

        assert_eq!(config.backend.kind, BackendKind::ChatGpt);
        assert_eq!(config.backend.api_key, "test-key");
        assert_eq!(config.backend.model(), "gpt-4o");
        assert_eq!(config.frames.interval_secs, 5.0);
        assert_eq!(config.frames.limit, 10);
        assert_eq!(config.storage.container_name, "frames");

        clear_env();
    }

    #[test]
    fn test_nested_values_and_lists() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        set_minimal_env("gemini");
        env::set_var("CHAT_ABOUT_VIDEO__FRAMES__INTERVAL_SECS", "2.5");
        env::set_var("CHAT_ABOUT_VIDEO__FRAMES__LIMIT", "4");
        env::set_var("CHAT_ABOUT_VIDEO__RETRY__BACKOFF_ON_THROTTLING_MS", "100,200,300");
        env::set_var("CHAT_ABOUT_VIDEO__PROMPTS__START_PROMPT_TEXT", "Describe the video.");

        let config = AppConfig::load().expect("Failed to load config");

        assert_eq!(config.backend.kind, BackendKind::Gemini);
        assert_eq!(config.frames.interval_secs, 2.5);
        assert_eq!(config.frames.limit, 4);
        assert_eq!(
            config.retry.backoff().schedule(ErrorClass::Throttling),
            &[100, 200, 300]
        );
        assert_eq!(
            config.prompts.start_prompt_text.as_deref(),
            Some("Describe the video.")
        );

        clear_env();
    }

    #[test]
    fn test_missing_backend_fails_to_load() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();

        assert!(matches!(AppConfig::load(), Err(ConfigError::LoadError(_))));
    }

    #[test]
    fn test_chatgpt_with_local_storage_converts() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        set_minimal_env("chatgpt");
        env::set_var("CHAT_ABOUT_VIDEO__STORAGE__PATH_PREFIX", "runs/");
        env::set_var("CHAT_ABOUT_VIDEO__BACKEND__ENDPOINT", "https://example.openai.azure.com");

        let options = AppConfig::load()
            .and_then(AppConfig::into_backend_options)
            .expect("Failed to convert config");

        match options {
            BackendOptions::ChatGpt(options) => {
                assert_eq!(
                    options.endpoint.as_deref(),
                    Some("https://example.openai.azure.com")
                );
                assert_eq!(options.storage.container_name, "frames");
                assert_eq!(options.storage.path_prefix, "runs/");
                assert!(options.extract_video_frames.is_some());
                assert!(options.video_retrieval_index.is_none());
            }
            other => panic!("expected ChatGPT options, got {}", other.kind()),
        }

        clear_env();
    }

    #[test]
    fn test_gemini_ignores_storage() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        env::set_var("CHAT_ABOUT_VIDEO__BACKEND__KIND", "gemini");
        env::set_var("CHAT_ABOUT_VIDEO__BACKEND__API_KEY", "test-key");
        env::set_var("CHAT_ABOUT_VIDEO__FRAMES__LIMIT", "3");

        let options = AppConfig::load()
            .and_then(AppConfig::into_backend_options)
            .expect("Failed to convert config");

        match options {
            BackendOptions::Gemini(options) => {
                assert_eq!(options.model, "gemini-1.5-flash");
                assert_eq!(options.extract_video_frames.limit, 3);
            }
            other => panic!("expected Gemini options, got {}", other.kind()),
        }

        clear_env();
    }

    #[test]
    fn test_invalid_interval_fails_validation() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        set_minimal_env("gemini");
        env::set_var("CHAT_ABOUT_VIDEO__FRAMES__INTERVAL_SECS", "0");

        let result = AppConfig::load().and_then(AppConfig::into_backend_options);

        assert!(matches!(
            result,
            Err(ConfigError::ValidationFailed(ValidationError::InvalidFrameInterval))
        ));

        clear_env();
    }
}
