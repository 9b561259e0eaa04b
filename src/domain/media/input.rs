//! Media a conversation can be started about.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A local image, optionally captioned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInput {
    pub image_file: PathBuf,
    /// Sent as a text part right before the image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_text: Option<String>,
}

impl ImageInput {
    pub fn new(image_file: impl Into<PathBuf>) -> Self {
        Self {
            image_file: image_file.into(),
            prompt_text: None,
        }
    }

    pub fn with_prompt_text(mut self, text: impl Into<String>) -> Self {
        self.prompt_text = Some(text.into());
        self
    }
}

/// One entry of a multi-media conversation start.
///
/// Each entry holds exactly one video or one image group, optionally
/// prefaced by free text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaEntry {
    Video {
        video_file: PathBuf,
        prompt_text: Option<String>,
    },
    Images {
        images: Vec<ImageInput>,
        prompt_text: Option<String>,
    },
}

impl MediaEntry {
    pub fn video(video_file: impl Into<PathBuf>) -> Self {
        Self::Video {
            video_file: video_file.into(),
            prompt_text: None,
        }
    }

    pub fn images(images: Vec<ImageInput>) -> Self {
        Self::Images {
            images,
            prompt_text: None,
        }
    }

    /// Sets the preface text sent before the media.
    pub fn with_prompt_text(self, text: impl Into<String>) -> Self {
        let text = Some(text.into());
        match self {
            Self::Video { video_file, .. } => Self::Video {
                video_file,
                prompt_text: text,
            },
            Self::Images { images, .. } => Self::Images {
                images,
                prompt_text: text,
            },
        }
    }

    pub fn prompt_text(&self) -> Option<&str> {
        match self {
            Self::Video { prompt_text, .. } | Self::Images { prompt_text, .. } => {
                prompt_text.as_deref()
            }
        }
    }
}

/// What a conversation is started about.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MediaInput {
    /// Plain text conversation.
    #[default]
    None,
    Video(PathBuf),
    Images(Vec<ImageInput>),
    /// Ordered mix of videos and image groups.
    Entries(Vec<MediaEntry>),
}

impl MediaInput {
    /// Normalizes into an ordered entry list.
    pub fn into_entries(self) -> Vec<MediaEntry> {
        match self {
            Self::None => Vec::new(),
            Self::Video(video_file) => vec![MediaEntry::video(video_file)],
            Self::Images(images) => vec![MediaEntry::images(images)],
            Self::Entries(entries) => entries,
        }
    }
}

impl From<PathBuf> for MediaInput {
    fn from(video_file: PathBuf) -> Self {
        Self::Video(video_file)
    }
}

impl From<&Path> for MediaInput {
    fn from(video_file: &Path) -> Self {
        Self::Video(video_file.to_path_buf())
    }
}

impl From<Vec<ImageInput>> for MediaInput {
    fn from(images: Vec<ImageInput>) -> Self {
        Self::Images(images)
    }
}

impl From<Vec<MediaEntry>> for MediaInput {
    fn from(entries: Vec<MediaEntry>) -> Self {
        Self::Entries(entries)
    }
}
