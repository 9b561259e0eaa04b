//! Media inputs and their staging.

mod input;
mod paths;
mod stager;

pub use input::{ImageInput, MediaEntry, MediaInput};
pub use paths::{find_common_parent_path, CommonParent};
pub use stager::{
    images_prompt_from_video, upload_images, FrameExtractionOptions, FramesDirectoryResolver,
    StagedImages, StorageOptions,
};
