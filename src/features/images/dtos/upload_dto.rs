use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::modules::imaging::ConversionError;

/// Upload form for OpenAPI documentation.
/// The handler reads the multipart stream directly.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct UploadImagesDto {
    /// Image file (jpg, jpeg, png or gif). Repeat the field for a batch; `image` is accepted as well
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub images: String,
    /// Optional category recorded with every pending image
    #[schema(example = "1")]
    pub category_id: Option<String>,
}

/// Why a single file of a batch was not stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UploadFailureKind {
    ReadError,
    FileTooLarge,
    UnsupportedFormat,
    ConversionFailed,
    ConversionTimeout,
    StorageError,
}

impl UploadFailureKind {
    /// Failures caused by the server side (encoder, disk, database) rather than the input
    pub fn is_dependency_failure(&self) -> bool {
        matches!(
            self,
            UploadFailureKind::ConversionFailed
                | UploadFailureKind::ConversionTimeout
                | UploadFailureKind::StorageError
        )
    }
}

impl From<&ConversionError> for UploadFailureKind {
    fn from(err: &ConversionError) -> Self {
        match err {
            ConversionError::UnsupportedFormat { .. } => UploadFailureKind::UnsupportedFormat,
            ConversionError::Timeout(_) => UploadFailureKind::ConversionTimeout,
            ConversionError::Io(_) => UploadFailureKind::StorageError,
            ConversionError::ConversionFailed(_) => UploadFailureKind::ConversionFailed,
        }
    }
}

/// A file that was converted and queued for moderation
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadedImageDto {
    pub id: i64,
    pub filename: String,
    pub original_name: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FailedUploadDto {
    pub original_name: String,
    pub code: UploadFailureKind,
    pub reason: String,
}

/// Per-file outcome of an upload request
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct BatchUploadResultDto {
    pub succeeded: Vec<UploadedImageDto>,
    pub failed: Vec<FailedUploadDto>,
}

impl BatchUploadResultDto {
    pub fn has_dependency_failure(&self) -> bool {
        self.failed.iter().any(|f| f.code.is_dependency_failure())
    }

    pub fn failure_reasons(&self) -> Vec<String> {
        self.failed
            .iter()
            .map(|f| format!("{}: {}", f.original_name, f.reason))
            .collect()
    }
}
