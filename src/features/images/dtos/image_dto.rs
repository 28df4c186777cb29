use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::features::images::models::{Image, ImageStatus};
use crate::shared::types::empty_string_as_none;

/// Public path prefix the upload directory is served under
pub const UPLOADS_URL_PREFIX: &str = "/uploads";

/// Response DTO for a submission
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ImageResponseDto {
    pub id: i64,
    /// Stored name, never the uploader's original name
    pub filename: String,
    /// Relative URL of the stored file
    #[schema(example = "/uploads/3f2a0c9e1b7d4e8fa6c5b4d3e2f10a9b.webp")]
    pub url: String,
    pub original_name: String,
    pub uploader_id: i64,
    pub category_id: Option<i64>,
    pub status: ImageStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
}

impl From<Image> for ImageResponseDto {
    fn from(image: Image) -> Self {
        Self {
            id: image.id,
            url: format!("{}/{}", UPLOADS_URL_PREFIX, image.filename),
            filename: image.filename,
            original_name: image.original_name,
            uploader_id: image.uploader_id,
            category_id: image.category_id,
            status: image.status,
            created_at: image.created_at,
            approved_at: image.approved_at,
        }
    }
}

/// Query parameters for the public gallery
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ImageFilterQuery {
    /// Only images approved into this category
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub category_id: Option<i64>,
}

/// Query parameters for the admin listing
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct AdminImageFilterQuery {
    /// `pending` or `approved`; omitted or empty lists every image
    #[serde(default, deserialize_with = "empty_string_as_none")]
    #[param(value_type = Option<String>, example = "pending")]
    pub status: Option<ImageStatus>,
}

/// Aggregate counters for the admin dashboard
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ImageStatsDto {
    pub total_images: i64,
    pub pending_images: i64,
    pub approved_images: i64,
    pub total_categories: i64,
}
