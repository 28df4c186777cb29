use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Persisted moderation state. Rejection deletes the row, so there is no third state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ImageStatus {
    Pending,
    Approved,
}

impl ImageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageStatus::Pending => "pending",
            ImageStatus::Approved => "approved",
        }
    }
}

impl fmt::Display for ImageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ImageStatus::Pending),
            "approved" => Ok(ImageStatus::Approved),
            other => Err(format!(
                "unknown status '{}', expected 'pending' or 'approved'",
                other
            )),
        }
    }
}

/// Database model for a submission
#[derive(Debug, Clone, FromRow)]
pub struct Image {
    pub id: i64,
    /// Generated on-disk name; the only name ever used to build a path
    pub filename: String,
    pub original_name: String,
    pub uploader_id: i64,
    pub category_id: Option<i64>,
    pub status: ImageStatus,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
}
