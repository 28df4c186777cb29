use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body of a single approval
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ApproveRequestDto {
    /// Category the image is published under (required)
    #[schema(example = 1)]
    pub category_id: Option<i64>,
}

/// Body of a bulk approval
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct BulkApproveRequestDto {
    #[serde(default)]
    pub ids: Vec<i64>,
    /// Category every approved image is published under (required)
    pub category_id: Option<i64>,
}

/// Body of a bulk rejection
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct BulkIdsRequestDto {
    #[serde(default)]
    pub ids: Vec<i64>,
}

/// Outcome of a bulk approval. Ids that were missing or already approved are
/// skipped, so `approved` can be lower than `requested`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BulkApproveResponseDto {
    pub requested: usize,
    pub approved: u64,
}

/// Outcome of a bulk rejection
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BulkRejectResponseDto {
    pub requested: usize,
    pub deleted: usize,
    /// Backing files actually removed from disk
    pub files_removed: usize,
}
