use std::sync::Arc;

use rand::Rng;

use crate::core::error::{AppError, Result};
use crate::features::categories::CategoryService;
use crate::features::images::dtos::{ImageResponseDto, ImageStatsDto};
use crate::features::images::models::ImageStatus;
use crate::features::images::services::ImageStore;
use crate::shared::types::PaginationQuery;

/// Attempts at drawing a random image before giving up on a shrinking set
const RANDOM_DRAW_ATTEMPTS: usize = 3;

/// Read side of the gallery
pub struct QueryService {
    store: Arc<ImageStore>,
    categories: Arc<CategoryService>,
}

impl QueryService {
    pub fn new(store: Arc<ImageStore>, categories: Arc<CategoryService>) -> Self {
        Self { store, categories }
    }

    /// Approved images, newest approval first, with the total matching count
    pub async fn list_approved(
        &self,
        pagination: &PaginationQuery,
        category_id: Option<i64>,
    ) -> Result<(Vec<ImageResponseDto>, i64)> {
        let images = self
            .store
            .list_approved(category_id, pagination.limit(), pagination.offset())
            .await?;
        let total = self.store.count_approved(category_id).await?;

        Ok((images.into_iter().map(|i| i.into()).collect(), total))
    }

    /// One approved image drawn uniformly at random.
    ///
    /// Counts the matching rows, then fetches the row at a random position of
    /// the id ordering. If rows disappear between the two statements the draw
    /// is repeated.
    pub async fn random_approved(&self, category_id: Option<i64>) -> Result<ImageResponseDto> {
        for _ in 0..RANDOM_DRAW_ATTEMPTS {
            let total = self.store.count_approved(category_id).await?;
            if total == 0 {
                break;
            }

            let position = rand::rng().random_range(0..total);
            if let Some(image) = self.store.approved_at_position(category_id, position).await? {
                return Ok(image.into());
            }
        }

        Err(AppError::NotFound("No approved images found".to_string()))
    }

    /// Every image regardless of status (or one status), newest upload first
    pub async fn list_admin(
        &self,
        pagination: &PaginationQuery,
        status: Option<ImageStatus>,
    ) -> Result<(Vec<ImageResponseDto>, i64)> {
        let images = self
            .store
            .list_all(status, pagination.limit(), pagination.offset())
            .await?;
        let total = self.store.count(status).await?;

        Ok((images.into_iter().map(|i| i.into()).collect(), total))
    }

    /// The whole moderation queue, oldest first
    pub async fn pending(&self) -> Result<Vec<ImageResponseDto>> {
        let images = self.store.list_pending().await?;
        Ok(images.into_iter().map(|i| i.into()).collect())
    }

    /// Four independent counts; no snapshot is taken across them
    pub async fn stats(&self) -> Result<ImageStatsDto> {
        Ok(ImageStatsDto {
            total_images: self.store.count(None).await?,
            pending_images: self.store.count(Some(ImageStatus::Pending)).await?,
            approved_images: self.store.count(Some(ImageStatus::Approved)).await?,
            total_categories: self.categories.count().await?,
        })
    }
}
