//! Moderation actions taken by the admin on submitted images.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::core::error::{AppError, Result};
use crate::features::admin::dtos::{BulkApproveResponseDto, BulkRejectResponseDto};
use crate::features::categories::CategoryService;
use crate::features::images::dtos::ImageResponseDto;
use crate::features::images::ImageStore;
use crate::modules::storage::UploadStorage;
use crate::shared::constants::MAX_BULK_IDS;

pub struct ModerationService {
    store: Arc<ImageStore>,
    categories: Arc<CategoryService>,
    storage: Arc<UploadStorage>,
}

impl ModerationService {
    pub fn new(
        store: Arc<ImageStore>,
        categories: Arc<CategoryService>,
        storage: Arc<UploadStorage>,
    ) -> Self {
        Self {
            store,
            categories,
            storage,
        }
    }

    /// Publish a pending image under a category
    pub async fn approve(&self, id: i64, category_id: Option<i64>) -> Result<ImageResponseDto> {
        let category_id = required_category(category_id)?;
        self.categories.ensure_exists(category_id).await?;

        let changed = self
            .store
            .transition_to_approved(id, category_id, Utc::now())
            .await?;
        if changed == 0 {
            return Err(not_found_or_processed(id));
        }

        info!("Image {} approved into category {}", id, category_id);
        let image = self
            .store
            .find_by_id(id)
            .await?
            // Rejected between the update and this read
            .ok_or_else(|| not_found_or_processed(id))?;
        Ok(image.into())
    }

    /// Delete an image record and its stored file
    pub async fn reject(&self, id: i64) -> Result<()> {
        let filename = self
            .store
            .remove(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Image {} not found", id)))?;

        self.storage.remove_best_effort(&filename).await;
        info!("Image {} rejected, removed {}", id, filename);
        Ok(())
    }

    /// Approve every listed image that is still pending
    pub async fn bulk_approve(
        &self,
        ids: &[i64],
        category_id: Option<i64>,
    ) -> Result<BulkApproveResponseDto> {
        let category_id = required_category(category_id)?;
        check_bulk_size(ids)?;

        if ids.is_empty() {
            return Ok(BulkApproveResponseDto {
                requested: 0,
                approved: 0,
            });
        }
        self.categories.ensure_exists(category_id).await?;

        let approved = self
            .store
            .bulk_transition_to_approved(ids, category_id, Utc::now())
            .await?;

        info!(
            "Bulk approve into category {}: {} of {} requested",
            category_id,
            approved,
            ids.len()
        );
        Ok(BulkApproveResponseDto {
            requested: ids.len(),
            approved,
        })
    }

    /// Delete every listed image and remove the stored files of the deleted rows
    pub async fn bulk_reject(&self, ids: &[i64]) -> Result<BulkRejectResponseDto> {
        check_bulk_size(ids)?;

        let filenames = self.store.bulk_remove(ids).await?;
        let mut files_removed = 0;
        for filename in &filenames {
            if self.storage.remove_best_effort(filename).await {
                files_removed += 1;
            }
        }

        info!(
            "Bulk reject: {} rows deleted, {} files removed, {} requested",
            filenames.len(),
            files_removed,
            ids.len()
        );
        Ok(BulkRejectResponseDto {
            requested: ids.len(),
            deleted: filenames.len(),
            files_removed,
        })
    }
}

fn required_category(category_id: Option<i64>) -> Result<i64> {
    match category_id {
        Some(id) if id != 0 => Ok(id),
        _ => Err(AppError::Validation("category_id is required".to_string())),
    }
}

fn check_bulk_size(ids: &[i64]) -> Result<()> {
    if ids.len() > MAX_BULK_IDS {
        return Err(AppError::Validation(format!(
            "At most {} ids per request",
            MAX_BULK_IDS
        )));
    }
    Ok(())
}

fn not_found_or_processed(id: i64) -> AppError {
    AppError::NotFound(format!("Image {} not found or already processed", id))
}
