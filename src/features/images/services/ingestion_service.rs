//! Batch ingestion: validate, convert and record every file independently.

use std::sync::Arc;

use axum::body::Bytes;
use tracing::{info, warn};

use crate::core::error::{AppError, Result};
use crate::features::categories::CategoryService;
use crate::features::images::dtos::{
    BatchUploadResultDto, FailedUploadDto, UploadFailureKind, UploadedImageDto,
};
use crate::features::images::services::ImageStore;
use crate::modules::imaging::ImageConverter;
use crate::modules::storage::UploadStorage;

/// One file taken from an upload request.
///
/// `data` holds the read error when the body of that part could not be read.
#[derive(Debug)]
pub struct IncomingFile {
    pub original_name: String,
    pub data: std::result::Result<Bytes, String>,
}

impl IncomingFile {
    pub fn new(original_name: impl Into<String>, data: Bytes) -> Self {
        Self {
            original_name: original_name.into(),
            data: Ok(data),
        }
    }

    pub fn unreadable(original_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            original_name: original_name.into(),
            data: Err(error.into()),
        }
    }
}

pub struct IngestionService {
    store: Arc<ImageStore>,
    categories: Arc<CategoryService>,
    converter: Arc<ImageConverter>,
    storage: Arc<UploadStorage>,
    max_file_size: usize,
}

impl IngestionService {
    pub fn new(
        store: Arc<ImageStore>,
        categories: Arc<CategoryService>,
        converter: Arc<ImageConverter>,
        storage: Arc<UploadStorage>,
        max_file_size: usize,
    ) -> Self {
        Self {
            store,
            categories,
            converter,
            storage,
            max_file_size,
        }
    }

    /// Ingest every file of a request.
    ///
    /// A failing file is reported in `failed` and never stops its siblings.
    /// Only request-level problems (no files, unknown category) return `Err`.
    pub async fn ingest_batch(
        &self,
        files: Vec<IncomingFile>,
        uploader_id: i64,
        category_id: Option<i64>,
    ) -> Result<BatchUploadResultDto> {
        if files.is_empty() {
            return Err(AppError::Validation("No images provided".to_string()));
        }
        if let Some(category_id) = category_id {
            self.categories.ensure_exists(category_id).await?;
        }

        let mut result = BatchUploadResultDto::default();
        for file in files {
            match self.ingest_one(&file, uploader_id, category_id).await {
                Ok(uploaded) => result.succeeded.push(uploaded),
                Err((code, reason)) => {
                    warn!("Upload of '{}' failed: {}", file.original_name, reason);
                    result.failed.push(FailedUploadDto {
                        original_name: file.original_name,
                        code,
                        reason,
                    });
                }
            }
        }

        info!(
            "Batch upload by user {}: {} stored, {} failed",
            uploader_id,
            result.succeeded.len(),
            result.failed.len()
        );
        Ok(result)
    }

    async fn ingest_one(
        &self,
        file: &IncomingFile,
        uploader_id: i64,
        category_id: Option<i64>,
    ) -> std::result::Result<UploadedImageDto, (UploadFailureKind, String)> {
        let data = file
            .data
            .as_ref()
            .map_err(|e| (UploadFailureKind::ReadError, format!("Failed to read file: {}", e)))?;

        if data.len() > self.max_file_size {
            return Err((
                UploadFailureKind::FileTooLarge,
                format!(
                    "File too large. Maximum size is {} MB",
                    self.max_file_size / 1024 / 1024
                ),
            ));
        }

        let filename = self
            .converter
            .convert(data.clone(), &file.original_name)
            .await
            .map_err(|e| (UploadFailureKind::from(&e), e.to_string()))?;

        match self
            .store
            .insert(&filename, &file.original_name, uploader_id, category_id)
            .await
        {
            Ok(image) => Ok(UploadedImageDto {
                id: image.id,
                filename: image.filename,
                original_name: image.original_name,
            }),
            Err(e) => {
                tracing::error!("Failed to record upload {}: {}", filename, e);
                self.storage.remove_best_effort(&filename).await;
                Err((
                    UploadFailureKind::StorageError,
                    "Failed to save image record".to_string(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::images::models::ImageStatus;
    use crate::modules::imaging::{EncodeError, Encoder};
    use crate::shared::test_helpers::{create_test_user, test_pool};
    use async_trait::async_trait;
    use std::path::Path;
    use std::time::Duration;

    struct CopyEncoder;

    #[async_trait]
    impl Encoder for CopyEncoder {
        async fn encode(&self, input: &Path, output: &Path) -> std::result::Result<(), EncodeError> {
            tokio::fs::copy(input, output)
                .await
                .map(|_| ())
                .map_err(|e| EncodeError::Spawn {
                    program: "copy".to_string(),
                    message: e.to_string(),
                })
        }
    }

    struct Fixture {
        service: IngestionService,
        store: Arc<ImageStore>,
        upload: tempfile::TempDir,
        _scratch: tempfile::TempDir,
        user: i64,
    }

    impl Fixture {
        async fn new(max_file_size: usize) -> Self {
            let pool = test_pool().await;
            let user = create_test_user(&pool, "uploader").await;
            let upload = tempfile::tempdir().unwrap();
            let scratch = tempfile::tempdir().unwrap();

            let storage = Arc::new(UploadStorage::new(upload.path()));
            let store = Arc::new(ImageStore::new(pool.clone()));
            let categories = Arc::new(CategoryService::new(pool, store.clone()));
            let converter = Arc::new(ImageConverter::new(
                storage.clone(),
                scratch.path(),
                Arc::new(CopyEncoder),
                Duration::from_secs(5),
            ));

            Self {
                service: IngestionService::new(
                    store.clone(),
                    categories,
                    converter,
                    storage,
                    max_file_size,
                ),
                store,
                upload,
                _scratch: scratch,
                user,
            }
        }

        fn stored_files(&self) -> usize {
            std::fs::read_dir(self.upload.path()).unwrap().count()
        }
    }

    fn file(name: &str) -> IncomingFile {
        IncomingFile::new(name, Bytes::from_static(b"pixels"))
    }

    #[tokio::test]
    async fn test_bad_file_in_the_middle_does_not_stop_the_batch() {
        let fx = Fixture::new(1024).await;
        let result = fx
            .service
            .ingest_batch(
                vec![file("one.jpg"), file("two.bmp"), file("three.PNG")],
                fx.user,
                None,
            )
            .await
            .unwrap();

        let succeeded: Vec<&str> = result
            .succeeded
            .iter()
            .map(|s| s.original_name.as_str())
            .collect();
        assert_eq!(succeeded, vec!["one.jpg", "three.PNG"]);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].original_name, "two.bmp");
        assert_eq!(result.failed[0].code, UploadFailureKind::UnsupportedFormat);
        assert!(!result.has_dependency_failure());

        assert_eq!(fx.stored_files(), 2);
        for uploaded in &result.succeeded {
            assert!(uploaded.filename.ends_with(".webp"));
            let image = fx.store.find_by_id(uploaded.id).await.unwrap().unwrap();
            assert_eq!(image.status, ImageStatus::Pending);
            assert_eq!(image.uploader_id, fx.user);
        }
    }

    #[tokio::test]
    async fn test_oversized_and_unreadable_files_fail_individually() {
        let fx = Fixture::new(4).await;
        let result = fx
            .service
            .ingest_batch(
                vec![
                    file("big.png"),
                    IncomingFile::unreadable("broken.gif", "connection reset"),
                    IncomingFile::new("tiny.gif", Bytes::from_static(b"gif")),
                ],
                fx.user,
                Some(1),
            )
            .await
            .unwrap();

        assert_eq!(result.succeeded.len(), 1);
        let codes: Vec<UploadFailureKind> = result.failed.iter().map(|f| f.code).collect();
        assert_eq!(
            codes,
            vec![UploadFailureKind::FileTooLarge, UploadFailureKind::ReadError]
        );

        let image = fx
            .store
            .find_by_id(result.succeeded[0].id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(image.category_id, Some(1));
    }

    #[tokio::test]
    async fn test_request_level_validation() {
        let fx = Fixture::new(1024).await;

        let err = fx.service.ingest_batch(vec![], fx.user, None).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = fx
            .service
            .ingest_batch(vec![file("a.png")], fx.user, Some(42))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(fx.stored_files(), 0);
    }

    #[tokio::test]
    async fn test_failed_insert_removes_converted_file() {
        let fx = Fixture::new(1024).await;
        // No such user: the foreign key rejects the row after conversion
        let result = fx
            .service
            .ingest_batch(vec![file("a.png")], fx.user + 100, None)
            .await
            .unwrap();

        assert!(result.succeeded.is_empty());
        assert_eq!(result.failed[0].code, UploadFailureKind::StorageError);
        assert!(result.has_dependency_failure());
        assert_eq!(fx.stored_files(), 0);
    }
}
