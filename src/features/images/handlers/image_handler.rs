use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::error::{AppError, Result};
use crate::core::extractor::AppQuery;
use crate::features::auth::guards::RequireUploader;
use crate::features::images::dtos::{
    BatchUploadResultDto, ImageFilterQuery, ImageResponseDto, UploadImagesDto,
};
use crate::features::images::services::{IncomingFile, IngestionService, QueryService};
use crate::shared::types::{ApiResponse, PaginationQuery};

/// Upload one or more images for moderation
///
/// Accepts multipart/form-data with:
/// - `images` (or `image`): one or more files, repeated
/// - `category_id`: optional category recorded with every pending image
///
/// Each file is handled on its own. The request is 201 when at least one file
/// was stored; failures are listed next to the successes.
#[utoipa::path(
    post,
    path = "/api/images/upload",
    tag = "images",
    request_body(
        content = UploadImagesDto,
        content_type = "multipart/form-data",
        description = "Image files with an optional category",
    ),
    responses(
        (status = 201, description = "At least one image stored", body = ApiResponse<BatchUploadResultDto>),
        (status = 400, description = "Nothing stored because of invalid input", body = ApiResponse<BatchUploadResultDto>),
        (status = 401, description = "Authentication required"),
        (status = 403, description = "A registered user account is required"),
        (status = 413, description = "Request too large"),
        (status = 500, description = "Nothing stored because of a server failure", body = ApiResponse<BatchUploadResultDto>)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn upload_images(
    RequireUploader(uploader_id): RequireUploader,
    State(service): State<Arc<IngestionService>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<BatchUploadResultDto>>)> {
    let mut files: Vec<IncomingFile> = Vec::new();
    let mut category_id: Option<i64> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            // A broken stream after some files still lets those files through
            Err(e) if !files.is_empty() => {
                warn!("Multipart stream ended early: {}", e);
                break;
            }
            Err(e) => {
                debug!("Failed to read multipart field: {}", e);
                return Err(AppError::BadRequest(format!(
                    "Failed to read multipart data: {}",
                    e
                )));
            }
        };

        let field_name = field.name().unwrap_or("").to_string();
        match field_name.as_str() {
            "images" | "image" => {
                let original_name = field.file_name().unwrap_or("unnamed").to_string();
                match field.bytes().await {
                    Ok(data) => files.push(IncomingFile::new(original_name, data)),
                    Err(e) => {
                        files.push(IncomingFile::unreadable(original_name, e.to_string()));
                        break;
                    }
                }
            }
            "category_id" => {
                let text = field.text().await.map_err(|e| {
                    AppError::BadRequest(format!("Failed to read category_id field: {}", e))
                })?;
                category_id = parse_category_id(&text)?;
            }
            _ => {
                debug!("Ignoring unknown field: {}", field_name);
            }
        }
    }

    let result = service
        .ingest_batch(files, uploader_id, category_id)
        .await?;

    if !result.succeeded.is_empty() {
        let message = format!(
            "{} of {} images uploaded",
            result.succeeded.len(),
            result.succeeded.len() + result.failed.len()
        );
        return Ok((
            StatusCode::CREATED,
            Json(ApiResponse::success(Some(result), Some(message), None)),
        ));
    }

    let status = if result.has_dependency_failure() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::BAD_REQUEST
    };
    let errors = result.failure_reasons();
    Ok((
        status,
        Json(ApiResponse::failure(
            result,
            "No images were uploaded".to_string(),
            errors,
        )),
    ))
}

fn parse_category_id(text: &str) -> Result<Option<i64>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    text.parse::<i64>()
        .map(Some)
        .map_err(|_| AppError::Validation(format!("Invalid category_id '{}'", text)))
}

/// List approved images
#[utoipa::path(
    get,
    path = "/api/images",
    params(PaginationQuery, ImageFilterQuery),
    responses(
        (status = 200, description = "Approved images, newest approval first", body = ApiResponse<Vec<ImageResponseDto>>),
        (status = 400, description = "Invalid query parameters")
    ),
    tag = "images"
)]
pub async fn list_images(
    State(service): State<Arc<QueryService>>,
    AppQuery(pagination): AppQuery<PaginationQuery>,
    AppQuery(filter): AppQuery<ImageFilterQuery>,
) -> Result<Json<ApiResponse<Vec<ImageResponseDto>>>> {
    let (images, total) = service
        .list_approved(&pagination, filter.category_id)
        .await?;
    Ok(Json(ApiResponse::success(
        Some(images),
        None,
        Some(pagination.meta(total)),
    )))
}

/// Get one random approved image
#[utoipa::path(
    get,
    path = "/api/images/random",
    params(ImageFilterQuery),
    responses(
        (status = 200, description = "A random approved image", body = ApiResponse<ImageResponseDto>),
        (status = 404, description = "No approved image matches")
    ),
    tag = "images"
)]
pub async fn random_image(
    State(service): State<Arc<QueryService>>,
    AppQuery(filter): AppQuery<ImageFilterQuery>,
) -> Result<Json<ApiResponse<ImageResponseDto>>> {
    let image = service.random_approved(filter.category_id).await?;
    Ok(Json(ApiResponse::success(Some(image), None, None)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::categories::CategoryService;
    use crate::features::images::{routes, ImageStore};
    use crate::modules::imaging::{EncodeError, Encoder, ImageConverter};
    use crate::modules::storage::UploadStorage;
    use crate::shared::test_helpers::{create_test_user, test_pool, with_user_auth};
    use async_trait::async_trait;
    use axum_test::multipart::{MultipartForm, Part};
    use axum_test::TestServer;
    use chrono::Utc;
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

    struct FailingEncoder;

    #[async_trait]
    impl Encoder for FailingEncoder {
        async fn encode(&self, _input: &Path, _output: &Path) -> std::result::Result<(), EncodeError> {
            Err(EncodeError::AllFailed {
                primary: "cwebp: not found".to_string(),
                fallback: "./.bin/webp/cwebp: not found".to_string(),
            })
        }
    }

    struct Fixture {
        ingestion: Arc<IngestionService>,
        query: Arc<QueryService>,
        store: Arc<ImageStore>,
        user: i64,
        _upload: tempfile::TempDir,
        _scratch: tempfile::TempDir,
    }

    impl Fixture {
        async fn new(encoder: Arc<dyn Encoder>) -> Self {
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
                encoder,
                Duration::from_secs(5),
            ));

            Self {
                ingestion: Arc::new(IngestionService::new(
                    store.clone(),
                    categories.clone(),
                    converter,
                    storage,
                    1024 * 1024,
                )),
                query: Arc::new(QueryService::new(store.clone(), categories)),
                store,
                user,
                _upload: upload,
                _scratch: scratch,
            }
        }

        fn upload_server(&self) -> TestServer {
            let app = with_user_auth(
                routes::upload_routes(self.ingestion.clone(), 10 * 1024 * 1024),
                self.user,
            );
            TestServer::new(app).unwrap()
        }

        fn public_server(&self) -> TestServer {
            TestServer::new(routes::routes(self.query.clone())).unwrap()
        }
    }

    fn image_part(name: &str) -> Part {
        Part::bytes(b"fake image".to_vec())
            .file_name(name)
            .mime_type("application/octet-stream")
    }

    #[test]
    fn test_parse_category_id() {
        assert_eq!(parse_category_id("").unwrap(), None);
        assert_eq!(parse_category_id(" 3 ").unwrap(), Some(3));
        assert!(parse_category_id("cats").is_err());
    }

    #[tokio::test]
    async fn test_partial_batch_is_created() {
        let fx = Fixture::new(Arc::new(CopyEncoder)).await;
        let form = MultipartForm::new()
            .add_part("images", image_part("a.jpg"))
            .add_part("images", image_part("b.txt"))
            .add_part("image", image_part("c.gif"))
            .add_text("category_id", "1");

        let response = fx.upload_server().post("/api/images/upload").multipart(form).await;
        assert_eq!(response.status_code(), StatusCode::CREATED);

        let body: serde_json::Value = response.json();
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["succeeded"].as_array().unwrap().len(), 2);
        assert_eq!(body["data"]["failed"][0]["original_name"], "b.txt");
        assert_eq!(body["data"]["failed"][0]["code"], "unsupported_format");
    }

    #[tokio::test]
    async fn test_all_invalid_is_bad_request() {
        let fx = Fixture::new(Arc::new(CopyEncoder)).await;
        let form = MultipartForm::new().add_part("images", image_part("virus.exe"));

        let response = fx.upload_server().post("/api/images/upload").multipart(form).await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["success"], false);
        assert_eq!(body["data"]["failed"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_encoder_outage_is_server_error() {
        let fx = Fixture::new(Arc::new(FailingEncoder)).await;
        let form = MultipartForm::new().add_part("images", image_part("a.png"));

        let response = fx.upload_server().post("/api/images/upload").multipart(form).await;
        assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = response.json();
        assert_eq!(body["data"]["failed"][0]["code"], "conversion_failed");
    }

    #[tokio::test]
    async fn test_upload_requires_user() {
        let fx = Fixture::new(Arc::new(CopyEncoder)).await;
        let server =
            TestServer::new(routes::upload_routes(fx.ingestion.clone(), 1024 * 1024)).unwrap();
        let form = MultipartForm::new().add_part("images", image_part("a.png"));

        let response = server.post("/api/images/upload").multipart(form).await;
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_gallery_listing_and_random() {
        let fx = Fixture::new(Arc::new(CopyEncoder)).await;
        let server = fx.public_server();

        let response = server.get("/api/images/random").await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

        for i in 0..3 {
            let image = fx
                .store
                .insert(&format!("{i}.webp"), "x.png", fx.user, None)
                .await
                .unwrap();
            fx.store
                .transition_to_approved(image.id, 1 + i, Utc::now())
                .await
                .unwrap();
        }

        let response = server
            .get("/api/images")
            .add_query_param("page", 1)
            .add_query_param("limit", 2)
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: serde_json::Value = response.json();
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
        assert_eq!(body["meta"]["total"], 3);
        assert_eq!(body["meta"]["limit"], 2);

        let response = server
            .get("/api/images")
            .add_query_param("category_id", "")
            .await;
        let body: serde_json::Value = response.json();
        assert_eq!(body["meta"]["total"], 3);

        let response = server
            .get("/api/images/random")
            .add_query_param("category_id", 2)
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: serde_json::Value = response.json();
        assert_eq!(body["data"]["category_id"], 2);
        assert!(body["data"]["url"].as_str().unwrap().starts_with("/uploads/"));

        let response = server
            .get("/api/images")
            .add_query_param("category_id", "abc")
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    }
}
