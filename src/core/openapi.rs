use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::features::admin::{dtos as admin_dtos, handlers as admin_handlers};
use crate::features::auth;
use crate::features::categories::{dtos as categories_dtos, handlers as categories_handlers};
use crate::features::images::{
    dtos as images_dtos, handlers as images_handlers, models as images_models,
};
use crate::shared::types::{ApiResponse, Meta};

#[derive(OpenApi)]
#[openapi(
    paths(
        // Auth
        auth::handlers::register,
        auth::handlers::login,
        auth::handlers::admin_login,
        auth::handlers::admin_logout,
        auth::handlers::get_me,
        // Images
        images_handlers::upload_images,
        images_handlers::list_images,
        images_handlers::random_image,
        // Categories (public)
        categories_handlers::list_categories,
        categories_handlers::get_category,
        // Categories (admin)
        categories_handlers::create_category,
        categories_handlers::update_category,
        categories_handlers::delete_category,
        // Admin
        admin_handlers::get_stats,
        admin_handlers::list_images,
        admin_handlers::list_pending,
        admin_handlers::approve_image,
        admin_handlers::reject_image,
        admin_handlers::delete_image,
        admin_handlers::bulk_approve,
        admin_handlers::bulk_reject,
    ),
    components(
        schemas(
            Meta,
            // Auth
            auth::dtos::RegisterRequestDto,
            auth::dtos::LoginRequestDto,
            auth::dtos::AdminLoginRequestDto,
            auth::dtos::AuthUserDto,
            auth::dtos::AuthResponseDto,
            auth::dtos::MeResponseDto,
            ApiResponse<auth::dtos::AuthUserDto>,
            ApiResponse<auth::dtos::AuthResponseDto>,
            ApiResponse<auth::dtos::MeResponseDto>,
            // Images
            images_models::ImageStatus,
            images_dtos::ImageResponseDto,
            images_dtos::ImageStatsDto,
            images_dtos::UploadImagesDto,
            images_dtos::UploadFailureKind,
            images_dtos::UploadedImageDto,
            images_dtos::FailedUploadDto,
            images_dtos::BatchUploadResultDto,
            ApiResponse<images_dtos::ImageResponseDto>,
            ApiResponse<Vec<images_dtos::ImageResponseDto>>,
            ApiResponse<images_dtos::ImageStatsDto>,
            ApiResponse<images_dtos::BatchUploadResultDto>,
            // Categories
            categories_dtos::CategoryResponseDto,
            categories_dtos::CreateCategoryDto,
            categories_dtos::UpdateCategoryDto,
            ApiResponse<categories_dtos::CategoryResponseDto>,
            ApiResponse<Vec<categories_dtos::CategoryResponseDto>>,
            // Admin
            admin_dtos::ApproveRequestDto,
            admin_dtos::BulkApproveRequestDto,
            admin_dtos::BulkIdsRequestDto,
            admin_dtos::BulkApproveResponseDto,
            admin_dtos::BulkRejectResponseDto,
            ApiResponse<admin_dtos::BulkApproveResponseDto>,
            ApiResponse<admin_dtos::BulkRejectResponseDto>,
        )
    ),
    tags(
        (name = "auth", description = "Registration, login and the admin session"),
        (name = "images", description = "Image upload and the public gallery"),
        (name = "categories", description = "Image categories"),
        (name = "admin", description = "Moderation endpoints (admin only)"),
    ),
    modifiers(&SecurityAddon),
    info(
        title = "Webpics API",
        version = "0.1.0",
        description = "API documentation for the Webpics gallery",
    )
)]
pub struct ApiDoc;

/// Adds Bearer JWT security scheme to OpenAPI spec
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Modifier to override OpenAPI info from config
pub struct SwaggerInfoModifier {
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Modify for SwaggerInfoModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.info.title = self.title.clone();
        openapi.info.version = self.version.clone();
        openapi.info.description = Some(self.description.clone());
    }
}
