use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::features::categories::models::Category;
use crate::shared::validation::SLUG_REGEX;

/// Response DTO for category
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CategoryResponseDto {
    pub id: i64,
    /// Display name
    #[schema(example = "梗图")]
    pub name: String,
    /// URL-safe unique key
    #[schema(example = "meme")]
    pub slug: String,
}

impl From<Category> for CategoryResponseDto {
    fn from(c: Category) -> Self {
        Self {
            id: c.id,
            name: c.name,
            slug: c.slug,
        }
    }
}

/// Request DTO for creating a category
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateCategoryDto {
    #[validate(length(min = 1, max = 64, message = "Name must be 1-64 characters"))]
    pub name: String,

    #[validate(length(min = 1, max = 64, message = "Slug must be 1-64 characters"))]
    #[validate(regex(
        path = *SLUG_REGEX,
        message = "Slug must be lowercase letters, digits and single hyphens"
    ))]
    pub slug: String,
}

/// Request DTO for updating a category; omitted fields keep their value
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateCategoryDto {
    #[validate(length(min = 1, max = 64, message = "Name must be 1-64 characters"))]
    pub name: Option<String>,

    #[validate(length(min = 1, max = 64, message = "Slug must be 1-64 characters"))]
    #[validate(regex(
        path = *SLUG_REGEX,
        message = "Slug must be lowercase letters, digits and single hyphens"
    ))]
    pub slug: Option<String>,
}
