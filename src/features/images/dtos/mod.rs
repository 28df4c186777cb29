mod image_dto;
mod upload_dto;

pub use image_dto::*;
pub use upload_dto::*;
