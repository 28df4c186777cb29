mod image;

pub use image::{Image, ImageStatus};
