//! Image conversion
//!
//! `ImageConverter` validates the upload extension, stages the bytes in a
//! scratch file and hands them to an `Encoder` that writes the canonical
//! WebP file into the upload directory.

mod converter;
mod encoder;

pub use converter::{ConversionError, ImageConverter};
pub use encoder::{CwebpEncoder, EncodeError, Encoder};
