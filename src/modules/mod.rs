//! Modules layer - Infrastructure components for external integrations
//!
//! Contains the upload directory handle and the external image encoder.

pub mod imaging;
pub mod storage;
