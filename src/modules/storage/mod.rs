//! Storage module for uploaded files
//!
//! Canonical images live flat in a single upload directory, named by their
//! generated stored name.

mod upload_dir;

pub use upload_dir::UploadStorage;
