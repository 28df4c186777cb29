mod image_store;
mod ingestion_service;
mod query_service;

pub use image_store::ImageStore;
pub use ingestion_service::{IncomingFile, IngestionService};
pub use query_service::QueryService;
