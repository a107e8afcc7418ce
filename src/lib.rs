pub mod config;
pub mod error;
pub mod db;
pub mod properties;
pub mod storage;
pub mod storage_server;
pub mod media;
pub mod audit;

pub use config::Config;
pub use error::{PropmediaError, Result};
pub use media::{Classification, IngestSession, PropertyGroup, UploadStatus};
pub use storage::{MediaStore, StorageClient};
