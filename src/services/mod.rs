pub mod auth_service;
pub mod car_service;
pub mod payment_service;
pub mod service_record_service;
pub mod storage_service;

pub use storage_service::{ImageMeta, ImageStorage, UploadedImage};
