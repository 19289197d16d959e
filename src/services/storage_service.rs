// ==================== IMAGE STORAGE ====================
// Car images go through a chain of stores: cloud (Cloudinary) -> local disk -> inline data URI.
// A store that fails or declines hands the image to the next one; inline never fails.

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use sha1::{Digest, Sha1};
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

use crate::config::{CloudinaryConfig, StorageConfig};

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
pub const CLOUD_FOLDER: &str = "car-management/user-uploads";
pub const PUBLIC_UPLOAD_PREFIX: &str = "/uploads/cars";

/// Image file received in a multipart upload.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub file_name: Option<String>,
}

/// Hints used to name the stored file.
#[derive(Debug, Clone, Default)]
pub struct ImageMeta {
    pub brand: Option<String>,
    pub model: Option<String>,
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(None)` means the store declined the image.
    async fn store(&self, image: &UploadedImage, meta: &ImageMeta) -> Result<Option<String>, String>;
}

/// Lowercase, runs of anything but `[a-z0-9]` collapse to `-`, no leading/trailing `-`.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for c in input.trim().to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        "car".to_string()
    } else {
        slug
    }
}

fn unique_suffix() -> String {
    format!(
        "{}-{}",
        chrono::Utc::now().timestamp_millis(),
        Uuid::new_v4().as_u128() % 1_000_000_000
    )
}

fn extension_for(image: &UploadedImage) -> String {
    if let Some(ext) = image
        .file_name
        .as_deref()
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
    {
        return ext.to_lowercase();
    }

    match image.content_type.split('/').nth(1) {
        Some("jpeg") => "jpg".to_string(),
        Some("svg+xml") => "svg".to_string(),
        Some(subtype) if subtype.chars().all(|c| c.is_ascii_alphanumeric()) => subtype.to_string(),
        _ => "img".to_string(),
    }
}

// ==================== CLOUDINARY ====================

#[derive(Debug, Deserialize)]
struct CloudinaryUploadResponse {
    secure_url: String,
}

pub struct CloudinaryStore {
    http: reqwest::Client,
    config: CloudinaryConfig,
}

impl CloudinaryStore {
    pub fn new(config: CloudinaryConfig) -> Result<Self, String> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {}", e))?;
        Ok(Self { http, config })
    }

    /// Signed upload: sha1 over the sorted params joined as `k=v&k=v` followed by the API secret.
    fn sign(params: &[(&str, String)], api_secret: &str) -> String {
        let mut sorted: Vec<_> = params.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));

        let to_sign = sorted
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");

        let mut hasher = Sha1::new();
        hasher.update(to_sign.as_bytes());
        hasher.update(api_secret.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn public_id(meta: &ImageMeta) -> String {
        if meta.brand.is_some() || meta.model.is_some() {
            format!(
                "{}-{}",
                slugify(meta.brand.as_deref().unwrap_or_default()),
                slugify(meta.model.as_deref().unwrap_or_default())
            )
        } else {
            format!("car-{}", unique_suffix())
        }
    }
}

#[async_trait]
impl ImageStore for CloudinaryStore {
    fn name(&self) -> &'static str {
        "cloudinary"
    }

    async fn store(&self, image: &UploadedImage, meta: &ImageMeta) -> Result<Option<String>, String> {
        let params = vec![
            ("folder", CLOUD_FOLDER.to_string()),
            ("public_id", Self::public_id(meta)),
            ("timestamp", chrono::Utc::now().timestamp().to_string()),
        ];
        let signature = Self::sign(&params, &self.config.api_secret);

        let file_part = reqwest::multipart::Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone().unwrap_or_else(|| "upload".to_string()))
            .mime_str(&image.content_type)
            .map_err(|e| format!("Invalid content type: {}", e))?;

        let mut form = reqwest::multipart::Form::new()
            .part("file", file_part)
            .text("api_key", self.config.api_key.clone())
            .text("signature", signature);
        for (key, value) in params {
            form = form.text(key, value);
        }

        let url = format!(
            "https://api.cloudinary.com/v1_1/{}/auto/upload",
            self.config.cloud_name
        );

        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| format!("Cloudinary request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("Cloudinary upload error: {}", response.status()));
        }

        let uploaded: CloudinaryUploadResponse = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse Cloudinary response: {}", e))?;

        Ok(Some(uploaded.secure_url))
    }
}

// ==================== LOCAL DISK ====================

/// Writes into `<upload_dir>/cars/`, served under `/uploads/cars/`.
pub struct DiskStore {
    dir: PathBuf,
}

impl DiskStore {
    pub fn new(upload_dir: &Path) -> Self {
        Self {
            dir: upload_dir.join("cars"),
        }
    }
}

#[async_trait]
impl ImageStore for DiskStore {
    fn name(&self) -> &'static str {
        "disk"
    }

    async fn store(&self, image: &UploadedImage, _meta: &ImageMeta) -> Result<Option<String>, String> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| format!("Failed to create {}: {}", self.dir.display(), e))?;

        let file_name = format!("car-{}.{}", unique_suffix(), extension_for(image));
        let path = self.dir.join(&file_name);

        tokio::fs::write(&path, &image.bytes)
            .await
            .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;

        Ok(Some(format!("{}/{}", PUBLIC_UPLOAD_PREFIX, file_name)))
    }
}

// ==================== INLINE (base64) ====================

pub struct InlineStore;

#[async_trait]
impl ImageStore for InlineStore {
    fn name(&self) -> &'static str {
        "inline"
    }

    async fn store(&self, image: &UploadedImage, _meta: &ImageMeta) -> Result<Option<String>, String> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&image.bytes);
        Ok(Some(format!("data:{};base64,{}", image.content_type, encoded)))
    }
}

// ==================== CHAIN ====================

pub struct ImageStorage {
    stores: Vec<Box<dyn ImageStore>>,
}

impl ImageStorage {
    pub fn from_config(config: &StorageConfig) -> Result<Self, String> {
        let mut stores: Vec<Box<dyn ImageStore>> = Vec::new();

        if let Some(cloudinary) = &config.cloudinary {
            stores.push(Box::new(CloudinaryStore::new(cloudinary.clone())?));
        }
        if !config.serverless {
            stores.push(Box::new(DiskStore::new(&config.upload_dir)));
        }
        stores.push(Box::new(InlineStore));

        Ok(Self { stores })
    }

    #[cfg(test)]
    pub fn with_stores(stores: Vec<Box<dyn ImageStore>>) -> Self {
        Self { stores }
    }

    pub fn store_names(&self) -> Vec<&'static str> {
        self.stores.iter().map(|s| s.name()).collect()
    }

    /// Returns the image reference to persist on the car: URL, `/uploads/...` path or data URI.
    pub async fn store(&self, image: &UploadedImage, meta: &ImageMeta) -> Result<String, String> {
        for store in &self.stores {
            match store.store(image, meta).await {
                Ok(Some(location)) => {
                    if store.name() == "inline" {
                        // Inline images live inside the car document (16 MB MongoDB limit)
                        log::warn!(
                            "⚠️  Storing {} byte image inline as a data URI",
                            image.bytes.len()
                        );
                    } else {
                        log::info!("🖼️  Image stored via {}", store.name());
                    }
                    return Ok(location);
                }
                Ok(None) => continue,
                Err(e) => {
                    log::warn!("⚠️  {} upload failed, falling back: {}", store.name(), e);
                }
            }
        }

        Err("No image store accepted the upload".to_string())
    }
}
