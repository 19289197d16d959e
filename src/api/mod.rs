pub mod cars;
pub mod health;
pub mod metrics;
pub mod payments;
pub mod services;
pub mod swagger;
pub mod users;

use serde::de::DeserializeOwned;

use crate::utils::AppError;

/// Decodes a raw JSON body. Update handlers call this only after the
/// ownership check, so strangers never learn whether their payload was valid.
pub fn json_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, AppError> {
    serde_json::from_slice(body)
        .map_err(|e| AppError::validation(format!("Invalid JSON body: {}", e)))
}
