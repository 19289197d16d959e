pub mod client;
pub mod signature;
pub mod types;

pub use client::RazorpayClient;
pub use types::*;

use crate::config::RazorpayConfig;
use crate::utils::AppError;

pub const NOT_CONFIGURED: &str = "Payment gateway is not configured on the server";

/// Payment gateway handle injected into handlers.
///
/// Order creation needs both key id and key secret; signature verification
/// only needs the secret, so either half may be unavailable independently.
#[derive(Clone, Default)]
pub struct PaymentGateway {
    client: Option<RazorpayClient>,
    key_secret: Option<String>,
}

impl PaymentGateway {
    pub fn from_config(config: &RazorpayConfig) -> Result<Self, String> {
        let client = match (&config.key_id, &config.key_secret) {
            (Some(key_id), Some(key_secret)) => {
                Some(RazorpayClient::new(&config.api_base, key_id, key_secret)?)
            }
            _ => None,
        };

        Ok(Self {
            client,
            key_secret: config.key_secret.clone(),
        })
    }

    pub fn client(&self) -> Result<&RazorpayClient, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::NotConfigured(NOT_CONFIGURED.to_string()))
    }

    /// Fails with 400 on mismatch and 500 when no secret is configured.
    pub fn verify_signature(
        &self,
        order_id: &str,
        payment_id: &str,
        signature: &str,
        not_configured_message: &str,
    ) -> Result<(), AppError> {
        let secret = self
            .key_secret
            .as_deref()
            .ok_or_else(|| AppError::NotConfigured(not_configured_message.to_string()))?;

        if signature::verify_payment_signature(secret, order_id, payment_id, signature) {
            Ok(())
        } else {
            log::warn!("❌ Payment signature mismatch for order {}", order_id);
            Err(AppError::validation("Payment verification failed"))
        }
    }
}
