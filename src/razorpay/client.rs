use super::types::{CreateOrderParams, RazorpayErrorBody, RazorpayOrder};
use std::time::Duration;

/// Thin client for the Razorpay Orders API. Built once at startup and shared.
#[derive(Clone)]
pub struct RazorpayClient {
    http: reqwest::Client,
    api_base: String,
    key_id: String,
    key_secret: String,
}

impl RazorpayClient {
    pub fn new(api_base: &str, key_id: &str, key_secret: &str) -> Result<Self, String> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            key_id: key_id.to_string(),
            key_secret: key_secret.to_string(),
        })
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// POST /v1/orders
    pub async fn create_order(&self, params: &CreateOrderParams) -> Result<RazorpayOrder, String> {
        let url = format!("{}/v1/orders", self.api_base);

        log::debug!("🔍 Creating Razorpay order: {} {} ({})", params.amount, params.currency, params.receipt);

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .header("Accept", "application/json")
            .json(params)
            .send()
            .await
            .map_err(|e| format!("Failed to reach Razorpay: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let detail = match response.json::<RazorpayErrorBody>().await {
                Ok(body) => body.error.to_string(),
                Err(_) => "unreadable error body".to_string(),
            };
            return Err(format!("Razorpay API error ({}): {}", status, detail));
        }

        response
            .json::<RazorpayOrder>()
            .await
            .map_err(|e| format!("Failed to parse Razorpay order: {}", e))
    }
}
