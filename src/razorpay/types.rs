use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Body of `POST /v1/orders`. `amount` is in minor currency units (paise for INR).
#[derive(Debug, Clone, Serialize)]
pub struct CreateOrderParams {
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
    pub notes: BTreeMap<String, serde_json::Value>,
}

/// Order object returned by the gateway, passed through to the checkout widget.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct RazorpayOrder {
    pub id: String,
    #[serde(default)]
    pub entity: Option<String>,
    pub amount: i64,
    #[serde(default)]
    pub amount_paid: i64,
    #[serde(default)]
    pub amount_due: i64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub attempts: i64,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub notes: serde_json::Value,
    #[serde(default)]
    pub created_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RazorpayErrorBody {
    pub error: RazorpayErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct RazorpayErrorDetail {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl std::fmt::Display for RazorpayErrorDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {}",
            self.code.as_deref().unwrap_or("UNKNOWN"),
            self.description.as_deref().unwrap_or("no description")
        )
    }
}
