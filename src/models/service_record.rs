use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime};
use serde::{Deserialize, Serialize};

use super::{flexible, to_rfc3339, CarSummary};

pub const SERVICES_COLLECTION: &str = "services";
pub const DEFAULT_CURRENCY: &str = "INR";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    #[default]
    Maintenance,
    Repair,
    Inspection,
    Detailing,
    Other,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Maintenance => "maintenance",
            ServiceType::Repair => "repair",
            ServiceType::Inspection => "inspection",
            ServiceType::Detailing => "detailing",
            ServiceType::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    #[serde(default)]
    pub status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<BsonDateTime>,
}

impl Default for PaymentDetails {
    fn default() -> Self {
        PaymentDetails {
            status: PaymentStatus::Pending,
            order_id: None,
            payment_id: None,
            signature: None,
            amount: None,
            currency: default_currency(),
            paid_at: None,
        }
    }
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

/// Service history entry stored in the `services` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRecord {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub car: ObjectId,
    pub date: BsonDateTime,
    pub description: String,
    pub cost: f64,
    #[serde(default)]
    pub service_type: ServiceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_service_date: Option<BsonDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_provider: Option<String>,
    #[serde(default)]
    pub payment_details: PaymentDetails,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<BsonDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<BsonDateTime>,
}

#[derive(Debug, Default, Clone, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetailsInput {
    #[serde(default)]
    pub status: Option<PaymentStatus>,
    #[serde(default, deserialize_with = "flexible::option_exact_string")]
    pub order_id: Option<String>,
    #[serde(default, deserialize_with = "flexible::option_exact_string")]
    pub payment_id: Option<String>,
    #[serde(default, deserialize_with = "flexible::option_exact_string")]
    pub signature: Option<String>,
    #[serde(default, deserialize_with = "flexible::option_f64")]
    pub amount: Option<f64>,
    #[serde(default, deserialize_with = "flexible::option_string")]
    pub currency: Option<String>,
}

/// Body of `POST /api/services` and `PUT /api/services/{id}`.
#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInput {
    /// Car id; required on create, ignored on update.
    #[serde(default, deserialize_with = "flexible::option_string")]
    pub car: Option<String>,
    #[serde(default, deserialize_with = "flexible::option_string")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "flexible::option_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "flexible::option_f64")]
    pub cost: Option<f64>,
    #[serde(default)]
    pub service_type: Option<ServiceType>,
    #[serde(default, deserialize_with = "flexible::option_string")]
    pub next_service_date: Option<String>,
    #[serde(default, deserialize_with = "flexible::option_string")]
    pub service_provider: Option<String>,
    #[serde(default)]
    pub payment_details: Option<PaymentDetailsInput>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetailsResponse {
    pub status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<String>,
}

impl From<PaymentDetails> for PaymentDetailsResponse {
    fn from(details: PaymentDetails) -> Self {
        PaymentDetailsResponse {
            status: details.status,
            order_id: details.order_id,
            payment_id: details.payment_id,
            amount: details.amount,
            currency: details.currency,
            paid_at: details.paid_at.map(to_rfc3339),
        }
    }
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(untagged)]
pub enum CarField {
    Populated(CarSummary),
    Id(String),
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub car: CarField,
    pub date: String,
    pub description: String,
    pub cost: f64,
    pub service_type: ServiceType,
    pub next_service_date: Option<String>,
    pub service_provider: Option<String>,
    pub payment_details: PaymentDetailsResponse,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl ServiceResponse {
    pub fn new(record: ServiceRecord, car: Option<CarSummary>) -> Self {
        let car = match car {
            Some(summary) => CarField::Populated(summary),
            None => CarField::Id(record.car.to_hex()),
        };

        ServiceResponse {
            id: record.id.map(|id| id.to_hex()).unwrap_or_default(),
            car,
            date: to_rfc3339(record.date),
            description: record.description,
            cost: record.cost,
            service_type: record.service_type,
            next_service_date: record.next_service_date.map(to_rfc3339),
            service_provider: record.service_provider,
            payment_details: record.payment_details.into(),
            created_at: record.created_at.map(to_rfc3339),
            updated_at: record.updated_at.map(to_rfc3339),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_details_default_to_pending_inr() {
        let details: PaymentDetails = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(details.status, PaymentStatus::Pending);
        assert_eq!(details.currency, "INR");
        assert_eq!(details, PaymentDetails::default());
    }

    #[test]
    fn test_service_input_reads_camel_case() {
        let input: ServiceInput = serde_json::from_value(serde_json::json!({
            "car": "650000000000000000000001",
            "date": "2024-05-01",
            "description": "Oil change",
            "cost": "1500",
            "serviceType": "repair",
            "serviceProvider": "",
            "paymentDetails": {
                "orderId": "order_1",
                "paymentId": "pay_1",
                "signature": "abc",
                "amount": 1500
            }
        }))
        .unwrap();

        assert_eq!(input.cost, Some(1500.0));
        assert_eq!(input.service_type, Some(ServiceType::Repair));
        assert_eq!(input.service_provider, None);
        let payment = input.payment_details.unwrap();
        assert_eq!(payment.order_id.as_deref(), Some("order_1"));
        assert_eq!(payment.status, None);
    }

    #[test]
    fn test_unknown_service_type_is_rejected() {
        let result = serde_json::from_value::<ServiceInput>(serde_json::json!({
            "serviceType": "tuning"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_response_hides_signature() {
        let record = ServiceRecord {
            id: Some(ObjectId::new()),
            car: ObjectId::new(),
            date: BsonDateTime::now(),
            description: "Inspection".into(),
            cost: 500.0,
            service_type: ServiceType::Inspection,
            next_service_date: None,
            service_provider: None,
            payment_details: PaymentDetails {
                status: PaymentStatus::Paid,
                signature: Some("deadbeef".into()),
                ..Default::default()
            },
            created_at: None,
            updated_at: None,
        };
        let json = serde_json::to_value(ServiceResponse::new(record, None)).unwrap();
        assert_eq!(json["paymentDetails"]["status"], "paid");
        assert!(json["paymentDetails"].get("signature").is_none());
        assert_eq!(json["serviceType"], "inspection");
    }
}
