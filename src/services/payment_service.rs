use mongodb::bson::DateTime as BsonDateTime;
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::middleware::AuthUser;
use crate::models::{flexible, PaymentDetails, PaymentDetailsInput, PaymentStatus, DEFAULT_CURRENCY};
use crate::razorpay::{CreateOrderParams, PaymentGateway, RazorpayOrder, NOT_CONFIGURED};
use crate::utils::AppError;

pub const INLINE_NOT_CONFIGURED: &str = "Payment verification configuration missing on server";
const INCOMPLETE: &str = "Payment verification details are incomplete";

#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct CreateOrderRequest {
    /// Major currency units (rupees for INR).
    #[serde(default, deserialize_with = "flexible::option_f64")]
    pub amount: Option<f64>,
    #[serde(default, deserialize_with = "flexible::option_string")]
    pub currency: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub notes: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentRequest {
    #[serde(default, deserialize_with = "flexible::option_exact_string")]
    pub order_id: Option<String>,
    #[serde(default, deserialize_with = "flexible::option_exact_string")]
    pub payment_id: Option<String>,
    #[serde(default, deserialize_with = "flexible::option_exact_string")]
    pub signature: Option<String>,
}

/// Converts a major-unit amount into the integer minor units the gateway expects.
pub fn amount_to_minor_units(amount: Option<f64>) -> Result<i64, AppError> {
    let invalid = || AppError::validation("Amount is required to initiate payment");

    let amount = amount.filter(|a| a.is_finite() && *a > 0.0).ok_or_else(invalid)?;
    let minor = (amount * 100.0).round();
    if minor < 1.0 || minor > i64::MAX as f64 {
        return Err(invalid());
    }

    Ok(minor as i64)
}

fn order_notes(
    requester: &AuthUser,
    extra: Option<serde_json::Map<String, serde_json::Value>>,
) -> BTreeMap<String, serde_json::Value> {
    let mut notes = BTreeMap::new();
    notes.insert("userId".to_string(), requester.id.to_hex().into());
    notes.insert("email".to_string(), requester.email.clone().into());

    if let Some(extra) = extra {
        notes.extend(extra);
    }

    notes
}

pub async fn create_order(
    gateway: &PaymentGateway,
    requester: &AuthUser,
    request: CreateOrderRequest,
) -> Result<RazorpayOrder, AppError> {
    let amount = amount_to_minor_units(request.amount)?;
    let client = gateway.client()?;

    let params = CreateOrderParams {
        amount,
        currency: request
            .currency
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string())
            .to_uppercase(),
        receipt: format!("car-service-{}", chrono::Utc::now().timestamp_millis()),
        notes: order_notes(requester, request.notes),
    };

    let order = client.create_order(&params).await.map_err(|e| {
        log::error!("❌ Razorpay order creation failed: {}", e);
        AppError::Gateway("Unable to create payment order".to_string())
    })?;

    log::info!(
        "💳 Payment order {} created for {} ({} {})",
        order.id,
        requester.email,
        order.amount,
        order.currency
    );

    Ok(order)
}

pub fn verify_payment(gateway: &PaymentGateway, request: &VerifyPaymentRequest) -> Result<(), AppError> {
    let (order_id, payment_id, signature) =
        match (&request.order_id, &request.payment_id, &request.signature) {
            (Some(o), Some(p), Some(s)) => (o, p, s),
            _ => return Err(AppError::validation(INCOMPLETE)),
        };

    gateway.verify_signature(order_id, payment_id, signature, NOT_CONFIGURED)?;

    log::info!("✅ Payment {} verified for order {}", payment_id, order_id);
    Ok(())
}

/// Resolves the payment details to persist on a service create or update.
///
/// Returns `None` when an update carries no payment details at all; on create
/// the caller falls back to [`PaymentDetails::default`].
pub fn resolve_payment_details(
    gateway: &PaymentGateway,
    input: Option<&PaymentDetailsInput>,
    fallback_amount: Option<f64>,
    existing: Option<&PaymentDetails>,
) -> Result<Option<PaymentDetails>, AppError> {
    let input = match input {
        Some(input) => input,
        None => return Ok(None),
    };

    let currency = input
        .currency
        .clone()
        .or_else(|| existing.map(|e| e.currency.clone()))
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

    match (&input.order_id, &input.payment_id, &input.signature) {
        (Some(order_id), Some(payment_id), Some(signature)) => {
            gateway.verify_signature(order_id, payment_id, signature, INLINE_NOT_CONFIGURED)?;

            log::info!("✅ Inline payment verification passed for order {}", order_id);

            Ok(Some(PaymentDetails {
                status: input.status.unwrap_or(PaymentStatus::Paid),
                order_id: Some(order_id.clone()),
                payment_id: Some(payment_id.clone()),
                signature: Some(signature.clone()),
                amount: input.amount.or(fallback_amount),
                currency,
                paid_at: Some(BsonDateTime::now()),
            }))
        }
        (None, None, None) => {
            let status = input.status.unwrap_or_default();
            if status == PaymentStatus::Paid {
                return Err(AppError::validation(
                    "A paid status requires verified payment details",
                ));
            }

            Ok(Some(PaymentDetails {
                status,
                amount: input.amount,
                currency,
                ..Default::default()
            }))
        }
        _ => Err(AppError::validation(INCOMPLETE)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RazorpayConfig;
    use crate::models::Role;
    use crate::razorpay::signature::payment_signature;
    use mongodb::bson::oid::ObjectId;

    fn gateway(secret: Option<&str>) -> PaymentGateway {
        PaymentGateway::from_config(&RazorpayConfig {
            key_id: Some("rzp_test_key".into()),
            key_secret: secret.map(String::from),
            api_base: "http://127.0.0.1:9".into(),
        })
        .unwrap()
    }

    fn requester() -> AuthUser {
        AuthUser {
            id: ObjectId::new(),
            email: "asha@example.com".into(),
            name: "Asha".into(),
            role: Role::User,
        }
    }

    fn signed_input(secret: &str) -> PaymentDetailsInput {
        PaymentDetailsInput {
            order_id: Some("order_9A33XWu170gUtm".into()),
            payment_id: Some("pay_29QQoUBi66xm2f".into()),
            signature: Some(payment_signature(secret, "order_9A33XWu170gUtm", "pay_29QQoUBi66xm2f")),
            ..Default::default()
        }
    }

    #[test]
    fn test_amount_in_minor_units() {
        assert_eq!(amount_to_minor_units(Some(500.0)).unwrap(), 50000);
        assert_eq!(amount_to_minor_units(Some(0.01)).unwrap(), 1);
        assert_eq!(amount_to_minor_units(Some(1299.5)).unwrap(), 129950);
    }

    #[test]
    fn test_amount_rejects_missing_zero_and_negative() {
        for amount in [None, Some(0.0), Some(-10.0), Some(f64::NAN), Some(0.001)] {
            let err = amount_to_minor_units(amount).unwrap_err();
            assert_eq!(err.to_string(), "Amount is required to initiate payment");
        }
    }

    #[test]
    fn test_caller_notes_override_defaults() {
        let user = requester();
        let mut extra = serde_json::Map::new();
        extra.insert("email".into(), "billing@example.com".into());
        extra.insert("carId".into(), "abc".into());

        let notes = order_notes(&user, Some(extra));
        assert_eq!(notes["userId"], user.id.to_hex());
        assert_eq!(notes["email"], "billing@example.com");
        assert_eq!(notes["carId"], "abc");
    }

    #[tokio::test]
    async fn test_create_order_without_credentials_fails() {
        let err = create_order(
            &PaymentGateway::default(),
            &requester(),
            CreateOrderRequest {
                amount: Some(100.0),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), NOT_CONFIGURED);
    }

    #[test]
    fn test_verify_requires_all_fields() {
        let request = VerifyPaymentRequest {
            order_id: Some("order_1".into()),
            payment_id: None,
            signature: Some("abc".into()),
        };
        let err = verify_payment(&gateway(Some("secret")), &request).unwrap_err();
        assert_eq!(err.to_string(), INCOMPLETE);
    }

    #[test]
    fn test_verify_accepts_valid_signature() {
        let request = VerifyPaymentRequest {
            order_id: Some("order_1".into()),
            payment_id: Some("pay_1".into()),
            signature: Some(payment_signature("secret", "order_1", "pay_1")),
        };
        assert!(verify_payment(&gateway(Some("secret")), &request).is_ok());

        let err = verify_payment(&gateway(Some("other-secret")), &request).unwrap_err();
        assert_eq!(err.to_string(), "Payment verification failed");
    }

    #[test]
    fn test_padded_ids_or_signature_do_not_verify() {
        let valid = payment_signature("secret", "order_1", "pay_1");
        let bodies = [
            serde_json::json!({ "orderId": "  order_1 ", "paymentId": "pay_1", "signature": valid }),
            serde_json::json!({ "orderId": "order_1", "paymentId": "pay_1\t", "signature": valid }),
            serde_json::json!({ "orderId": "order_1", "paymentId": "pay_1", "signature": format!("  {}  \n", valid) }),
        ];

        for body in bodies {
            let request: VerifyPaymentRequest = serde_json::from_value(body.clone()).unwrap();
            let err = verify_payment(&gateway(Some("secret")), &request).unwrap_err();
            assert_eq!(err.to_string(), "Payment verification failed", "{}", body);

            let input: PaymentDetailsInput = serde_json::from_value(body.clone()).unwrap();
            let err = resolve_payment_details(&gateway(Some("secret")), Some(&input), None, None)
                .unwrap_err();
            assert_eq!(err.to_string(), "Payment verification failed", "{}", body);
        }
    }

    #[test]
    fn test_absent_details_resolve_to_none() {
        assert_eq!(resolve_payment_details(&gateway(None), None, Some(10.0), None).unwrap(), None);
    }

    #[test]
    fn test_unverified_details_default_to_pending() {
        let input = PaymentDetailsInput::default();
        let details = resolve_payment_details(&gateway(None), Some(&input), Some(1500.0), None)
            .unwrap()
            .unwrap();
        assert_eq!(details.status, PaymentStatus::Pending);
        assert_eq!(details.currency, "INR");
        assert!(details.paid_at.is_none());
    }

    #[test]
    fn test_paid_without_ids_is_rejected() {
        let input = PaymentDetailsInput {
            status: Some(PaymentStatus::Paid),
            ..Default::default()
        };
        let result = resolve_payment_details(&gateway(Some("secret")), Some(&input), None, None);
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_verified_details_are_stamped_paid() {
        let existing = PaymentDetails {
            currency: "USD".into(),
            ..Default::default()
        };
        let details = resolve_payment_details(
            &gateway(Some("secret")),
            Some(&signed_input("secret")),
            Some(1500.0),
            Some(&existing),
        )
        .unwrap()
        .unwrap();

        assert_eq!(details.status, PaymentStatus::Paid);
        assert_eq!(details.amount, Some(1500.0));
        assert_eq!(details.currency, "USD");
        assert!(details.paid_at.is_some());
    }

    #[test]
    fn test_tampered_signature_is_rejected() {
        let mut input = signed_input("secret");
        input.payment_id = Some("pay_someone_else".into());
        let err = resolve_payment_details(&gateway(Some("secret")), Some(&input), None, None).unwrap_err();
        assert_eq!(err.to_string(), "Payment verification failed");
    }

    #[test]
    fn test_partial_ids_are_incomplete() {
        let input = PaymentDetailsInput {
            order_id: Some("order_1".into()),
            ..Default::default()
        };
        let err = resolve_payment_details(&gateway(Some("secret")), Some(&input), None, None).unwrap_err();
        assert_eq!(err.to_string(), INCOMPLETE);
    }

    #[test]
    fn test_inline_verification_without_secret() {
        let err = resolve_payment_details(&gateway(None), Some(&signed_input("secret")), None, None)
            .unwrap_err();
        assert_eq!(err.to_string(), INLINE_NOT_CONFIGURED);
    }
}
