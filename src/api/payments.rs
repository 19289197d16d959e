use actix_web::{web, HttpResponse};

use crate::middleware::AuthUser;
use crate::razorpay::{PaymentGateway, RazorpayOrder};
use crate::services::payment_service::{self, CreateOrderRequest, VerifyPaymentRequest};
use crate::utils::AppError;

#[utoipa::path(
    post,
    path = "/api/payments/create-order",
    tag = "Payments",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Gateway order created", body = RazorpayOrder),
        (status = 400, description = "Amount is required to initiate payment"),
        (status = 500, description = "Gateway not configured or unavailable")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_order(
    gateway: web::Data<PaymentGateway>,
    user: AuthUser,
    request: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, AppError> {
    log::info!("💳 POST /payments/create-order - {}", user.email);

    let order = payment_service::create_order(&gateway, &user, request.into_inner()).await?;

    Ok(HttpResponse::Created().json(serde_json::json!({
        "success": true,
        "data": order
    })))
}

#[utoipa::path(
    post,
    path = "/api/payments/verify",
    tag = "Payments",
    request_body = VerifyPaymentRequest,
    responses(
        (status = 200, description = "Payment verified successfully"),
        (status = 400, description = "Details incomplete or signature mismatch"),
        (status = 500, description = "Gateway secret not configured")
    ),
    security(("bearer_auth" = []))
)]
pub async fn verify_payment(
    gateway: web::Data<PaymentGateway>,
    user: AuthUser,
    request: web::Json<VerifyPaymentRequest>,
) -> Result<HttpResponse, AppError> {
    log::info!("🔏 POST /payments/verify - {}", user.email);

    payment_service::verify_payment(&gateway, &request)?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Payment verified successfully"
    })))
}

/// Mounted under `/api/payments` behind required auth.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/create-order", web::post().to(create_order))
        .route("/verify", web::post().to(verify_payment));
}
