use utoipa::OpenApi;
use utoipa::openapi::security::{SecurityScheme, HttpAuthScheme, HttpBuilder};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Car Management System API",
        version = "1.0.0",
        description = "Manage cars, their service history and service payments.\n\n**Authentication:** Most endpoints require a JWT Bearer token from `/api/users/login`.\n\n**Features:**\n- User registration and login\n- Car catalog with owner-only editing and image upload\n- Service history per car\n- Razorpay order creation and payment signature verification\n- Health monitoring and metrics"
    ),
    paths(
        // Users
        crate::api::users::register,
        crate::api::users::login,
        crate::api::users::get_profile,
        crate::api::users::list_users,

        // Cars
        crate::api::cars::list_cars,
        crate::api::cars::my_cars,
        crate::api::cars::get_car,
        crate::api::cars::create_car,
        crate::api::cars::update_car,
        crate::api::cars::delete_car,

        // Services
        crate::api::services::list_all,
        crate::api::services::list_for_car,
        crate::api::services::create_service,
        crate::api::services::update_service,
        crate::api::services::delete_service,

        // Payments
        crate::api::payments::create_order,
        crate::api::payments::verify_payment,

        // Health & Metrics
        crate::api::health::health_check,
        crate::api::metrics::get_metrics,
    ),
    components(
        schemas(
            // Users
            crate::models::Role,
            crate::models::RegisterRequest,
            crate::models::LoginRequest,
            crate::models::AuthResponse,
            crate::models::UserResponse,
            crate::models::OwnerSummary,

            // Cars
            crate::models::CarInput,
            crate::models::CarResponse,
            crate::models::CarSummary,
            crate::models::OwnerField,

            // Services
            crate::models::ServiceType,
            crate::models::PaymentStatus,
            crate::models::ServiceInput,
            crate::models::PaymentDetailsInput,
            crate::models::ServiceResponse,
            crate::models::PaymentDetailsResponse,
            crate::models::CarField,

            // Payments
            crate::services::payment_service::CreateOrderRequest,
            crate::services::payment_service::VerifyPaymentRequest,
            crate::razorpay::RazorpayOrder,

            // Health & Metrics
            crate::api::health::HealthResponse,
        )
    ),
    tags(
        (name = "Users", description = "Registration, login and user profiles."),
        (name = "Cars", description = "Car catalog. Reads are public; changes are limited to the owner or an admin."),
        (name = "Services", description = "Service history of a car, with optional verified payment details."),
        (name = "Payments", description = "Razorpay order creation and payment signature verification."),
        (name = "Health", description = "Health check and system metrics endpoints for monitoring service status."),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Enter your JWT token"))
                        .build()
                ),
            );
        }
    }
}
