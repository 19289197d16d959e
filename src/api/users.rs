use actix_web::{web, HttpResponse};

use crate::config::AuthConfig;
use crate::database::MongoDB;
use crate::middleware::AuthUser;
use crate::models::{AuthResponse, LoginRequest, RegisterRequest, UserResponse};
use crate::services::auth_service;
use crate::utils::AppError;

#[utoipa::path(
    post,
    path = "/api/users/register",
    tag = "Users",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = AuthResponse),
        (status = 400, description = "Invalid input or user already exists")
    )
)]
pub async fn register(
    db: web::Data<MongoDB>,
    config: web::Data<AuthConfig>,
    request: web::Json<RegisterRequest>,
) -> Result<HttpResponse, AppError> {
    let email = request.email.clone().unwrap_or_else(|| "N/A".to_string());
    log::info!("📝 POST /users/register - email: {}", email);

    match auth_service::register(&db, &config, request.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Created().json(response)),
        Err(e) => {
            log::warn!("❌ Registration failed: {} - {}", email, e);
            Err(e)
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/users/login",
    tag = "Users",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid email or password")
    )
)]
pub async fn login(
    db: web::Data<MongoDB>,
    config: web::Data<AuthConfig>,
    request: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    let email = request.email.clone().unwrap_or_else(|| "N/A".to_string());
    log::info!("🔐 POST /users/login - email: {}", email);

    match auth_service::login(&db, &config, request.into_inner()).await {
        Ok(response) => {
            log::info!("✅ Login successful: {}", email);
            Ok(HttpResponse::Ok().json(response))
        }
        Err(e) => {
            log::warn!("❌ Login failed: {} - {}", email, e);
            Err(e)
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/users/profile",
    tag = "Users",
    responses(
        (status = 200, description = "Current user's profile", body = UserResponse),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_profile(db: web::Data<MongoDB>, user: AuthUser) -> Result<HttpResponse, AppError> {
    let profile = auth_service::get_profile(&db, &user.id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": profile
    })))
}

#[utoipa::path(
    get,
    path = "/api/users",
    tag = "Users",
    responses(
        (status = 200, description = "All users, newest first"),
        (status = 403, description = "Not an admin")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_users(db: web::Data<MongoDB>, user: AuthUser) -> Result<HttpResponse, AppError> {
    user.require_admin()?;

    let users = auth_service::list_users(&db).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "count": users.len(),
        "data": users
    })))
}

/// Mounted under `/api/users` with optional auth; protected handlers take [`AuthUser`].
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/register", web::post().to(register))
        .route("/login", web::post().to(login))
        .route("/profile", web::get().to(get_profile))
        .route("", web::get().to(list_users));
}
