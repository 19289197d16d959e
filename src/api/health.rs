use actix_web::{HttpResponse, Responder};
use actix_web::web;
use serde::{Deserialize, Serialize};

use crate::database::MongoDB;

#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub success: bool,
    pub message: String,
    pub status: String,
    pub database: String,
    pub version: String,
    pub timestamp: String,
}

pub async fn index() -> impl Responder {
    HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body("Car Management System API is running")
}

#[utoipa::path(
    get,
    path = "/api/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health_check(db: web::Data<MongoDB>) -> impl Responder {
    let database = match db.health_check().await {
        Ok(_) => "connected",
        Err(e) => {
            log::warn!("⚠️  Health check: database unreachable: {}", e);
            "unreachable"
        }
    };

    HttpResponse::Ok().json(HealthResponse {
        success: true,
        message: "Car Management System API is running".to_string(),
        status: if database == "connected" { "healthy" } else { "degraded" }.to_string(),
        database: database.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

pub async fn route_not_found() -> HttpResponse {
    HttpResponse::NotFound().json(serde_json::json!({
        "success": false,
        "message": "Route not found"
    }))
}
