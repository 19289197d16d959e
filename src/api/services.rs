use actix_web::{web, HttpResponse};

use crate::database::MongoDB;
use crate::middleware::AuthUser;
use crate::models::{ServiceInput, ServiceResponse};
use crate::razorpay::PaymentGateway;
use crate::services::service_record_service;
use crate::utils::AppError;

use super::json_body;

fn service_list(services: Vec<ServiceResponse>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "count": services.len(),
        "data": services
    }))
}

#[utoipa::path(
    get,
    path = "/api/services",
    tag = "Services",
    responses(
        (status = 200, description = "Every service with its car summary"),
        (status = 403, description = "Not an admin")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_all(db: web::Data<MongoDB>, user: AuthUser) -> Result<HttpResponse, AppError> {
    let services = service_record_service::list_all(&db, &user).await?;
    Ok(service_list(services))
}

#[utoipa::path(
    get,
    path = "/api/services/{car_id}",
    tag = "Services",
    params(("car_id" = String, Path, description = "Car id")),
    responses(
        (status = 200, description = "Service history of the car, newest first"),
        (status = 404, description = "Car not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_for_car(
    db: web::Data<MongoDB>,
    _user: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let services = service_record_service::list_for_car(&db, &path.into_inner()).await?;
    Ok(service_list(services))
}

#[utoipa::path(
    post,
    path = "/api/services",
    tag = "Services",
    request_body = ServiceInput,
    responses(
        (status = 201, description = "Service added successfully", body = ServiceResponse),
        (status = 400, description = "Validation or payment verification error"),
        (status = 403, description = "Not authorized to add service to this car"),
        (status = 404, description = "Car not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_service(
    db: web::Data<MongoDB>,
    gateway: web::Data<PaymentGateway>,
    user: AuthUser,
    input: web::Json<ServiceInput>,
) -> Result<HttpResponse, AppError> {
    log::info!(
        "🔧 POST /services - car: {} by {}",
        input.car.as_deref().unwrap_or("N/A"),
        user.email
    );

    let service = service_record_service::create_service(&db, &gateway, &user, input.into_inner()).await?;

    Ok(HttpResponse::Created().json(serde_json::json!({
        "success": true,
        "message": "Service added successfully",
        "data": service
    })))
}

#[utoipa::path(
    put,
    path = "/api/services/{id}",
    tag = "Services",
    params(("id" = String, Path, description = "Service id")),
    request_body = ServiceInput,
    responses(
        (status = 200, description = "Service updated successfully", body = ServiceResponse),
        (status = 403, description = "Not the car owner or an admin"),
        (status = 404, description = "Service not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_service(
    db: web::Data<MongoDB>,
    gateway: web::Data<PaymentGateway>,
    user: AuthUser,
    path: web::Path<String>,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    log::info!("✏️  PUT /services/{} - {}", id, user.email);

    let target =
        service_record_service::find_modifiable_service(&db, &user, &id, "update this service").await?;
    let input: ServiceInput = json_body(&body)?;

    let service =
        service_record_service::apply_service_update(&db, &gateway, &user, target, input).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Service updated successfully",
        "data": service
    })))
}

#[utoipa::path(
    delete,
    path = "/api/services/{id}",
    tag = "Services",
    params(("id" = String, Path, description = "Service id")),
    responses(
        (status = 200, description = "Service deleted successfully"),
        (status = 403, description = "Not the car owner or an admin"),
        (status = 404, description = "Service not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_service(
    db: web::Data<MongoDB>,
    user: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    log::info!("🗑️  DELETE /services/{} - {}", id, user.email);

    service_record_service::delete_service(&db, &user, &id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Service deleted successfully"
    })))
}

/// Mounted under `/api/services` behind required auth.
///
/// `GET /{id}` takes a car id while `PUT`/`DELETE /{id}` take a service id.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("")
            .route(web::get().to(list_all))
            .route(web::post().to(create_service)),
    )
    .service(
        web::resource("/{id}")
            .route(web::get().to(list_for_car))
            .route(web::put().to(update_service))
            .route(web::delete().to(delete_service)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;
    use crate::middleware::AuthMiddleware;
    use crate::models::{CarInput, Role, User};
    use crate::services::{auth_service, car_service};
    use actix_web::{http::StatusCode, test, App};
    use mongodb::bson::oid::ObjectId;

    fn auth_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "services-test-secret".into(),
            jwt_issuer: "car-management".into(),
            jwt_audience: "car-management-api".into(),
            token_ttl_hours: 1,
        }
    }

    fn bearer(id: ObjectId) -> String {
        let user = User {
            id: Some(id),
            name: "Arjun".into(),
            email: "arjun@example.com".into(),
            password: String::new(),
            role: Role::User,
            created_at: None,
            updated_at: None,
        };
        format!("Bearer {}", auth_service::generate_jwt(&auth_config(), &user).unwrap())
    }

    macro_rules! services_app {
        ($db:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($db))
                    .app_data(web::Data::new(auth_config()))
                    .app_data(web::Data::new(PaymentGateway::default()))
                    .service(
                        web::scope("/api/services")
                            .wrap(AuthMiddleware::required())
                            .configure(configure),
                    ),
            )
            .await
        };
    }

    fn put(uri: &str, token: &str, body: &'static str) -> test::TestRequest {
        test::TestRequest::put()
            .uri(uri)
            .insert_header(("Authorization", token.to_string()))
            .insert_header(("Content-Type", "application/json"))
            .set_payload(body)
    }

    #[actix_web::test]
    async fn test_update_looks_up_service_before_reading_body() {
        // No server is contacted: a malformed id fails before any query
        let db = MongoDB::lazy("mongodb://localhost:27017/car_management_test")
            .await
            .unwrap();
        let app = services_app!(db);

        let req = put("/api/services/not-a-service", &bearer(ObjectId::new()), r#"{"cost":"lots"}"#)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let json: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(json["message"], "Service not found");
    }

    #[actix_web::test]
    #[ignore] // Requires a running MongoDB
    async fn test_stranger_update_and_delete_are_forbidden() {
        let uri = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "mongodb://localhost:27017/car_management_test".to_string());
        let db = MongoDB::new(&uri).await.unwrap();
        let owner = AuthUser {
            id: ObjectId::new(),
            email: "owner@example.com".into(),
            name: "Owner".into(),
            role: Role::User,
        };

        let car = car_service::create_car(
            &db,
            &owner,
            CarInput {
                brand: Some("Toyota".into()),
                model: Some("Corolla".into()),
                year: Some(2018),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let service = service_record_service::create_service(
            &db,
            &PaymentGateway::default(),
            &owner,
            ServiceInput {
                car: Some(car.id.clone()),
                description: Some("Brake pads".into()),
                cost: Some(2400.0),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let app = services_app!(db.clone());
        let stranger = bearer(ObjectId::new());
        let path = format!("/api/services/{}", service.id);

        for body in [r#"{"cost":"lots"}"#, r#"{"cost":-5}"#, "{", r#"{"description":"Pads"}"#] {
            let resp = test::call_service(&app, put(&path, &stranger, body).to_request()).await;
            assert_eq!(resp.status(), StatusCode::FORBIDDEN, "{}", body);
        }

        let req = test::TestRequest::delete()
            .uri(&path)
            .insert_header(("Authorization", stranger.clone()))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = test::call_service(&app, put(&path, &bearer(owner.id), r#"{"cost":-5}"#).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        car_service::delete_car(&db, &owner, &car.id).await.unwrap();
    }
}
