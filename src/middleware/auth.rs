use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error, FromRequest, HttpMessage, HttpRequest,
};
use futures::future::LocalBoxFuture;
use mongodb::bson::oid::ObjectId;
use std::future::{ready, Ready};

use crate::config::AuthConfig;
use crate::models::Role;
use crate::services::auth_service::{self, Claims};
use crate::utils::AppError;

/// Authenticated requester, attached to request extensions by [`AuthMiddleware`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: ObjectId,
    pub email: String,
    pub name: String,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::forbidden("Not authorized as an admin"))
        }
    }
}

impl TryFrom<Claims> for AuthUser {
    type Error = AppError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let id = ObjectId::parse_str(&claims.sub)
            .map_err(|_| AppError::Unauthorized("Not authorized, token failed".into()))?;

        Ok(AuthUser {
            id,
            email: claims.email,
            name: claims.name,
            role: claims.role,
        })
    }
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthUser>()
                .cloned()
                .ok_or_else(|| AppError::Unauthorized("Not authorized, no token".into())),
        )
    }
}

fn bearer_token(req: &ServiceRequest) -> Option<String> {
    let header = req.headers().get("Authorization")?.to_str().ok()?;
    header
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

fn authenticate(req: &ServiceRequest) -> Result<Option<AuthUser>, AppError> {
    let token = match bearer_token(req) {
        Some(token) => token,
        None => return Ok(None),
    };

    let config = req
        .app_data::<web::Data<AuthConfig>>()
        .ok_or_else(|| AppError::Internal("AuthConfig not registered as app data".into()))?;

    let claims = auth_service::verify_token(config, &token).map_err(|e| {
        log::warn!("❌ {} {} - {}", req.method(), req.path(), e);
        AppError::Unauthorized("Not authorized, token failed".into())
    })?;

    AuthUser::try_from(claims).map(Some)
}

/// Decodes the bearer token into an [`AuthUser`].
///
/// `required()` rejects requests without a valid token; `optional()` lets
/// anonymous requests through and only rejects a token that is present but invalid.
#[derive(Clone, Copy)]
pub struct AuthMiddleware {
    required: bool,
}

impl AuthMiddleware {
    pub fn required() -> Self {
        AuthMiddleware { required: true }
    }

    pub fn optional() -> Self {
        AuthMiddleware { required: false }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service,
            required: self.required,
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: S,
    required: bool,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        match authenticate(&req) {
            Ok(Some(user)) => {
                req.extensions_mut().insert(user);
            }
            Ok(None) if self.required => {
                return Box::pin(async move {
                    Err(AppError::Unauthorized("Not authorized, no token".into()).into())
                });
            }
            Ok(None) => {}
            Err(e) => return Box::pin(async move { Err(e.into()) }),
        }

        let fut = self.service.call(req);
        Box::pin(async move { fut.await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;
    use actix_web::{http::StatusCode, test, App, HttpResponse};

    fn auth_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret".into(),
            jwt_issuer: "car-management".into(),
            jwt_audience: "car-management-api".into(),
            token_ttl_hours: 1,
        }
    }

    async fn whoami(user: AuthUser) -> HttpResponse {
        HttpResponse::Ok().body(user.role.to_string())
    }

    async fn maybe_whoami(req: HttpRequest) -> HttpResponse {
        match req.extensions().get::<AuthUser>() {
            Some(user) => HttpResponse::Ok().body(user.email.clone()),
            None => HttpResponse::Ok().body("anonymous"),
        }
    }

    fn token_for(role: Role) -> String {
        let user = User {
            id: Some(ObjectId::new()),
            name: "Meera".into(),
            email: "meera@example.com".into(),
            password: String::new(),
            role,
            created_at: None,
            updated_at: None,
        };
        auth_service::generate_jwt(&auth_config(), &user).unwrap()
    }

    #[actix_web::test]
    async fn test_required_rejects_missing_token() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(auth_config()))
                .service(
                    web::resource("/private")
                        .wrap(AuthMiddleware::required())
                        .route(web::get().to(whoami)),
                ),
        )
        .await;

        let req = test::TestRequest::get().uri("/private").to_request();
        let err = app.call(req).await.unwrap_err();
        assert_eq!(err.as_response_error().status_code(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_required_accepts_valid_token() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(auth_config()))
                .service(
                    web::resource("/private")
                        .wrap(AuthMiddleware::required())
                        .route(web::get().to(whoami)),
                ),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/private")
            .insert_header(("Authorization", format!("Bearer {}", token_for(Role::Admin))))
            .to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(body, "admin");
    }

    #[actix_web::test]
    async fn test_optional_lets_anonymous_through() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(auth_config()))
                .service(
                    web::resource("/public")
                        .wrap(AuthMiddleware::optional())
                        .route(web::get().to(maybe_whoami)),
                ),
        )
        .await;

        let req = test::TestRequest::get().uri("/public").to_request();
        assert_eq!(test::call_and_read_body(&app, req).await, "anonymous");

        let req = test::TestRequest::get()
            .uri("/public")
            .insert_header(("Authorization", format!("Bearer {}", token_for(Role::User))))
            .to_request();
        assert_eq!(test::call_and_read_body(&app, req).await, "meera@example.com");
    }

    #[actix_web::test]
    async fn test_extractor_without_middleware_is_unauthorized() {
        let app = test::init_service(App::new().route("/me", web::get().to(whoami))).await;

        let req = test::TestRequest::get().uri("/me").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
