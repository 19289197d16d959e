use actix_multipart::{Multipart, MultipartError};
use actix_web::{guard, http::header, http::StatusCode, web, HttpResponse};
use futures::stream::TryStreamExt;
use std::collections::HashMap;

use crate::database::MongoDB;
use crate::middleware::AuthUser;
use crate::models::{CarInput, CarResponse};
use crate::services::storage_service::MAX_IMAGE_BYTES;
use crate::services::{car_service, ImageMeta, ImageStorage, UploadedImage};
use crate::utils::AppError;

use super::json_body;

const IMAGE_FIELD: &str = "image";
/// Largest accepted text part of a car form.
pub const MAX_FIELD_BYTES: usize = 1024 * 1024;

fn multipart_error(e: MultipartError) -> AppError {
    AppError::validation(format!("Invalid multipart body: {}", e))
}

/// Splits a multipart car form into its text fields and the optional `image` file.
pub async fn read_car_form(
    mut payload: Multipart,
) -> Result<(CarInput, Option<UploadedImage>), AppError> {
    let mut fields = HashMap::new();
    let mut image = None;

    while let Some(mut field) = payload.try_next().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(String::from);

        if name == IMAGE_FIELD && file_name.is_some() {
            let content_type = field
                .content_type()
                .map(|mime| mime.essence_str().to_string())
                .unwrap_or_default();
            if !content_type.starts_with("image/") {
                return Err(AppError::validation("Only image files are allowed!"));
            }

            let mut bytes = Vec::new();
            while let Some(chunk) = field.try_next().await.map_err(multipart_error)? {
                if bytes.len() + chunk.len() > MAX_IMAGE_BYTES {
                    return Err(AppError::validation("Image exceeds the 5MB upload limit"));
                }
                bytes.extend_from_slice(&chunk);
            }

            if !bytes.is_empty() {
                image = Some(UploadedImage {
                    bytes,
                    content_type,
                    file_name,
                });
            }
            continue;
        }

        let mut value = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(multipart_error)? {
            if value.len() + chunk.len() > MAX_FIELD_BYTES {
                return Err(AppError::validation(format!(
                    "Field '{}' exceeds the 1MB limit",
                    name
                )));
            }
            value.extend_from_slice(&chunk);
        }
        fields.insert(name, String::from_utf8_lossy(&value).into_owned());
    }

    Ok((CarInput::from_form(fields)?, image))
}

async fn attach_image(
    storage: &ImageStorage,
    input: &mut CarInput,
    image: Option<UploadedImage>,
    meta: ImageMeta,
) -> Result<(), AppError> {
    if let Some(image) = image {
        let location = storage
            .store(&image, &meta)
            .await
            .map_err(|e| AppError::Internal(format!("Image upload failed: {}", e)))?;
        input.image = Some(location);
    }
    Ok(())
}

fn car_list(cars: Vec<CarResponse>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "count": cars.len(),
        "data": cars
    }))
}

fn car_saved(status: StatusCode, message: &str, car: CarResponse) -> HttpResponse {
    HttpResponse::build(status).json(serde_json::json!({
        "success": true,
        "message": message,
        "data": car
    }))
}

#[utoipa::path(
    get,
    path = "/api/cars",
    tag = "Cars",
    responses((status = 200, description = "All cars, newest first"))
)]
pub async fn list_cars(db: web::Data<MongoDB>) -> Result<HttpResponse, AppError> {
    let cars = car_service::list_cars(&db).await?;
    Ok(car_list(cars))
}

#[utoipa::path(
    get,
    path = "/api/cars/my-cars",
    tag = "Cars",
    responses(
        (status = 200, description = "Cars owned by the requester"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = []))
)]
pub async fn my_cars(db: web::Data<MongoDB>, user: AuthUser) -> Result<HttpResponse, AppError> {
    let cars = car_service::my_cars(&db, &user).await?;
    Ok(car_list(cars))
}

#[utoipa::path(
    get,
    path = "/api/cars/{id}",
    tag = "Cars",
    params(("id" = String, Path, description = "Car id")),
    responses(
        (status = 200, description = "Car with owner and service history", body = CarResponse),
        (status = 404, description = "Car not found")
    )
)]
pub async fn get_car(db: web::Data<MongoDB>, path: web::Path<String>) -> Result<HttpResponse, AppError> {
    let car = car_service::get_car(&db, &path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": car
    })))
}

#[utoipa::path(
    post,
    path = "/api/cars",
    tag = "Cars",
    request_body(content = CarInput, description = "JSON body, or multipart/form-data with an optional `image` file"),
    responses(
        (status = 201, description = "Car created successfully", body = CarResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_car(
    db: web::Data<MongoDB>,
    user: AuthUser,
    input: web::Json<CarInput>,
) -> Result<HttpResponse, AppError> {
    log::info!("🚗 POST /cars - {}", user.email);

    let car = car_service::create_car(&db, &user, input.into_inner()).await?;
    Ok(car_saved(
        StatusCode::CREATED,
        "Car created successfully",
        car,
    ))
}

pub async fn create_car_multipart(
    db: web::Data<MongoDB>,
    storage: web::Data<ImageStorage>,
    user: AuthUser,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    log::info!("🚗 POST /cars (multipart) - {}", user.email);

    let (mut input, image) = read_car_form(payload).await?;
    input.ensure_creatable()?;

    let meta = ImageMeta {
        brand: input.brand.clone(),
        model: input.model.clone(),
    };
    attach_image(&storage, &mut input, image, meta).await?;

    let car = car_service::create_car(&db, &user, input).await?;
    Ok(car_saved(
        StatusCode::CREATED,
        "Car created successfully",
        car,
    ))
}

#[utoipa::path(
    put,
    path = "/api/cars/{id}",
    tag = "Cars",
    params(("id" = String, Path, description = "Car id")),
    request_body(content = CarInput, description = "Fields to change; JSON or multipart/form-data"),
    responses(
        (status = 200, description = "Car updated successfully", body = CarResponse),
        (status = 403, description = "Not the owner or an admin"),
        (status = 404, description = "Car not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_car(
    db: web::Data<MongoDB>,
    user: AuthUser,
    path: web::Path<String>,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    log::info!("✏️  PUT /cars/{} - {}", id, user.email);

    let existing = car_service::find_modifiable_car(&db, &user, &id, "update this car").await?;
    let input: CarInput = json_body(&body)?;

    let car = car_service::apply_car_update(&db, &user, existing, input).await?;
    Ok(car_saved(
        StatusCode::OK,
        "Car updated successfully",
        car,
    ))
}

pub async fn update_car_multipart(
    db: web::Data<MongoDB>,
    storage: web::Data<ImageStorage>,
    user: AuthUser,
    path: web::Path<String>,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    log::info!("✏️  PUT /cars/{} (multipart) - {}", id, user.email);

    // The form is not read at all unless the requester may change this car
    let existing = car_service::find_modifiable_car(&db, &user, &id, "update this car").await?;
    let (mut input, image) = read_car_form(payload).await?;

    let meta = ImageMeta {
        brand: input.brand.clone().or_else(|| Some(existing.brand.clone())),
        model: input.model.clone().or_else(|| Some(existing.model.clone())),
    };
    attach_image(&storage, &mut input, image, meta).await?;

    let car = car_service::apply_car_update(&db, &user, existing, input).await?;
    Ok(car_saved(
        StatusCode::OK,
        "Car updated successfully",
        car,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/cars/{id}",
    tag = "Cars",
    params(("id" = String, Path, description = "Car id")),
    responses(
        (status = 200, description = "Car and its services deleted"),
        (status = 403, description = "Not the owner or an admin"),
        (status = 404, description = "Car not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_car(
    db: web::Data<MongoDB>,
    user: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    log::info!("🗑️  DELETE /cars/{} - {}", id, user.email);

    car_service::delete_car(&db, &user, &id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Car deleted successfully"
    })))
}

fn is_multipart(ctx: &guard::GuardContext) -> bool {
    ctx.head()
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with("multipart/form-data"))
        .unwrap_or(false)
}

/// Mounted under `/api/cars` with optional auth. `/my-cars` must precede `/{id}`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("")
            .route(web::get().to(list_cars))
            .route(web::post().guard(guard::fn_guard(is_multipart)).to(create_car_multipart))
            .route(web::post().to(create_car)),
    )
    .route("/my-cars", web::get().to(my_cars))
    .service(
        web::resource("/{id}")
            .route(web::get().to(get_car))
            .route(web::put().guard(guard::fn_guard(is_multipart)).to(update_car_multipart))
            .route(web::put().to(update_car))
            .route(web::delete().to(delete_car)),
    );
}
