mod api;
mod config;
mod database;
mod middleware;
mod models;
mod razorpay;
mod seeds;
mod services;
mod utils;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::razorpay::PaymentGateway;
use crate::services::ImageStorage;
use crate::utils::AppError;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::from_env().map_err(|e| {
        log::error!("❌ Invalid configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e)
    })?;

    log::info!("🚀 Starting Car Management Service...");

    // Initialize MongoDB connection
    let db = database::MongoDB::new(&config.database_url)
        .await
        .map_err(|e| {
            log::error!("❌ Failed to connect to MongoDB: {}", e);
            std::io::Error::new(std::io::ErrorKind::ConnectionRefused, e.to_string())
        })?;

    log::info!("✅ MongoDB connected successfully");

    if config.seed_demo_cars {
        seeds::demo_cars_seed::seed_demo_cars(&db).await;
    }

    let gateway = PaymentGateway::from_config(&config.razorpay)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    match gateway.client() {
        Ok(client) => log::info!("💳 Razorpay gateway configured (key {})", client.key_id()),
        Err(_) => log::warn!("⚠️  Razorpay keys not set, payment order creation is disabled"),
    }

    let storage = ImageStorage::from_config(&config.storage)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    log::info!("🖼️  Image stores: {}", storage.store_names().join(" -> "));

    let db_data = web::Data::new(db);
    let auth_data = web::Data::new(config.auth.clone());
    let gateway_data = web::Data::new(gateway);
    let storage_data = web::Data::new(storage);

    let cors_origins = config.cors_origins.clone();
    let upload_dir = config.storage.upload_dir.clone();
    let serve_uploads = !config.storage.serverless;
    if serve_uploads {
        if let Err(e) = std::fs::create_dir_all(upload_dir.join("cars")) {
            log::warn!("⚠️  Could not create upload directory {}: {}", upload_dir.display(), e);
        }
    }

    log::info!("🌐 Server starting on {}:{}", config.host, config.port);
    log::info!("📚 Swagger UI available at: http://{}:{}/swagger-ui/", config.host, config.port);
    log::info!("📄 OpenAPI spec at: http://{}:{}/api-docs/openapi.json", config.host, config.port);

    // Start HTTP server
    HttpServer::new(move || {
        let cors = build_cors(&cors_origins);

        // Generate OpenAPI specification
        let openapi = api::swagger::ApiDoc::openapi();

        let mut app = App::new()
            .app_data(db_data.clone())
            .app_data(auth_data.clone())
            .app_data(gateway_data.clone())
            .app_data(storage_data.clone())
            .app_data(web::JsonConfig::default().error_handler(|err, _req| {
                AppError::validation(format!("Invalid JSON body: {}", err)).into()
            }))
            .app_data(web::PathConfig::default().error_handler(|err, _req| {
                AppError::validation(err.to_string()).into()
            }))
            .app_data(web::QueryConfig::default().error_handler(|err, _req| {
                AppError::validation(err.to_string()).into()
            }))
            .wrap(cors)
            .wrap(middleware::SecurityHeaders)
            .wrap(middleware::RequestMetrics)
            .wrap(Logger::default())
            // Swagger UI
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone())
            )
            .route("/", web::get().to(api::health::index))
            // Health check
            .route("/api/health", web::get().to(api::health::health_check))
            // Metrics
            .route("/metrics", web::get().to(api::metrics::get_metrics))
            // Users: register/login are public
            .service(
                web::scope("/api/users")
                    .wrap(middleware::AuthMiddleware::optional())
                    .configure(api::users::configure)
            )
            // Cars: reads are public, writes need a token
            .service(
                web::scope("/api/cars")
                    .wrap(middleware::AuthMiddleware::optional())
                    .configure(api::cars::configure)
            )
            .service(
                web::scope("/api/services")
                    .wrap(middleware::AuthMiddleware::required())
                    .configure(api::services::configure)
            )
            .service(
                web::scope("/api/payments")
                    .wrap(middleware::AuthMiddleware::required())
                    .configure(api::payments::configure)
            );

        if serve_uploads {
            app = app.service(actix_files::Files::new("/uploads", upload_dir.clone()));
        }

        app.default_service(web::to(api::health::route_not_found))
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}

fn build_cors(origins: &[String]) -> Cors {
    let cors = if origins.iter().any(|origin| origin == "*") {
        Cors::default().allow_any_origin()
    } else {
        origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .supports_credentials()
    };

    cors.allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allowed_headers(vec![
            actix_web::http::header::AUTHORIZATION,
            actix_web::http::header::CONTENT_TYPE,
            actix_web::http::header::ACCEPT,
        ])
        .expose_headers(vec![actix_web::http::header::CONTENT_TYPE])
        .max_age(3600)
}
