use crate::{
    config::AuthConfig,
    database::MongoDB,
    models::{AuthResponse, LoginRequest, RegisterRequest, Role, User, UserResponse, USERS_COLLECTION},
    utils::AppError,
};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use futures::stream::TryStreamExt;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use mongodb::bson::{doc, oid::ObjectId, DateTime as BsonDateTime};
use mongodb::error::{ErrorKind, WriteError, WriteFailure};
use mongodb::Collection;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

const MIN_PASSWORD_LEN: usize = 6;
const DUPLICATE_KEY: i32 = 11000;

// JWT Claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // user _id (hex)
    pub email: String,
    pub name: String,
    pub role: Role,
    pub iat: usize,
    pub exp: usize,
    pub jti: String,
    pub aud: String,
    pub iss: String,
}

pub fn generate_jwt(config: &AuthConfig, user: &User) -> Result<String, AppError> {
    let user_id = user
        .id
        .ok_or_else(|| AppError::Internal("Cannot issue a token for an unsaved user".into()))?;

    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_hex(),
        email: user.email.clone(),
        name: user.name.clone(),
        role: user.role,
        iat: now.timestamp() as usize,
        exp: (now + Duration::hours(config.token_ttl_hours)).timestamp() as usize,
        jti: Uuid::new_v4().to_string(),
        aud: config.jwt_audience.clone(),
        iss: config.jwt_issuer.clone(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_ref()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to generate token: {}", e)))
}

pub fn verify_token(config: &AuthConfig, token: &str) -> Result<Claims, String> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[config.jwt_audience.clone()]);

    let mut issuers = HashSet::new();
    issuers.insert(config.jwt_issuer.clone());
    validation.iss = Some(issuers);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_ref()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| format!("Invalid token: {}", e))
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn auth_response(config: &AuthConfig, user: User) -> Result<AuthResponse, AppError> {
    let token = generate_jwt(config, &user)?;
    Ok(AuthResponse {
        id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
        name: user.name,
        email: user.email,
        role: user.role,
        token,
    })
}

// User registration
pub async fn register(
    db: &MongoDB,
    config: &AuthConfig,
    request: RegisterRequest,
) -> Result<AuthResponse, AppError> {
    let name = request
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| AppError::validation("Please provide a name"))?;

    let email = request
        .email
        .as_deref()
        .map(normalize_email)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::validation("Please provide an email"))?;
    if !email.contains('@') {
        return Err(AppError::validation("Please provide a valid email"));
    }

    let password = request
        .password
        .ok_or_else(|| AppError::validation("Please provide a password"))?;
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let collection = db.collection::<User>(USERS_COLLECTION);

    if collection.find_one(doc! { "email": &email }).await?.is_some() {
        return Err(AppError::validation("User already exists"));
    }

    let hashed_password = hash(&password, DEFAULT_COST)?;

    let now = BsonDateTime::now();
    let mut user = User {
        id: None,
        name,
        email,
        password: hashed_password,
        role: Role::User,
        created_at: Some(now),
        updated_at: Some(now),
    };

    user.id = insert_user(&collection, &user).await?;

    log::info!("✅ User registered successfully: {}", user.email);

    auth_response(config, user)
}

fn is_duplicate_key(error: &mongodb::error::Error) -> bool {
    matches!(
        error.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(WriteError { code: DUPLICATE_KEY, .. }))
    )
}

/// Inserts the user; a concurrent registration that wins the unique email
/// index surfaces as "User already exists".
async fn insert_user(collection: &Collection<User>, user: &User) -> Result<Option<ObjectId>, AppError> {
    match collection.insert_one(user).await {
        Ok(result) => Ok(result.inserted_id.as_object_id()),
        Err(e) if is_duplicate_key(&e) => {
            log::warn!("⚠️  Duplicate registration for {}", user.email);
            Err(AppError::validation("User already exists"))
        }
        Err(e) => Err(e.into()),
    }
}

// User login
pub async fn login(
    db: &MongoDB,
    config: &AuthConfig,
    request: LoginRequest,
) -> Result<AuthResponse, AppError> {
    let invalid = || AppError::Unauthorized("Invalid email or password".into());

    let (email, password) = match (request.email, request.password) {
        (Some(email), Some(password)) if !email.trim().is_empty() && !password.is_empty() => {
            (normalize_email(&email), password)
        }
        _ => return Err(AppError::validation("Please provide an email and password")),
    };

    let user = db
        .collection::<User>(USERS_COLLECTION)
        .find_one(doc! { "email": &email })
        .await?
        .ok_or_else(invalid)?;

    if !verify(&password, &user.password)? {
        return Err(invalid());
    }

    auth_response(config, user)
}

pub async fn get_profile(db: &MongoDB, user_id: &ObjectId) -> Result<UserResponse, AppError> {
    db.collection::<User>(USERS_COLLECTION)
        .find_one(doc! { "_id": user_id })
        .await?
        .map(UserResponse::from)
        .ok_or_else(|| AppError::not_found("User not found"))
}

pub async fn list_users(db: &MongoDB) -> Result<Vec<UserResponse>, AppError> {
    let users: Vec<User> = db
        .collection::<User>(USERS_COLLECTION)
        .find(doc! {})
        .sort(doc! { "createdAt": -1 })
        .await?
        .try_collect()
        .await?;

    Ok(users.into_iter().map(UserResponse::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(secret: &str, audience: &str) -> AuthConfig {
        AuthConfig {
            jwt_secret: secret.to_string(),
            jwt_issuer: "car-management".to_string(),
            jwt_audience: audience.to_string(),
            token_ttl_hours: 24,
        }
    }

    fn user(role: Role) -> User {
        User {
            id: Some(ObjectId::new()),
            name: "Ravi".into(),
            email: "ravi@example.com".into(),
            password: "hash".into(),
            role,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_token_round_trip() {
        let cfg = config("secret", "car-management-api");
        let user = user(Role::Admin);
        let token = generate_jwt(&cfg, &user).unwrap();

        let claims = verify_token(&cfg, &token).unwrap();
        assert_eq!(claims.sub, user.id.unwrap().to_hex());
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.email, "ravi@example.com");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_token_rejected_with_other_secret_or_audience() {
        let token = generate_jwt(&config("secret", "car-management-api"), &user(Role::User)).unwrap();

        assert!(verify_token(&config("other", "car-management-api"), &token).is_err());
        assert!(verify_token(&config("secret", "someone-else"), &token).is_err());
        assert!(verify_token(&config("secret", "car-management-api"), "not.a.jwt").is_err());
    }

    #[test]
    fn test_unsaved_user_gets_no_token() {
        let mut unsaved = user(Role::User);
        unsaved.id = None;
        assert!(generate_jwt(&config("secret", "aud"), &unsaved).is_err());
    }

    #[tokio::test]
    #[ignore] // Requires a running MongoDB
    async fn test_duplicate_insert_reports_existing_user() {
        let uri = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "mongodb://localhost:27017/car_management_test".to_string());
        let db = MongoDB::new(&uri).await.unwrap();
        let collection = db.collection::<User>(USERS_COLLECTION);

        let mut racer = user(Role::User);
        racer.id = None;
        racer.email = format!("race-{}@example.com", ObjectId::new().to_hex());

        let first = insert_user(&collection, &racer).await.unwrap();
        let err = insert_user(&collection, &racer).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(err.to_string(), "User already exists");

        collection.delete_one(doc! { "_id": first.unwrap() }).await.unwrap();
    }

    #[test]
    fn test_email_is_normalized() {
        assert_eq!(normalize_email("  Ravi@Example.COM "), "ravi@example.com");
    }
}
