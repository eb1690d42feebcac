//! Accounts and bearer-token authentication
//!
//! Passwords are stored as argon2 PHC strings. Sessions are stateless HS256
//! tokens carrying the user's id, name and email.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::async_trait;
use axum::extract::{FromRequestParts, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::Json;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use loominary_config::AuthConfig;
use loominary_core::User;
use loominary_persistence::UserRecord;

use crate::extract::ApiJson;
use crate::state::AppState;
use crate::ServerError;

const MAX_TOKEN_TTL_HOURS: u64 = 24 * 365 * 10;

/// Token payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub name: Option<String>,
    pub email: String,
    pub exp: i64,
}

/// Sign a session token for `user`
pub fn issue_token(user: &User, auth: &AuthConfig) -> Result<String, ServerError> {
    // Ten years at most
    let ttl = Duration::hours(auth.token_ttl_hours.min(MAX_TOKEN_TTL_HOURS) as i64);
    let claims = Claims {
        sub: user.id.clone(),
        name: user.name.clone(),
        email: user.email.clone(),
        exp: (Utc::now() + ttl).timestamp(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(auth.jwt_secret.as_bytes()),
    )
    .map_err(|e| ServerError::Internal(format!("Failed to sign token: {}", e)))
}

fn verify_token(token: &str, secret: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .ok()
}

/// The caller of an authenticated route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(ServerError::Unauthorized)?;

        let secret = state.get_config().auth.jwt_secret.clone();
        let claims = verify_token(token, &secret).ok_or(ServerError::Unauthorized)?;

        Ok(AuthUser(User {
            id: claims.sub,
            name: claims.name,
            email: claims.email,
        }))
    }
}

fn hash_password(password: &str) -> Result<String, ServerError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServerError::Internal(format!("Failed to hash password: {}", e)))
}

fn password_matches(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "Stored password hash is malformed");
            false
        },
    }
}

/// Argon2 off the async workers
async fn hash_password_blocking(password: String) -> Result<String, ServerError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ServerError::Internal(format!("Password hashing task failed: {}", e)))?
}

async fn password_matches_blocking(password: String, stored: String) -> Result<bool, ServerError> {
    tokio::task::spawn_blocking(move || password_matches(&password, &stored))
        .await
        .map_err(|e| ServerError::Internal(format!("Password check task failed: {}", e)))
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

fn required(field: Option<String>) -> Option<String> {
    field.filter(|value| !value.trim().is_empty())
}

/// POST /api/register
pub async fn register(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ServerError> {
    let (Some(name), Some(email), Some(password)) = (
        required(request.name),
        required(request.email),
        required(request.password),
    ) else {
        return Err(ServerError::InvalidRequest(
            "Name, email and password are required".to_string(),
        ));
    };

    let hash = hash_password_blocking(password).await?;
    let record = UserRecord::new(Some(name.trim().to_string()), &email, hash);

    state.users.create(&record).await.map_err(|e| match ServerError::from(e) {
        ServerError::Conflict(_) => ServerError::Conflict("User already exists".to_string()),
        other => other,
    })?;

    tracing::info!(user_id = %record.id, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: record.to_user(),
        }),
    ))
}

/// POST /api/login
pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ServerError> {
    let invalid = || ServerError::InvalidRequest("Email and password are required".to_string());
    let email = required(request.email).ok_or_else(invalid)?;
    let password = required(request.password).ok_or_else(invalid)?;

    let record = match state.users.find_by_email(&email).await? {
        Some(record) => {
            let stored = record.password_hash.clone();
            password_matches_blocking(password, stored).await?.then_some(record)
        },
        None => None,
    };
    let Some(record) = record else {
        tracing::debug!("Rejected login");
        return Err(ServerError::Unauthorized);
    };

    let user = record.to_user();
    let token = {
        let config = state.get_config();
        issue_token(&user, &config.auth)?
    };

    Ok(Json(LoginResponse { token, user }))
}
