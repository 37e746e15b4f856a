//!
//! src/auth.rs
//!
//! Password login and bearer tokens. Passwords are stored as argon2 PHC
//! strings, tokens are HS256 jwts carrying the user id.
//!

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::AuthConfig;
use crate::errors::{CatalogError, StoreError};
use crate::persistent::SqliteCatalog;
use crate::types::{PublicUser, User};

pub const MAX_EMAIL_LEN: usize = 250;
pub const MIN_PASSWORD_LEN: usize = 7;

mod password {
    use super::*;

    pub fn hash(plain: &str) -> Result<String, CatalogError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(plain.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| CatalogError::Internal(format!("hash password: {e}")))
    }

    /// A malformed stored hash verifies as false
    pub fn verify(plain: &str, stored: &str) -> bool {
        match PasswordHash::new(stored) {
            Ok(parsed) => Argon2::default().verify_password(plain.as_bytes(), &parsed).is_ok(),
            Err(_) => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: i64,
    pub iat: u64,
    pub exp: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub user: PublicUser,
}

/// Authenticated caller, attached to each graphql request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i64,
    pub email: String,
}

/// Trims and lower-cases, then checks shape and length
pub fn normalize_email(raw: &str) -> Result<String, CatalogError> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err(CatalogError::BadRequest("email must not be empty".to_string()));
    }
    if email.chars().count() > MAX_EMAIL_LEN {
        return Err(CatalogError::BadRequest(
            format!("email must be at most {MAX_EMAIL_LEN} characters")
        ));
    }
    let well_formed = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty()
            && !domain.contains('@')
            && domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.'),
        None => false,
    };
    if !well_formed {
        return Err(CatalogError::BadRequest("email must be an email".to_string()));
    }
    Ok(email)
}

pub fn check_password(password: &str) -> Result<(), CatalogError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(CatalogError::BadRequest(
            format!("password must be at least {MIN_PASSWORD_LEN} characters")
        ));
    }
    Ok(())
}

/// Pulls the token out of an `Authorization: Bearer <token>` value
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    let value = header?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<SqliteCatalog>,
    encoding: EncodingKey,
    decoding: DecodingKey,
    token_ttl: Duration,
}

impl AuthService {
    pub fn new(users: Arc<SqliteCatalog>, cfg: &AuthConfig) -> Self {
        Self {
            users,
            encoding: EncodingKey::from_secret(cfg.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.jwt_secret.as_bytes()),
            token_ttl: cfg.token_ttl,
        }
    }

    pub fn issue_token(&self, user: &User) -> Result<String, CatalogError> {
        let iat = unix_now();
        let claims = Claims { user_id: user.id, iat, exp: iat + self.token_ttl.as_secs() };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| CatalogError::Internal(format!("sign token: {e}")))
    }

    /// Signature and expiry only, no user lookup
    pub fn verify_token(&self, token: &str) -> Result<Claims, CatalogError> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| CatalogError::Unauthenticated(format!("invalid token: {e}")))
    }

    pub async fn login(&self, req: &LoginRequest) -> Result<LoginResponse, CatalogError> {
        let email = normalize_email(&req.email)?;
        check_password(&req.password)?;

        let user = self.users.find_user_by_email(&email).await?;
        let user = match user {
            Some(u) if password::verify(&req.password, &u.password_hash) => u,
            _ => {
                warn!(email = %email, "auth.login.rejected");
                return Err(CatalogError::Unauthenticated("Invalid credentials".to_string()));
            }
        };

        let access_token = self.issue_token(&user)?;
        info!(user_id = user.id, "auth.login");
        Ok(LoginResponse { access_token, user: PublicUser::from(&user) })
    }

    /// Resolves an Authorization header to its user. The user must still
    /// exist.
    pub async fn authenticate(&self, header: Option<&str>) -> Result<AuthUser, CatalogError> {
        let token = bearer_token(header)
            .ok_or_else(|| CatalogError::Unauthenticated("missing bearer token".to_string()))?;
        let claims = self.verify_token(token)?;

        let user = self.users.find_user_by_id(claims.user_id).await?
            .ok_or_else(|| CatalogError::Unauthenticated("user no longer exists".to_string()))?;
        Ok(AuthUser { id: user.id, email: user.email })
    }
}

/// Outcome of seeding a user account
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedOutcome {
    Created(i64),
    AlreadyExists,
}

pub async fn seed_user(users: &SqliteCatalog, email: &str, password: &str) ->
    Result<SeedOutcome, CatalogError> {
    let email = normalize_email(email)?;
    check_password(password)?;

    let hashed = password::hash(password)?;
    match users.insert_user(&email, &hashed).await {
        Ok(user) => {
            info!(user_id = user.id, email = %email, "auth.seed.created");
            Ok(SeedOutcome::Created(user.id))
        }
        Err(StoreError::Conflict(_)) => {
            info!(email = %email, "auth.seed.exists");
            Ok(SeedOutcome::AlreadyExists)
        }
        Err(e) => Err(e.into()),
    }
}
