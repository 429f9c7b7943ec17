use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{LoginRequest, RegisterRequest},
        jwt::JwtKeys,
        password::{check_policy, hash_password, verify_password},
        repo_types::{NewUser, User},
    },
    error::AppError,
    state::AppState,
    store::{bounded, StoreError},
};

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex =
            Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex compiles");
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn issue_tokens(keys: &JwtKeys, user_id: Uuid) -> Result<TokenPair, AppError> {
    let access = keys.sign_access(user_id).map_err(AppError::Internal)?;
    let refresh = keys.sign_refresh(user_id).map_err(AppError::Internal)?;
    Ok(TokenPair { access, refresh })
}

pub async fn register(st: &AppState, req: RegisterRequest) -> Result<(User, TokenPair), AppError> {
    let name = req.name.trim().to_string();
    let email = normalize_email(&req.email);
    if name.is_empty() || email.is_empty() || req.password.is_empty() {
        return Err(AppError::invalid("All fields are required"));
    }
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AppError::invalid("Please enter a valid email address"));
    }
    if let Err(e) = check_policy(&req.password) {
        warn!("password rejected by policy");
        return Err(e);
    }

    let limit = st.config.store_timeout();
    if bounded(limit, st.users.find_by_email(&email)).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::Conflict("Email already registered".into()));
    }

    let password_hash = hash_password(&req.password).map_err(AppError::Internal)?;
    let new = NewUser {
        name,
        email,
        password_hash,
    };
    let user = match bounded(limit, st.users.create(new)).await {
        Ok(u) => u,
        // lost a race with a concurrent registration
        Err(StoreError::Duplicate(_)) => {
            return Err(AppError::Conflict("Email already registered".into()))
        }
        Err(e) => {
            error!(error = %e, "create user failed");
            return Err(e.into());
        }
    };

    let tokens = issue_tokens(&st.jwt, user.id)?;
    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((user, tokens))
}

pub async fn authenticate(st: &AppState, req: LoginRequest) -> Result<(User, TokenPair), AppError> {
    let email = normalize_email(&req.email);
    if email.is_empty() || req.password.is_empty() {
        return Err(AppError::invalid("All fields are required"));
    }

    let user = bounded(st.config.store_timeout(), st.users.find_by_email(&email))
        .await?
        .ok_or_else(|| {
            warn!(email = %email, "login unknown email");
            AppError::not_found("User")
        })?;

    let ok = verify_password(&req.password, &user.password_hash).map_err(AppError::Internal)?;
    if !ok {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredential);
    }

    let tokens = issue_tokens(&st.jwt, user.id)?;
    info!(user_id = %user.id, "user logged in");
    Ok((user, tokens))
}

/// Trades a refresh token for a fresh pair.
pub async fn refresh(st: &AppState, refresh_token: &str) -> Result<(User, TokenPair), AppError> {
    let claims = st.jwt.verify_refresh(refresh_token).map_err(|e| {
        warn!(error = %e, "refresh token rejected");
        AppError::Unauthenticated("Invalid or expired refresh token".into())
    })?;
    let user = bounded(st.config.store_timeout(), st.users.find_by_id(claims.sub))
        .await?
        .ok_or_else(|| AppError::Unauthenticated("User no longer exists".into()))?;
    let tokens = issue_tokens(&st.jwt, user.id)?;
    Ok((user, tokens))
}

pub async fn profile(st: &AppState, user_id: Uuid) -> Result<User, AppError> {
    bounded(st.config.store_timeout(), st.users.find_by_id(user_id))
        .await?
        .ok_or_else(|| AppError::not_found("User"))
}
