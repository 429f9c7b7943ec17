use std::time::Duration;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{config::JwtConfig, error::AppError};

/// Which half of the token pair a JWT is; only `Access` opens the API.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
    pub kind: TokenKind,
}

/// HS256 key material plus the lifetimes of both token kinds.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        let minutes = |m: i64| Duration::from_secs(m.max(1) as u64 * 60);
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: minutes(cfg.ttl_minutes),
            refresh_ttl: minutes(cfg.refresh_ttl_minutes),
        }
    }

    fn lifetime(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        }
    }

    fn issue_at(&self, sub: Uuid, kind: TokenKind, at: OffsetDateTime) -> anyhow::Result<String> {
        let iat = at.unix_timestamp();
        let claims = Claims {
            sub,
            iat,
            exp: iat + self.lifetime(kind).as_secs() as i64,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        debug!(%sub, ?kind, "token issued");
        Ok(token)
    }

    pub fn sign_access(&self, user_id: Uuid) -> anyhow::Result<String> {
        self.issue_at(user_id, TokenKind::Access, OffsetDateTime::now_utc())
    }

    pub fn sign_refresh(&self, user_id: Uuid) -> anyhow::Result<String> {
        self.issue_at(user_id, TokenKind::Refresh, OffsetDateTime::now_utc())
    }

    /// Checks signature, expiry, issuer, audience and that `kind` matches.
    fn verify(&self, token: &str, expected: TokenKind) -> anyhow::Result<Claims> {
        let mut rules = Validation::new(Algorithm::HS256);
        rules.set_issuer(&[self.issuer.as_str()]);
        rules.set_audience(&[self.audience.as_str()]);
        let claims = decode::<Claims>(token, &self.decoding, &rules)?.claims;
        anyhow::ensure!(
            claims.kind == expected,
            "expected {expected:?} token, got {:?}",
            claims.kind
        );
        Ok(claims)
    }

    pub fn verify_access(&self, token: &str) -> anyhow::Result<Claims> {
        self.verify(token, TokenKind::Access)
    }

    pub fn verify_refresh(&self, token: &str) -> anyhow::Result<Claims> {
        self.verify(token, TokenKind::Refresh)
    }
}

/// Authenticated caller, taken from `Authorization: Bearer <access token>`.
pub struct AuthUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| AppError::Unauthenticated("No token, authorization denied".into()))?;
        let token = raw
            .to_str()
            .ok()
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Unauthenticated("Invalid Authorization header".into()))?;

        JwtKeys::from_ref(state)
            .verify_access(token)
            .map(|claims| AuthUser(claims.sub))
            .map_err(|e| {
                warn!(error = %e, "access token rejected");
                AppError::Unauthenticated("Invalid or expired token".into())
            })
    }
}
