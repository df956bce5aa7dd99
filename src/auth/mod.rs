/*!
 * # Seller authentication
 *
 * The seller panel has a single operator whose credentials come from
 * configuration. A successful login yields an HS256 JWT that is accepted
 * either from the `sellerToken` cookie or an `Authorization: Bearer` header.
 */

use axum::{
    extract::Request,
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::ServiceError;

pub const SELLER_COOKIE: &str = "sellerToken";
pub const NOT_AUTHORIZED: &str = "Not Authorized";

/// Claim structure for seller tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // seller email
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// The authenticated seller, inserted into request extensions by the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellerIdentity {
    pub email: String,
    pub token_id: String,
}

/// Issues and verifies seller tokens.
#[derive(Clone)]
pub struct SellerAuth {
    email: String,
    password_digest: [u8; 32],
    jwt_secret: String,
    token_ttl: Duration,
    secure_cookie: bool,
}

impl std::fmt::Debug for SellerAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SellerAuth")
            .field("email", &self.email)
            .field("token_ttl", &self.token_ttl)
            .finish_non_exhaustive()
    }
}

fn digest(value: &str) -> [u8; 32] {
    Sha256::digest(value.as_bytes()).into()
}

impl SellerAuth {
    pub fn new(
        email: impl Into<String>,
        password: &str,
        jwt_secret: impl Into<String>,
        token_ttl: Duration,
    ) -> Self {
        Self {
            email: email.into(),
            password_digest: digest(password),
            jwt_secret: jwt_secret.into(),
            token_ttl,
            secure_cookie: false,
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        let mut auth = Self::new(
            cfg.seller_email.clone(),
            &cfg.seller_password,
            cfg.jwt_secret.clone(),
            cfg.jwt_expiration(),
        );
        auth.secure_cookie = cfg.is_production();
        auth
    }

    /// Passwords are compared by SHA-256 digest.
    pub fn verify_credentials(&self, email: &str, password: &str) -> bool {
        email.trim().eq_ignore_ascii_case(&self.email) && digest(password) == self.password_digest
    }

    pub fn issue_token(&self) -> Result<String, ServiceError> {
        let now = Utc::now();
        let ttl = ChronoDuration::from_std(self.token_ttl)
            .map_err(|_| ServiceError::InternalError("Invalid token duration".to_string()))?;
        let claims = Claims {
            sub: self.email.clone(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| {
            error!("Failed to sign seller token: {}", e);
            ServiceError::InternalError("Failed to issue token".to_string())
        })
    }

    /// Valid signature, not expired, and issued to the configured seller.
    pub fn verify_token(&self, token: &str) -> Result<SellerIdentity, ServiceError> {
        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|e| {
            debug!(error = %e, "seller token rejected");
            unauthorized()
        })?
        .claims;

        if !claims.sub.eq_ignore_ascii_case(&self.email) {
            warn!("seller token subject does not match configured seller");
            return Err(unauthorized());
        }

        Ok(SellerIdentity {
            email: claims.sub,
            token_id: claims.jti,
        })
    }

    /// `Set-Cookie` value carrying a fresh token.
    pub fn session_cookie(&self, token: &str) -> String {
        let same_site = if self.secure_cookie { "None; Secure" } else { "Strict" };
        format!(
            "{SELLER_COOKIE}={token}; HttpOnly; Path=/; Max-Age={}; SameSite={same_site}",
            self.token_ttl.as_secs()
        )
    }

    /// `Set-Cookie` value that removes the session cookie.
    pub fn cleared_cookie(&self) -> String {
        let same_site = if self.secure_cookie { "None; Secure" } else { "Strict" };
        format!("{SELLER_COOKIE}=; HttpOnly; Path=/; Max-Age=0; SameSite={same_site}")
    }
}

fn unauthorized() -> ServiceError {
    ServiceError::Unauthorized(NOT_AUTHORIZED.to_string())
}

/// Bearer token first, then the session cookie.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SELLER_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Rejects requests that do not carry a valid seller token.
pub async fn require_seller(mut request: Request, next: Next) -> Response {
    let auth = match request.extensions().get::<Arc<SellerAuth>>() {
        Some(auth) => auth.clone(),
        None => {
            return ServiceError::InternalError(
                "Authentication service not available".to_string(),
            )
            .into_response();
        }
    };

    let Some(token) = token_from_headers(request.headers()) else {
        return unauthorized().into_response();
    };

    match auth.verify_token(&token) {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// Extension methods for Router to add the seller gate
pub trait SellerRouterExt {
    fn with_seller_auth(self) -> Self;
}

impl<S> SellerRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_seller_auth(self) -> Self {
        self.route_layer(axum::middleware::from_fn(require_seller))
    }
}

pub fn cookie_header(value: &str) -> Result<HeaderValue, ServiceError> {
    HeaderValue::from_str(value)
        .map_err(|e| ServiceError::InternalError(format!("Invalid cookie header: {e}")))
}
