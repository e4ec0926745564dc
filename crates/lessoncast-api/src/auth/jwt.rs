//! HS256 access tokens signed with `JWT_SECRET`.

use crate::auth::models::{CallerContext, JwtClaims};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use lessoncast_core::AppError;
use lessoncast_services::CallerRole;
use std::time::Duration;
use uuid::Uuid;

#[derive(Clone)]
pub struct JwtService {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Mint a token; used by operators and tests.
    pub fn issue(&self, user_id: Uuid, role: CallerRole, ttl: Duration) -> Result<String, AppError> {
        let now = Utc::now().timestamp();
        let role = serde_json::to_value(role)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .ok_or_else(|| AppError::Internal("Failed to encode role".to_string()))?;
        let claims = JwtClaims {
            sub: user_id,
            role,
            exp: now + ttl.as_secs() as i64,
            iat: now,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
    }

    pub fn verify(&self, token: &str) -> Result<CallerContext, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        let data = decode::<JwtClaims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    AppError::Unauthorized("Token has expired".to_string())
                }
                _ => AppError::Unauthorized("Invalid token".to_string()),
            }
        })?;

        let role = data
            .claims
            .role
            .parse::<CallerRole>()
            .map_err(AppError::Unauthorized)?;

        Ok(CallerContext {
            user_id: data.claims.sub,
            role,
        })
    }
}
