//! Signed URLs for the local backend.
//!
//! S3 presigns natively. The local backend hands out
//! `{base_url}/{key}?token=...` where the token is an HS256 JWT binding the
//! HTTP method, the key and an expiry. The API's media route verifies it.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::traits::{StorageError, StorageResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlMethod {
    Get,
    Put,
}

impl UrlMethod {
    fn as_str(self) -> &'static str {
        match self {
            UrlMethod::Get => "GET",
            UrlMethod::Put => "PUT",
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct UrlClaims {
    key: String,
    method: String,
    exp: i64,
}

#[derive(Clone)]
pub struct UrlSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl UrlSigner {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    pub fn sign(
        &self,
        method: UrlMethod,
        storage_key: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        let exp = chrono::Utc::now().timestamp() + expires_in.as_secs() as i64;
        let claims = UrlClaims {
            key: storage_key.to_string(),
            method: method.as_str().to_string(),
            exp,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| StorageError::BackendError(format!("Failed to sign URL: {}", e)))
    }

    /// Accepts the token only for the same method and key, before expiry.
    pub fn verify(&self, token: &str, method: UrlMethod, storage_key: &str) -> StorageResult<()> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.required_spec_claims = ["exp".to_string()].into_iter().collect();

        let data = decode::<UrlClaims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    StorageError::InvalidSignature("URL has expired".to_string())
                }
                _ => StorageError::InvalidSignature(e.to_string()),
            }
        })?;

        if data.claims.method != method.as_str() || data.claims.key != storage_key {
            return Err(StorageError::InvalidSignature(
                "URL was not issued for this object".to_string(),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("UrlSigner(..)")
    }
}
