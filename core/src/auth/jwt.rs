use crate::config::AuthConfig;
use crate::error::{ServiceError, ServiceResult};
use anyhow::anyhow;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub sub: String,
    pub iat: usize,
    pub exp: usize,
}

/// Signing material derived once from `JWT_SECRET_KEY`.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: u64,
}

impl JwtKeys {
    pub fn from_config(cfg: &AuthConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.jwt_secret.as_bytes()),
            ttl_secs: cfg.access_ttl_secs(),
        }
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    pub fn issue(&self, sub: &str) -> ServiceResult<String> {
        issue_access_token(&self.encoding, sub, self.ttl_secs)
    }

    pub fn validate(&self, token: &str) -> ServiceResult<AccessTokenClaims> {
        validate_access_token(&self.decoding, token)
    }
}

pub fn issue_access_token(
    encoding_key: &EncodingKey,
    sub: &str,
    ttl_secs: u64,
) -> ServiceResult<String> {
    let now = unix_timestamp()?;
    let exp = now
        .checked_add(ttl_secs)
        .ok_or_else(|| ServiceError::Other(anyhow!("access token exp overflow")))?;

    let claims = AccessTokenClaims {
        sub: sub.to_string(),
        iat: to_usize(now, "iat")?,
        exp: to_usize(exp, "exp")?,
    };

    let header = Header::new(Algorithm::HS256);
    jsonwebtoken::encode(&header, &claims, encoding_key)
        .map_err(|err| ServiceError::Other(anyhow!("failed to issue jwt: {err}")))
}

pub fn validate_access_token(
    decoding_key: &DecodingKey,
    token: &str,
) -> ServiceResult<AccessTokenClaims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp", "sub"]);

    let data = jsonwebtoken::decode::<AccessTokenClaims>(token, decoding_key, &validation)
        .map_err(|_| ServiceError::Unauthorized("invalid access token".into()))?;

    if data.claims.sub.trim().is_empty() {
        return Err(ServiceError::Unauthorized("token subject missing".into()));
    }

    Ok(data.claims)
}

fn unix_timestamp() -> ServiceResult<u64> {
    let now = Utc::now().timestamp();
    u64::try_from(now).map_err(|_| ServiceError::Other(anyhow!("system clock before epoch")))
}

fn to_usize(value: u64, label: &str) -> ServiceResult<usize> {
    usize::try_from(value)
        .map_err(|_| ServiceError::Other(anyhow!("jwt claim {label} does not fit into usize")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(secret: &str) -> JwtKeys {
        JwtKeys::from_config(&AuthConfig {
            username: "admin".into(),
            password_hash: String::new(),
            jwt_secret: secret.into(),
            access_ttl_hours: 168,
        })
    }

    #[test]
    fn issued_token_round_trips_subject() {
        let keys = keys("test-secret");
        let token = keys.issue("admin").unwrap();
        let claims = keys.validate(&token).unwrap();
        assert_eq!(claims.sub, "admin");
        assert_eq!(claims.exp - claims.iat, 168 * 3600);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = keys("secret-a").issue("admin").unwrap();
        let err = keys("secret-b").validate(&token).unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let now = Utc::now().timestamp() as usize;
        let claims = AccessTokenClaims {
            sub: "admin".into(),
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        let err = keys("test-secret").validate(&token).unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(keys("test-secret").validate("not-a-jwt").is_err());
    }
}
