//! HS256 JWT bearer tokens

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Session, SessionIssuer};
use crate::error::{AppError, Result};
use crate::models::Role;

pub const TOKEN_ISSUER: &str = "gigboard";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    sub: String,
    role: Role,
    iss: String,
    iat: i64,
    exp: i64,
}

pub struct JwtSessionIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl JwtSessionIssuer {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }
}

impl SessionIssuer for JwtSessionIssuer {
    fn issue(&self, session: &Session) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: session.user_id.to_string(),
            role: session.role,
            iss: TOKEN_ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("JWT encoding error: {}", e)))
    }

    fn recover(&self, token: &str) -> Result<Session> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[TOKEN_ISSUER]);

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AppError::InvalidToken("Token expired".to_string()),
                ErrorKind::InvalidSignature => {
                    AppError::InvalidToken("Invalid token signature".to_string())
                }
                _ => AppError::InvalidToken("Malformed token".to_string()),
            }
        })?;

        let user_id = Uuid::parse_str(&data.claims.sub)
            .map_err(|_| AppError::InvalidToken("Invalid subject claim".to_string()))?;

        Ok(Session::new(user_id, data.claims.role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_recover() {
        let issuer = JwtSessionIssuer::new("test-secret", Duration::minutes(5));
        let session = Session::new(Uuid::new_v4(), Role::Contractor);

        let token = issuer.issue(&session).unwrap();
        assert_eq!(issuer.recover(&token).unwrap(), session);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let issuer = JwtSessionIssuer::new("secret-a", Duration::minutes(5));
        let other = JwtSessionIssuer::new("secret-b", Duration::minutes(5));
        let token = issuer
            .issue(&Session::new(Uuid::new_v4(), Role::Agent))
            .unwrap();

        assert!(matches!(
            other.recover(&token),
            Err(AppError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let issuer = JwtSessionIssuer::new("test-secret", Duration::hours(-2));
        let token = issuer
            .issue(&Session::new(Uuid::new_v4(), Role::Agent))
            .unwrap();

        match issuer.recover(&token) {
            Err(AppError::InvalidToken(msg)) => assert_eq!(msg, "Token expired"),
            other => panic!("expected expired token, got {:?}", other),
        }
    }

    #[test]
    fn test_garbage_token_is_rejected() {
        let issuer = JwtSessionIssuer::new("test-secret", Duration::minutes(5));
        assert!(matches!(
            issuer.recover("not.a.jwt"),
            Err(AppError::InvalidToken(_))
        ));
    }
}
