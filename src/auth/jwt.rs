//! JWT token management
//!
//! Tokens only name a persisted session; signing out deletes the row, so a
//! token can outlive its session but never authenticate without it.

use crate::error::AppError;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (session ID)
    pub sub: Uuid,
    /// User ID the session belongs to
    pub uid: Uuid,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
}

/// Token handed to clients on sign in
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionToken {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
}

/// Sign a token for `session_id`
pub fn create_token(
    session_id: Uuid,
    user_id: Uuid,
    secret: &str,
    issued_at: DateTime<Utc>,
    ttl: Duration,
) -> Result<SessionToken, AppError> {
    let expires_at = issued_at + ttl;
    let claims = Claims {
        sub: session_id,
        uid: user_id,
        exp: expires_at.timestamp(),
        iat: issued_at.timestamp(),
    };

    let access_token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to create session token: {}", e)))?;

    Ok(SessionToken {
        access_token,
        token_type: "Bearer".to_string(),
        expires_at,
    })
}

/// Decode and validate a JWT token
pub fn decode_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
            AppError::Unauthorized("Session expired".to_string())
        }
        _ => AppError::Unauthorized("Invalid session token".to_string()),
    })?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() {
        let session_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let token = create_token(session_id, user_id, "secret", Utc::now(), Duration::hours(1)).unwrap();
        assert_eq!(token.token_type, "Bearer");

        let claims = decode_token(&token.access_token, "secret").unwrap();
        assert_eq!(claims.sub, session_id);
        assert_eq!(claims.uid, user_id);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = create_token(Uuid::new_v4(), Uuid::new_v4(), "a", Utc::now(), Duration::hours(1)).unwrap();
        assert!(matches!(
            decode_token(&token.access_token, "b"),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let issued = Utc::now() - Duration::hours(3);
        let token = create_token(Uuid::new_v4(), Uuid::new_v4(), "s", issued, Duration::hours(1)).unwrap();
        assert!(decode_token(&token.access_token, "s").is_err());
    }
}
