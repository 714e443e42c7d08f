//! Password hashing
//!
//! Hashing and verification run on the blocking pool.

use crate::error::AppError;
use bcrypt::{hash, verify};

#[cfg(not(test))]
const COST: u32 = bcrypt::DEFAULT_COST;
#[cfg(test)]
const COST: u32 = 4;

pub async fn hash_password(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash(password, COST))
        .await
        .map_err(|e| AppError::Internal(format!("Password task failed: {}", e)))?
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

/// A malformed stored hash never matches
pub async fn verify_password(password: String, hashed: String) -> Result<bool, AppError> {
    let outcome = tokio::task::spawn_blocking(move || verify(password, &hashed))
        .await
        .map_err(|e| AppError::Internal(format!("Password task failed: {}", e)))?;
    Ok(outcome.unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_then_verify() {
        let hashed = hash_password("correct horse battery".into()).await.unwrap();
        assert_ne!(hashed, "correct horse battery");
        assert!(verify_password("correct horse battery".into(), hashed.clone()).await.unwrap());
        assert!(!verify_password("wrong".into(), hashed).await.unwrap());
    }

    #[tokio::test]
    async fn test_garbage_hash_is_a_mismatch() {
        assert!(!verify_password("anything".into(), String::new()).await.unwrap());
    }
}
