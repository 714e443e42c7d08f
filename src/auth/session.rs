//! Request sessions
//!
//! Every handler receives a [`MaybeSession`]; anonymous requests are not
//! rejected here, the permission predicates decide what they may do.

use crate::auth::decode_token;
use crate::error::AppError;
use crate::models::User;
use crate::state::SharedState;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Persisted session row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// An authenticated session with its user loaded
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

impl Session {
    pub fn user_id(&self) -> Uuid {
        self.user.id
    }
}

/// Extractor yielding the caller's session, if any
#[derive(Debug, Clone)]
pub struct MaybeSession(pub Option<Session>);

impl MaybeSession {
    pub fn as_ref(&self) -> Option<&Session> {
        self.0.as_ref()
    }
}

impl FromRequestParts<SharedState> for MaybeSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let Some(Authorization(bearer)) = parts.headers.typed_get::<Authorization<Bearer>>() else {
            return Ok(MaybeSession(None));
        };

        let claims = match decode_token(bearer.token(), &state.jwt_secret) {
            Ok(claims) => claims,
            Err(e) => {
                debug!("Ignoring bearer token: {}", e);
                return Ok(MaybeSession(None));
            }
        };

        let Some(record) = state.store.find_session(claims.sub).await? else {
            debug!("Session {} no longer exists", claims.sub);
            return Ok(MaybeSession(None));
        };

        if record.expires_at <= Utc::now() || record.user_id != claims.uid {
            return Ok(MaybeSession(None));
        }

        let session = state
            .store
            .find_user(record.user_id)
            .await?
            .filter(User::is_active)
            .map(|user| Session {
                id: record.id,
                created_at: record.created_at,
                expires_at: record.expires_at,
                user,
            });

        Ok(MaybeSession(session))
    }
}
