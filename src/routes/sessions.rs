//! Session routes
//!
//! Sign in with email and password, read the current session, sign out.

use crate::auth::{create_token, verify_password, MaybeSession, Session, SessionRecord, SessionToken};
use crate::error::{ensure, validation_error, ApiResult, AppError};
use crate::models::SuccessResponse;
use crate::permissions;
use crate::state::SharedState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

const SIGN_IN_FAILED: &str = "Invalid email or password.";

#[derive(Debug, Deserialize, Validate)]
pub struct SignInRequest {
    #[validate(email(message = "Please enter a valid email."))]
    pub email: String,
    #[validate(length(min = 1, message = "Please enter your password."))]
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    pub session: Session,
    pub token: SessionToken,
}

/// `current` or a session id
fn resolve_id(raw: &str, session: Option<&Session>) -> ApiResult<Option<Uuid>> {
    if raw == "current" {
        return Ok(session.map(|s| s.id));
    }
    Uuid::parse_str(raw)
        .map(Some)
        .map_err(|_| validation_error("id", "Invalid session id."))
}

/// POST /api/sessions
pub async fn sign_in(
    State(state): State<SharedState>,
    Json(body): Json<SignInRequest>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<SignInResponse>>)> {
    body.validate()?;

    let email = body.email.trim().to_lowercase();
    let Some(user) = state.store.find_user_by_email(&email).await? else {
        return Err(AppError::Unauthorized(SIGN_IN_FAILED.to_string()));
    };

    if !verify_password(body.password, user.password_hash.clone()).await? || !user.is_active() {
        warn!("Failed sign in for {}", email);
        return Err(AppError::Unauthorized(SIGN_IN_FAILED.to_string()));
    }

    let now = Utc::now();
    let record = state
        .store
        .create_session(SessionRecord {
            id: Uuid::new_v4(),
            user_id: user.id,
            created_at: now,
            expires_at: now + state.session_ttl,
        })
        .await?;

    let token = create_token(record.id, user.id, &state.jwt_secret, now, state.session_ttl)?;
    info!("👤 {} signed in", user.email);

    let session = Session {
        id: record.id,
        created_at: record.created_at,
        expires_at: record.expires_at,
        user,
    };

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data("Signed in", SignInResponse { session, token })),
    ))
}

/// GET /api/sessions/{id}
///
/// `current` answers with no data for anonymous callers.
pub async fn read_session(
    session: MaybeSession,
    Path(id): Path<String>,
) -> ApiResult<Json<SuccessResponse<Option<Session>>>> {
    let session = session.as_ref();
    let Some(id) = resolve_id(&id, session)? else {
        return Ok(Json(SuccessResponse::with_data("No active session", None)));
    };
    ensure(permissions::read_session(session, id))?;

    Ok(Json(SuccessResponse::with_data("Session retrieved", session.cloned())))
}

/// DELETE /api/sessions/{id}
pub async fn sign_out(
    State(state): State<SharedState>,
    session: MaybeSession,
    Path(id): Path<String>,
) -> ApiResult<Json<SuccessResponse<()>>> {
    let session = session.as_ref();
    let id = resolve_id(&id, session)?.ok_or_else(AppError::permission)?;
    ensure(permissions::read_session(session, id))?;

    state.store.delete_session(id).await?;
    info!("👋 Session {} signed out", id);

    Ok(Json(SuccessResponse::message_only("Signed out")))
}
