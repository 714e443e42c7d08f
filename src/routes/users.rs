//! User account routes

use crate::auth::{hash_password, MaybeSession, UserType};
use crate::error::{ensure, not_found_error, validation_error, ApiResult};
use crate::models::user::{SignUpRequest, UserAction};
use crate::models::{clean_optional, SuccessResponse, User, UserStatus};
use crate::permissions;
use crate::state::SharedState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

async fn find_user(state: &SharedState, id: Uuid) -> ApiResult<User> {
    state
        .store
        .find_user(id)
        .await?
        .ok_or_else(|| not_found_error("User not found."))
}

/// POST /api/users
///
/// Administrators are promoted from government accounts, never signed up.
pub async fn sign_up(
    State(state): State<SharedState>,
    Json(body): Json<SignUpRequest>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<User>>)> {
    body.validate()?;
    if body.user_type == UserType::Admin {
        return Err(validation_error("userType", "Please choose vendor or government."));
    }

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        user_type: body.user_type,
        status: UserStatus::Active,
        name: body.name.trim().to_string(),
        email: body.email.trim().to_lowercase(),
        job_title: clean_optional(body.job_title),
        password_hash: hash_password(body.password).await?,
        accepted_terms_at: None,
        created_at: now,
        updated_at: now,
    };

    let user = state.store.create_user(user).await?;
    info!("✅ Signed up {} user {}", user.user_type, user.email);

    Ok((StatusCode::CREATED, Json(SuccessResponse::with_data("User created", user))))
}

/// GET /api/users
pub async fn list_users(
    State(state): State<SharedState>,
    session: MaybeSession,
) -> ApiResult<Json<SuccessResponse<Vec<User>>>> {
    ensure(permissions::read_many_users(session.as_ref()))?;

    let users = state.store.list_users().await?;
    Ok(Json(SuccessResponse::with_data(
        format!("Found {} users", users.len()),
        users,
    )))
}

/// GET /api/users/{id}
pub async fn read_user(
    State(state): State<SharedState>,
    session: MaybeSession,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SuccessResponse<User>>> {
    ensure(permissions::read_one_user(session.as_ref(), id))?;
    let user = find_user(&state, id).await?;
    Ok(Json(SuccessResponse::with_data("User retrieved", user)))
}

/// PUT /api/users/{id}
pub async fn update_user(
    State(state): State<SharedState>,
    session: MaybeSession,
    Path(id): Path<Uuid>,
    Json(action): Json<UserAction>,
) -> ApiResult<Json<SuccessResponse<User>>> {
    let session = session.as_ref();
    let mut user = find_user(&state, id).await?;
    let now = Utc::now();

    match action {
        UserAction::UpdateProfile(profile) => {
            profile.validate()?;
            ensure(permissions::update_user(session, id))?;
            user.name = profile.name.trim().to_string();
            user.email = profile.email.trim().to_lowercase();
            user.job_title = clean_optional(profile.job_title);
        }
        UserAction::AcceptTerms => {
            ensure(permissions::accept_terms(session, id))?;
            if user.accepted_terms_at.is_none() {
                user.accepted_terms_at = Some(now);
            }
        }
        UserAction::Reactivate => {
            ensure(permissions::reactivate_user(session, id))?;
            if user.is_active() {
                return Err(validation_error("status", "This user is already active."));
            }
            user.status = UserStatus::Active;
        }
        UserAction::UpdateAdminPermissions(admin) => {
            ensure(permissions::update_admin_status(session, id))?;
            if user.user_type == UserType::Vendor {
                return Err(validation_error("userType", "Vendors cannot be administrators."));
            }
            user.user_type = if admin { UserType::Admin } else { UserType::Government };
        }
    }

    user.updated_at = now;
    let user = state.store.update_user(user).await?;
    Ok(Json(SuccessResponse::with_data("User updated", user)))
}

/// DELETE /api/users/{id}
///
/// Accounts are deactivated, never removed.
pub async fn deactivate_user(
    State(state): State<SharedState>,
    session: MaybeSession,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SuccessResponse<User>>> {
    let session = session.as_ref();
    ensure(permissions::deactivate_user(session, id))?;

    let mut user = find_user(&state, id).await?;
    if !user.is_active() {
        return Err(validation_error("status", "This user is already inactive."));
    }

    let by_self = session.is_some_and(|s| s.user_id() == id);
    user.status = if by_self { UserStatus::InactiveByUser } else { UserStatus::InactiveByAdmin };
    user.updated_at = Utc::now();

    let user = state.store.update_user(user).await?;
    info!("🚫 Deactivated user {}", user.id);

    Ok(Json(SuccessResponse::with_data("User deactivated", user)))
}
