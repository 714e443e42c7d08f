//! Organization membership routes

use super::caller_membership;
use crate::auth::{MaybeSession, UserType};
use crate::error::{ensure, not_found_error, validation_error, ApiResult, AppError};
use crate::models::organization::{AffiliationAction, CreateAffiliation};
use crate::models::{Affiliation, MembershipStatus, MembershipType, SuccessResponse};
use crate::permissions;
use crate::state::SharedState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize)]
pub struct AffiliationQuery {
    pub organization: Option<Uuid>,
}

async fn find_affiliation(state: &SharedState, id: Uuid) -> ApiResult<Affiliation> {
    state
        .store
        .find_affiliation(id)
        .await?
        .ok_or_else(|| not_found_error("Affiliation not found."))
}

/// POST /api/affiliations
///
/// Invites a vendor by email; the invitation stays pending until approved.
pub async fn create_affiliation(
    State(state): State<SharedState>,
    session: MaybeSession,
    Json(body): Json<CreateAffiliation>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<Affiliation>>)> {
    body.validate()?;
    if body.membership_type == MembershipType::Owner {
        return Err(validation_error("membershipType", "Organizations have a single owner."));
    }

    let session = session.as_ref();
    let membership = caller_membership(&state, session, Some(body.organization_id)).await?;
    ensure(permissions::invite_member(session, membership.as_ref()))?;

    let organization = state
        .store
        .find_organization(body.organization_id)
        .await?
        .filter(|o| o.active)
        .ok_or_else(|| not_found_error("Organization not found."))?;

    let invitee = state
        .store
        .find_user_by_email(&body.user_email.trim().to_lowercase())
        .await?
        .filter(|u| u.user_type == UserType::Vendor && u.is_active())
        .ok_or_else(|| validation_error("userEmail", "There is no active vendor with this email."))?;

    let now = Utc::now();
    let affiliation = state
        .store
        .create_affiliation(Affiliation {
            id: Uuid::new_v4(),
            user_id: invitee.id,
            organization_id: organization.id,
            membership_type: body.membership_type,
            membership_status: MembershipStatus::Pending,
            created_at: now,
            updated_at: now,
        })
        .await?;

    info!("📨 Invited {} to '{}'", invitee.email, organization.legal_name);

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data("Invitation sent", affiliation)),
    ))
}

/// GET /api/affiliations
///
/// With `?organization=` lists that organization's members, otherwise the
/// caller's own memberships.
pub async fn list_affiliations(
    State(state): State<SharedState>,
    session: MaybeSession,
    Query(query): Query<AffiliationQuery>,
) -> ApiResult<Json<SuccessResponse<Vec<Affiliation>>>> {
    let session = session.as_ref();

    let affiliations = match query.organization {
        Some(organization_id) => {
            let membership = caller_membership(&state, session, Some(organization_id)).await?;
            ensure(permissions::read_organization_members(session, membership.as_ref()))?;
            state.store.list_affiliations_for_organization(organization_id).await?
        }
        None => {
            let session = session.ok_or_else(AppError::permission)?;
            state.store.list_affiliations_for_user(session.user_id()).await?
        }
    };

    Ok(Json(SuccessResponse::with_data(
        format!("Found {} affiliations", affiliations.len()),
        affiliations,
    )))
}

/// PUT /api/affiliations/{id}
pub async fn update_affiliation(
    State(state): State<SharedState>,
    session: MaybeSession,
    Path(id): Path<Uuid>,
    Json(action): Json<AffiliationAction>,
) -> ApiResult<Json<SuccessResponse<Affiliation>>> {
    let session = session.as_ref();
    let mut affiliation = find_affiliation(&state, id).await?;

    match action {
        AffiliationAction::Approve => {
            ensure(permissions::approve_affiliation(session, &affiliation))?;
            if affiliation.is_active() {
                return Err(validation_error("membershipStatus", "This membership is already active."));
            }
            affiliation.membership_status = MembershipStatus::Active;
        }
        AffiliationAction::UpdateAdminStatus(admin) => {
            let membership =
                caller_membership(&state, session, Some(affiliation.organization_id)).await?;
            ensure(permissions::update_affiliation_admin_status(
                session,
                &affiliation,
                membership.as_ref(),
            ))?;
            if !affiliation.is_active() {
                return Err(validation_error("membershipStatus", "Only active members can be promoted."));
            }
            affiliation.membership_type = if admin { MembershipType::Admin } else { MembershipType::Member };
        }
    }

    affiliation.updated_at = Utc::now();
    let affiliation = state.store.update_affiliation(affiliation).await?;

    Ok(Json(SuccessResponse::with_data("Affiliation updated", affiliation)))
}

/// DELETE /api/affiliations/{id}
pub async fn delete_affiliation(
    State(state): State<SharedState>,
    session: MaybeSession,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SuccessResponse<()>>> {
    let session = session.as_ref();
    let affiliation = find_affiliation(&state, id).await?;
    let membership = caller_membership(&state, session, Some(affiliation.organization_id)).await?;
    ensure(permissions::delete_affiliation(session, &affiliation, membership.as_ref()))?;

    state.store.delete_affiliation(id).await?;
    info!("🗑️ Removed affiliation {}", id);

    Ok(Json(SuccessResponse::message_only("Affiliation removed")))
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use crate::auth::UserType;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_invite_approve_promote() {
        let app = TestApp::new();
        let (_, owner) = app.user(UserType::Vendor).await;
        let (member, member_token) = app.user(UserType::Vendor).await;
        let organization = app.organization(&owner).await;

        let (status, body) = app
            .send(
                Method::POST,
                "/api/affiliations",
                Some(&owner),
                Some(json!({"organizationId": organization, "userEmail": member.email})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        assert_eq!(body["data"]["membershipStatus"], "PENDING");
        let uri = format!("/api/affiliations/{}", body["data"]["id"].as_str().unwrap());

        // Only the invitee approves
        let (status, _) = app
            .send(Method::PUT, &uri, Some(&owner), Some(json!({"tag": "approve"})))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, body) = app
            .send(Method::PUT, &uri, Some(&member_token), Some(json!({"tag": "approve"})))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["membershipStatus"], "ACTIVE");

        let (status, body) = act(&app, &uri, &owner, "updateAdminStatus", json!(true)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["membershipType"], "ADMIN");

        let (status, body) = app
            .send(
                Method::GET,
                &format!("/api/affiliations?organization={}", organization),
                Some(&member_token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_owner_membership_cannot_be_removed() {
        let app = TestApp::new();
        let (_, owner) = app.user(UserType::Vendor).await;
        app.organization(&owner).await;

        let (_, body) = app.send(Method::GET, "/api/affiliations", Some(&owner), None).await;
        let id = body["data"][0]["id"].as_str().unwrap().to_string();
        let (status, _) = app
            .send(Method::DELETE, &format!("/api/affiliations/{}", id), Some(&owner), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_only_vendors_can_be_invited() {
        let app = TestApp::new();
        let (_, owner) = app.user(UserType::Vendor).await;
        let (gov, _) = app.user(UserType::Government).await;
        let organization = app.organization(&owner).await;

        let (status, body) = app
            .send(
                Method::POST,
                "/api/affiliations",
                Some(&owner),
                Some(json!({"organizationId": organization, "userEmail": gov.email})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["errors"]["userEmail"].is_array());
    }
}
