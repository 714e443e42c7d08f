//! Organization routes
//!
//! Vendors create organizations and become their owner; archiving flips the
//! organization inactive and keeps its proposals intact.

use super::caller_membership;
use crate::auth::MaybeSession;
use crate::error::{ensure, not_found_error, ApiResult, AppError};
use crate::models::organization::OrganizationBody;
use crate::models::{
    clean_optional, Affiliation, MembershipStatus, MembershipType, Organization, SuccessResponse,
};
use crate::permissions;
use crate::state::SharedState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// Organization plus the facts vendors need before proposing
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationView {
    #[serde(flatten)]
    pub organization: Organization,
    pub active_members: usize,
    pub swu_qualified: bool,
    pub twu_qualified: bool,
}

/// Public listing entry
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationSlim {
    pub id: Uuid,
    pub legal_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website_url: Option<String>,
    pub active: bool,
}

async fn find_organization(state: &SharedState, id: Uuid) -> ApiResult<Organization> {
    state
        .store
        .find_organization(id)
        .await?
        .ok_or_else(|| not_found_error("Organization not found."))
}

/// Count of active members, used by the Sprint With Us qualification
pub(super) async fn active_member_count(state: &SharedState, organization_id: Uuid) -> ApiResult<usize> {
    Ok(state
        .store
        .list_affiliations_for_organization(organization_id)
        .await?
        .iter()
        .filter(|a| a.is_active())
        .count())
}

fn terms_timestamp(
    current: Option<DateTime<Utc>>,
    accept: bool,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    current.or(accept.then_some(now))
}

fn apply(organization: &mut Organization, body: OrganizationBody, now: DateTime<Utc>) {
    organization.legal_name = body.legal_name.trim().to_string();
    organization.website_url = clean_optional(body.website_url);
    organization.contact_email = body.contact_email.trim().to_lowercase();
    organization.possess_all_capabilities = body.possess_all_capabilities;
    organization.service_areas = body.service_areas;
    organization.accepted_swu_terms_at =
        terms_timestamp(organization.accepted_swu_terms_at, body.accept_swu_terms, now);
    organization.accepted_twu_terms_at =
        terms_timestamp(organization.accepted_twu_terms_at, body.accept_twu_terms, now);
    organization.updated_at = now;
}

/// POST /api/organizations
pub async fn create_organization(
    State(state): State<SharedState>,
    session: MaybeSession,
    Json(body): Json<OrganizationBody>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<Organization>>)> {
    body.validate()?;
    let session = session.as_ref();
    ensure(permissions::create_organization(session))?;
    let owner = session.ok_or_else(AppError::permission)?;

    let now = Utc::now();
    let mut organization = Organization {
        id: Uuid::new_v4(),
        legal_name: String::new(),
        website_url: None,
        contact_email: String::new(),
        active: true,
        possess_all_capabilities: false,
        service_areas: Vec::new(),
        accepted_swu_terms_at: None,
        accepted_twu_terms_at: None,
        created_at: now,
        updated_at: now,
    };
    apply(&mut organization, body, now);

    let affiliation = Affiliation {
        id: Uuid::new_v4(),
        user_id: owner.user_id(),
        organization_id: organization.id,
        membership_type: MembershipType::Owner,
        membership_status: MembershipStatus::Active,
        created_at: now,
        updated_at: now,
    };

    let organization = state.store.create_organization(organization, affiliation).await?;
    info!("✅ Created organization '{}'", organization.legal_name);

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data("Organization created", organization)),
    ))
}

/// GET /api/organizations
///
/// Archived organizations are only listed for administrators.
pub async fn list_organizations(
    State(state): State<SharedState>,
    session: MaybeSession,
) -> ApiResult<Json<SuccessResponse<Vec<OrganizationSlim>>>> {
    let session = session.as_ref();
    ensure(permissions::read_many_organizations(session))?;
    let admin = permissions::is_admin(session);

    let organizations: Vec<_> = state
        .store
        .list_organizations()
        .await?
        .into_iter()
        .filter(|o| o.active || admin)
        .map(|o| OrganizationSlim {
            id: o.id,
            legal_name: o.legal_name,
            website_url: o.website_url,
            active: o.active,
        })
        .collect();

    Ok(Json(SuccessResponse::with_data(
        format!("Found {} organizations", organizations.len()),
        organizations,
    )))
}

/// GET /api/organizations/{id}
pub async fn read_organization(
    State(state): State<SharedState>,
    session: MaybeSession,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SuccessResponse<OrganizationView>>> {
    let session = session.as_ref();
    let organization = find_organization(&state, id).await?;
    let membership = caller_membership(&state, session, Some(id)).await?;
    ensure(permissions::read_one_organization(session, membership.as_ref()))?;

    let active_members = active_member_count(&state, id).await?;
    let view = OrganizationView {
        swu_qualified: organization.meets_swu_qualification(active_members),
        twu_qualified: organization.meets_twu_qualification(),
        active_members,
        organization,
    };

    Ok(Json(SuccessResponse::with_data("Organization retrieved", view)))
}

/// PUT /api/organizations/{id}
pub async fn update_organization(
    State(state): State<SharedState>,
    session: MaybeSession,
    Path(id): Path<Uuid>,
    Json(body): Json<OrganizationBody>,
) -> ApiResult<Json<SuccessResponse<Organization>>> {
    body.validate()?;
    let session = session.as_ref();
    let mut organization = find_organization(&state, id).await?;
    let membership = caller_membership(&state, session, Some(id)).await?;
    ensure(permissions::update_organization(session, membership.as_ref()))?;

    apply(&mut organization, body, Utc::now());
    let organization = state.store.update_organization(organization).await?;

    Ok(Json(SuccessResponse::with_data("Organization updated", organization)))
}

/// DELETE /api/organizations/{id}
pub async fn archive_organization(
    State(state): State<SharedState>,
    session: MaybeSession,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SuccessResponse<Organization>>> {
    let session = session.as_ref();
    let mut organization = find_organization(&state, id).await?;
    let membership = caller_membership(&state, session, Some(id)).await?;
    ensure(permissions::archive_organization(session, membership.as_ref()))?;

    organization.active = false;
    organization.updated_at = Utc::now();
    let organization = state.store.update_organization(organization).await?;
    info!("🗄️ Archived organization '{}'", organization.legal_name);

    Ok(Json(SuccessResponse::with_data("Organization archived", organization)))
}
