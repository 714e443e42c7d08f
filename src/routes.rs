//! Route definitions and router setup
//!
//! Configures all API routes and middleware.

mod affiliations;
mod counters;
mod evaluations;
mod opportunities;
mod organizations;
mod proposals;
mod sessions;
mod subscribers;
mod users;

#[cfg(test)]
mod testing;

use crate::auth::Session;
use crate::config::Settings;
use crate::error::{not_found_error, ApiResult};
use crate::lifecycle::Program;
use crate::models::{clean_optional, Affiliation, Opportunity, Proposal};
use crate::state::SharedState;
use axum::{
    http::{header, Method},
    routing::{delete, get, post, put},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::MakeRequestUuid,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
    ServiceBuilderExt,
};
use tracing::Level;
use uuid::Uuid;

/// Create the application router with all routes and middleware
pub fn create_router(state: SharedState, settings: &Settings) -> Router {
    // Build CORS layer
    let cors = build_cors_layer(settings);

    // Build tracing/logging layer
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    // Build middleware stack
    let middleware = ServiceBuilder::new()
        .set_x_request_id(MakeRequestUuid)
        .layer(trace_layer)
        .layer(CompressionLayer::new())
        .layer(cors)
        .propagate_x_request_id();

    Router::new()
        .nest("/api", api_routes())
        .layer(middleware)
        .with_state(state)
}

fn api_routes() -> Router<SharedState> {
    Router::new()
        // Health check
        .route("/health", get(health_check))

        // Sessions and users
        .route("/sessions", post(sessions::sign_in))
        .route("/sessions/{id}", get(sessions::read_session).delete(sessions::sign_out))
        .route("/users", get(users::list_users).post(users::sign_up))
        .route(
            "/users/{id}",
            get(users::read_user).put(users::update_user).delete(users::deactivate_user),
        )

        // Organizations and memberships
        .route(
            "/organizations",
            get(organizations::list_organizations).post(organizations::create_organization),
        )
        .route(
            "/organizations/{id}",
            get(organizations::read_organization)
                .put(organizations::update_organization)
                .delete(organizations::archive_organization),
        )
        .route(
            "/affiliations",
            get(affiliations::list_affiliations).post(affiliations::create_affiliation),
        )
        .route(
            "/affiliations/{id}",
            put(affiliations::update_affiliation).delete(affiliations::delete_affiliation),
        )

        // Opportunities and proposals
        .route(
            "/opportunities/{program}",
            get(opportunities::list_opportunities).post(opportunities::create_opportunity),
        )
        .route(
            "/opportunities/{program}/{id}",
            get(opportunities::read_opportunity).put(opportunities::update_opportunity),
        )
        .route(
            "/proposals/{program}",
            get(proposals::list_proposals).post(proposals::create_proposal),
        )
        .route(
            "/proposals/{program}/{id}",
            get(proposals::read_proposal).put(proposals::update_proposal),
        )
        .route(
            "/evaluations/team-with-us",
            get(evaluations::list_evaluations).post(evaluations::create_evaluation),
        )
        .route(
            "/evaluations/team-with-us/{id}",
            get(evaluations::read_evaluation).put(evaluations::update_evaluation),
        )

        // Notifications and metrics
        .route("/subscribers/{program}", post(subscribers::subscribe))
        .route(
            "/subscribers/{program}/{opportunity}",
            delete(subscribers::unsubscribe),
        )
        .route("/counters", get(counters::read_counters))
        .route("/counters/{name}", put(counters::increment_counter))
}

/// Build CORS layer from settings
fn build_cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<_> = settings
        .cors
        .allowed_origins
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();

    let methods = [Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS];
    let headers = [header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT];

    if origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(headers)
            .max_age(Duration::from_secs(3600))
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(headers)
            .max_age(Duration::from_secs(3600))
    }
}

/// Health check endpoint
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "success": true,
        "message": "Server is running fine.",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

// ============================================
// Shared lookups
// ============================================

/// Unknown program slugs are treated like missing resources
fn parse_program(raw: &str) -> ApiResult<Program> {
    Program::from_slug(raw).ok_or_else(|| not_found_error(format!("Unknown program '{}'.", raw)))
}

async fn find_opportunity(state: &SharedState, program: Program, id: Uuid) -> ApiResult<Opportunity> {
    state
        .store
        .find_opportunity(id)
        .await?
        .filter(|o| o.program == program)
        .ok_or_else(|| not_found_error("Opportunity not found."))
}

async fn find_proposal(state: &SharedState, program: Program, id: Uuid) -> ApiResult<Proposal> {
    state
        .store
        .find_proposal(id)
        .await?
        .filter(|p| p.program == program)
        .ok_or_else(|| not_found_error("Proposal not found."))
}

/// The caller's affiliation with `organization_id`, if any
async fn caller_membership(
    state: &SharedState,
    session: Option<&Session>,
    organization_id: Option<Uuid>,
) -> ApiResult<Option<Affiliation>> {
    let (Some(session), Some(organization_id)) = (session, organization_id) else {
        return Ok(None);
    };
    Ok(state
        .store
        .list_affiliations_for_user(session.user_id())
        .await?
        .into_iter()
        .find(|a| a.organization_id == organization_id))
}

/// Free-text notes attached to status changes
fn note(raw: String) -> Option<String> {
    clean_optional(Some(raw))
}
