//! Opportunity subscription routes

use super::{find_opportunity, parse_program};
use crate::auth::MaybeSession;
use crate::error::{ensure, not_found_error, ApiResult, AppError};
use crate::models::subscriber::SubscribeBody;
use crate::models::{Subscriber, SuccessResponse};
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

/// POST /api/subscribers/{program}
///
/// Subscribing twice returns the existing subscription.
pub async fn subscribe(
    State(state): State<SharedState>,
    session: MaybeSession,
    Path(program): Path<String>,
    Json(body): Json<SubscribeBody>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<Subscriber>>)> {
    let program = parse_program(&program)?;
    let session = session.as_ref();
    ensure(permissions::manage_subscription(session))?;
    let user_id = session.ok_or_else(AppError::permission)?.user_id();

    let opportunity = find_opportunity(&state, program, body.opportunity_id).await?;
    if !permissions::read_opportunity(session, &opportunity) {
        return Err(not_found_error("Opportunity not found."));
    }

    let subscriber = state
        .store
        .add_subscriber(Subscriber {
            opportunity_id: opportunity.id,
            user_id,
            created_at: Utc::now(),
        })
        .await?;

    info!("🔔 User {} subscribed to opportunity {}", user_id, opportunity.id);

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data("Subscribed", subscriber)),
    ))
}

/// DELETE /api/subscribers/{program}/{opportunity}
pub async fn unsubscribe(
    State(state): State<SharedState>,
    session: MaybeSession,
    Path((program, opportunity_id)): Path<(String, Uuid)>,
) -> ApiResult<Json<SuccessResponse<()>>> {
    let program = parse_program(&program)?;
    let session = session.as_ref();
    ensure(permissions::manage_subscription(session))?;
    let user_id = session.ok_or_else(AppError::permission)?.user_id();

    let opportunity = find_opportunity(&state, program, opportunity_id).await?;
    if !state.store.remove_subscriber(opportunity.id, user_id).await? {
        return Err(not_found_error("Subscription not found."));
    }

    Ok(Json(SuccessResponse::message_only("Unsubscribed")))
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use crate::auth::UserType;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_subscribe_is_idempotent_and_reversible() {
        let app = TestApp::new();
        let (_, gov) = app.user(UserType::Government).await;
        let (vendor, token) = app.user(UserType::Vendor).await;
        let id = create_opportunity(&app, &gov, "code-with-us", Some("PUBLISHED")).await;

        for _ in 0..2 {
            let (status, body) = app
                .send(
                    Method::POST,
                    "/api/subscribers/code-with-us",
                    Some(&token),
                    Some(json!({"opportunityId": id})),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED, "{}", body);
            assert_eq!(body["data"]["userId"], json!(vendor.id));
        }

        let uri = format!("/api/subscribers/code-with-us/{}", id);
        let (status, _) = app.send(Method::DELETE, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = app.send(Method::DELETE, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_hidden_and_anonymous_subscriptions_refused() {
        let app = TestApp::new();
        let (_, gov) = app.user(UserType::Government).await;
        let (_, token) = app.user(UserType::Vendor).await;
        let draft = create_opportunity(&app, &gov, "code-with-us", None).await;
        let body = json!({"opportunityId": draft});

        let (status, _) = app
            .send(Method::POST, "/api/subscribers/code-with-us", None, Some(body.clone()))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = app
            .send(Method::POST, "/api/subscribers/code-with-us", Some(&token), Some(body))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
