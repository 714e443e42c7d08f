//! View counter routes

use crate::auth::MaybeSession;
use crate::error::{ensure, ApiResult};
use crate::models::counter::{CounterName, CounterQuery};
use crate::models::{Counter, SuccessResponse};
use crate::permissions;
use crate::state::SharedState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use tracing::debug;
use validator::Validate;

/// GET /api/counters?names=a,b
pub async fn read_counters(
    State(state): State<SharedState>,
    session: MaybeSession,
    Query(query): Query<CounterQuery>,
) -> ApiResult<Json<SuccessResponse<Vec<Counter>>>> {
    query.validate()?;
    ensure(permissions::read_counters(session.as_ref()))?;

    let counters = state.store.get_counters(&query.split_names()).await?;
    Ok(Json(SuccessResponse::with_data(
        format!("Found {} counters", counters.len()),
        counters,
    )))
}

/// PUT /api/counters/{name}
///
/// Anyone may bump a counter; it is how anonymous page views are tallied.
pub async fn increment_counter(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> ApiResult<Json<SuccessResponse<Counter>>> {
    let name = CounterName { name };
    name.validate()?;

    let count = state.store.increment_counter(&name.name).await?;
    debug!("Counter {} is now {}", name.name, count);

    Ok(Json(SuccessResponse::with_data(
        "Counter incremented",
        Counter { name: name.name, count },
    )))
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use crate::auth::UserType;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_increment_then_read() {
        let app = TestApp::new();
        for expected in 1..=2 {
            let (status, body) = app.send(Method::PUT, "/api/counters/page.views", None, None).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["data"]["count"], expected);
        }

        let (_, gov) = app.user(UserType::Government).await;
        let (status, body) = app
            .send(Method::GET, "/api/counters?names=page.views,never.used", Some(&gov), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["data"],
            json!([{"name": "never.used", "count": 0}, {"name": "page.views", "count": 2}])
        );
    }

    #[tokio::test]
    async fn test_counters_reject_bad_names_and_vendors() {
        let app = TestApp::new();
        let (status, _) = app.send(Method::PUT, "/api/counters/has%20space", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, vendor) = app.user(UserType::Vendor).await;
        let (status, _) = app
            .send(Method::GET, "/api/counters?names=page.views", Some(&vendor), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
