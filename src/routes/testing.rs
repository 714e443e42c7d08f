//! Router-level test harness over the in-memory store

use super::create_router;
use crate::auth::{create_token, session::fixtures, SessionRecord, UserType};
use crate::config::Settings;
use crate::db::MemoryStore;
use crate::models::User;
use crate::state::{AppState, SharedState};
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

pub struct TestApp {
    pub router: Router,
    pub state: SharedState,
}

impl TestApp {
    pub fn new() -> Self {
        let settings = Settings::default();
        let state = Arc::new(AppState::new(Arc::new(MemoryStore::new()), &settings));
        let router = create_router(state.clone(), &settings);
        Self { router, state }
    }

    /// Issue one request and decode the JSON body
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    /// Active user with accepted terms and a live session token
    pub async fn user(&self, user_type: UserType) -> (User, String) {
        let user = self.state.store.create_user(fixtures::user(user_type)).await.unwrap();
        let token = self.token_for(&user).await;
        (user, token)
    }

    pub async fn token_for(&self, user: &User) -> String {
        let now = Utc::now();
        let record = self
            .state
            .store
            .create_session(SessionRecord {
                id: Uuid::new_v4(),
                user_id: user.id,
                created_at: now,
                expires_at: now + self.state.session_ttl,
            })
            .await
            .unwrap();
        create_token(record.id, user.id, &self.state.jwt_secret, now, self.state.session_ttl)
            .unwrap()
            .access_token
    }

    /// Sign up through the API
    pub async fn sign_up(&self, user_type: UserType, email: &str, password: &str) -> User {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/users",
                None,
                Some(json!({
                    "name": "Test User",
                    "email": email,
                    "password": password,
                    "userType": user_type,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        let id: Uuid = serde_json::from_value(body["data"]["id"].clone()).unwrap();
        self.state.store.find_user(id).await.unwrap().unwrap()
    }

    /// Organization owned by `owner`, qualified for every program
    pub async fn organization(&self, owner_token: &str) -> Uuid {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/organizations",
                Some(owner_token),
                Some(json!({
                    "legalName": "Acme Digital",
                    "contactEmail": "hello@acme.test",
                    "possessAllCapabilities": true,
                    "serviceAreas": ["FULL_STACK_DEVELOPER"],
                    "acceptSwuTerms": true,
                    "acceptTwuTerms": true,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        serde_json::from_value(body["data"]["id"].clone()).unwrap()
    }
}

/// Create body for an opportunity of `program` (a slug)
pub fn opportunity_body(program: &str, status: Option<&str>) -> Value {
    let deadline = (Utc::now() + chrono::Duration::days(14)).to_rfc3339();
    let details = match program {
        "code-with-us" => json!({
            "program": "code-with-us",
            "reward": 70000,
            "skills": ["Rust"],
            "acceptanceCriteria": "Ships",
            "evaluationCriteria": "Quality",
        }),
        "sprint-with-us" => json!({
            "program": "sprint-with-us",
            "totalMaxBudget": 2000000,
            "minTeamMembers": 2,
            "mandatorySkills": ["Agile"],
            "teamQuestions": [question(1, None)],
            "questionsWeight": 25,
            "codeChallengeWeight": 25,
            "scenarioWeight": 25,
            "priceWeight": 25,
        }),
        _ => json!({
            "program": "team-with-us",
            "maxBudget": 500000,
            "serviceAreas": ["FULL_STACK_DEVELOPER"],
            "resourceQuestions": [question(1, Some(5)), question(2, None)],
            "questionsWeight": 25,
            "challengeWeight": 50,
            "priceWeight": 25,
        }),
    };
    let mut body = json!({
        "title": "Build the thing",
        "teaser": "A thing",
        "description": "Build it well",
        "location": "Victoria",
        "proposalDeadline": deadline,
        "details": details,
    });
    if let Some(status) = status {
        body["status"] = json!(status);
    }
    body
}

fn question(order: u32, minimum: Option<u32>) -> Value {
    json!({
        "order": order,
        "question": format!("Question {}", order),
        "score": 10,
        "wordLimit": 500,
        "minimumScore": minimum,
    })
}

/// Create an opportunity through the API, returning its id
pub async fn create_opportunity(app: &TestApp, token: &str, program: &str, status: Option<&str>) -> Uuid {
    let (code, body) = app
        .send(
            Method::POST,
            &format!("/api/opportunities/{}", program),
            Some(token),
            Some(opportunity_body(program, status)),
        )
        .await;
    assert_eq!(code, StatusCode::CREATED, "{}", body);
    serde_json::from_value(body["data"]["id"].clone()).unwrap()
}

/// Apply a tagged action, returning the status code and body
pub async fn act(app: &TestApp, uri: &str, token: &str, tag: &str, value: Value) -> (StatusCode, Value) {
    app.send(Method::PUT, uri, Some(token), Some(json!({"tag": tag, "value": value})))
        .await
}
