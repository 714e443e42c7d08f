//! Team With Us panel evaluation routes
//!
//! Panel evaluators score each proposal's resource questions individually;
//! the chair then records one consensus per proposal. Both are locked once
//! submitted.

use super::{find_opportunity, find_proposal};
use crate::auth::MaybeSession;
use crate::error::{ensure, not_found_error, validation_error, ApiResult, AppError};
use crate::lifecycle::{
    is_valid_consensus_status_change, is_valid_evaluation_status_change, EvaluationStatus,
    OpportunityStatus, Program, ProposalStatus, TwuOpportunityStatus,
};
use crate::models::evaluation::{completeness_errors, validate_scores, CreateEvaluation, EvaluationAction};
use crate::models::{Evaluation, EvaluationKind, Opportunity, SuccessResponse};
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

#[derive(Debug, Deserialize)]
pub struct EvaluationQuery {
    pub proposal: Option<Uuid>,
}

/// Opportunity stage in which evaluations of `kind` are entered
fn stage_for(kind: EvaluationKind) -> OpportunityStatus {
    OpportunityStatus::TeamWithUs(match kind {
        EvaluationKind::Individual => TwuOpportunityStatus::EvaluationResourceQuestionsIndividual,
        EvaluationKind::Consensus => TwuOpportunityStatus::EvaluationResourceQuestionsConsensus,
    })
}

fn require_stage(opportunity: &Opportunity, kind: EvaluationKind) -> ApiResult<()> {
    if opportunity.status == stage_for(kind) {
        Ok(())
    } else {
        Err(validation_error(
            "status",
            format!("{} evaluations are not open at this stage.", kind.as_str().to_lowercase()),
        ))
    }
}

async fn find_evaluation(state: &SharedState, id: Uuid) -> ApiResult<(Evaluation, Opportunity)> {
    let evaluation = state
        .store
        .find_evaluation(id)
        .await?
        .ok_or_else(|| not_found_error("Evaluation not found."))?;
    let opportunity = find_opportunity(state, Program::TeamWithUs, evaluation.opportunity_id).await?;
    Ok((evaluation, opportunity))
}

/// POST /api/evaluations/team-with-us
pub async fn create_evaluation(
    State(state): State<SharedState>,
    session: MaybeSession,
    Json(body): Json<CreateEvaluation>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<Evaluation>>)> {
    let session = session.as_ref();
    let proposal = find_proposal(&state, Program::TeamWithUs, body.proposal_id).await?;
    let opportunity = find_opportunity(&state, Program::TeamWithUs, proposal.opportunity_id).await?;

    validate_scores(&body.scores, opportunity.questions()).into_result()?;
    ensure(match body.kind {
        EvaluationKind::Individual => permissions::create_individual_evaluation(session, &opportunity),
        EvaluationKind::Consensus => permissions::create_consensus(session, &opportunity),
    })?;
    let evaluator = session.ok_or_else(AppError::permission)?.user_id();

    require_stage(&opportunity, body.kind)?;
    if proposal.status != ProposalStatus::first_review(Program::TeamWithUs) {
        return Err(validation_error("proposalId", "This proposal is not under review."));
    }

    let now = Utc::now();
    let evaluation = state
        .store
        .insert_evaluation(Evaluation {
            id: Uuid::new_v4(),
            proposal_id: proposal.id,
            opportunity_id: opportunity.id,
            evaluator_id: evaluator,
            kind: body.kind,
            status: EvaluationStatus::Draft,
            scores: body.scores,
            created_at: now,
            updated_at: now,
        })
        .await?;

    info!("✅ Started {} evaluation of proposal {}", evaluation.kind.as_str(), proposal.id);

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data("Evaluation created", evaluation)),
    ))
}

/// GET /api/evaluations/team-with-us?proposal={id}
pub async fn list_evaluations(
    State(state): State<SharedState>,
    session: MaybeSession,
    Query(query): Query<EvaluationQuery>,
) -> ApiResult<Json<SuccessResponse<Vec<Evaluation>>>> {
    let session = session.as_ref();
    let proposal_id = query
        .proposal
        .ok_or_else(|| validation_error("proposal", "Please select a proposal."))?;
    ensure(permissions::is_public_sector(session))?;

    let proposal = find_proposal(&state, Program::TeamWithUs, proposal_id).await?;
    let opportunity = find_opportunity(&state, Program::TeamWithUs, proposal.opportunity_id).await?;

    let evaluations: Vec<_> = state
        .store
        .list_evaluations_for_proposal(proposal.id)
        .await?
        .into_iter()
        .filter(|e| permissions::read_evaluation(session, e, &opportunity))
        .collect();

    Ok(Json(SuccessResponse::with_data(
        format!("Found {} evaluations", evaluations.len()),
        evaluations,
    )))
}

/// GET /api/evaluations/team-with-us/{id}
pub async fn read_evaluation(
    State(state): State<SharedState>,
    session: MaybeSession,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SuccessResponse<Evaluation>>> {
    let (evaluation, opportunity) = find_evaluation(&state, id).await?;
    ensure(permissions::read_evaluation(session.as_ref(), &evaluation, &opportunity))?;
    Ok(Json(SuccessResponse::with_data("Evaluation retrieved", evaluation)))
}

/// PUT /api/evaluations/team-with-us/{id}
pub async fn update_evaluation(
    State(state): State<SharedState>,
    session: MaybeSession,
    Path(id): Path<Uuid>,
    Json(action): Json<EvaluationAction>,
) -> ApiResult<Json<SuccessResponse<Evaluation>>> {
    let session = session.as_ref();
    let (mut evaluation, opportunity) = find_evaluation(&state, id).await?;
    let questions = opportunity.questions();

    match action {
        EvaluationAction::Edit(scores) => {
            validate_scores(&scores, questions).into_result()?;
            ensure(permissions::edit_evaluation(session, &evaluation))?;
            if evaluation.is_submitted() {
                return Err(validation_error("status", "Submitted evaluations cannot change."));
            }
            require_stage(&opportunity, evaluation.kind)?;
            evaluation.scores = scores;
        }
        EvaluationAction::Submit => {
            ensure(permissions::edit_evaluation(session, &evaluation))?;
            completeness_errors(&evaluation.scores, questions).into_result()?;
            require_stage(&opportunity, evaluation.kind)?;
            let allowed = match evaluation.kind {
                EvaluationKind::Individual => {
                    is_valid_evaluation_status_change(evaluation.status, EvaluationStatus::Submitted)
                }
                EvaluationKind::Consensus => {
                    is_valid_consensus_status_change(evaluation.status, EvaluationStatus::Submitted)
                }
            };
            ensure(allowed)?;
            evaluation.status = EvaluationStatus::Submitted;
        }
    }

    evaluation.updated_at = Utc::now();
    let evaluation = state.store.update_evaluation(evaluation).await?;
    Ok(Json(SuccessResponse::with_data("Evaluation updated", evaluation)))
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use crate::auth::UserType;
    use crate::closer;
    use axum::http::{Method, StatusCode};
    use chrono::{Duration, Utc};
    use serde_json::{json, Value};

    fn scores(first: f64, second: f64) -> Value {
        json!([{"order": 1, "score": first}, {"order": 2, "score": second}])
    }

    async fn submitted_proposal(app: &TestApp, opportunity: &str, hourly_rate: i64) -> String {
        let (_, vendor) = app.user(UserType::Vendor).await;
        let organization = app.organization(&vendor).await;
        let (status, body) = app
            .send(
                Method::POST,
                "/api/proposals/team-with-us",
                Some(&vendor),
                Some(json!({
                    "opportunityId": opportunity,
                    "organizationId": organization,
                    "status": "SUBMITTED",
                    "details": {
                        "program": "team-with-us",
                        "resourceQuestionResponses": [
                            {"order": 1, "response": "Ten years of Rust."},
                            {"order": 2, "response": "Remote friendly."},
                        ],
                        "hourlyRate": hourly_rate,
                    },
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["data"]["id"].as_str().unwrap().to_string()
    }

    async fn evaluate(app: &TestApp, token: &str, proposal: &str, kind: &str, values: Value) -> String {
        let (status, body) = app
            .send(
                Method::POST,
                "/api/evaluations/team-with-us",
                Some(token),
                Some(json!({"proposalId": proposal, "kind": kind, "scores": values})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        let uri = format!("/api/evaluations/team-with-us/{}", body["data"]["id"].as_str().unwrap());
        let (status, body) = app
            .send(Method::PUT, &uri, Some(token), Some(json!({"tag": "submit"})))
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        uri
    }

    /// A Team With Us opportunity taken through consensus and finalized
    struct Finalized {
        opportunity: String,
        strong: String,
        weak: String,
        status: Value,
    }

    async fn finalize_consensus(app: &TestApp, admin: &str, strong_scores: Value, weak_scores: Value) -> Finalized {
        let (chair, chair_token) = app.user(UserType::Government).await;
        let mut body = opportunity_body("team-with-us", Some("PUBLISHED"));
        body["evaluationPanel"] = json!([{"userId": chair.id, "chair": true, "evaluator": true}]);
        let (status, created) = app
            .send(Method::POST, "/api/opportunities/team-with-us", Some(admin), Some(body))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", created);
        let opportunity = format!("/api/opportunities/team-with-us/{}", created["data"]["id"].as_str().unwrap());
        let id = created["data"]["id"].as_str().unwrap().to_string();

        let strong = submitted_proposal(app, &id, 100).await;
        let weak = submitted_proposal(app, &id, 80).await;
        closer::close_due_opportunities(app.state.store.as_ref(), Utc::now() + Duration::days(30))
            .await
            .unwrap();

        for kind in ["INDIVIDUAL", "CONSENSUS"] {
            if kind == "CONSENSUS" {
                let (status, body) = act(app, &opportunity, admin, "startConsensus", json!("")).await;
                assert_eq!(status, StatusCode::OK, "{}", body);
            }
            evaluate(app, &chair_token, &strong, kind, strong_scores.clone()).await;
            evaluate(app, &chair_token, &weak, kind, weak_scores.clone()).await;
        }

        let (status, body) = act(app, &opportunity, admin, "finalizeQuestionConsensuses", json!("")).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        Finalized {
            opportunity,
            strong: format!("/api/proposals/team-with-us/{}", strong),
            weak: format!("/api/proposals/team-with-us/{}", weak),
            status: body["data"]["status"].clone(),
        }
    }

    #[tokio::test]
    async fn test_screening_out_the_last_challenger_ends_the_challenge() {
        let app = TestApp::new();
        let (_, admin) = app.user(UserType::Admin).await;
        let f = finalize_consensus(&app, &admin, scores(8.0, 9.0), scores(4.0, 6.0)).await;
        assert_eq!(f.status, "EVAL_C");

        let (status, body) = act(&app, &f.weak, &admin, "screenInToChallenge", json!("Second look")).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["data"]["status"], "UNDER_REVIEW_CHALLENGE");

        // The weak proposal is still a challenger
        let (status, _) = act(&app, &f.strong, &admin, "scoreChallenge", json!(75.0)).await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = app.send(Method::GET, &f.opportunity, Some(&admin), None).await;
        assert_eq!(body["data"]["status"], "EVAL_C");

        let (status, body) = act(&app, &f.weak, &admin, "screenOutFromChallenge", json!("")).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["data"]["status"], "EVALUATED_QUESTIONS");
        assert!(body["data"]["scores"].get("priceScore").is_none());

        let (_, body) = app.send(Method::GET, &f.opportunity, Some(&admin), None).await;
        assert_eq!(body["data"]["status"], "PROCESSING");
        let (_, body) = app.send(Method::GET, &f.strong, Some(&admin), None).await;
        assert_eq!(body["data"]["scores"]["priceScore"], 100.0);

        let (status, body) = act(&app, &f.strong, &admin, "award", json!("")).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        let (_, body) = app.send(Method::GET, &f.weak, Some(&admin), None).await;
        assert_eq!(body["data"]["status"], "NOT_AWARDED");
    }

    #[tokio::test]
    async fn test_disqualifying_the_last_challenger_ends_the_challenge() {
        let app = TestApp::new();
        let (_, admin) = app.user(UserType::Admin).await;
        let f = finalize_consensus(&app, &admin, scores(8.0, 9.0), scores(8.0, 9.0)).await;
        assert_eq!(f.status, "EVAL_C");

        let (status, _) = act(&app, &f.weak, &admin, "scoreChallenge", json!(60.0)).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = act(&app, &f.strong, &admin, "disqualify", json!("Conflict of interest")).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["data"]["status"], "DISQUALIFIED");

        let (_, body) = app.send(Method::GET, &f.opportunity, Some(&admin), None).await;
        assert_eq!(body["data"]["status"], "PROCESSING");
        let (_, body) = app.send(Method::GET, &f.weak, Some(&admin), None).await;
        assert_eq!(body["data"]["scores"]["priceScore"], 100.0);
    }

    #[tokio::test]
    async fn test_no_challengers_moves_straight_to_processing() {
        let app = TestApp::new();
        let (_, admin) = app.user(UserType::Admin).await;
        let f = finalize_consensus(&app, &admin, scores(4.0, 9.0), scores(3.0, 6.0)).await;
        assert_eq!(f.status, "PROCESSING");

        for uri in [&f.strong, &f.weak] {
            let (_, body) = app.send(Method::GET, uri, Some(&admin), None).await;
            assert_eq!(body["data"]["status"], "EVALUATED_QUESTIONS");
        }
        let (_, body) = app.send(Method::GET, &f.opportunity, Some(&admin), None).await;
        let history = body["data"]["history"].as_array().unwrap();
        let moves: Vec<_> = history.iter().rev().take(2).map(|h| h["type"]["value"].clone()).collect();
        assert_eq!(moves, vec![json!("PROCESSING"), json!("EVAL_C")]);
    }

    #[tokio::test]
    async fn test_panel_evaluation_through_award() {
        let app = TestApp::new();
        let (_, admin) = app.user(UserType::Admin).await;
        let (chair, chair_token) = app.user(UserType::Government).await;

        let mut body = opportunity_body("team-with-us", Some("PUBLISHED"));
        body["evaluationPanel"] = json!([{"userId": chair.id, "chair": true, "evaluator": true}]);
        let (status, created) = app
            .send(Method::POST, "/api/opportunities/team-with-us", Some(&admin), Some(body))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", created);
        let opportunity = created["data"]["id"].as_str().unwrap().to_string();
        let opportunity_uri = format!("/api/opportunities/team-with-us/{}", opportunity);

        let strong = submitted_proposal(&app, &opportunity, 100).await;
        let weak = submitted_proposal(&app, &opportunity, 80).await;

        closer::close_due_opportunities(app.state.store.as_ref(), Utc::now() + Duration::days(30))
            .await
            .unwrap();

        // Consensus cannot start before the individual stage ends
        let (status, _) = app
            .send(
                Method::POST,
                "/api/evaluations/team-with-us",
                Some(&chair_token),
                Some(json!({"proposalId": strong, "kind": "CONSENSUS", "scores": scores(8.0, 9.0)})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        evaluate(&app, &chair_token, &strong, "INDIVIDUAL", scores(8.0, 9.0)).await;
        let individual = evaluate(&app, &chair_token, &weak, "INDIVIDUAL", scores(4.0, 6.0)).await;

        // Locked once submitted
        let (status, _) = act(&app, &individual, &chair_token, "edit", scores(5.0, 6.0)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = act(&app, &opportunity_uri, &admin, "startConsensus", json!("")).await;
        assert_eq!(status, StatusCode::OK, "{}", body);

        evaluate(&app, &chair_token, &strong, "CONSENSUS", scores(8.0, 9.0)).await;
        evaluate(&app, &chair_token, &weak, "CONSENSUS", scores(4.0, 6.0)).await;

        let (status, body) =
            act(&app, &opportunity_uri, &admin, "finalizeQuestionConsensuses", json!("")).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["data"]["status"], "EVAL_C");

        let strong_uri = format!("/api/proposals/team-with-us/{}", strong);
        let weak_uri = format!("/api/proposals/team-with-us/{}", weak);
        let (_, body) = app.send(Method::GET, &strong_uri, Some(&admin), None).await;
        assert_eq!(body["data"]["status"], "UNDER_REVIEW_CHALLENGE");
        assert_eq!(body["data"]["scores"]["questionsScore"], 85.0);
        let (_, body) = app.send(Method::GET, &weak_uri, Some(&admin), None).await;
        assert_eq!(body["data"]["status"], "EVALUATED_QUESTIONS");

        // Scoring the last challenger prices the finalists and moves on
        let (status, body) = act(&app, &strong_uri, &admin, "scoreChallenge", json!(75.0)).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["data"]["status"], "EVALUATED_CHALLENGE");
        assert_eq!(body["data"]["scores"]["priceScore"], 100.0);
        let (_, body) = app.send(Method::GET, &opportunity_uri, Some(&admin), None).await;
        assert_eq!(body["data"]["status"], "PROCESSING");

        let (status, body) = act(&app, &strong_uri, &admin, "award", json!("")).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["data"]["status"], "AWARDED");
        let (_, body) = app.send(Method::GET, &weak_uri, Some(&admin), None).await;
        assert_eq!(body["data"]["status"], "NOT_AWARDED");
    }

    #[tokio::test]
    async fn test_only_panel_members_evaluate() {
        let app = TestApp::new();
        let (_, admin) = app.user(UserType::Admin).await;
        let (chair, _) = app.user(UserType::Government).await;
        let (_, outsider) = app.user(UserType::Government).await;

        let mut body = opportunity_body("team-with-us", Some("PUBLISHED"));
        body["evaluationPanel"] = json!([{"userId": chair.id, "chair": true, "evaluator": true}]);
        let (_, created) = app
            .send(Method::POST, "/api/opportunities/team-with-us", Some(&admin), Some(body))
            .await;
        let opportunity = created["data"]["id"].as_str().unwrap().to_string();
        let proposal = submitted_proposal(&app, &opportunity, 100).await;
        closer::close_due_opportunities(app.state.store.as_ref(), Utc::now() + Duration::days(30))
            .await
            .unwrap();

        let (status, _) = app
            .send(
                Method::POST,
                "/api/evaluations/team-with-us",
                Some(&outsider),
                Some(json!({"proposalId": proposal, "kind": "INDIVIDUAL", "scores": scores(1.0, 1.0)})),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = app
            .send(
                Method::GET,
                &format!("/api/evaluations/team-with-us?proposal={}", proposal),
                Some(&outsider),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 0);
    }
}
