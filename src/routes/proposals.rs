//! Proposal routes
//!
//! Vendors draft, submit and withdraw; the opportunity's author (or an
//! admin) scores, screens, awards and disqualifies. Multi-record outcomes
//! such as awarding are committed as one change set.

use super::organizations::active_member_count;
use super::{caller_membership, find_opportunity, find_proposal, note, parse_program};
use crate::auth::{MaybeSession, Session, UserType};
use crate::db::{ChangeSet, RecordChange};
use crate::error::{ensure, validation_error, ApiResult, AppError, FieldErrors};
use crate::lifecycle::{
    CwuOpportunityStatus, CwuProposalStatus, OpportunityStatus, Program, ProposalStatus,
    SwuOpportunityStatus, SwuProposalStatus, TwuOpportunityStatus, TwuProposalStatus,
};
use crate::models::proposal::{
    check_score, price_scores, CreateProposal, ProposalAction, ScenarioScores, ScoreWithNote,
};
use crate::models::{
    HistoryEvent, HistoryRecord, Opportunity, Proposal, ProposalDetails, ProposalScores,
    SuccessResponse,
};
use crate::permissions;
use crate::state::SharedState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ProposalQuery {
    pub opportunity: Option<Uuid>,
}

/// Hide scores from callers who may not see them yet
fn present(session: Option<&Session>, proposal: Proposal, opportunity: &Opportunity) -> Proposal {
    if permissions::read_proposal_scores(session, &proposal, opportunity) {
        proposal
    } else {
        proposal.without_scores()
    }
}

fn refused(proposal: &Proposal, to: ProposalStatus) -> AppError {
    warn!("Refused proposal {} move {} -> {}", proposal.id, proposal.status, to);
    AppError::permission()
}

/// Evaluator-side move checked against the allow-list
fn advance(
    proposal: &mut Proposal,
    to: ProposalStatus,
    actor_type: UserType,
    actor: Option<Uuid>,
    note: Option<String>,
    now: DateTime<Utc>,
) -> ApiResult<HistoryRecord> {
    proposal
        .move_to(to, actor_type, false, actor, note, now)
        .ok_or_else(|| refused(proposal, to))
}

fn require_stage(opportunity: &Opportunity, stage: OpportunityStatus) -> ApiResult<()> {
    if opportunity.status == stage {
        Ok(())
    } else {
        Err(validation_error(
            "status",
            format!("The opportunity must be in {} for this action.", stage),
        ))
    }
}

fn require_status(proposal: &Proposal, status: ProposalStatus) -> ApiResult<()> {
    if proposal.status == status {
        Ok(())
    } else {
        Err(validation_error(
            "proposalStatus",
            format!("The proposal must be {} for this action.", status),
        ))
    }
}

fn hourly_rate(proposal: &Proposal) -> i64 {
    match &proposal.details {
        ProposalDetails::TeamWithUs { hourly_rate, .. } => *hourly_rate,
        _ => 0,
    }
}

/// Close the Team With Us challenge once no proposal is left under
/// challenge review: price the finalists against each other and move the
/// opportunity on to processing.
///
/// Proposals already in `changes` are taken in their changed state. Does
/// nothing outside the challenge stage or while a challenger remains.
pub(super) async fn complete_challenge(
    state: &SharedState,
    opportunity: &mut Opportunity,
    changes: &mut ChangeSet,
    caller: Uuid,
    now: DateTime<Utc>,
) -> ApiResult<()> {
    if opportunity.status != OpportunityStatus::TeamWithUs(TwuOpportunityStatus::EvaluationChallenge) {
        return Ok(());
    }

    let mut current: Vec<Proposal> = state.store.list_proposals_for_opportunity(opportunity.id).await?;
    for proposal in current.iter_mut() {
        if let Some(change) = changes.proposals.iter().find(|c| c.record.id == proposal.id) {
            *proposal = change.record.clone();
        }
    }
    let in_challenge = ProposalStatus::TeamWithUs(TwuProposalStatus::UnderReviewChallenge);
    if current.iter().any(|p| p.status == in_challenge) {
        return Ok(());
    }

    let finished = ProposalStatus::TeamWithUs(TwuProposalStatus::EvaluatedChallenge);
    let finalists: Vec<Proposal> = current.into_iter().filter(|p| p.status == finished).collect();
    let rates: Vec<(Uuid, i64)> = finalists.iter().map(|p| (p.id, hourly_rate(p))).collect();
    for (finalist, (_, price)) in finalists.into_iter().zip(price_scores(&rates)) {
        let entry = HistoryRecord::event(HistoryEvent::PriceScoreEntered, caller, None, now);
        match changes.proposals.iter_mut().find(|c| c.record.id == finalist.id) {
            Some(change) => {
                change.record.scores.price_score = Some(price);
                change.history.push(entry);
            }
            None => {
                let expected = finalist.status.as_str();
                let mut priced = finalist;
                priced.scores.price_score = Some(price);
                priced.updated_at = now;
                changes.proposals.push(RecordChange::with_history(expected, priced, entry));
            }
        }
    }

    let from = opportunity.status.as_str();
    let to = OpportunityStatus::TeamWithUs(TwuOpportunityStatus::Processing);
    let entry = opportunity
        .move_to(to, Some(caller), None, now)
        .ok_or_else(AppError::permission)?;
    let (expected, mut history) = match changes.opportunity.take() {
        Some(earlier) => (earlier.expected_status, earlier.history),
        None => (from, Vec::new()),
    };
    history.push(entry);
    changes.opportunity = Some(RecordChange::new(expected, opportunity.clone(), history));
    info!("🏁 Challenge complete for opportunity {}", opportunity.id);
    Ok(())
}

/// Sprint With Us and Team With Us proposals are made on behalf of an
/// organization the caller actively belongs to
async fn check_organization(
    state: &SharedState,
    session: Option<&Session>,
    organization_id: Option<Uuid>,
) -> ApiResult<()> {
    let Some(organization_id) = organization_id else {
        return Ok(());
    };
    let membership = caller_membership(state, session, Some(organization_id)).await?;
    ensure(membership.is_some_and(|m| m.is_active()))
}

fn organization_errors(program: Program, organization_id: Option<Uuid>) -> FieldErrors {
    if program != Program::CodeWithUs && organization_id.is_none() {
        FieldErrors::single("organizationId", "Please select an organization.")
    } else {
        FieldErrors::new()
    }
}

/// Everything that must hold before a proposal is submitted
async fn submission_checks(
    state: &SharedState,
    proposal: &Proposal,
    opportunity: &Opportunity,
    now: DateTime<Utc>,
) -> ApiResult<()> {
    if !opportunity.accepts_proposals(now) {
        return Err(validation_error("opportunity", "This opportunity is not accepting proposals."));
    }

    let mut errors = proposal.details.completeness_errors(opportunity);
    errors.merge(organization_errors(proposal.program, proposal.organization_id));
    errors.into_result()?;

    let Some(organization_id) = proposal.organization_id else {
        return Ok(());
    };
    let organization = state
        .store
        .find_organization(organization_id)
        .await?
        .filter(|o| o.active)
        .ok_or_else(|| validation_error("organizationId", "This organization is archived."))?;

    let qualified = match proposal.program {
        Program::CodeWithUs => true,
        Program::SprintWithUs => {
            organization.meets_swu_qualification(active_member_count(state, organization_id).await?)
        }
        Program::TeamWithUs => organization.meets_twu_qualification(),
    };
    if !qualified {
        return Err(validation_error(
            "organizationId",
            format!("This organization is not qualified for {}.", proposal.program),
        ));
    }
    Ok(())
}

/// POST /api/proposals/{program}
pub async fn create_proposal(
    State(state): State<SharedState>,
    session: MaybeSession,
    Path(program): Path<String>,
    Json(body): Json<CreateProposal>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<Proposal>>)> {
    let program = parse_program(&program)?;
    let session = session.as_ref();
    let opportunity = find_opportunity(&state, program, body.opportunity_id).await?;
    let now = Utc::now();

    let status = match body.status.as_deref() {
        None => ProposalStatus::draft(program),
        Some(raw) => ProposalStatus::parse(program, raw)
            .filter(|s| s.is_draft() || s.is_submitted())
            .ok_or_else(|| validation_error("status", "Please choose draft or submitted."))?,
    };

    let mut errors = body.details.validate_against(&opportunity);
    errors.merge(organization_errors(program, body.organization_id));
    errors.into_result()?;

    ensure(permissions::create_proposal(session))?;
    let author = session.ok_or_else(AppError::permission)?.user_id();
    check_organization(&state, session, body.organization_id).await?;

    if !opportunity.accepts_proposals(now) {
        return Err(validation_error("opportunity", "This opportunity is not accepting proposals."));
    }
    let duplicate = state
        .store
        .list_proposals_by_author(author)
        .await?
        .iter()
        .any(|p| p.opportunity_id == opportunity.id);
    if duplicate {
        return Err(validation_error(
            "opportunityId",
            "You already have a proposal for this opportunity.",
        ));
    }

    let mut proposal = Proposal {
        id: Uuid::new_v4(),
        program,
        opportunity_id: opportunity.id,
        organization_id: body.organization_id,
        status: ProposalStatus::draft(program),
        details: body.details,
        scores: ProposalScores::default(),
        history: Vec::new(),
        submitted_at: None,
        created_by: author,
        created_at: now,
        updated_at: now,
    };
    if status.is_submitted() {
        submission_checks(&state, &proposal, &opportunity, now).await?;
        proposal.set_status(status, now);
    }
    proposal.history.push(HistoryRecord::status(status, Some(author), None, now));

    let proposal = state.store.insert_proposal(proposal).await?;
    info!("✅ Created {} proposal {} as {}", program, proposal.id, status);

    Ok((StatusCode::CREATED, Json(SuccessResponse::with_data("Proposal created", proposal))))
}

/// GET /api/proposals/{program}
///
/// With `?opportunity=` lists the proposals the caller may see for that
/// opportunity; without it, a vendor's own proposals.
pub async fn list_proposals(
    State(state): State<SharedState>,
    session: MaybeSession,
    Path(program): Path<String>,
    Query(query): Query<ProposalQuery>,
) -> ApiResult<Json<SuccessResponse<Vec<Proposal>>>> {
    let program = parse_program(&program)?;
    let session = session.as_ref();

    let proposals = match query.opportunity {
        Some(opportunity_id) => {
            let opportunity = find_opportunity(&state, program, opportunity_id).await?;
            ensure(
                permissions::is_vendor(session)
                    || permissions::reviews_opportunity(session, &opportunity),
            )?;
            let memberships = match session {
                Some(s) => state.store.list_affiliations_for_user(s.user_id()).await?,
                None => Vec::new(),
            };

            state
                .store
                .list_proposals_for_opportunity(opportunity_id)
                .await?
                .into_iter()
                .filter(|p| {
                    let membership = memberships
                        .iter()
                        .find(|m| Some(m.organization_id) == p.organization_id);
                    permissions::read_proposal(session, p, &opportunity, membership)
                })
                .map(|p| present(session, p, &opportunity))
                .collect::<Vec<_>>()
        }
        None => {
            ensure(permissions::is_vendor(session))?;
            let author = session.ok_or_else(AppError::permission)?.user_id();
            let mut own = Vec::new();
            for proposal in state.store.list_proposals_by_author(author).await? {
                if proposal.program != program {
                    continue;
                }
                let opportunity = find_opportunity(&state, program, proposal.opportunity_id).await?;
                own.push(present(session, proposal, &opportunity));
            }
            own
        }
    };

    Ok(Json(SuccessResponse::with_data(
        format!("Found {} proposals", proposals.len()),
        proposals,
    )))
}

/// GET /api/proposals/{program}/{id}
pub async fn read_proposal(
    State(state): State<SharedState>,
    session: MaybeSession,
    Path((program, id)): Path<(String, Uuid)>,
) -> ApiResult<Json<SuccessResponse<Proposal>>> {
    let program = parse_program(&program)?;
    let session = session.as_ref();
    let proposal = find_proposal(&state, program, id).await?;
    let opportunity = find_opportunity(&state, program, proposal.opportunity_id).await?;
    let membership = caller_membership(&state, session, proposal.organization_id).await?;
    ensure(permissions::read_proposal(session, &proposal, &opportunity, membership.as_ref()))?;

    Ok(Json(SuccessResponse::with_data(
        "Proposal retrieved",
        present(session, proposal, &opportunity),
    )))
}

/// PUT /api/proposals/{program}/{id}
pub async fn update_proposal(
    State(state): State<SharedState>,
    session: MaybeSession,
    Path((program, id)): Path<(String, Uuid)>,
    Json(action): Json<ProposalAction>,
) -> ApiResult<Json<SuccessResponse<Proposal>>> {
    let program = parse_program(&program)?;
    let session = session.as_ref();
    let mut proposal = find_proposal(&state, program, id).await?;
    let mut opportunity = find_opportunity(&state, program, proposal.opportunity_id).await?;

    if !action.available_for(program) {
        return Err(validation_error(
            "action",
            format!("'{}' is not available for {} proposals.", action.name(), program),
        ));
    }

    let action_name = action.name();
    let changes = if action.is_vendor_action() {
        plan_vendor_action(&state, session, &opportunity, &mut proposal, action, Utc::now()).await?
    } else {
        plan_evaluator_action(&state, session, &mut opportunity, &mut proposal, action, Utc::now())
            .await?
    };
    state.store.commit(changes).await?;
    info!("📝 Proposal {} {}", id, action_name);

    let proposal = find_proposal(&state, program, id).await?;
    let opportunity = find_opportunity(&state, program, proposal.opportunity_id).await?;
    Ok(Json(SuccessResponse::with_data(
        "Proposal updated",
        present(session, proposal, &opportunity),
    )))
}

/// Edit, submit and withdraw
async fn plan_vendor_action(
    state: &SharedState,
    session: Option<&Session>,
    opportunity: &Opportunity,
    proposal: &mut Proposal,
    action: ProposalAction,
    now: DateTime<Utc>,
) -> ApiResult<ChangeSet> {
    let membership = caller_membership(state, session, proposal.organization_id).await?;
    let actor = session.map(Session::user_id);
    let before_deadline = opportunity.accepts_proposals(now);

    let (to, raw_note) = match action {
        ProposalAction::Edit(edit) => {
            let mut errors = edit.details.validate_against(opportunity);
            errors.merge(organization_errors(proposal.program, edit.organization_id));
            errors.into_result()?;
            ensure(permissions::owns_proposal(session, proposal, membership.as_ref()))?;
            if !proposal.status.is_editable() {
                return Err(validation_error(
                    "status",
                    "Only draft or withdrawn proposals can be edited.",
                ));
            }
            if edit.organization_id != proposal.organization_id {
                check_organization(state, session, edit.organization_id).await?;
            }
            let editor = actor.ok_or_else(AppError::permission)?;
            let from = proposal.status.as_str();
            proposal.details = edit.details;
            proposal.organization_id = edit.organization_id;
            proposal.updated_at = now;
            return Ok(ChangeSet::proposal(RecordChange::with_history(
                from,
                proposal.clone(),
                HistoryRecord::event(HistoryEvent::Edited, editor, None, now),
            )));
        }
        ProposalAction::Submit(raw) => {
            ensure(permissions::owns_proposal(session, proposal, membership.as_ref()))?;
            submission_checks(state, proposal, opportunity, now).await?;
            (ProposalStatus::submitted(proposal.program), raw)
        }
        ProposalAction::Withdraw(raw) => {
            ensure(permissions::owns_proposal(session, proposal, membership.as_ref()))?;
            (ProposalStatus::withdrawn(proposal.program), raw)
        }
        other => {
            return Err(AppError::Internal(format!("'{}' is not a vendor action", other.name())));
        }
    };

    let from = proposal.status.as_str();
    let entry = proposal
        .move_to(to, UserType::Vendor, before_deadline, actor, note(raw_note), now)
        .ok_or_else(|| refused(proposal, to))?;
    Ok(ChangeSet::proposal(RecordChange::with_history(from, proposal.clone(), entry)))
}

/// Scoring, screening, awarding and disqualifying
async fn plan_evaluator_action(
    state: &SharedState,
    session: Option<&Session>,
    opportunity: &mut Opportunity,
    proposal: &mut Proposal,
    action: ProposalAction,
    now: DateTime<Utc>,
) -> ApiResult<ChangeSet> {
    let program = proposal.program;
    let under_review = ProposalStatus::first_review(program);

    // Field checks come before the permission check
    let field_errors = match &action {
        ProposalAction::Score(ScoreWithNote { score, .. }) => check_score("score", *score),
        ProposalAction::ScoreQuestions(score) => check_score("questionsScore", *score),
        ProposalAction::ScoreCodeChallenge(score) | ProposalAction::ScoreChallenge(score) => {
            check_score("challengeScore", *score)
        }
        ProposalAction::ScoreTeamScenario(ScenarioScores { scenario, price }) => {
            let mut errors = check_score("scenarioScore", *scenario);
            errors.merge(check_score("priceScore", *price));
            errors
        }
        ProposalAction::Disqualify(reason) if reason.trim().is_empty() => {
            FieldErrors::single("reason", "Please explain the disqualification.")
        }
        _ => FieldErrors::new(),
    };
    field_errors.into_result()?;

    ensure(permissions::evaluate_proposal(session, opportunity))?;
    let caller = session.ok_or_else(AppError::permission)?;
    let (actor, actor_type) = (Some(caller.user_id()), caller.user.user_type);
    let event = |kind| HistoryRecord::event(kind, caller.user_id(), None, now);
    let (proposal_from, opportunity_from) = (proposal.status.as_str(), opportunity.status.as_str());
    let may_end_challenge = matches!(
        action,
        ProposalAction::ScoreChallenge(_)
            | ProposalAction::ScreenOutFromChallenge(_)
            | ProposalAction::Disqualify(_)
    );

    let mut history = Vec::new();
    let mut changes = ChangeSet::default();

    match action {
        ProposalAction::Score(ScoreWithNote { score, note: raw }) => {
            require_stage(opportunity, OpportunityStatus::CodeWithUs(CwuOpportunityStatus::Evaluation))?;
            proposal.scores.score = Some(score);
            let to = ProposalStatus::CodeWithUs(CwuProposalStatus::Evaluated);
            history.push(advance(proposal, to, actor_type, actor, note(raw), now)?);
        }

        ProposalAction::ScoreQuestions(score) => {
            require_stage(
                opportunity,
                OpportunityStatus::SprintWithUs(SwuOpportunityStatus::EvaluationTeamQuestions),
            )?;
            require_status(proposal, under_review)?;
            proposal.scores.questions_score = Some(score);
            proposal.updated_at = now;
            history.push(event(HistoryEvent::QuestionsScoreEntered));
        }

        ProposalAction::ScoreCodeChallenge(score) => {
            require_stage(
                opportunity,
                OpportunityStatus::SprintWithUs(SwuOpportunityStatus::EvaluationCodeChallenge),
            )?;
            require_status(proposal, under_review)?;
            if proposal.scores.questions_score.is_none() {
                return Err(validation_error("questionsScore", "Score the team questions first."));
            }
            proposal.scores.challenge_score = Some(score);
            proposal.updated_at = now;
            history.push(event(HistoryEvent::ChallengeScoreEntered));
        }

        ProposalAction::ScoreTeamScenario(ScenarioScores { scenario, price }) => {
            require_stage(
                opportunity,
                OpportunityStatus::SprintWithUs(SwuOpportunityStatus::EvaluationTeamScenario),
            )?;
            require_status(proposal, under_review)?;
            if proposal.scores.challenge_score.is_none() {
                return Err(validation_error("challengeScore", "Score the code challenge first."));
            }
            proposal.scores.scenario_score = Some(scenario);
            proposal.scores.price_score = Some(price);
            history.push(event(HistoryEvent::ScenarioScoreEntered));
            history.push(event(HistoryEvent::PriceScoreEntered));
            let to = ProposalStatus::SprintWithUs(SwuProposalStatus::Evaluated);
            history.push(advance(proposal, to, actor_type, actor, None, now)?);
        }

        ProposalAction::ScreenInToChallenge(raw) => {
            require_stage(opportunity, OpportunityStatus::TeamWithUs(TwuOpportunityStatus::EvaluationChallenge))?;
            let to = ProposalStatus::TeamWithUs(TwuProposalStatus::UnderReviewChallenge);
            history.push(advance(proposal, to, actor_type, actor, note(raw), now)?);
        }

        ProposalAction::ScreenOutFromChallenge(raw) => {
            require_stage(opportunity, OpportunityStatus::TeamWithUs(TwuOpportunityStatus::EvaluationChallenge))?;
            let to = ProposalStatus::TeamWithUs(TwuProposalStatus::EvaluatedResourceQuestions);
            history.push(advance(proposal, to, actor_type, actor, note(raw), now)?);
        }

        ProposalAction::ScoreChallenge(score) => {
            require_stage(opportunity, OpportunityStatus::TeamWithUs(TwuOpportunityStatus::EvaluationChallenge))?;
            proposal.scores.challenge_score = Some(score);
            history.push(event(HistoryEvent::ChallengeScoreEntered));
            let to = ProposalStatus::TeamWithUs(TwuProposalStatus::EvaluatedChallenge);
            history.push(advance(proposal, to, actor_type, actor, None, now)?);
        }

        ProposalAction::Award(raw) => {
            if !opportunity.status.is_final_evaluation_stage() {
                return Err(validation_error(
                    "status",
                    "Proposals can only be awarded at the final evaluation stage.",
                ));
            }
            let to = ProposalStatus::awarded(program);
            history.push(advance(proposal, to, actor_type, actor, note(raw), now)?);

            let not_awarded = ProposalStatus::not_awarded(program);
            for mut other in state.store.list_proposals_for_opportunity(opportunity.id).await? {
                if other.id == proposal.id || other.status == not_awarded {
                    continue;
                }
                let expected = other.status.as_str();
                if let Some(entry) = other.move_to(not_awarded, actor_type, false, actor, None, now) {
                    changes.proposals.push(RecordChange::with_history(expected, other, entry));
                }
            }

            let to = OpportunityStatus::awarded(program);
            let entry = opportunity
                .move_to(to, actor, None, now)
                .ok_or_else(AppError::permission)?;
            changes.opportunity = Some(RecordChange::with_history(opportunity_from, opportunity.clone(), entry));
        }

        ProposalAction::Disqualify(reason) => {
            let to = ProposalStatus::disqualified(program);
            history.push(advance(proposal, to, actor_type, actor, note(reason), now)?);
        }

        other => {
            return Err(AppError::Internal(format!("'{}' is not an evaluator action", other.name())));
        }
    }

    changes.proposals.insert(0, RecordChange::new(proposal_from, proposal.clone(), history));
    if may_end_challenge {
        complete_challenge(state, opportunity, &mut changes, caller.user_id(), now).await?;
    }
    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use crate::auth::UserType;
    use crate::closer;
    use axum::http::{Method, StatusCode};
    use chrono::Duration;
    use serde_json::{json, Value};
    use uuid::Uuid;

    fn cwu_proposal(opportunity: Uuid, status: Option<&str>) -> Value {
        let mut body = json!({
            "opportunityId": opportunity,
            "details": {
                "program": "code-with-us",
                "proposalText": "I will build it in Rust.",
            },
        });
        if let Some(status) = status {
            body["status"] = json!(status);
        }
        body
    }

    async fn published_cwu(app: &TestApp, gov: &str) -> Uuid {
        let id = create_opportunity(app, gov, "code-with-us", None).await;
        let (status, _) = act(
            app,
            &format!("/api/opportunities/code-with-us/{}", id),
            gov,
            "publish",
            json!(""),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        id
    }

    /// Push the clock past every deadline and run the closer
    async fn close_opportunities(app: &TestApp) {
        closer::close_due_opportunities(app.state.store.as_ref(), chrono::Utc::now() + Duration::days(30))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_proposal_round_trip() {
        let app = TestApp::new();
        let (_, gov) = app.user(UserType::Government).await;
        let (_, vendor) = app.user(UserType::Vendor).await;
        let opportunity = published_cwu(&app, &gov).await;

        let (status, body) = app
            .send(Method::POST, "/api/proposals/code-with-us", Some(&vendor), Some(cwu_proposal(opportunity, None)))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        let uri = format!("/api/proposals/code-with-us/{}", body["data"]["id"].as_str().unwrap());

        let (status, body) = app.send(Method::GET, &uri, Some(&vendor), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "DRAFT");
        assert_eq!(body["data"]["opportunityId"], json!(opportunity));
        assert_eq!(body["data"]["details"]["proposalText"], "I will build it in Rust.");

        let (status, body) = app
            .send(Method::GET, "/api/proposals/code-with-us", Some(&vendor), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_submit_is_one_way_for_vendors() {
        let app = TestApp::new();
        let (_, gov) = app.user(UserType::Government).await;
        let (_, vendor) = app.user(UserType::Vendor).await;
        let opportunity = published_cwu(&app, &gov).await;

        let (_, body) = app
            .send(Method::POST, "/api/proposals/code-with-us", Some(&vendor), Some(cwu_proposal(opportunity, None)))
            .await;
        let uri = format!("/api/proposals/code-with-us/{}", body["data"]["id"].as_str().unwrap());

        let (status, body) = act(&app, &uri, &vendor, "submit", json!("")).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["data"]["status"], "SUBMITTED");
        assert!(body["data"]["submittedAt"].is_string());

        // Submitted proposals neither resubmit nor accept edits
        let (status, _) = act(&app, &uri, &vendor, "submit", json!("")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = act(
            &app,
            &uri,
            &vendor,
            "edit",
            json!({"details": {"program": "code-with-us", "proposalText": "Changed"}}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = act(&app, &uri, &vendor, "withdraw", json!("Changed my mind")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "WITHDRAWN");
    }

    #[tokio::test]
    async fn test_one_proposal_per_vendor_per_opportunity() {
        let app = TestApp::new();
        let (_, gov) = app.user(UserType::Government).await;
        let (_, vendor) = app.user(UserType::Vendor).await;
        let opportunity = published_cwu(&app, &gov).await;

        let (status, _) = app
            .send(Method::POST, "/api/proposals/code-with-us", Some(&vendor), Some(cwu_proposal(opportunity, None)))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) = app
            .send(Method::POST, "/api/proposals/code-with-us", Some(&vendor), Some(cwu_proposal(opportunity, None)))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["errors"]["opportunityId"].is_array());
    }

    #[tokio::test]
    async fn test_government_sees_nothing_until_close_then_scores_and_awards() {
        let app = TestApp::new();
        let (_, gov) = app.user(UserType::Government).await;
        let (_, winner) = app.user(UserType::Vendor).await;
        let (_, runner_up) = app.user(UserType::Vendor).await;
        let opportunity = published_cwu(&app, &gov).await;

        let mut uris = Vec::new();
        for vendor in [&winner, &runner_up] {
            let (status, body) = app
                .send(
                    Method::POST,
                    "/api/proposals/code-with-us",
                    Some(vendor),
                    Some(cwu_proposal(opportunity, Some("SUBMITTED"))),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED, "{}", body);
            uris.push(format!("/api/proposals/code-with-us/{}", body["data"]["id"].as_str().unwrap()));
        }

        let (status, _) = app.send(Method::GET, &uris[0], Some(&gov), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        close_opportunities(&app).await;

        let (status, body) = app.send(Method::GET, &uris[0], Some(&gov), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "UNDER_REVIEW");

        for (uri, score) in uris.iter().zip([90.0, 70.0]) {
            let (status, body) = act(&app, uri, &gov, "score", json!({"score": score})).await;
            assert_eq!(status, StatusCode::OK, "{}", body);
            assert_eq!(body["data"]["status"], "EVALUATED");
        }

        // Scores stay hidden from the vendor until the outcome is final
        let (_, body) = app.send(Method::GET, &uris[0], Some(&winner), None).await;
        assert!(body["data"]["scores"].get("score").is_none());

        let (status, body) = act(&app, &uris[0], &gov, "award", json!("Best value")).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["data"]["status"], "AWARDED");

        let (_, body) = app.send(Method::GET, &uris[0], Some(&winner), None).await;
        assert_eq!(body["data"]["scores"]["score"], 90.0);
        let (_, body) = app.send(Method::GET, &uris[1], Some(&runner_up), None).await;
        assert_eq!(body["data"]["status"], "NOT_AWARDED");

        let (_, body) = app
            .send(Method::GET, &format!("/api/opportunities/code-with-us/{}", opportunity), None, None)
            .await;
        assert_eq!(body["data"]["status"], "AWARDED");
    }

    #[tokio::test]
    async fn test_vendor_cannot_score() {
        let app = TestApp::new();
        let (_, gov) = app.user(UserType::Government).await;
        let (_, vendor) = app.user(UserType::Vendor).await;
        let opportunity = published_cwu(&app, &gov).await;
        let (_, body) = app
            .send(
                Method::POST,
                "/api/proposals/code-with-us",
                Some(&vendor),
                Some(cwu_proposal(opportunity, Some("SUBMITTED"))),
            )
            .await;
        let uri = format!("/api/proposals/code-with-us/{}", body["data"]["id"].as_str().unwrap());
        close_opportunities(&app).await;

        let (status, _) = act(&app, &uri, &vendor, "score", json!({"score": 100.0})).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = act(&app, &uri, &gov, "score", json!({"score": 101.0})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    /// Vendor token and a two-member organization qualified for Sprint With Us
    async fn swu_team(app: &TestApp) -> (String, Uuid) {
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
        let uri = format!("/api/affiliations/{}", body["data"]["id"].as_str().unwrap());
        let (status, _) = app
            .send(Method::PUT, &uri, Some(&member_token), Some(json!({"tag": "approve"})))
            .await;
        assert_eq!(status, StatusCode::OK);
        (owner, organization)
    }

    #[tokio::test]
    async fn test_sprint_with_us_phases_through_award() {
        let app = TestApp::new();
        let (_, admin) = app.user(UserType::Admin).await;
        let opportunity = create_opportunity(&app, &admin, "sprint-with-us", Some("PUBLISHED")).await;
        let opportunity_uri = format!("/api/opportunities/sprint-with-us/{}", opportunity);

        let mut uris = Vec::new();
        for price in [1_500_000, 1_800_000] {
            let (vendor, organization) = swu_team(&app).await;
            let (status, body) = app
                .send(
                    Method::POST,
                    "/api/proposals/sprint-with-us",
                    Some(&vendor),
                    Some(json!({
                        "opportunityId": opportunity,
                        "organizationId": organization,
                        "status": "SUBMITTED",
                        "details": {
                            "program": "sprint-with-us",
                            "teamQuestionResponses": [{"order": 1, "response": "We pair daily."}],
                            "price": price,
                        },
                    })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED, "{}", body);
            uris.push(format!("/api/proposals/sprint-with-us/{}", body["data"]["id"].as_str().unwrap()));
        }
        close_opportunities(&app).await;

        // Phases are scored in order
        let (status, _) = act(&app, &uris[0], &admin, "scoreCodeChallenge", json!(80.0)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        for (uri, score) in uris.iter().zip([90.0, 60.0]) {
            let (status, body) = act(&app, uri, &admin, "scoreQuestions", json!(score)).await;
            assert_eq!(status, StatusCode::OK, "{}", body);
            assert_eq!(body["data"]["status"], "UNDER_REVIEW");
        }

        let (status, body) = act(&app, &opportunity_uri, &admin, "startCodeChallenge", json!("")).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["data"]["status"], "EVAL_CC");
        for (uri, score) in uris.iter().zip([80.0, 70.0]) {
            let (status, body) = act(&app, uri, &admin, "scoreCodeChallenge", json!(score)).await;
            assert_eq!(status, StatusCode::OK, "{}", body);
        }

        let (status, body) = act(&app, &opportunity_uri, &admin, "startTeamScenario", json!("")).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["data"]["status"], "EVAL_SCENARIO");
        for (uri, price) in uris.iter().zip([100.0, 83.0]) {
            let (status, body) =
                act(&app, uri, &admin, "scoreTeamScenario", json!({"scenario": 85.0, "price": price})).await;
            assert_eq!(status, StatusCode::OK, "{}", body);
            assert_eq!(body["data"]["status"], "EVALUATED");
        }

        let (status, body) = act(&app, &uris[0], &admin, "award", json!("Strongest team")).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["data"]["status"], "AWARDED");
        let (_, body) = app.send(Method::GET, &uris[1], Some(&admin), None).await;
        assert_eq!(body["data"]["status"], "NOT_AWARDED");
        let (_, body) = app.send(Method::GET, &opportunity_uri, None, None).await;
        assert_eq!(body["data"]["status"], "AWARDED");
    }

    #[tokio::test]
    async fn test_disqualify_needs_a_reason() {
        let app = TestApp::new();
        let (_, gov) = app.user(UserType::Government).await;
        let (_, vendor) = app.user(UserType::Vendor).await;
        let opportunity = published_cwu(&app, &gov).await;
        let (_, body) = app
            .send(
                Method::POST,
                "/api/proposals/code-with-us",
                Some(&vendor),
                Some(cwu_proposal(opportunity, Some("SUBMITTED"))),
            )
            .await;
        let uri = format!("/api/proposals/code-with-us/{}", body["data"]["id"].as_str().unwrap());
        close_opportunities(&app).await;

        let (status, body) = act(&app, &uri, &gov, "disqualify", json!("  ")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["errors"]["reason"].is_array());

        let (status, body) = act(&app, &uri, &gov, "disqualify", json!("Missed mandatory skills")).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["data"]["status"], "DISQUALIFIED");
        let history = body["data"]["history"].as_array().unwrap();
        assert_eq!(history.last().unwrap()["note"], "Missed mandatory skills");

        // Disqualified proposals cannot be awarded
        let (status, _) = act(&app, &uri, &gov, "award", json!("")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_sprint_with_us_needs_a_qualified_organization() {
        let app = TestApp::new();
        let (_, admin) = app.user(UserType::Admin).await;
        let (_, vendor) = app.user(UserType::Vendor).await;
        let opportunity = create_opportunity(&app, &admin, "sprint-with-us", Some("PUBLISHED")).await;

        let details = json!({
            "program": "sprint-with-us",
            "teamQuestionResponses": [{"order": 1, "response": "We pair daily."}],
            "price": 1500000,
        });
        let (status, body) = app
            .send(
                Method::POST,
                "/api/proposals/sprint-with-us",
                Some(&vendor),
                Some(json!({"opportunityId": opportunity, "details": details})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["errors"]["organizationId"].is_array());

        // A one-person organization is below the team minimum
        let organization = app.organization(&vendor).await;
        let (status, body) = app
            .send(
                Method::POST,
                "/api/proposals/sprint-with-us",
                Some(&vendor),
                Some(json!({
                    "opportunityId": opportunity,
                    "organizationId": organization,
                    "details": details,
                    "status": "SUBMITTED",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["errors"]["organizationId"].is_array());
    }
}
