//! Opportunity routes
//!
//! Creation, listing and the tagged `PUT` actions that move an opportunity
//! through its program's lifecycle. Every status change goes through
//! [`Opportunity::move_to`], so anything outside the allow-list is refused.

use super::proposals::complete_challenge;
use super::{find_opportunity, note, parse_program};
use crate::auth::{MaybeSession, Session};
use crate::db::{ChangeSet, RecordChange};
use crate::error::{ensure, validation_error, ApiResult, AppError};
use crate::lifecycle::{
    EvaluationStatus, OpportunityStatus, Program, ProposalStatus, SwuOpportunityStatus,
    TwuOpportunityStatus, TwuProposalStatus,
};
use crate::models::evaluation::EvaluationKind;
use crate::models::opportunity::{validate_panel, CreateOpportunity, OpportunityAction};
use crate::models::{
    clean_optional, Addendum, HistoryEvent, HistoryRecord, Opportunity, SuccessResponse,
};
use crate::permissions;
use crate::state::SharedState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

/// Strip internals the caller may not see
fn present(session: Option<&Session>, opportunity: Opportunity) -> Opportunity {
    if permissions::read_opportunity_internals(session, &opportunity) {
        opportunity
    } else {
        opportunity.public_view()
    }
}

/// Allow-listed status change as a single-record change set
fn transition(
    opportunity: &mut Opportunity,
    to: OpportunityStatus,
    actor: Option<Uuid>,
    raw_note: String,
    now: DateTime<Utc>,
) -> ApiResult<RecordChange<Opportunity>> {
    let from = opportunity.status;
    let entry = opportunity.move_to(to, actor, note(raw_note), now).ok_or_else(|| {
        warn!("Refused opportunity {} move {} -> {}", opportunity.id, from, to);
        AppError::permission()
    })?;
    Ok(RecordChange::with_history(from.as_str(), opportunity.clone(), entry))
}

fn required_note(field: &str, raw: String) -> ApiResult<String> {
    clean_optional(Some(raw)).ok_or_else(|| validation_error(field, "Please enter some text."))
}

/// POST /api/opportunities/{program}
pub async fn create_opportunity(
    State(state): State<SharedState>,
    session: MaybeSession,
    Path(program): Path<String>,
    Json(body): Json<CreateOpportunity>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<Opportunity>>)> {
    let program = parse_program(&program)?;
    let session = session.as_ref();
    let now = Utc::now();

    let status = match body.status.as_deref() {
        None => OpportunityStatus::draft(program),
        Some(raw) => OpportunityStatus::parse(program, raw)
            .filter(|s| {
                s.is_draft() || s.is_published() || *s == OpportunityStatus::under_review(program)
            })
            .ok_or_else(|| validation_error("status", "Please choose draft, review or publish."))?,
    };

    body.body.check(program, now).into_result()?;
    ensure(permissions::create_opportunity(session, status))?;
    let author = session.ok_or_else(AppError::permission)?.user_id();

    let mut opportunity = Opportunity {
        id: Uuid::new_v4(),
        program,
        status,
        title: String::new(),
        teaser: String::new(),
        description: String::new(),
        location: String::new(),
        remote_ok: false,
        remote_desc: None,
        proposal_deadline: body.body.proposal_deadline,
        details: body.body.details.clone(),
        evaluation_panel: Vec::new(),
        addenda: Vec::new(),
        history: Vec::new(),
        created_by: author,
        created_at: now,
        updated_at: now,
    };
    opportunity.apply(body.body, now);
    if !status.is_draft() {
        opportunity.completeness_errors().into_result()?;
    }
    opportunity.history.push(HistoryRecord::status(status, Some(author), None, now));

    let opportunity = state.store.insert_opportunity(opportunity).await?;
    info!("✅ Created {} opportunity '{}' as {}", program, opportunity.title, status);

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data("Opportunity created", opportunity)),
    ))
}

/// GET /api/opportunities/{program}
pub async fn list_opportunities(
    State(state): State<SharedState>,
    session: MaybeSession,
    Path(program): Path<String>,
) -> ApiResult<Json<SuccessResponse<Vec<Opportunity>>>> {
    let program = parse_program(&program)?;
    let session = session.as_ref();

    let opportunities: Vec<_> = state
        .store
        .list_opportunities(Some(program))
        .await?
        .into_iter()
        .filter(|o| permissions::read_opportunity(session, o))
        .map(|o| present(session, o))
        .collect();

    Ok(Json(SuccessResponse::with_data(
        format!("Found {} opportunities", opportunities.len()),
        opportunities,
    )))
}

/// GET /api/opportunities/{program}/{id}
pub async fn read_opportunity(
    State(state): State<SharedState>,
    session: MaybeSession,
    Path((program, id)): Path<(String, Uuid)>,
) -> ApiResult<Json<SuccessResponse<Opportunity>>> {
    let program = parse_program(&program)?;
    let session = session.as_ref();
    let opportunity = find_opportunity(&state, program, id).await?;
    ensure(permissions::read_opportunity(session, &opportunity))?;

    Ok(Json(SuccessResponse::with_data(
        "Opportunity retrieved",
        present(session, opportunity),
    )))
}

/// PUT /api/opportunities/{program}/{id}
pub async fn update_opportunity(
    State(state): State<SharedState>,
    session: MaybeSession,
    Path((program, id)): Path<(String, Uuid)>,
    Json(action): Json<OpportunityAction>,
) -> ApiResult<Json<SuccessResponse<Opportunity>>> {
    let program = parse_program(&program)?;
    let session = session.as_ref();
    let mut opportunity = find_opportunity(&state, program, id).await?;

    if !action.available_for(program) {
        return Err(validation_error(
            "action",
            format!("'{}' is not available for {} opportunities.", action.name(), program),
        ));
    }

    let action_name = action.name();
    let changes = plan_action(&state, session, &mut opportunity, action, Utc::now()).await?;
    state.store.commit(changes).await?;
    info!("📝 Opportunity {} {}", id, action_name);

    let opportunity = find_opportunity(&state, program, id).await?;
    Ok(Json(SuccessResponse::with_data(
        "Opportunity updated",
        present(session, opportunity),
    )))
}

/// Validate `action` and describe what it changes
async fn plan_action(
    state: &SharedState,
    session: Option<&Session>,
    opportunity: &mut Opportunity,
    action: OpportunityAction,
    now: DateTime<Utc>,
) -> ApiResult<ChangeSet> {
    let actor = session.map(Session::user_id);
    let program = opportunity.program;

    match action {
        OpportunityAction::Edit(body) => {
            body.check(program, now).into_result()?;
            ensure(permissions::edit_opportunity(session, opportunity))?;
            if !opportunity.status.details_editable(permissions::is_admin(session)) {
                return Err(validation_error("status", "This opportunity can no longer be edited."));
            }
            if body.evaluation_panel.is_some()
                && !matches!(opportunity.status, OpportunityStatus::TeamWithUs(s) if s.can_change_evaluation_panel())
            {
                return Err(validation_error("evaluationPanel", "The panel can no longer change."));
            }
            opportunity.apply(body, now);
            if !opportunity.status.is_draft() {
                opportunity.completeness_errors().into_result()?;
            }
            let editor = actor.ok_or_else(AppError::permission)?;
            Ok(ChangeSet::opportunity(RecordChange::with_history(
                opportunity.status.as_str(),
                opportunity.clone(),
                HistoryRecord::event(HistoryEvent::Edited, editor, None, now),
            )))
        }

        OpportunityAction::SubmitForReview(raw) => {
            ensure(permissions::submit_opportunity_for_review(session, opportunity))?;
            opportunity.completeness_errors().into_result()?;
            let to = OpportunityStatus::under_review(program);
            Ok(ChangeSet::opportunity(transition(opportunity, to, actor, raw, now)?))
        }

        OpportunityAction::Publish(raw) => {
            ensure(permissions::manage_opportunity(session, opportunity))?;
            opportunity.completeness_errors().into_result()?;
            if opportunity.proposal_deadline <= now {
                return Err(validation_error("proposalDeadline", "Please select a future date."));
            }
            let to = OpportunityStatus::published(program);
            Ok(ChangeSet::opportunity(transition(opportunity, to, actor, raw, now)?))
        }

        OpportunityAction::Suspend(raw) => {
            ensure(permissions::manage_opportunity(session, opportunity))?;
            let to = OpportunityStatus::suspended(program).ok_or_else(AppError::permission)?;
            Ok(ChangeSet::opportunity(transition(opportunity, to, actor, raw, now)?))
        }

        OpportunityAction::Cancel(raw) => {
            ensure(permissions::manage_opportunity(session, opportunity))?;
            let to = OpportunityStatus::canceled(program);
            Ok(ChangeSet::opportunity(transition(opportunity, to, actor, raw, now)?))
        }

        OpportunityAction::AddAddendum(raw) => {
            let description = required_note("addendum", raw)?;
            ensure(permissions::edit_opportunity(session, opportunity))?;
            if !opportunity.status.allows_addenda() {
                return Err(validation_error("status", "Addenda cannot be added at this stage."));
            }
            let author = actor.ok_or_else(AppError::permission)?;
            opportunity.addenda.push(Addendum {
                id: Uuid::new_v4(),
                description,
                created_by: author,
                created_at: now,
            });
            opportunity.updated_at = now;
            Ok(ChangeSet::opportunity(RecordChange::with_history(
                opportunity.status.as_str(),
                opportunity.clone(),
                HistoryRecord::event(HistoryEvent::AddendumAdded, author, None, now),
            )))
        }

        OpportunityAction::AddNote(raw) => {
            let text = required_note("note", raw)?;
            ensure(permissions::edit_opportunity(session, opportunity))?;
            let author = actor.ok_or_else(AppError::permission)?;
            Ok(ChangeSet::opportunity(RecordChange::with_history(
                opportunity.status.as_str(),
                opportunity.clone(),
                HistoryRecord::event(HistoryEvent::NoteAdded, author, Some(text), now),
            )))
        }

        OpportunityAction::EditEvaluationPanel(panel) => {
            validate_panel(&panel).into_result()?;
            if panel.is_empty() {
                return Err(validation_error("evaluationPanel", "Please assign an evaluation panel."));
            }
            ensure(permissions::edit_opportunity(session, opportunity))?;
            if !matches!(opportunity.status, OpportunityStatus::TeamWithUs(s) if s.can_change_evaluation_panel())
            {
                return Err(validation_error("evaluationPanel", "The panel can no longer change."));
            }
            let author = actor.ok_or_else(AppError::permission)?;
            opportunity.evaluation_panel = panel;
            opportunity.updated_at = now;
            Ok(ChangeSet::opportunity(RecordChange::with_history(
                opportunity.status.as_str(),
                opportunity.clone(),
                HistoryRecord::event(HistoryEvent::EvaluationPanelChanged, author, None, now),
            )))
        }

        OpportunityAction::StartCodeChallenge(raw) => {
            ensure(permissions::edit_opportunity(session, opportunity))?;
            let to = OpportunityStatus::SprintWithUs(SwuOpportunityStatus::EvaluationCodeChallenge);
            Ok(ChangeSet::opportunity(transition(opportunity, to, actor, raw, now)?))
        }

        OpportunityAction::StartTeamScenario(raw) => {
            ensure(permissions::edit_opportunity(session, opportunity))?;
            let to = OpportunityStatus::SprintWithUs(SwuOpportunityStatus::EvaluationTeamScenario);
            Ok(ChangeSet::opportunity(transition(opportunity, to, actor, raw, now)?))
        }

        OpportunityAction::StartConsensus(raw) => {
            ensure(permissions::edit_opportunity(session, opportunity))?;
            let evaluations = state.store.list_evaluations_for_opportunity(opportunity.id).await?;
            if evaluations
                .iter()
                .any(|e| e.kind == EvaluationKind::Individual && e.status == EvaluationStatus::Draft)
            {
                return Err(validation_error(
                    "evaluations",
                    "Every individual evaluation must be submitted first.",
                ));
            }
            let to = OpportunityStatus::TeamWithUs(TwuOpportunityStatus::EvaluationResourceQuestionsConsensus);
            Ok(ChangeSet::opportunity(transition(opportunity, to, actor, raw, now)?))
        }

        OpportunityAction::FinalizeQuestionConsensuses(raw) => {
            ensure(permissions::edit_opportunity(session, opportunity))?;
            finalize_question_consensuses(state, session, opportunity, raw, now).await
        }
    }
}

/// Apply each submitted consensus to its proposal: proposals meeting every
/// question minimum are screened into the challenge, the rest stop at
/// evaluated. The opportunity then moves on to the challenge stage, or
/// straight through to processing when nobody was screened in.
async fn finalize_question_consensuses(
    state: &SharedState,
    session: Option<&Session>,
    opportunity: &mut Opportunity,
    raw: String,
    now: DateTime<Utc>,
) -> ApiResult<ChangeSet> {
    let actor = session.map(Session::user_id);
    let actor_type = session.map(|s| s.user.user_type).ok_or_else(AppError::permission)?;
    let program = Program::TeamWithUs;
    let under_review = ProposalStatus::first_review(program);
    let evaluated = ProposalStatus::TeamWithUs(TwuProposalStatus::EvaluatedResourceQuestions);
    let challenge = ProposalStatus::TeamWithUs(TwuProposalStatus::UnderReviewChallenge);

    let evaluations = state.store.list_evaluations_for_opportunity(opportunity.id).await?;
    let questions = opportunity.questions().to_vec();
    let mut changes = ChangeSet::default();

    for mut proposal in state.store.list_proposals_for_opportunity(opportunity.id).await? {
        if proposal.status != under_review {
            continue;
        }
        let consensus = evaluations
            .iter()
            .find(|e| e.proposal_id == proposal.id && e.kind == EvaluationKind::Consensus && e.is_submitted())
            .ok_or_else(|| {
                validation_error("consensus", "Every proposal needs a submitted consensus first.")
            })?;

        proposal.scores.questions_score = Some(consensus.percentage(&questions));
        let mut history = Vec::new();
        let entry = proposal
            .move_to(evaluated, actor_type, false, actor, None, now)
            .ok_or_else(AppError::permission)?;
        history.push(entry);
        if !consensus.below_minimum(&questions) {
            let entry = proposal
                .move_to(challenge, actor_type, false, actor, None, now)
                .ok_or_else(AppError::permission)?;
            history.push(entry);
        }
        changes.proposals.push(RecordChange::new(under_review.as_str(), proposal, history));
    }

    let to = OpportunityStatus::TeamWithUs(TwuOpportunityStatus::EvaluationChallenge);
    changes.opportunity = Some(transition(opportunity, to, actor, raw, now)?);
    // Nobody screened in means there is no challenge to run
    let caller = actor.ok_or_else(AppError::permission)?;
    complete_challenge(state, opportunity, &mut changes, caller, now).await?;
    Ok(changes)
}
