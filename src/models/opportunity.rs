//! Opportunities posted by government buyers

use super::{clean_optional, HistoryRecord};
use crate::error::FieldErrors;
use crate::lifecycle::{OpportunityStatus, Program};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;
use validator::Validate;

/// Scoring weights must add up to this
pub const TOTAL_WEIGHT: u32 = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Opportunity {
    pub id: Uuid,
    pub program: Program,
    pub status: OpportunityStatus,
    pub title: String,
    pub teaser: String,
    pub description: String,
    pub location: String,
    pub remote_ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_desc: Option<String>,
    pub proposal_deadline: DateTime<Utc>,
    pub details: OpportunityDetails,
    pub evaluation_panel: Vec<PanelMember>,
    pub addenda: Vec<Addendum>,
    pub history: Vec<HistoryRecord>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Opportunity {
    pub fn is_author(&self, user_id: Uuid) -> bool {
        self.created_by == user_id
    }

    /// Published and the deadline has not passed
    pub fn accepts_proposals(&self, now: DateTime<Utc>) -> bool {
        self.status.is_published() && self.proposal_deadline > now
    }

    pub fn panel_member(&self, user_id: Uuid) -> Option<&PanelMember> {
        self.evaluation_panel.iter().find(|m| m.user_id == user_id)
    }

    /// Questions vendors answer, in display order
    pub fn questions(&self) -> &[Question] {
        match &self.details {
            OpportunityDetails::CodeWithUs { .. } => &[],
            OpportunityDetails::SprintWithUs { team_questions, .. } => team_questions,
            OpportunityDetails::TeamWithUs { resource_questions, .. } => resource_questions,
        }
    }

    /// Fields that must be filled in before publishing or review
    pub fn completeness_errors(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if self.title.trim().is_empty() {
            errors.add("title", "Please enter a title.");
        }
        if self.teaser.trim().is_empty() {
            errors.add("teaser", "Please enter a teaser.");
        }
        if self.description.trim().is_empty() {
            errors.add("description", "Please enter a description.");
        }
        if self.remote_ok && self.remote_desc.is_none() {
            errors.add("remoteDesc", "Please describe the remote work options.");
        }
        if self.program != Program::CodeWithUs && self.questions().is_empty() {
            errors.add("questions", "Please add at least one question.");
        }
        if self.program == Program::TeamWithUs && self.evaluation_panel.is_empty() {
            errors.add("evaluationPanel", "Please assign an evaluation panel.");
        }
        errors
    }

    /// Replace editable fields from `body`
    pub fn apply(&mut self, body: OpportunityBody, now: DateTime<Utc>) {
        self.title = body.title.trim().to_string();
        self.teaser = body.teaser.trim().to_string();
        self.description = body.description;
        self.location = body.location.trim().to_string();
        self.remote_ok = body.remote_ok;
        self.remote_desc = clean_optional(body.remote_desc);
        self.proposal_deadline = body.proposal_deadline;
        self.details = body.details;
        if let Some(panel) = body.evaluation_panel {
            self.evaluation_panel = panel;
        }
        self.updated_at = now;
    }

    /// Move to `to` when the allow-list permits it, returning the history entry
    pub fn move_to(
        &mut self,
        to: OpportunityStatus,
        created_by: Option<Uuid>,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Option<HistoryRecord> {
        if !self.status.can_transition_to(to) {
            return None;
        }
        self.status = to;
        self.updated_at = now;
        Some(HistoryRecord::status(to, created_by, note, now))
    }

    /// Copy suitable for callers who may not see internal workflow data
    pub fn public_view(&self) -> Opportunity {
        Opportunity {
            history: Vec::new(),
            evaluation_panel: Vec::new(),
            ..self.clone()
        }
    }
}

/// Program-specific fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "program", rename_all = "kebab-case")]
pub enum OpportunityDetails {
    #[serde(rename_all = "camelCase")]
    CodeWithUs {
        /// Fixed price, in dollars
        reward: i64,
        skills: Vec<String>,
        acceptance_criteria: String,
        evaluation_criteria: String,
    },
    #[serde(rename_all = "camelCase")]
    SprintWithUs {
        total_max_budget: i64,
        min_team_members: u32,
        mandatory_skills: Vec<String>,
        team_questions: Vec<Question>,
        questions_weight: u32,
        code_challenge_weight: u32,
        scenario_weight: u32,
        price_weight: u32,
    },
    #[serde(rename_all = "camelCase")]
    TeamWithUs {
        max_budget: i64,
        service_areas: Vec<String>,
        resource_questions: Vec<Question>,
        questions_weight: u32,
        challenge_weight: u32,
        price_weight: u32,
    },
}

impl OpportunityDetails {
    pub fn program(&self) -> Program {
        match self {
            OpportunityDetails::CodeWithUs { .. } => Program::CodeWithUs,
            OpportunityDetails::SprintWithUs { .. } => Program::SprintWithUs,
            OpportunityDetails::TeamWithUs { .. } => Program::TeamWithUs,
        }
    }

    pub fn validate_fields(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        match self {
            OpportunityDetails::CodeWithUs { reward, .. } => {
                if *reward <= 0 {
                    errors.add("reward", "Please enter a reward greater than zero.");
                }
            }
            OpportunityDetails::SprintWithUs {
                total_max_budget,
                min_team_members,
                team_questions,
                questions_weight,
                code_challenge_weight,
                scenario_weight,
                price_weight,
                ..
            } => {
                if *total_max_budget <= 0 {
                    errors.add("totalMaxBudget", "Please enter a budget greater than zero.");
                }
                if *min_team_members == 0 {
                    errors.add("minTeamMembers", "A team needs at least one member.");
                }
                let total =
                    weights_total(&[*questions_weight, *code_challenge_weight, *scenario_weight, *price_weight]);
                if total != u64::from(TOTAL_WEIGHT) {
                    errors.add("weights", format!("Weights must add up to {}.", TOTAL_WEIGHT));
                }
                validate_questions("teamQuestions", team_questions, &mut errors);
            }
            OpportunityDetails::TeamWithUs {
                max_budget,
                service_areas,
                resource_questions,
                questions_weight,
                challenge_weight,
                price_weight,
            } => {
                if *max_budget <= 0 {
                    errors.add("maxBudget", "Please enter a budget greater than zero.");
                }
                if service_areas.is_empty() {
                    errors.add("serviceAreas", "Please select at least one service area.");
                }
                if weights_total(&[*questions_weight, *challenge_weight, *price_weight])
                    != u64::from(TOTAL_WEIGHT)
                {
                    errors.add("weights", format!("Weights must add up to {}.", TOTAL_WEIGHT));
                }
                validate_questions("resourceQuestions", resource_questions, &mut errors);
            }
        }
        errors
    }
}

fn weights_total(weights: &[u32]) -> u64 {
    weights.iter().map(|w| u64::from(*w)).sum()
}

fn validate_questions(field: &str, questions: &[Question], errors: &mut FieldErrors) {
    let mut orders = HashSet::new();
    for q in questions {
        if let Err(e) = q.validate() {
            for (name, messages) in FieldErrors::from(e) {
                for message in messages {
                    errors.add(format!("{}[{}].{}", field, q.order, name), message);
                }
            }
        }
        if !orders.insert(q.order) {
            errors.add(field, format!("Question order {} is used twice.", q.order));
        }
        if q.minimum_score.is_some_and(|min| min > q.score) {
            errors.add(
                format!("{}[{}].minimumScore", field, q.order),
                "Minimum score cannot exceed the available score.",
            );
        }
    }
}

/// A question vendors answer in writing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub order: u32,
    #[validate(length(min = 1, max = 2000, message = "Please enter a question."))]
    pub question: String,
    #[validate(length(max = 2000, message = "Guideline is too long."))]
    #[serde(default)]
    pub guideline: String,
    /// Maximum score an evaluator may give
    #[validate(range(min = 1, max = 100, message = "Score must be between 1 and 100."))]
    pub score: u32,
    #[validate(range(min = 1, max = 3000, message = "Word limit must be between 1 and 3000."))]
    pub word_limit: u32,
    /// Proposals scoring below this are screened out
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_score: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelMember {
    pub user_id: Uuid,
    pub chair: bool,
    pub evaluator: bool,
}

/// A panel needs exactly one chair and at least one evaluator
pub fn validate_panel(panel: &[PanelMember]) -> FieldErrors {
    let mut errors = FieldErrors::new();
    if panel.is_empty() {
        return errors;
    }
    if panel.iter().filter(|m| m.chair).count() != 1 {
        errors.add("evaluationPanel", "The panel must have exactly one chair.");
    }
    if !panel.iter().any(|m| m.evaluator) {
        errors.add("evaluationPanel", "The panel must have at least one evaluator.");
    }
    let unique: HashSet<_> = panel.iter().map(|m| m.user_id).collect();
    if unique.len() != panel.len() {
        errors.add("evaluationPanel", "Panel members must be unique.");
    }
    errors
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Addendum {
    pub id: Uuid,
    pub description: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Create and edit body
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OpportunityBody {
    #[validate(length(min = 1, max = 200, message = "Please enter a title."))]
    pub title: String,
    #[validate(length(max = 500, message = "Teaser is too long."))]
    #[serde(default)]
    pub teaser: String,
    #[validate(length(max = 10000, message = "Description is too long."))]
    #[serde(default)]
    pub description: String,
    #[validate(length(min = 1, max = 100, message = "Please enter a location."))]
    pub location: String,
    #[serde(default)]
    pub remote_ok: bool,
    #[validate(length(max = 500, message = "Remote description is too long."))]
    pub remote_desc: Option<String>,
    pub proposal_deadline: DateTime<Utc>,
    pub details: OpportunityDetails,
    pub evaluation_panel: Option<Vec<PanelMember>>,
}

impl OpportunityBody {
    /// Derive-level checks plus cross-field rules
    pub fn check(&self, program: Program, now: DateTime<Utc>) -> FieldErrors {
        let mut errors = match self.validate() {
            Ok(()) => FieldErrors::new(),
            Err(e) => FieldErrors::from(e),
        };
        if self.details.program() != program {
            errors.add("details", format!("Details must describe a {} opportunity.", program));
        } else {
            errors.merge(self.details.validate_fields());
        }
        if self.proposal_deadline <= now {
            errors.add("proposalDeadline", "Please select a future date.");
        }
        if let Some(panel) = &self.evaluation_panel {
            if program != Program::TeamWithUs && !panel.is_empty() {
                errors.add("evaluationPanel", "Only Team With Us opportunities have a panel.");
            }
            errors.merge(validate_panel(panel));
        }
        errors
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOpportunity {
    #[serde(flatten)]
    pub body: OpportunityBody,
    /// Initial status tag; defaults to DRAFT
    pub status: Option<String>,
}

/// `PUT /opportunities/{program}/{id}` actions
#[derive(Debug, Deserialize)]
#[serde(tag = "tag", content = "value", rename_all = "camelCase")]
pub enum OpportunityAction {
    Edit(OpportunityBody),
    SubmitForReview(String),
    Publish(String),
    Suspend(String),
    Cancel(String),
    AddAddendum(String),
    AddNote(String),
    EditEvaluationPanel(Vec<PanelMember>),
    StartCodeChallenge(String),
    StartTeamScenario(String),
    StartConsensus(String),
    FinalizeQuestionConsensuses(String),
}

impl OpportunityAction {
    pub fn name(&self) -> &'static str {
        match self {
            OpportunityAction::Edit(_) => "edit",
            OpportunityAction::SubmitForReview(_) => "submitForReview",
            OpportunityAction::Publish(_) => "publish",
            OpportunityAction::Suspend(_) => "suspend",
            OpportunityAction::Cancel(_) => "cancel",
            OpportunityAction::AddAddendum(_) => "addAddendum",
            OpportunityAction::AddNote(_) => "addNote",
            OpportunityAction::EditEvaluationPanel(_) => "editEvaluationPanel",
            OpportunityAction::StartCodeChallenge(_) => "startCodeChallenge",
            OpportunityAction::StartTeamScenario(_) => "startTeamScenario",
            OpportunityAction::StartConsensus(_) => "startConsensus",
            OpportunityAction::FinalizeQuestionConsensuses(_) => "finalizeQuestionConsensuses",
        }
    }

    /// Whether the action exists for `program`
    pub fn available_for(&self, program: Program) -> bool {
        match self {
            OpportunityAction::Suspend(_) => program != Program::TeamWithUs,
            OpportunityAction::StartCodeChallenge(_) | OpportunityAction::StartTeamScenario(_) => {
                program == Program::SprintWithUs
            }
            OpportunityAction::EditEvaluationPanel(_)
            | OpportunityAction::StartConsensus(_)
            | OpportunityAction::FinalizeQuestionConsensuses(_) => program == Program::TeamWithUs,
            _ => true,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use chrono::Duration;

    fn body(program: Program) -> OpportunityBody {
        OpportunityBody {
            title: "Title".into(),
            teaser: "Teaser".into(),
            description: "Description".into(),
            location: "Victoria".into(),
            remote_ok: false,
            remote_desc: None,
            proposal_deadline: Utc::now() + Duration::days(7),
            details: details(program),
            evaluation_panel: None,
        }
    }

    #[test]
    fn test_valid_body_passes() {
        for program in Program::ALL {
            let errors = body(program).check(program, Utc::now());
            assert!(errors.is_empty(), "{}: {:?}", program, errors);
        }
    }

    #[test]
    fn test_details_must_match_program() {
        let errors = body(Program::CodeWithUs).check(Program::TeamWithUs, Utc::now());
        assert!(errors.get("details").is_some());
    }

    #[test]
    fn test_weights_must_total_one_hundred() {
        let mut b = body(Program::SprintWithUs);
        if let OpportunityDetails::SprintWithUs { price_weight, .. } = &mut b.details {
            *price_weight = 30;
        }
        assert!(b.check(Program::SprintWithUs, Utc::now()).get("weights").is_some());
    }

    #[test]
    fn test_minimum_score_bounded_by_score() {
        let mut b = body(Program::TeamWithUs);
        if let OpportunityDetails::TeamWithUs { resource_questions, .. } = &mut b.details {
            resource_questions[0].minimum_score = Some(11);
        }
        let errors = b.check(Program::TeamWithUs, Utc::now());
        assert!(errors.get("resourceQuestions[1].minimumScore").is_some());
    }

    #[test]
    fn test_past_deadline_rejected() {
        let mut b = body(Program::CodeWithUs);
        b.proposal_deadline = Utc::now() - Duration::minutes(1);
        assert!(b.check(Program::CodeWithUs, Utc::now()).get("proposalDeadline").is_some());
    }

    #[test]
    fn test_panel_rules() {
        let chair = PanelMember { user_id: Uuid::new_v4(), chair: true, evaluator: true };
        assert!(validate_panel(&[chair.clone()]).is_empty());
        let second_chair = PanelMember { user_id: Uuid::new_v4(), chair: true, evaluator: false };
        assert!(!validate_panel(&[chair.clone(), second_chair]).is_empty());
        assert!(!validate_panel(&[chair.clone(), chair]).is_empty());
    }

    #[test]
    fn test_accepts_proposals_until_deadline() {
        let opp = opportunity(
            Program::CodeWithUs,
            OpportunityStatus::published(Program::CodeWithUs),
            Uuid::new_v4(),
        );
        assert!(opp.accepts_proposals(Utc::now()));
        assert!(!opp.accepts_proposals(opp.proposal_deadline));
    }

    #[test]
    fn test_move_to_follows_allow_list() {
        let mut opp = opportunity(
            Program::CodeWithUs,
            OpportunityStatus::draft(Program::CodeWithUs),
            Uuid::new_v4(),
        );
        let now = Utc::now();
        assert!(opp.move_to(OpportunityStatus::awarded(Program::CodeWithUs), None, None, now).is_none());
        assert!(opp.status.is_draft());

        let entry = opp
            .move_to(OpportunityStatus::published(Program::CodeWithUs), Some(opp.created_by), None, now)
            .unwrap();
        assert!(opp.status.is_published());
        assert_eq!(entry.columns().0, Some("PUBLISHED"));
    }

    #[test]
    fn test_action_availability() {
        let start = OpportunityAction::StartConsensus(String::new());
        assert!(start.available_for(Program::TeamWithUs));
        assert!(!start.available_for(Program::CodeWithUs));
        assert!(!OpportunityAction::Suspend(String::new()).available_for(Program::TeamWithUs));
    }

    #[test]
    fn test_details_tagged_by_program() {
        let json = serde_json::to_value(details(Program::CodeWithUs)).unwrap();
        assert_eq!(json["program"], "code-with-us");
        assert_eq!(json["reward"], 70_000);
    }
}
