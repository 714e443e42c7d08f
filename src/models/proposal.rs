//! Vendor proposals

use super::{HistoryRecord, Opportunity, OpportunityDetails};
use crate::auth::UserType;
use crate::error::FieldErrors;
use crate::lifecycle::{Program, ProposalStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Scores are percentages
pub const MAX_SCORE: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub id: Uuid,
    pub program: Program,
    pub opportunity_id: Uuid,
    /// Required for Sprint With Us and Team With Us
    pub organization_id: Option<Uuid>,
    pub status: ProposalStatus,
    pub details: ProposalDetails,
    pub scores: ProposalScores,
    pub history: Vec<HistoryRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Proposal {
    pub fn is_author(&self, user_id: Uuid) -> bool {
        self.created_by == user_id
    }

    /// Copy with scores and history removed
    pub fn without_scores(&self) -> Proposal {
        Proposal {
            scores: ProposalScores::default(),
            history: Vec::new(),
            ..self.clone()
        }
    }

    /// Move to `status`, stamping the submission time when entering it
    pub fn set_status(&mut self, status: ProposalStatus, now: DateTime<Utc>) {
        if status.is_submitted() {
            self.submitted_at = Some(now);
        }
        self.status = status;
        self.updated_at = now;
    }

    /// Allow-listed move made by `actor`, returning the history entry
    pub fn move_to(
        &mut self,
        to: ProposalStatus,
        actor: UserType,
        before_deadline: bool,
        created_by: Option<Uuid>,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Option<HistoryRecord> {
        if !self.status.can_transition_to(to, actor, before_deadline) {
            return None;
        }
        self.set_status(to, now);
        Some(HistoryRecord::status(to, created_by, note, now))
    }
}

/// Program-specific content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "program", rename_all = "kebab-case")]
pub enum ProposalDetails {
    #[serde(rename_all = "camelCase")]
    CodeWithUs {
        proposal_text: String,
        #[serde(default)]
        additional_comments: String,
    },
    #[serde(rename_all = "camelCase")]
    SprintWithUs {
        team_question_responses: Vec<QuestionResponse>,
        /// Total price across all phases, in dollars
        price: i64,
        #[serde(default)]
        team_members: Vec<Uuid>,
    },
    #[serde(rename_all = "camelCase")]
    TeamWithUs {
        resource_question_responses: Vec<QuestionResponse>,
        hourly_rate: i64,
    },
}

impl ProposalDetails {
    pub fn program(&self) -> Program {
        match self {
            ProposalDetails::CodeWithUs { .. } => Program::CodeWithUs,
            ProposalDetails::SprintWithUs { .. } => Program::SprintWithUs,
            ProposalDetails::TeamWithUs { .. } => Program::TeamWithUs,
        }
    }

    pub fn responses(&self) -> &[QuestionResponse] {
        match self {
            ProposalDetails::CodeWithUs { .. } => &[],
            ProposalDetails::SprintWithUs { team_question_responses, .. } => team_question_responses,
            ProposalDetails::TeamWithUs { resource_question_responses, .. } => {
                resource_question_responses
            }
        }
    }

    /// Structural checks that hold for drafts too
    pub fn validate_against(&self, opportunity: &Opportunity) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if self.program() != opportunity.program {
            errors.add("details", format!("Details must describe a {} proposal.", opportunity.program));
            return errors;
        }
        match self {
            ProposalDetails::CodeWithUs { proposal_text, additional_comments } => {
                if proposal_text.len() > 10_000 {
                    errors.add("proposalText", "Proposal is too long.");
                }
                if additional_comments.len() > 5_000 {
                    errors.add("additionalComments", "Comments are too long.");
                }
            }
            ProposalDetails::SprintWithUs { price, .. } => {
                if let OpportunityDetails::SprintWithUs { total_max_budget, .. } = &opportunity.details {
                    if *price < 0 || price > total_max_budget {
                        errors.add("price", "Price must be within the maximum budget.");
                    }
                }
            }
            ProposalDetails::TeamWithUs { hourly_rate, .. } => {
                if *hourly_rate <= 0 {
                    errors.add("hourlyRate", "Please enter an hourly rate greater than zero.");
                }
            }
        }
        for response in self.responses() {
            match opportunity.questions().iter().find(|q| q.order == response.order) {
                None => errors.add(
                    format!("responses[{}]", response.order),
                    "There is no question with this order.",
                ),
                Some(q) if word_count(&response.response) > q.word_limit as usize => errors.add(
                    format!("responses[{}]", response.order),
                    format!("Responses are limited to {} words.", q.word_limit),
                ),
                Some(_) => {}
            }
        }
        errors
    }

    /// Everything a submitted proposal must contain
    pub fn completeness_errors(&self, opportunity: &Opportunity) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if let ProposalDetails::CodeWithUs { proposal_text, .. } = self {
            if proposal_text.trim().is_empty() {
                errors.add("proposalText", "Please enter a proposal.");
            }
        }
        for q in opportunity.questions() {
            let answered = self
                .responses()
                .iter()
                .any(|r| r.order == q.order && !r.response.trim().is_empty());
            if !answered {
                errors.add(format!("responses[{}]", q.order), "Please answer this question.");
            }
        }
        errors
    }
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResponse {
    pub order: u32,
    pub response: String,
}

/// Evaluation results, each a percentage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalScores {
    /// Code With Us single score
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub questions_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub challenge_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_score: Option<f64>,
}

impl ProposalScores {
    /// Weighted total, once every weighted component is known
    pub fn total(&self, details: &OpportunityDetails) -> Option<f64> {
        match details {
            OpportunityDetails::CodeWithUs { .. } => self.score,
            OpportunityDetails::SprintWithUs {
                questions_weight,
                code_challenge_weight,
                scenario_weight,
                price_weight,
                ..
            } => Some(
                (self.questions_score? * f64::from(*questions_weight)
                    + self.challenge_score? * f64::from(*code_challenge_weight)
                    + self.scenario_score? * f64::from(*scenario_weight)
                    + self.price_score? * f64::from(*price_weight))
                    / 100.0,
            ),
            OpportunityDetails::TeamWithUs {
                questions_weight,
                challenge_weight,
                price_weight,
                ..
            } => Some(
                (self.questions_score? * f64::from(*questions_weight)
                    + self.challenge_score? * f64::from(*challenge_weight)
                    + self.price_score? * f64::from(*price_weight))
                    / 100.0,
            ),
        }
    }
}

/// Rejects scores outside `0..=100`
pub fn check_score(field: &str, value: f64) -> FieldErrors {
    if value.is_finite() && (0.0..=MAX_SCORE).contains(&value) {
        FieldErrors::new()
    } else {
        FieldErrors::single(field, "Score must be between 0 and 100.")
    }
}

/// Lowest rate earns full marks; others scale down proportionally
pub fn price_scores(rates: &[(Uuid, i64)]) -> Vec<(Uuid, f64)> {
    let lowest = rates.iter().map(|(_, r)| *r).filter(|r| *r > 0).min();
    rates
        .iter()
        .map(|(id, rate)| match lowest {
            Some(low) if *rate > 0 => (*id, low as f64 / *rate as f64 * MAX_SCORE),
            _ => (*id, 0.0),
        })
        .collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProposal {
    pub opportunity_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub details: ProposalDetails,
    /// DRAFT (default) or SUBMITTED
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalEdit {
    pub organization_id: Option<Uuid>,
    pub details: ProposalDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioScores {
    pub scenario: f64,
    pub price: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreWithNote {
    pub score: f64,
    #[serde(default)]
    pub note: String,
}

/// `PUT /proposals/{program}/{id}` actions
#[derive(Debug, Deserialize)]
#[serde(tag = "tag", content = "value", rename_all = "camelCase")]
pub enum ProposalAction {
    Edit(ProposalEdit),
    Submit(String),
    Withdraw(String),
    Score(ScoreWithNote),
    ScoreQuestions(f64),
    ScoreCodeChallenge(f64),
    ScoreTeamScenario(ScenarioScores),
    ScreenInToChallenge(String),
    ScreenOutFromChallenge(String),
    ScoreChallenge(f64),
    Award(String),
    Disqualify(String),
}

impl ProposalAction {
    pub fn name(&self) -> &'static str {
        match self {
            ProposalAction::Edit(_) => "edit",
            ProposalAction::Submit(_) => "submit",
            ProposalAction::Withdraw(_) => "withdraw",
            ProposalAction::Score(_) => "score",
            ProposalAction::ScoreQuestions(_) => "scoreQuestions",
            ProposalAction::ScoreCodeChallenge(_) => "scoreCodeChallenge",
            ProposalAction::ScoreTeamScenario(_) => "scoreTeamScenario",
            ProposalAction::ScreenInToChallenge(_) => "screenInToChallenge",
            ProposalAction::ScreenOutFromChallenge(_) => "screenOutFromChallenge",
            ProposalAction::ScoreChallenge(_) => "scoreChallenge",
            ProposalAction::Award(_) => "award",
            ProposalAction::Disqualify(_) => "disqualify",
        }
    }

    pub fn available_for(&self, program: Program) -> bool {
        match self {
            ProposalAction::Score(_) => program == Program::CodeWithUs,
            ProposalAction::ScoreQuestions(_)
            | ProposalAction::ScoreCodeChallenge(_)
            | ProposalAction::ScoreTeamScenario(_) => program == Program::SprintWithUs,
            ProposalAction::ScreenInToChallenge(_)
            | ProposalAction::ScreenOutFromChallenge(_)
            | ProposalAction::ScoreChallenge(_) => program == Program::TeamWithUs,
            _ => true,
        }
    }

    /// Actions a vendor performs on their own proposal
    pub fn is_vendor_action(&self) -> bool {
        matches!(
            self,
            ProposalAction::Edit(_) | ProposalAction::Submit(_) | ProposalAction::Withdraw(_)
        )
    }
}
