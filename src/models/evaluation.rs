//! Team With Us panel evaluations of resource question responses

use super::Question;
use crate::error::FieldErrors;
use crate::lifecycle::EvaluationStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvaluationKind {
    /// One per panel evaluator
    Individual,
    /// One per proposal, entered by the chair
    Consensus,
}

impl EvaluationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluationKind::Individual => "INDIVIDUAL",
            EvaluationKind::Consensus => "CONSENSUS",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "INDIVIDUAL" => Some(EvaluationKind::Individual),
            "CONSENSUS" => Some(EvaluationKind::Consensus),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionScore {
    pub order: u32,
    pub score: f64,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub id: Uuid,
    pub proposal_id: Uuid,
    pub opportunity_id: Uuid,
    pub evaluator_id: Uuid,
    pub kind: EvaluationKind,
    pub status: EvaluationStatus,
    pub scores: Vec<QuestionScore>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Evaluation {
    pub fn is_submitted(&self) -> bool {
        self.status == EvaluationStatus::Submitted
    }

    /// Percentage of the available question score
    pub fn percentage(&self, questions: &[Question]) -> f64 {
        let available: u32 = questions.iter().map(|q| q.score).sum();
        if available == 0 {
            return 0.0;
        }
        let earned: f64 = self.scores.iter().map(|s| s.score).sum();
        earned / f64::from(available) * 100.0
    }

    /// Whether any question fell below its minimum
    pub fn below_minimum(&self, questions: &[Question]) -> bool {
        questions.iter().any(|q| {
            q.minimum_score.is_some_and(|min| {
                self.scores
                    .iter()
                    .find(|s| s.order == q.order)
                    .map_or(true, |s| s.score < f64::from(min))
            })
        })
    }
}

/// Each score must belong to a question and stay within its maximum
pub fn validate_scores(scores: &[QuestionScore], questions: &[Question]) -> FieldErrors {
    let mut errors = FieldErrors::new();
    for s in scores {
        let field = format!("scores[{}]", s.order);
        match questions.iter().find(|q| q.order == s.order) {
            None => errors.add(field, "There is no question with this order."),
            Some(q) if !(0.0..=f64::from(q.score)).contains(&s.score) => {
                errors.add(field, format!("Score must be between 0 and {}.", q.score))
            }
            Some(_) => {}
        }
        if scores.iter().filter(|o| o.order == s.order).count() > 1 {
            errors.add(format!("scores[{}]", s.order), "Each question may be scored once.");
        }
    }
    errors
}

/// Submitted evaluations must score every question
pub fn completeness_errors(scores: &[QuestionScore], questions: &[Question]) -> FieldErrors {
    let mut errors = FieldErrors::new();
    for q in questions {
        if !scores.iter().any(|s| s.order == q.order) {
            errors.add(format!("scores[{}]", q.order), "Please score this question.");
        }
    }
    errors
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEvaluation {
    pub proposal_id: Uuid,
    pub kind: EvaluationKind,
    pub scores: Vec<QuestionScore>,
}

/// `PUT /evaluations/team-with-us/{id}` actions
#[derive(Debug, Deserialize)]
#[serde(tag = "tag", content = "value", rename_all = "camelCase")]
pub enum EvaluationAction {
    Edit(Vec<QuestionScore>),
    Submit,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::opportunity::fixtures::question;

    fn scores(values: &[(u32, f64)]) -> Vec<QuestionScore> {
        values
            .iter()
            .map(|(order, score)| QuestionScore { order: *order, score: *score, notes: String::new() })
            .collect()
    }

    #[test]
    fn test_scores_bounded_by_question() {
        let questions = vec![question(1, 10, None), question(2, 5, None)];
        assert!(validate_scores(&scores(&[(1, 10.0), (2, 0.0)]), &questions).is_empty());
        let errors = validate_scores(&scores(&[(2, 6.0), (3, 1.0)]), &questions);
        assert!(errors.get("scores[2]").is_some());
        assert!(errors.get("scores[3]").is_some());
    }

    #[test]
    fn test_duplicate_orders_rejected() {
        let questions = vec![question(1, 10, None)];
        assert!(!validate_scores(&scores(&[(1, 1.0), (1, 2.0)]), &questions).is_empty());
    }

    #[test]
    fn test_percentage_and_minimums() {
        let questions = vec![question(1, 10, Some(5)), question(2, 10, None)];
        let now = Utc::now();
        let evaluation = Evaluation {
            id: Uuid::new_v4(),
            proposal_id: Uuid::new_v4(),
            opportunity_id: Uuid::new_v4(),
            evaluator_id: Uuid::new_v4(),
            kind: EvaluationKind::Consensus,
            status: EvaluationStatus::Draft,
            scores: scores(&[(1, 4.0), (2, 10.0)]),
            created_at: now,
            updated_at: now,
        };
        assert_eq!(evaluation.percentage(&questions), 70.0);
        assert!(evaluation.below_minimum(&questions));
        assert!(completeness_errors(&evaluation.scores, &questions).is_empty());
        assert!(!completeness_errors(&[], &questions).is_empty());
    }
}
