//! Append-only history shared by opportunities and proposals

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Non-status entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoryEvent {
    Edited,
    AddendumAdded,
    NoteAdded,
    EvaluationPanelChanged,
    QuestionsScoreEntered,
    ChallengeScoreEntered,
    ScenarioScoreEntered,
    PriceScoreEntered,
}

impl HistoryEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryEvent::Edited => "EDITED",
            HistoryEvent::AddendumAdded => "ADDENDUM_ADDED",
            HistoryEvent::NoteAdded => "NOTE_ADDED",
            HistoryEvent::EvaluationPanelChanged => "EVALUATION_PANEL_CHANGED",
            HistoryEvent::QuestionsScoreEntered => "QUESTIONS_SCORE_ENTERED",
            HistoryEvent::ChallengeScoreEntered => "CHALLENGE_SCORE_ENTERED",
            HistoryEvent::ScenarioScoreEntered => "SCENARIO_SCORE_ENTERED",
            HistoryEvent::PriceScoreEntered => "PRICE_SCORE_ENTERED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        [
            HistoryEvent::Edited,
            HistoryEvent::AddendumAdded,
            HistoryEvent::NoteAdded,
            HistoryEvent::EvaluationPanelChanged,
            HistoryEvent::QuestionsScoreEntered,
            HistoryEvent::ChallengeScoreEntered,
            HistoryEvent::ScenarioScoreEntered,
            HistoryEvent::PriceScoreEntered,
        ]
        .into_iter()
        .find(|e| e.as_str() == raw)
    }
}

/// What a history entry records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tag", content = "value", rename_all = "camelCase")]
pub enum HistoryKind {
    /// Status tag the record moved into
    Status(String),
    Event(HistoryEvent),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    /// `None` for changes made by the background closer
    pub created_by: Option<Uuid>,
    #[serde(rename = "type")]
    pub kind: HistoryKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl HistoryRecord {
    pub fn status(
        status: impl std::fmt::Display,
        created_by: Option<Uuid>,
        note: Option<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: at,
            created_by,
            kind: HistoryKind::Status(status.to_string()),
            note,
        }
    }

    pub fn event(event: HistoryEvent, created_by: Uuid, note: Option<String>, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: at,
            created_by: Some(created_by),
            kind: HistoryKind::Event(event),
            note,
        }
    }

    /// Storage columns: (status tag, event tag)
    pub fn columns(&self) -> (Option<&str>, Option<&'static str>) {
        match &self.kind {
            HistoryKind::Status(s) => (Some(s.as_str()), None),
            HistoryKind::Event(e) => (None, Some(e.as_str())),
        }
    }
}
