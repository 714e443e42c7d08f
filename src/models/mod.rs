//! Data models and DTOs (Data Transfer Objects)
//!
//! Records as stored, plus the request bodies that create and update them.

pub mod counter;
pub mod evaluation;
pub mod history;
pub mod opportunity;
pub mod organization;
pub mod proposal;
pub mod subscriber;
pub mod user;

pub use counter::Counter;
pub use evaluation::{Evaluation, EvaluationKind};
pub use history::{HistoryEvent, HistoryKind, HistoryRecord};
pub use opportunity::{Addendum, Opportunity, OpportunityDetails, Question};
pub use organization::{Affiliation, MembershipStatus, MembershipType, Organization};
pub use proposal::{Proposal, ProposalDetails, ProposalScores};
pub use subscriber::Subscriber;
pub use user::{User, UserStatus};

use serde::Serialize;

/// Generic success response
#[derive(Debug, Serialize)]
pub struct SuccessResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn with_data(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

impl SuccessResponse<()> {
    pub fn message_only(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }
}

/// Trim and drop empty optional text
pub(crate) fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
