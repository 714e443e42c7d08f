//! Sprint With Us: agile team opportunities evaluated in three phases
//! (team questions, code challenge, team scenario).

use crate::auth::UserType;

pub use super::code_with_us::CwuProposalStatus as SwuProposalStatus;

status_tags! {
    /// Lifecycle stages of a Sprint With Us opportunity
    SwuOpportunityStatus {
        Draft => "DRAFT",
        UnderReview => "UNDER_REVIEW",
        Published => "PUBLISHED",
        EvaluationTeamQuestions => "EVAL_QUESTIONS",
        EvaluationCodeChallenge => "EVAL_CC",
        EvaluationTeamScenario => "EVAL_SCENARIO",
        Awarded => "AWARDED",
        Suspended => "SUSPENDED",
        Canceled => "CANCELED",
    }
}

pub fn is_valid_status_change(from: SwuOpportunityStatus, to: SwuOpportunityStatus) -> bool {
    use SwuOpportunityStatus::*;
    match from {
        Draft => matches!(to, UnderReview | Published),
        UnderReview => matches!(to, Published | Suspended),
        Published => matches!(to, Canceled | Suspended | EvaluationTeamQuestions),
        EvaluationTeamQuestions => matches!(to, Canceled | Suspended | EvaluationCodeChallenge),
        EvaluationCodeChallenge => matches!(to, Canceled | Suspended | EvaluationTeamScenario),
        EvaluationTeamScenario => matches!(to, Canceled | Suspended | Awarded),
        Suspended => matches!(to, Published | Canceled),
        Awarded | Canceled => false,
    }
}

impl SwuOpportunityStatus {
    pub fn is_public(self) -> bool {
        matches!(
            self,
            Self::Published
                | Self::EvaluationTeamQuestions
                | Self::EvaluationCodeChallenge
                | Self::EvaluationTeamScenario
                | Self::Awarded
        )
    }

    pub fn allows_addenda(self) -> bool {
        self.is_public() || self == Self::Suspended
    }

    pub fn allows_gov_to_view_proposals(self) -> bool {
        !matches!(self, Self::Draft | Self::UnderReview | Self::Published)
    }
}

/// Sprint With Us proposals follow the Code With Us table.
pub fn is_valid_proposal_status_change(
    from: SwuProposalStatus,
    to: SwuProposalStatus,
    actor: UserType,
    before_deadline: bool,
) -> bool {
    super::code_with_us::is_valid_proposal_status_change(from, to, actor, before_deadline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn in_evaluation(status: SwuOpportunityStatus) -> bool {
        matches!(
            status,
            SwuOpportunityStatus::EvaluationTeamQuestions
                | SwuOpportunityStatus::EvaluationCodeChallenge
                | SwuOpportunityStatus::EvaluationTeamScenario
        )
    }

    proptest! {
        #[test]
        fn evaluation_phases_only_advance_in_order(
            from in proptest::sample::select(SwuOpportunityStatus::ALL),
            to in proptest::sample::select(SwuOpportunityStatus::ALL),
        ) {
            use SwuOpportunityStatus::*;
            if in_evaluation(from) && in_evaluation(to) && is_valid_status_change(from, to) {
                prop_assert!(matches!(
                    (from, to),
                    (EvaluationTeamQuestions, EvaluationCodeChallenge)
                        | (EvaluationCodeChallenge, EvaluationTeamScenario)
                ));
            }
        }

        #[test]
        fn drafts_never_jump_into_evaluation(to in proptest::sample::select(SwuOpportunityStatus::ALL)) {
            if is_valid_status_change(SwuOpportunityStatus::Draft, to) {
                prop_assert!(!in_evaluation(to));
            }
        }
    }

    #[test]
    fn test_under_review_can_be_suspended() {
        assert!(is_valid_status_change(
            SwuOpportunityStatus::UnderReview,
            SwuOpportunityStatus::Suspended
        ));
        assert!(!is_valid_status_change(
            SwuOpportunityStatus::UnderReview,
            SwuOpportunityStatus::Canceled
        ));
    }

    #[test]
    fn test_suspension_returns_to_published_only() {
        use SwuOpportunityStatus::*;
        let exits: Vec<_> = SwuOpportunityStatus::ALL
            .iter()
            .copied()
            .filter(|to| is_valid_status_change(Suspended, *to))
            .collect();
        assert_eq!(exits, vec![Published, Canceled]);
    }
}
