//! Team With Us: resource-based opportunities scored by an evaluation
//! panel (individual then consensus) before a challenge round.

use crate::auth::UserType;

status_tags! {
    /// Lifecycle stages of a Team With Us opportunity
    TwuOpportunityStatus {
        Draft => "DRAFT",
        UnderReview => "UNDER_REVIEW",
        Published => "PUBLISHED",
        EvaluationResourceQuestionsIndividual => "EVAL_QUESTIONS_INDIVIDUAL",
        EvaluationResourceQuestionsConsensus => "EVAL_QUESTIONS_CONSENSUS",
        EvaluationChallenge => "EVAL_C",
        Processing => "PROCESSING",
        Awarded => "AWARDED",
        // Retired stage; kept so older records still parse.
        Suspended => "SUSPENDED",
        Canceled => "CANCELED",
    }
}

status_tags! {
    /// Lifecycle stages of a Team With Us proposal
    TwuProposalStatus {
        Draft => "DRAFT",
        Submitted => "SUBMITTED",
        UnderReviewResourceQuestions => "UNDER_REVIEW_QUESTIONS",
        EvaluatedResourceQuestions => "EVALUATED_QUESTIONS",
        UnderReviewChallenge => "UNDER_REVIEW_CHALLENGE",
        EvaluatedChallenge => "EVALUATED_CHALLENGE",
        Awarded => "AWARDED",
        NotAwarded => "NOT_AWARDED",
        Disqualified => "DISQUALIFIED",
        Withdrawn => "WITHDRAWN",
    }
}

pub fn is_valid_status_change(from: TwuOpportunityStatus, to: TwuOpportunityStatus) -> bool {
    use TwuOpportunityStatus::*;
    match from {
        Draft => matches!(to, UnderReview | Published),
        UnderReview => to == Published,
        Published => matches!(to, Canceled | EvaluationResourceQuestionsIndividual),
        EvaluationResourceQuestionsIndividual => {
            matches!(to, Canceled | EvaluationResourceQuestionsConsensus)
        }
        EvaluationResourceQuestionsConsensus => matches!(to, Canceled | EvaluationChallenge),
        EvaluationChallenge => matches!(to, Canceled | Processing),
        Processing => matches!(to, Canceled | Awarded),
        Awarded | Suspended | Canceled => false,
    }
}

impl TwuOpportunityStatus {
    pub fn is_public(self) -> bool {
        matches!(
            self,
            Self::Published
                | Self::EvaluationResourceQuestionsIndividual
                | Self::EvaluationResourceQuestionsConsensus
                | Self::EvaluationChallenge
                | Self::Processing
                | Self::Awarded
                | Self::Canceled
        )
    }

    pub fn allows_addenda(self) -> bool {
        self.is_public()
    }

    pub fn allows_gov_to_view_proposals(self) -> bool {
        !matches!(self, Self::Draft | Self::UnderReview | Self::Published)
    }

    /// The panel is frozen once consensus starts
    pub fn can_change_evaluation_panel(self) -> bool {
        matches!(
            self,
            Self::Draft | Self::UnderReview | Self::Published | Self::EvaluationResourceQuestionsIndividual
        )
    }

    pub fn details_editable(self, by_admin: bool) -> bool {
        match self {
            Self::Draft | Self::UnderReview => true,
            Self::Published => by_admin,
            _ => false,
        }
    }
}

pub fn is_valid_proposal_status_change(
    from: TwuProposalStatus,
    to: TwuProposalStatus,
    actor: UserType,
    before_deadline: bool,
) -> bool {
    use TwuProposalStatus::*;
    let vendor = actor == UserType::Vendor;
    match (from, to) {
        (Draft | Withdrawn, Submitted) => vendor && before_deadline,
        (Submitted, Withdrawn) => vendor,
        (Submitted, UnderReviewResourceQuestions) => !vendor,
        (UnderReviewResourceQuestions, EvaluatedResourceQuestions | Disqualified) => !vendor,
        (EvaluatedResourceQuestions, UnderReviewChallenge | NotAwarded | Disqualified) => !vendor,
        (UnderReviewChallenge, EvaluatedResourceQuestions | EvaluatedChallenge | Disqualified) => {
            !vendor
        }
        (EvaluatedChallenge, Awarded | NotAwarded | Disqualified) => !vendor,
        (Awarded, NotAwarded | Disqualified) => !vendor,
        (NotAwarded, Awarded | Disqualified) => !vendor,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Who may take a listed proposal move
    #[derive(Debug, Clone, Copy)]
    enum Mover {
        VendorBeforeDeadline,
        Vendor,
        Buyer,
    }

    const PROPOSAL_ALLOWED: &[(TwuProposalStatus, TwuProposalStatus, Mover)] = {
        use Mover::*;
        use TwuProposalStatus::*;
        &[
            (Draft, Submitted, VendorBeforeDeadline),
            (Withdrawn, Submitted, VendorBeforeDeadline),
            (Submitted, Withdrawn, Vendor),
            (Submitted, UnderReviewResourceQuestions, Buyer),
            (UnderReviewResourceQuestions, EvaluatedResourceQuestions, Buyer),
            (UnderReviewResourceQuestions, Disqualified, Buyer),
            (EvaluatedResourceQuestions, UnderReviewChallenge, Buyer),
            (EvaluatedResourceQuestions, NotAwarded, Buyer),
            (EvaluatedResourceQuestions, Disqualified, Buyer),
            (UnderReviewChallenge, EvaluatedResourceQuestions, Buyer),
            (UnderReviewChallenge, EvaluatedChallenge, Buyer),
            (UnderReviewChallenge, Disqualified, Buyer),
            (EvaluatedChallenge, Awarded, Buyer),
            (EvaluatedChallenge, NotAwarded, Buyer),
            (EvaluatedChallenge, Disqualified, Buyer),
            (Awarded, NotAwarded, Buyer),
            (Awarded, Disqualified, Buyer),
            (NotAwarded, Awarded, Buyer),
            (NotAwarded, Disqualified, Buyer),
        ]
    };

    fn may_move(mover: Mover, actor: UserType, before_deadline: bool) -> bool {
        match mover {
            Mover::VendorBeforeDeadline => actor == UserType::Vendor && before_deadline,
            Mover::Vendor => actor == UserType::Vendor,
            Mover::Buyer => actor != UserType::Vendor,
        }
    }

    proptest! {
        #[test]
        fn proposal_moves_outside_allow_list_are_denied(
            from in proptest::sample::select(TwuProposalStatus::ALL),
            to in proptest::sample::select(TwuProposalStatus::ALL),
            actor in prop_oneof![
                Just(UserType::Vendor),
                Just(UserType::Government),
                Just(UserType::Admin),
            ],
            before_deadline in any::<bool>(),
        ) {
            let listed = PROPOSAL_ALLOWED
                .iter()
                .any(|(f, t, mover)| (*f, *t) == (from, to) && may_move(*mover, actor, before_deadline));
            prop_assert_eq!(is_valid_proposal_status_change(from, to, actor, before_deadline), listed);
        }

        #[test]
        fn retired_suspension_is_unreachable(from in proptest::sample::select(TwuOpportunityStatus::ALL)) {
            prop_assert!(!is_valid_status_change(from, TwuOpportunityStatus::Suspended));
            prop_assert!(!is_valid_status_change(TwuOpportunityStatus::Suspended, from));
        }

        #[test]
        fn vendors_only_submit_or_withdraw(
            from in proptest::sample::select(TwuProposalStatus::ALL),
            to in proptest::sample::select(TwuProposalStatus::ALL),
            before_deadline in any::<bool>(),
        ) {
            if is_valid_proposal_status_change(from, to, UserType::Vendor, before_deadline) {
                prop_assert!(matches!(to, TwuProposalStatus::Submitted | TwuProposalStatus::Withdrawn));
            }
        }
    }

    #[test]
    fn test_consensus_follows_individual_evaluation() {
        use TwuOpportunityStatus::*;
        assert!(is_valid_status_change(
            EvaluationResourceQuestionsIndividual,
            EvaluationResourceQuestionsConsensus
        ));
        assert!(!is_valid_status_change(
            EvaluationResourceQuestionsIndividual,
            EvaluationChallenge
        ));
        assert!(!is_valid_status_change(Published, EvaluationResourceQuestionsConsensus));
    }

    #[test]
    fn test_screening_out_of_challenge() {
        use TwuProposalStatus::*;
        assert!(is_valid_proposal_status_change(
            UnderReviewChallenge,
            EvaluatedResourceQuestions,
            UserType::Government,
            false
        ));
        assert!(!is_valid_proposal_status_change(
            EvaluatedChallenge,
            EvaluatedResourceQuestions,
            UserType::Government,
            false
        ));
    }

    #[test]
    fn test_panel_freezes_at_consensus() {
        assert!(TwuOpportunityStatus::EvaluationResourceQuestionsIndividual.can_change_evaluation_panel());
        assert!(!TwuOpportunityStatus::EvaluationResourceQuestionsConsensus.can_change_evaluation_panel());
    }

    #[test]
    fn test_published_details_admin_only() {
        assert!(TwuOpportunityStatus::Published.details_editable(true));
        assert!(!TwuOpportunityStatus::Published.details_editable(false));
        assert!(TwuOpportunityStatus::Draft.details_editable(false));
        assert!(!TwuOpportunityStatus::Processing.details_editable(true));
    }
}
