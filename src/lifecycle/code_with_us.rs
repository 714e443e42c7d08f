//! Code With Us: fixed-price, single-developer opportunities.

use crate::auth::UserType;

status_tags! {
    /// Lifecycle stages of a Code With Us opportunity
    CwuOpportunityStatus {
        Draft => "DRAFT",
        UnderReview => "UNDER_REVIEW",
        Published => "PUBLISHED",
        Evaluation => "EVALUATION",
        Awarded => "AWARDED",
        Suspended => "SUSPENDED",
        Canceled => "CANCELED",
    }
}

status_tags! {
    /// Lifecycle stages of a Code With Us (and Sprint With Us) proposal
    CwuProposalStatus {
        Draft => "DRAFT",
        Submitted => "SUBMITTED",
        UnderReview => "UNDER_REVIEW",
        Evaluated => "EVALUATED",
        Awarded => "AWARDED",
        NotAwarded => "NOT_AWARDED",
        Disqualified => "DISQUALIFIED",
        Withdrawn => "WITHDRAWN",
    }
}

pub fn is_valid_status_change(from: CwuOpportunityStatus, to: CwuOpportunityStatus) -> bool {
    use CwuOpportunityStatus::*;
    match from {
        Draft => matches!(to, UnderReview | Published),
        UnderReview => to == Published,
        Published => matches!(to, Canceled | Suspended | Evaluation),
        Evaluation => matches!(to, Canceled | Suspended | Awarded),
        Suspended => matches!(to, Published | Canceled),
        Awarded | Canceled => false,
    }
}

impl CwuOpportunityStatus {
    pub fn is_public(self) -> bool {
        matches!(self, Self::Published | Self::Evaluation | Self::Awarded)
    }

    pub fn allows_addenda(self) -> bool {
        matches!(
            self,
            Self::Published | Self::Evaluation | Self::Awarded | Self::Suspended
        )
    }

    pub fn allows_gov_to_view_proposals(self) -> bool {
        !matches!(self, Self::Draft | Self::UnderReview | Self::Published)
    }
}

/// Vendors move their own proposals in and out of submission while the
/// opportunity accepts them; everything after that belongs to the buyer.
pub fn is_valid_proposal_status_change(
    from: CwuProposalStatus,
    to: CwuProposalStatus,
    actor: UserType,
    before_deadline: bool,
) -> bool {
    use CwuProposalStatus::*;
    let vendor = actor == UserType::Vendor;
    match (from, to) {
        (Draft | Withdrawn, Submitted) => vendor && before_deadline,
        (Submitted, Withdrawn) => vendor,
        (Submitted, UnderReview) => !vendor,
        (UnderReview, Evaluated | Disqualified | NotAwarded) => !vendor,
        (Evaluated, Evaluated | Awarded | NotAwarded | Disqualified) => !vendor,
        (Awarded, NotAwarded | Disqualified) => !vendor,
        (NotAwarded, Awarded | Disqualified) => !vendor,
        _ => false,
    }
}
