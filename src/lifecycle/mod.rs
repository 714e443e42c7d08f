//! Opportunity, proposal and evaluation lifecycles
//!
//! Each program has its own closed set of status tags and an allow-list of
//! transitions. The per-program enums are wrapped by [`OpportunityStatus`]
//! and [`ProposalStatus`] so records of every program share one shape.

use crate::auth::UserType;
use serde::{Deserialize, Serialize, Serializer};

/// Declares a closed set of string tags with `as_str`/`parse`/`ALL`
macro_rules! status_tags {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $tag:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $tag)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $tag,)+
                }
            }

            pub fn parse(raw: &str) -> Option<Self> {
                match raw {
                    $($tag => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub mod code_with_us;
pub mod evaluation;
pub mod sprint_with_us;
pub mod team_with_us;

pub use code_with_us::{CwuOpportunityStatus, CwuProposalStatus};
pub use evaluation::{is_valid_consensus_status_change, is_valid_evaluation_status_change, EvaluationStatus};
pub use sprint_with_us::{SwuOpportunityStatus, SwuProposalStatus};
pub use team_with_us::{TwuOpportunityStatus, TwuProposalStatus};

/// The three opportunity programs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Program {
    CodeWithUs,
    SprintWithUs,
    TeamWithUs,
}

impl Program {
    pub const ALL: [Program; 3] = [Program::CodeWithUs, Program::SprintWithUs, Program::TeamWithUs];

    /// Path segment and storage tag
    pub fn slug(self) -> &'static str {
        match self {
            Program::CodeWithUs => "code-with-us",
            Program::SprintWithUs => "sprint-with-us",
            Program::TeamWithUs => "team-with-us",
        }
    }

    pub fn from_slug(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.slug() == raw)
    }
}

impl std::fmt::Display for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}

// ============================================
// Opportunity status
// ============================================

/// Status of an opportunity of any program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpportunityStatus {
    CodeWithUs(CwuOpportunityStatus),
    SprintWithUs(SwuOpportunityStatus),
    TeamWithUs(TwuOpportunityStatus),
}

impl OpportunityStatus {
    pub fn program(self) -> Program {
        match self {
            OpportunityStatus::CodeWithUs(_) => Program::CodeWithUs,
            OpportunityStatus::SprintWithUs(_) => Program::SprintWithUs,
            OpportunityStatus::TeamWithUs(_) => Program::TeamWithUs,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OpportunityStatus::CodeWithUs(s) => s.as_str(),
            OpportunityStatus::SprintWithUs(s) => s.as_str(),
            OpportunityStatus::TeamWithUs(s) => s.as_str(),
        }
    }

    pub fn parse(program: Program, raw: &str) -> Option<Self> {
        match program {
            Program::CodeWithUs => CwuOpportunityStatus::parse(raw).map(Self::CodeWithUs),
            Program::SprintWithUs => SwuOpportunityStatus::parse(raw).map(Self::SprintWithUs),
            Program::TeamWithUs => TwuOpportunityStatus::parse(raw).map(Self::TeamWithUs),
        }
    }

    /// Allow-list check; statuses of different programs never connect.
    pub fn can_transition_to(self, to: OpportunityStatus) -> bool {
        match (self, to) {
            (Self::CodeWithUs(a), Self::CodeWithUs(b)) => code_with_us::is_valid_status_change(a, b),
            (Self::SprintWithUs(a), Self::SprintWithUs(b)) => {
                sprint_with_us::is_valid_status_change(a, b)
            }
            (Self::TeamWithUs(a), Self::TeamWithUs(b)) => team_with_us::is_valid_status_change(a, b),
            _ => false,
        }
    }

    pub fn draft(program: Program) -> Self {
        match program {
            Program::CodeWithUs => Self::CodeWithUs(CwuOpportunityStatus::Draft),
            Program::SprintWithUs => Self::SprintWithUs(SwuOpportunityStatus::Draft),
            Program::TeamWithUs => Self::TeamWithUs(TwuOpportunityStatus::Draft),
        }
    }

    pub fn under_review(program: Program) -> Self {
        match program {
            Program::CodeWithUs => Self::CodeWithUs(CwuOpportunityStatus::UnderReview),
            Program::SprintWithUs => Self::SprintWithUs(SwuOpportunityStatus::UnderReview),
            Program::TeamWithUs => Self::TeamWithUs(TwuOpportunityStatus::UnderReview),
        }
    }

    pub fn published(program: Program) -> Self {
        match program {
            Program::CodeWithUs => Self::CodeWithUs(CwuOpportunityStatus::Published),
            Program::SprintWithUs => Self::SprintWithUs(SwuOpportunityStatus::Published),
            Program::TeamWithUs => Self::TeamWithUs(TwuOpportunityStatus::Published),
        }
    }

    /// `None` for Team With Us, whose suspended stage is retired
    pub fn suspended(program: Program) -> Option<Self> {
        match program {
            Program::CodeWithUs => Some(Self::CodeWithUs(CwuOpportunityStatus::Suspended)),
            Program::SprintWithUs => Some(Self::SprintWithUs(SwuOpportunityStatus::Suspended)),
            Program::TeamWithUs => None,
        }
    }

    pub fn canceled(program: Program) -> Self {
        match program {
            Program::CodeWithUs => Self::CodeWithUs(CwuOpportunityStatus::Canceled),
            Program::SprintWithUs => Self::SprintWithUs(SwuOpportunityStatus::Canceled),
            Program::TeamWithUs => Self::TeamWithUs(TwuOpportunityStatus::Canceled),
        }
    }

    pub fn awarded(program: Program) -> Self {
        match program {
            Program::CodeWithUs => Self::CodeWithUs(CwuOpportunityStatus::Awarded),
            Program::SprintWithUs => Self::SprintWithUs(SwuOpportunityStatus::Awarded),
            Program::TeamWithUs => Self::TeamWithUs(TwuOpportunityStatus::Awarded),
        }
    }

    /// Stage entered when the proposal deadline passes
    pub fn first_evaluation_stage(program: Program) -> Self {
        match program {
            Program::CodeWithUs => Self::CodeWithUs(CwuOpportunityStatus::Evaluation),
            Program::SprintWithUs => {
                Self::SprintWithUs(SwuOpportunityStatus::EvaluationTeamQuestions)
            }
            Program::TeamWithUs => {
                Self::TeamWithUs(TwuOpportunityStatus::EvaluationResourceQuestionsIndividual)
            }
        }
    }

    /// Stage from which a proposal may be awarded
    pub fn is_final_evaluation_stage(self) -> bool {
        matches!(
            self,
            Self::CodeWithUs(CwuOpportunityStatus::Evaluation)
                | Self::SprintWithUs(SwuOpportunityStatus::EvaluationTeamScenario)
                | Self::TeamWithUs(TwuOpportunityStatus::Processing)
        )
    }

    pub fn is_draft(self) -> bool {
        self == Self::draft(self.program())
    }

    pub fn is_published(self) -> bool {
        self == Self::published(self.program())
    }

    /// Visible to anonymous visitors and vendors
    pub fn is_public(self) -> bool {
        match self {
            Self::CodeWithUs(s) => s.is_public(),
            Self::SprintWithUs(s) => s.is_public(),
            Self::TeamWithUs(s) => s.is_public(),
        }
    }

    pub fn allows_addenda(self) -> bool {
        match self {
            Self::CodeWithUs(s) => s.allows_addenda(),
            Self::SprintWithUs(s) => s.allows_addenda(),
            Self::TeamWithUs(s) => s.allows_addenda(),
        }
    }

    /// Government users only see proposals once the opportunity has closed
    pub fn allows_gov_to_view_proposals(self) -> bool {
        match self {
            Self::CodeWithUs(s) => s.allows_gov_to_view_proposals(),
            Self::SprintWithUs(s) => s.allows_gov_to_view_proposals(),
            Self::TeamWithUs(s) => s.allows_gov_to_view_proposals(),
        }
    }

    /// Whether the descriptive fields may still change
    pub fn details_editable(self, by_admin: bool) -> bool {
        match self {
            Self::CodeWithUs(s) => matches!(
                s,
                CwuOpportunityStatus::Draft
                    | CwuOpportunityStatus::UnderReview
                    | CwuOpportunityStatus::Published
                    | CwuOpportunityStatus::Suspended
            ),
            Self::SprintWithUs(s) => match s {
                SwuOpportunityStatus::Draft | SwuOpportunityStatus::UnderReview => true,
                SwuOpportunityStatus::Published | SwuOpportunityStatus::Suspended => by_admin,
                _ => false,
            },
            Self::TeamWithUs(s) => s.details_editable(by_admin),
        }
    }
}

impl std::fmt::Display for OpportunityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for OpportunityStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ============================================
// Proposal status
// ============================================

/// Status of a proposal of any program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProposalStatus {
    CodeWithUs(CwuProposalStatus),
    SprintWithUs(SwuProposalStatus),
    TeamWithUs(TwuProposalStatus),
}

impl ProposalStatus {
    pub fn program(self) -> Program {
        match self {
            ProposalStatus::CodeWithUs(_) => Program::CodeWithUs,
            ProposalStatus::SprintWithUs(_) => Program::SprintWithUs,
            ProposalStatus::TeamWithUs(_) => Program::TeamWithUs,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProposalStatus::CodeWithUs(s) => s.as_str(),
            ProposalStatus::SprintWithUs(s) => s.as_str(),
            ProposalStatus::TeamWithUs(s) => s.as_str(),
        }
    }

    pub fn parse(program: Program, raw: &str) -> Option<Self> {
        match program {
            Program::CodeWithUs => CwuProposalStatus::parse(raw).map(Self::CodeWithUs),
            Program::SprintWithUs => SwuProposalStatus::parse(raw).map(Self::SprintWithUs),
            Program::TeamWithUs => TwuProposalStatus::parse(raw).map(Self::TeamWithUs),
        }
    }

    /// Allow-list check for `actor` moving a proposal from `self` to `to`.
    /// `before_deadline` is whether the opportunity still accepts submissions.
    pub fn can_transition_to(self, to: ProposalStatus, actor: UserType, before_deadline: bool) -> bool {
        match (self, to) {
            (Self::CodeWithUs(a), Self::CodeWithUs(b)) => {
                code_with_us::is_valid_proposal_status_change(a, b, actor, before_deadline)
            }
            (Self::SprintWithUs(a), Self::SprintWithUs(b)) => {
                sprint_with_us::is_valid_proposal_status_change(a, b, actor, before_deadline)
            }
            (Self::TeamWithUs(a), Self::TeamWithUs(b)) => {
                team_with_us::is_valid_proposal_status_change(a, b, actor, before_deadline)
            }
            _ => false,
        }
    }

    pub fn draft(program: Program) -> Self {
        match program {
            Program::CodeWithUs => Self::CodeWithUs(CwuProposalStatus::Draft),
            Program::SprintWithUs => Self::SprintWithUs(SwuProposalStatus::Draft),
            Program::TeamWithUs => Self::TeamWithUs(TwuProposalStatus::Draft),
        }
    }

    pub fn submitted(program: Program) -> Self {
        match program {
            Program::CodeWithUs => Self::CodeWithUs(CwuProposalStatus::Submitted),
            Program::SprintWithUs => Self::SprintWithUs(SwuProposalStatus::Submitted),
            Program::TeamWithUs => Self::TeamWithUs(TwuProposalStatus::Submitted),
        }
    }

    /// Stage a submitted proposal enters when its opportunity closes
    pub fn first_review(program: Program) -> Self {
        match program {
            Program::CodeWithUs => Self::CodeWithUs(CwuProposalStatus::UnderReview),
            Program::SprintWithUs => Self::SprintWithUs(SwuProposalStatus::UnderReview),
            Program::TeamWithUs => Self::TeamWithUs(TwuProposalStatus::UnderReviewResourceQuestions),
        }
    }

    pub fn withdrawn(program: Program) -> Self {
        match program {
            Program::CodeWithUs => Self::CodeWithUs(CwuProposalStatus::Withdrawn),
            Program::SprintWithUs => Self::SprintWithUs(SwuProposalStatus::Withdrawn),
            Program::TeamWithUs => Self::TeamWithUs(TwuProposalStatus::Withdrawn),
        }
    }

    pub fn awarded(program: Program) -> Self {
        match program {
            Program::CodeWithUs => Self::CodeWithUs(CwuProposalStatus::Awarded),
            Program::SprintWithUs => Self::SprintWithUs(SwuProposalStatus::Awarded),
            Program::TeamWithUs => Self::TeamWithUs(TwuProposalStatus::Awarded),
        }
    }

    pub fn not_awarded(program: Program) -> Self {
        match program {
            Program::CodeWithUs => Self::CodeWithUs(CwuProposalStatus::NotAwarded),
            Program::SprintWithUs => Self::SprintWithUs(SwuProposalStatus::NotAwarded),
            Program::TeamWithUs => Self::TeamWithUs(TwuProposalStatus::NotAwarded),
        }
    }

    pub fn disqualified(program: Program) -> Self {
        match program {
            Program::CodeWithUs => Self::CodeWithUs(CwuProposalStatus::Disqualified),
            Program::SprintWithUs => Self::SprintWithUs(SwuProposalStatus::Disqualified),
            Program::TeamWithUs => Self::TeamWithUs(TwuProposalStatus::Disqualified),
        }
    }

    /// Vendors may only edit drafts and withdrawn proposals
    pub fn is_editable(self) -> bool {
        self == Self::draft(self.program()) || self == Self::withdrawn(self.program())
    }

    pub fn is_draft(self) -> bool {
        self == Self::draft(self.program())
    }

    pub fn is_submitted(self) -> bool {
        self == Self::submitted(self.program())
    }

    pub fn visible_to_government(self) -> bool {
        !self.is_draft() && !self.is_submitted()
    }

    /// Vendors see their scores only once the outcome is final
    pub fn scores_visible_to_vendor(self) -> bool {
        self == Self::awarded(self.program()) || self == Self::not_awarded(self.program())
    }
}

impl std::fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ProposalStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
