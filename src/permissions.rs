//! Permission predicates
//!
//! Every check takes the caller's optional session plus whatever resource
//! context it needs and answers yes or no. Anonymous callers get `None`.
//! Handlers resolve the context (memberships, opportunity) before asking.

use crate::auth::{Session, UserType};
use crate::lifecycle::{OpportunityStatus, Program};
use crate::models::{Affiliation, Evaluation, MembershipType, Opportunity, Proposal};
use uuid::Uuid;

// ============================================
// Roles
// ============================================

pub fn is_signed_in(session: Option<&Session>) -> bool {
    session.is_some()
}

pub fn is_admin(session: Option<&Session>) -> bool {
    session.is_some_and(|s| s.user.user_type == UserType::Admin)
}

/// Government users, administrators included
pub fn is_public_sector(session: Option<&Session>) -> bool {
    session.is_some_and(|s| s.user.user_type.is_public_sector())
}

pub fn is_vendor(session: Option<&Session>) -> bool {
    session.is_some_and(|s| s.user.user_type == UserType::Vendor)
}

fn is_user(session: Option<&Session>, user_id: Uuid) -> bool {
    session.is_some_and(|s| s.user_id() == user_id)
}

fn is_vendor_with_terms(session: Option<&Session>) -> bool {
    session.is_some_and(|s| s.user.user_type == UserType::Vendor && s.user.has_accepted_terms())
}

fn manages(session: Option<&Session>, membership: Option<&Affiliation>) -> bool {
    match (session, membership) {
        (Some(s), Some(m)) => m.user_id == s.user_id() && m.can_manage(),
        _ => false,
    }
}

fn owns(session: Option<&Session>, membership: Option<&Affiliation>) -> bool {
    manages(session, membership)
        && membership.is_some_and(|m| m.membership_type == MembershipType::Owner)
}

// ============================================
// Sessions and users
// ============================================

pub fn read_session(session: Option<&Session>, session_id: Uuid) -> bool {
    session.is_some_and(|s| s.id == session_id)
}

pub fn read_many_users(session: Option<&Session>) -> bool {
    is_public_sector(session)
}

pub fn read_one_user(session: Option<&Session>, user_id: Uuid) -> bool {
    is_user(session, user_id) || is_admin(session)
}

pub fn update_user(session: Option<&Session>, user_id: Uuid) -> bool {
    is_user(session, user_id) || is_admin(session)
}

pub fn deactivate_user(session: Option<&Session>, user_id: Uuid) -> bool {
    is_user(session, user_id) || is_admin(session)
}

pub fn accept_terms(session: Option<&Session>, user_id: Uuid) -> bool {
    is_user(session, user_id)
}

/// Admins may not reactivate themselves
pub fn reactivate_user(session: Option<&Session>, user_id: Uuid) -> bool {
    is_admin(session) && !is_user(session, user_id)
}

pub fn update_admin_status(session: Option<&Session>, user_id: Uuid) -> bool {
    is_admin(session) && !is_user(session, user_id)
}

// ============================================
// Organizations and affiliations
// ============================================

pub fn create_organization(session: Option<&Session>) -> bool {
    is_vendor_with_terms(session)
}

pub fn read_many_organizations(session: Option<&Session>) -> bool {
    is_signed_in(session)
}

/// `membership` is the caller's affiliation with the organization, if any
pub fn read_one_organization(session: Option<&Session>, membership: Option<&Affiliation>) -> bool {
    is_admin(session) || manages(session, membership)
}

pub fn update_organization(session: Option<&Session>, membership: Option<&Affiliation>) -> bool {
    is_admin(session) || owns(session, membership)
}

pub fn archive_organization(session: Option<&Session>, membership: Option<&Affiliation>) -> bool {
    is_admin(session) || owns(session, membership)
}

pub fn read_organization_members(session: Option<&Session>, membership: Option<&Affiliation>) -> bool {
    is_admin(session) || membership.is_some_and(|m| is_user(session, m.user_id) && m.is_active())
}

pub fn invite_member(session: Option<&Session>, membership: Option<&Affiliation>) -> bool {
    is_admin(session) || manages(session, membership)
}

/// Only the invitee (or an admin) accepts an invitation
pub fn approve_affiliation(session: Option<&Session>, affiliation: &Affiliation) -> bool {
    is_admin(session) || is_user(session, affiliation.user_id)
}

pub fn update_affiliation_admin_status(
    session: Option<&Session>,
    affiliation: &Affiliation,
    membership: Option<&Affiliation>,
) -> bool {
    affiliation.membership_type != MembershipType::Owner
        && (is_admin(session) || manages(session, membership))
}

/// Owners cannot be removed
pub fn delete_affiliation(
    session: Option<&Session>,
    affiliation: &Affiliation,
    membership: Option<&Affiliation>,
) -> bool {
    affiliation.membership_type != MembershipType::Owner
        && (is_admin(session) || is_user(session, affiliation.user_id) || manages(session, membership))
}

// ============================================
// Opportunities
// ============================================

/// Code With Us: any public sector user. The other programs let government
/// users create drafts and review requests; only admins publish directly.
pub fn create_opportunity(session: Option<&Session>, initial: OpportunityStatus) -> bool {
    match initial.program() {
        Program::CodeWithUs => is_public_sector(session),
        Program::SprintWithUs | Program::TeamWithUs => {
            is_admin(session) || (is_public_sector(session) && !initial.is_published())
        }
    }
}

pub fn read_opportunity(session: Option<&Session>, opportunity: &Opportunity) -> bool {
    opportunity.status.is_public() || is_admin(session) || is_opportunity_author(session, opportunity)
}

/// History, panel and other workflow internals
pub fn read_opportunity_internals(session: Option<&Session>, opportunity: &Opportunity) -> bool {
    is_admin(session) || is_opportunity_author(session, opportunity)
}

fn is_opportunity_author(session: Option<&Session>, opportunity: &Opportunity) -> bool {
    is_public_sector(session) && session.is_some_and(|s| opportunity.is_author(s.user_id()))
}

/// Edits, addenda, notes and evaluation-stage moves
pub fn edit_opportunity(session: Option<&Session>, opportunity: &Opportunity) -> bool {
    is_admin(session) || is_opportunity_author(session, opportunity)
}

pub fn submit_opportunity_for_review(session: Option<&Session>, opportunity: &Opportunity) -> bool {
    is_opportunity_author(session, opportunity)
}

/// Publishing, suspending and cancelling. Code With Us authors manage their
/// own opportunities; the other programs need an admin.
pub fn manage_opportunity(session: Option<&Session>, opportunity: &Opportunity) -> bool {
    match opportunity.program {
        Program::CodeWithUs => edit_opportunity(session, opportunity),
        Program::SprintWithUs | Program::TeamWithUs => is_admin(session),
    }
}

// ============================================
// Proposals
// ============================================

pub fn create_proposal(session: Option<&Session>) -> bool {
    is_vendor_with_terms(session)
}

/// Vendor-side ownership: the author, or a manager of the proposing organization
pub fn owns_proposal(session: Option<&Session>, proposal: &Proposal, membership: Option<&Affiliation>) -> bool {
    is_vendor(session)
        && (is_user(session, proposal.created_by)
            || (membership.is_some_and(|m| Some(m.organization_id) == proposal.organization_id)
                && manages(session, membership)))
}

/// Government-side reviewers of an opportunity's proposals
pub fn reviews_opportunity(session: Option<&Session>, opportunity: &Opportunity) -> bool {
    let on_panel = session.is_some_and(|s| opportunity.panel_member(s.user_id()).is_some());
    (is_admin(session) || is_opportunity_author(session, opportunity) || (is_public_sector(session) && on_panel))
        && opportunity.status.allows_gov_to_view_proposals()
}

pub fn read_proposal(
    session: Option<&Session>,
    proposal: &Proposal,
    opportunity: &Opportunity,
    membership: Option<&Affiliation>,
) -> bool {
    owns_proposal(session, proposal, membership)
        || (reviews_opportunity(session, opportunity) && proposal.status.visible_to_government())
}

pub fn read_proposal_scores(
    session: Option<&Session>,
    proposal: &Proposal,
    opportunity: &Opportunity,
) -> bool {
    reviews_opportunity(session, opportunity)
        || (is_vendor(session) && proposal.status.scores_visible_to_vendor())
}

/// Scoring, screening, awarding and disqualifying
pub fn evaluate_proposal(session: Option<&Session>, opportunity: &Opportunity) -> bool {
    is_admin(session) || is_opportunity_author(session, opportunity)
}

// ============================================
// Evaluations
// ============================================

pub fn create_individual_evaluation(session: Option<&Session>, opportunity: &Opportunity) -> bool {
    is_public_sector(session)
        && session.is_some_and(|s| opportunity.panel_member(s.user_id()).is_some_and(|m| m.evaluator))
}

pub fn create_consensus(session: Option<&Session>, opportunity: &Opportunity) -> bool {
    is_public_sector(session)
        && session.is_some_and(|s| opportunity.panel_member(s.user_id()).is_some_and(|m| m.chair))
}

pub fn edit_evaluation(session: Option<&Session>, evaluation: &Evaluation) -> bool {
    is_user(session, evaluation.evaluator_id)
}

pub fn read_evaluation(session: Option<&Session>, evaluation: &Evaluation, opportunity: &Opportunity) -> bool {
    is_user(session, evaluation.evaluator_id)
        || is_admin(session)
        || is_opportunity_author(session, opportunity)
        || (is_public_sector(session)
            && session.is_some_and(|s| opportunity.panel_member(s.user_id()).is_some_and(|m| m.chair)))
}

// ============================================
// Subscribers and counters
// ============================================

pub fn manage_subscription(session: Option<&Session>) -> bool {
    is_signed_in(session)
}

pub fn read_counters(session: Option<&Session>) -> bool {
    is_public_sector(session)
}
