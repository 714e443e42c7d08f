//! In-memory store
//!
//! Same contract as the PostgreSQL store; used for tests and local runs.
//! One lock guards every table so a [`ChangeSet`] applies atomically.

use super::{ChangeSet, Store, StoreError, StoreResult};
use crate::auth::SessionRecord;
use crate::lifecycle::Program;
use crate::models::{
    Affiliation, Counter, Evaluation, Opportunity, Organization, Proposal, Subscriber, User,
};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    sessions: HashMap<Uuid, SessionRecord>,
    organizations: HashMap<Uuid, Organization>,
    affiliations: HashMap<Uuid, Affiliation>,
    opportunities: HashMap<Uuid, Opportunity>,
    proposals: HashMap<Uuid, Proposal>,
    evaluations: HashMap<Uuid, Evaluation>,
    subscribers: HashMap<(Uuid, Uuid), Subscriber>,
    counters: HashMap<String, i64>,
    /// Opportunities whose commits fail, for exercising error paths
    #[cfg(test)]
    refused: std::collections::HashSet<Uuid>,
}

impl Tables {
    #[cfg(test)]
    fn refuses(&self, opportunity_id: Uuid) -> bool {
        self.refused.contains(&opportunity_id)
    }

    #[cfg(not(test))]
    fn refuses(&self, _opportunity_id: Uuid) -> bool {
        false
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every later commit that touches this opportunity
    #[cfg(test)]
    pub async fn refuse_commits_for(&self, opportunity_id: Uuid) {
        self.tables.write().await.refused.insert(opportunity_id);
    }
}

fn stale(what: &str, id: Uuid) -> StoreError {
    StoreError::Conflict(format!("The {} {} was changed by someone else. Please try again.", what, id))
}

fn sorted_by<T, K: Ord>(mut items: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    items.sort_by_key(|item| key(item));
    items
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: User) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(StoreError::Conflict("Email already registered.".to_string()));
        }
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email.eq_ignore_ascii_case(email)).cloned())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let users = self.tables.read().await.users.values().cloned().collect();
        Ok(sorted_by(users, |u: &User| std::cmp::Reverse(u.created_at)))
    }

    async fn update_user(&self, user: User) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        if tables
            .users
            .values()
            .any(|u| u.id != user.id && u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(StoreError::Conflict("Email already registered.".to_string()));
        }
        let slot = tables
            .users
            .get_mut(&user.id)
            .ok_or_else(|| StoreError::NotFound("user".to_string()))?;
        *slot = user.clone();
        Ok(user)
    }

    async fn create_session(&self, session: SessionRecord) -> StoreResult<SessionRecord> {
        self.tables.write().await.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn find_session(&self, id: Uuid) -> StoreResult<Option<SessionRecord>> {
        Ok(self.tables.read().await.sessions.get(&id).cloned())
    }

    async fn delete_session(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.tables.write().await.sessions.remove(&id).is_some())
    }

    async fn create_organization(&self, organization: Organization, owner: Affiliation) -> StoreResult<Organization> {
        let mut tables = self.tables.write().await;
        tables.organizations.insert(organization.id, organization.clone());
        tables.affiliations.insert(owner.id, owner);
        Ok(organization)
    }

    async fn find_organization(&self, id: Uuid) -> StoreResult<Option<Organization>> {
        Ok(self.tables.read().await.organizations.get(&id).cloned())
    }

    async fn list_organizations(&self) -> StoreResult<Vec<Organization>> {
        let organizations = self.tables.read().await.organizations.values().cloned().collect();
        Ok(sorted_by(organizations, |o: &Organization| o.legal_name.clone()))
    }

    async fn update_organization(&self, organization: Organization) -> StoreResult<Organization> {
        let mut tables = self.tables.write().await;
        let slot = tables
            .organizations
            .get_mut(&organization.id)
            .ok_or_else(|| StoreError::NotFound("organization".to_string()))?;
        *slot = organization.clone();
        Ok(organization)
    }

    async fn create_affiliation(&self, affiliation: Affiliation) -> StoreResult<Affiliation> {
        let mut tables = self.tables.write().await;
        if tables.affiliations.values().any(|a| {
            a.user_id == affiliation.user_id && a.organization_id == affiliation.organization_id
        }) {
            return Err(StoreError::Conflict(
                "User is already a member of this organization.".to_string(),
            ));
        }
        tables.affiliations.insert(affiliation.id, affiliation.clone());
        Ok(affiliation)
    }

    async fn find_affiliation(&self, id: Uuid) -> StoreResult<Option<Affiliation>> {
        Ok(self.tables.read().await.affiliations.get(&id).cloned())
    }

    async fn list_affiliations_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Affiliation>> {
        let tables = self.tables.read().await;
        let found = tables.affiliations.values().filter(|a| a.user_id == user_id).cloned().collect();
        Ok(sorted_by(found, |a: &Affiliation| a.created_at))
    }

    async fn list_affiliations_for_organization(&self, organization_id: Uuid) -> StoreResult<Vec<Affiliation>> {
        let tables = self.tables.read().await;
        let found = tables
            .affiliations
            .values()
            .filter(|a| a.organization_id == organization_id)
            .cloned()
            .collect();
        Ok(sorted_by(found, |a: &Affiliation| a.created_at))
    }

    async fn update_affiliation(&self, affiliation: Affiliation) -> StoreResult<Affiliation> {
        let mut tables = self.tables.write().await;
        let slot = tables
            .affiliations
            .get_mut(&affiliation.id)
            .ok_or_else(|| StoreError::NotFound("affiliation".to_string()))?;
        *slot = affiliation.clone();
        Ok(affiliation)
    }

    async fn delete_affiliation(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.tables.write().await.affiliations.remove(&id).is_some())
    }

    async fn insert_opportunity(&self, opportunity: Opportunity) -> StoreResult<Opportunity> {
        self.tables.write().await.opportunities.insert(opportunity.id, opportunity.clone());
        Ok(opportunity)
    }

    async fn find_opportunity(&self, id: Uuid) -> StoreResult<Option<Opportunity>> {
        Ok(self.tables.read().await.opportunities.get(&id).cloned())
    }

    async fn list_opportunities(&self, program: Option<Program>) -> StoreResult<Vec<Opportunity>> {
        let tables = self.tables.read().await;
        let found = tables
            .opportunities
            .values()
            .filter(|o| program.map_or(true, |p| o.program == p))
            .cloned()
            .collect();
        Ok(sorted_by(found, |o: &Opportunity| std::cmp::Reverse(o.created_at)))
    }

    async fn insert_proposal(&self, proposal: Proposal) -> StoreResult<Proposal> {
        let mut tables = self.tables.write().await;
        if tables
            .proposals
            .values()
            .any(|p| p.opportunity_id == proposal.opportunity_id && p.created_by == proposal.created_by)
        {
            return Err(StoreError::Conflict(
                "You already have a proposal for this opportunity.".to_string(),
            ));
        }
        tables.proposals.insert(proposal.id, proposal.clone());
        Ok(proposal)
    }

    async fn find_proposal(&self, id: Uuid) -> StoreResult<Option<Proposal>> {
        Ok(self.tables.read().await.proposals.get(&id).cloned())
    }

    async fn list_proposals_for_opportunity(&self, opportunity_id: Uuid) -> StoreResult<Vec<Proposal>> {
        let tables = self.tables.read().await;
        let found = tables
            .proposals
            .values()
            .filter(|p| p.opportunity_id == opportunity_id)
            .cloned()
            .collect();
        Ok(sorted_by(found, |p: &Proposal| p.created_at))
    }

    async fn list_proposals_by_author(&self, user_id: Uuid) -> StoreResult<Vec<Proposal>> {
        let tables = self.tables.read().await;
        let found = tables.proposals.values().filter(|p| p.created_by == user_id).cloned().collect();
        Ok(sorted_by(found, |p: &Proposal| std::cmp::Reverse(p.created_at)))
    }

    async fn commit(&self, changes: ChangeSet) -> StoreResult<()> {
        let mut tables = self.tables.write().await;

        // Check everything exists unchanged before touching anything
        if let Some(change) = &changes.opportunity {
            let id = change.record.id;
            if tables.refuses(id) {
                return Err(StoreError::Conflict(format!("commit refused for {}", id)));
            }
            match tables.opportunities.get(&id) {
                None => return Err(StoreError::NotFound("opportunity".to_string())),
                Some(stored) if stored.status.as_str() != change.expected_status => {
                    return Err(stale("opportunity", id));
                }
                Some(_) => {}
            }
        }
        for change in &changes.proposals {
            let id = change.record.id;
            match tables.proposals.get(&id) {
                None => return Err(StoreError::NotFound(format!("proposal {}", id))),
                Some(stored) if stored.status.as_str() != change.expected_status => {
                    return Err(stale("proposal", id));
                }
                Some(_) => {}
            }
        }

        if let Some(change) = changes.opportunity {
            if let Some(stored) = tables.opportunities.get_mut(&change.record.id) {
                let mut history = std::mem::take(&mut stored.history);
                history.extend(change.history);
                *stored = Opportunity { history, ..change.record };
            }
        }
        for change in changes.proposals {
            if let Some(stored) = tables.proposals.get_mut(&change.record.id) {
                let mut history = std::mem::take(&mut stored.history);
                history.extend(change.history);
                *stored = Proposal { history, ..change.record };
            }
        }
        Ok(())
    }

    async fn insert_evaluation(&self, evaluation: Evaluation) -> StoreResult<Evaluation> {
        let mut tables = self.tables.write().await;
        if tables.evaluations.values().any(|e| {
            e.proposal_id == evaluation.proposal_id
                && e.evaluator_id == evaluation.evaluator_id
                && e.kind == evaluation.kind
        }) {
            return Err(StoreError::Conflict(
                "An evaluation already exists for this proposal.".to_string(),
            ));
        }
        tables.evaluations.insert(evaluation.id, evaluation.clone());
        Ok(evaluation)
    }

    async fn find_evaluation(&self, id: Uuid) -> StoreResult<Option<Evaluation>> {
        Ok(self.tables.read().await.evaluations.get(&id).cloned())
    }

    async fn list_evaluations_for_proposal(&self, proposal_id: Uuid) -> StoreResult<Vec<Evaluation>> {
        let tables = self.tables.read().await;
        let found = tables
            .evaluations
            .values()
            .filter(|e| e.proposal_id == proposal_id)
            .cloned()
            .collect();
        Ok(sorted_by(found, |e: &Evaluation| e.created_at))
    }

    async fn list_evaluations_for_opportunity(&self, opportunity_id: Uuid) -> StoreResult<Vec<Evaluation>> {
        let tables = self.tables.read().await;
        let found = tables
            .evaluations
            .values()
            .filter(|e| e.opportunity_id == opportunity_id)
            .cloned()
            .collect();
        Ok(sorted_by(found, |e: &Evaluation| e.created_at))
    }

    async fn update_evaluation(&self, evaluation: Evaluation) -> StoreResult<Evaluation> {
        let mut tables = self.tables.write().await;
        let slot = tables
            .evaluations
            .get_mut(&evaluation.id)
            .ok_or_else(|| StoreError::NotFound("evaluation".to_string()))?;
        *slot = evaluation.clone();
        Ok(evaluation)
    }

    async fn add_subscriber(&self, subscriber: Subscriber) -> StoreResult<Subscriber> {
        let mut tables = self.tables.write().await;
        let key = (subscriber.opportunity_id, subscriber.user_id);
        Ok(tables.subscribers.entry(key).or_insert(subscriber).clone())
    }

    async fn remove_subscriber(&self, opportunity_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.subscribers.remove(&(opportunity_id, user_id)).is_some())
    }

    async fn increment_counter(&self, name: &str) -> StoreResult<i64> {
        let mut tables = self.tables.write().await;
        let count = tables.counters.entry(name.to_string()).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    async fn get_counters(&self, names: &[String]) -> StoreResult<Vec<Counter>> {
        let tables = self.tables.read().await;
        Ok(names
            .iter()
            .map(|name| Counter {
                name: name.clone(),
                count: tables.counters.get(name).copied().unwrap_or(0),
            })
            .collect())
    }
}
