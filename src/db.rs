//! Persistence layer
//!
//! Handlers talk to a [`Store`]; the PostgreSQL and in-memory backends
//! implement the same contract. Multi-record changes go through
//! [`Store::commit`] so they land together or not at all.

pub mod memory;
pub mod postgres;
pub mod queries;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::auth::SessionRecord;
use crate::lifecycle::Program;
use crate::models::{
    Affiliation, Counter, Evaluation, HistoryRecord, Opportunity, Organization, Proposal,
    Subscriber, User,
};
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// Persistence failures
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint was violated, or the row changed under a write
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A record's new root fields plus the history entries to append.
///
/// `expected_status` is the status tag the record was read with. The write
/// only lands while the stored row still carries it, otherwise the whole
/// commit fails with [`StoreError::Conflict`].
#[derive(Debug, Clone)]
pub struct RecordChange<T> {
    pub record: T,
    pub history: Vec<HistoryRecord>,
    pub expected_status: &'static str,
}

impl<T> RecordChange<T> {
    pub fn new(expected_status: &'static str, record: T, history: Vec<HistoryRecord>) -> Self {
        Self { record, history, expected_status }
    }

    pub fn with_history(expected_status: &'static str, record: T, entry: HistoryRecord) -> Self {
        Self::new(expected_status, record, vec![entry])
    }
}

/// Changes applied atomically by [`Store::commit`].
///
/// Stored history is never rewritten: the `history` field on each record is
/// ignored and only the entries in [`RecordChange::history`] are appended.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub opportunity: Option<RecordChange<Opportunity>>,
    pub proposals: Vec<RecordChange<Proposal>>,
}

impl ChangeSet {
    pub fn opportunity(change: RecordChange<Opportunity>) -> Self {
        Self { opportunity: Some(change), proposals: Vec::new() }
    }

    pub fn proposal(change: RecordChange<Proposal>) -> Self {
        Self { opportunity: None, proposals: vec![change] }
    }

    pub fn is_empty(&self) -> bool {
        self.opportunity.is_none() && self.proposals.is_empty()
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    // Users
    /// Fails with [`StoreError::Conflict`] when the email is taken
    async fn create_user(&self, user: User) -> StoreResult<User>;
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn list_users(&self) -> StoreResult<Vec<User>>;
    async fn update_user(&self, user: User) -> StoreResult<User>;

    // Sessions
    async fn create_session(&self, session: SessionRecord) -> StoreResult<SessionRecord>;
    async fn find_session(&self, id: Uuid) -> StoreResult<Option<SessionRecord>>;
    async fn delete_session(&self, id: Uuid) -> StoreResult<bool>;

    // Organizations
    /// Inserts the organization together with its owner's affiliation
    async fn create_organization(&self, organization: Organization, owner: Affiliation) -> StoreResult<Organization>;
    async fn find_organization(&self, id: Uuid) -> StoreResult<Option<Organization>>;
    async fn list_organizations(&self) -> StoreResult<Vec<Organization>>;
    async fn update_organization(&self, organization: Organization) -> StoreResult<Organization>;

    // Affiliations
    /// Fails with [`StoreError::Conflict`] when the user already belongs to the organization
    async fn create_affiliation(&self, affiliation: Affiliation) -> StoreResult<Affiliation>;
    async fn find_affiliation(&self, id: Uuid) -> StoreResult<Option<Affiliation>>;
    async fn list_affiliations_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Affiliation>>;
    async fn list_affiliations_for_organization(&self, organization_id: Uuid) -> StoreResult<Vec<Affiliation>>;
    async fn update_affiliation(&self, affiliation: Affiliation) -> StoreResult<Affiliation>;
    async fn delete_affiliation(&self, id: Uuid) -> StoreResult<bool>;

    // Opportunities
    /// Inserts the record and its initial history
    async fn insert_opportunity(&self, opportunity: Opportunity) -> StoreResult<Opportunity>;
    async fn find_opportunity(&self, id: Uuid) -> StoreResult<Option<Opportunity>>;
    async fn list_opportunities(&self, program: Option<Program>) -> StoreResult<Vec<Opportunity>>;

    // Proposals
    async fn insert_proposal(&self, proposal: Proposal) -> StoreResult<Proposal>;
    async fn find_proposal(&self, id: Uuid) -> StoreResult<Option<Proposal>>;
    async fn list_proposals_for_opportunity(&self, opportunity_id: Uuid) -> StoreResult<Vec<Proposal>>;
    async fn list_proposals_by_author(&self, user_id: Uuid) -> StoreResult<Vec<Proposal>>;

    /// Applies every change in one transaction
    async fn commit(&self, changes: ChangeSet) -> StoreResult<()>;

    // Evaluations
    async fn insert_evaluation(&self, evaluation: Evaluation) -> StoreResult<Evaluation>;
    async fn find_evaluation(&self, id: Uuid) -> StoreResult<Option<Evaluation>>;
    async fn list_evaluations_for_proposal(&self, proposal_id: Uuid) -> StoreResult<Vec<Evaluation>>;
    async fn list_evaluations_for_opportunity(&self, opportunity_id: Uuid) -> StoreResult<Vec<Evaluation>>;
    async fn update_evaluation(&self, evaluation: Evaluation) -> StoreResult<Evaluation>;

    // Subscribers
    /// Returns the existing subscription when there already is one
    async fn add_subscriber(&self, subscriber: Subscriber) -> StoreResult<Subscriber>;
    async fn remove_subscriber(&self, opportunity_id: Uuid, user_id: Uuid) -> StoreResult<bool>;

    // Counters
    async fn increment_counter(&self, name: &str) -> StoreResult<i64>;
    /// Missing counters are reported as zero
    async fn get_counters(&self, names: &[String]) -> StoreResult<Vec<Counter>>;
}
