//! PostgreSQL store
//!
//! Root records live in one table each. Opportunity and proposal history
//! are append-only tables; JSON-shaped fields are stored as JSONB.

use super::queries::*;
use super::{ChangeSet, Store, StoreError, StoreResult};
use crate::auth::{SessionRecord, UserType};
use crate::lifecycle::{EvaluationStatus, OpportunityStatus, Program, ProposalStatus};
use crate::models::{
    Affiliation, Counter, Evaluation, EvaluationKind, HistoryEvent, HistoryKind, HistoryRecord,
    MembershipStatus, MembershipType, Opportunity, Organization, Proposal, Subscriber, User,
    UserStatus,
};
use async_trait::async_trait;
use deadpool_postgres::{Client, Pool, Transaction};
use postgres_types::Json;
use tokio_postgres::error::SqlState;
use tokio_postgres::Row;
use tracing::{debug, info};
use uuid::Uuid;

pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create tables and indexes if they don't exist
    pub async fn migrate(&self) -> StoreResult<()> {
        let client = self.client().await?;
        for statement in SCHEMA {
            client.batch_execute(statement).await?;
        }
        info!("✅ Database tables initialized");
        Ok(())
    }

    async fn client(&self) -> StoreResult<Client> {
        Ok(self.pool.get().await?)
    }

    async fn opportunity_with_history(&self, client: &Client, row: &Row) -> StoreResult<Opportunity> {
        let mut opportunity = opportunity_from_row(row)?;
        opportunity.history = load_history(client, OPPORTUNITY_HISTORY, opportunity.id).await?;
        Ok(opportunity)
    }

    async fn proposal_with_history(&self, client: &Client, row: &Row) -> StoreResult<Proposal> {
        let mut proposal = proposal_from_row(row)?;
        proposal.history = load_history(client, PROPOSAL_HISTORY, proposal.id).await?;
        Ok(proposal)
    }

    async fn query_opportunities(&self, sql: &str, program: Option<&str>) -> StoreResult<Vec<Opportunity>> {
        let client = self.client().await?;
        let rows = match program {
            Some(slug) => client.query(sql, &[&slug]).await?,
            None => client.query(sql, &[]).await?,
        };
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(self.opportunity_with_history(&client, row).await?);
        }
        Ok(out)
    }

    async fn query_proposals(&self, sql: &str, id: Uuid) -> StoreResult<Vec<Proposal>> {
        let client = self.client().await?;
        let rows = client.query(sql, &[&id]).await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(self.proposal_with_history(&client, row).await?);
        }
        Ok(out)
    }
}

/// Unique violations become conflicts
fn conflict_or(error: tokio_postgres::Error, message: &str) -> StoreError {
    if error.code() == Some(&SqlState::UNIQUE_VIOLATION) {
        StoreError::Conflict(message.to_string())
    } else {
        StoreError::Database(error)
    }
}

fn expect_one(affected: u64, what: &str) -> StoreResult<()> {
    if affected == 0 {
        Err(StoreError::NotFound(what.to_string()))
    } else {
        Ok(())
    }
}

/// A guarded update matched no row: the record is gone or its status moved on
async fn missing_or_stale(tx: &Transaction<'_>, exists_sql: &str, id: Uuid, what: &str) -> StoreError {
    match tx.query_opt(exists_sql, &[&id]).await {
        Ok(Some(_)) => StoreError::Conflict(format!(
            "The {} {} was changed by someone else. Please try again.",
            what, id
        )),
        Ok(None) => StoreError::NotFound(what.to_string()),
        Err(e) => StoreError::Database(e),
    }
}

fn bad_column(column: &str, value: &str) -> StoreError {
    StoreError::Serialization(format!("unexpected {} value {:?}", column, value))
}

fn program_column(row: &Row) -> StoreResult<Program> {
    let raw: String = row.try_get("program")?;
    Program::from_slug(&raw).ok_or_else(|| bad_column("program", &raw))
}

async fn load_history(client: &Client, sql: &str, id: Uuid) -> StoreResult<Vec<HistoryRecord>> {
    let rows = client.query(sql, &[&id]).await?;
    rows.iter().map(history_from_row).collect()
}

fn history_from_row(row: &Row) -> StoreResult<HistoryRecord> {
    let status: Option<String> = row.try_get("status")?;
    let event: Option<String> = row.try_get("event")?;
    let kind = match (status, event) {
        (Some(status), None) => HistoryKind::Status(status),
        (None, Some(event)) => HistoryKind::Event(
            HistoryEvent::parse(&event).ok_or_else(|| bad_column("event", &event))?,
        ),
        _ => return Err(StoreError::Serialization("history row needs a status or an event".into())),
    };
    Ok(HistoryRecord {
        id: row.try_get("id")?,
        created_at: row.try_get("created_at")?,
        created_by: row.try_get("created_by")?,
        kind,
        note: row.try_get("note")?,
    })
}

async fn append_history(
    tx: &Transaction<'_>,
    sql: &str,
    owner: Uuid,
    entries: &[HistoryRecord],
) -> StoreResult<()> {
    for entry in entries {
        let (status, event) = entry.columns();
        tx.execute(
            sql,
            &[&entry.id, &owner, &entry.created_at, &entry.created_by, &status, &event, &entry.note],
        )
        .await?;
    }
    Ok(())
}

fn user_from_row(row: &Row) -> StoreResult<User> {
    let user_type: String = row.try_get("user_type")?;
    let status: String = row.try_get("status")?;
    Ok(User {
        id: row.try_get("id")?,
        user_type: UserType::parse(&user_type).ok_or_else(|| bad_column("user_type", &user_type))?,
        status: UserStatus::parse(&status).ok_or_else(|| bad_column("status", &status))?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        job_title: row.try_get("job_title")?,
        password_hash: row.try_get("password_hash")?,
        accepted_terms_at: row.try_get("accepted_terms_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn session_from_row(row: &Row) -> StoreResult<SessionRecord> {
    Ok(SessionRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        created_at: row.try_get("created_at")?,
        expires_at: row.try_get("expires_at")?,
    })
}

fn organization_from_row(row: &Row) -> StoreResult<Organization> {
    Ok(Organization {
        id: row.try_get("id")?,
        legal_name: row.try_get("legal_name")?,
        website_url: row.try_get("website_url")?,
        contact_email: row.try_get("contact_email")?,
        active: row.try_get("active")?,
        possess_all_capabilities: row.try_get("possess_all_capabilities")?,
        service_areas: row.try_get("service_areas")?,
        accepted_swu_terms_at: row.try_get("accepted_swu_terms_at")?,
        accepted_twu_terms_at: row.try_get("accepted_twu_terms_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn affiliation_from_row(row: &Row) -> StoreResult<Affiliation> {
    let membership_type: String = row.try_get("membership_type")?;
    let membership_status: String = row.try_get("membership_status")?;
    Ok(Affiliation {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        organization_id: row.try_get("organization_id")?,
        membership_type: MembershipType::parse(&membership_type)
            .ok_or_else(|| bad_column("membership_type", &membership_type))?,
        membership_status: MembershipStatus::parse(&membership_status)
            .ok_or_else(|| bad_column("membership_status", &membership_status))?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// History is loaded separately
fn opportunity_from_row(row: &Row) -> StoreResult<Opportunity> {
    let program = program_column(row)?;
    let status: String = row.try_get("status")?;
    let Json(details) = row.try_get("details")?;
    let Json(evaluation_panel) = row.try_get("evaluation_panel")?;
    let Json(addenda) = row.try_get("addenda")?;
    Ok(Opportunity {
        id: row.try_get("id")?,
        program,
        status: OpportunityStatus::parse(program, &status).ok_or_else(|| bad_column("status", &status))?,
        title: row.try_get("title")?,
        teaser: row.try_get("teaser")?,
        description: row.try_get("description")?,
        location: row.try_get("location")?,
        remote_ok: row.try_get("remote_ok")?,
        remote_desc: row.try_get("remote_desc")?,
        proposal_deadline: row.try_get("proposal_deadline")?,
        details,
        evaluation_panel,
        addenda,
        history: Vec::new(),
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn proposal_from_row(row: &Row) -> StoreResult<Proposal> {
    let program = program_column(row)?;
    let status: String = row.try_get("status")?;
    let Json(details) = row.try_get("details")?;
    let Json(scores) = row.try_get("scores")?;
    Ok(Proposal {
        id: row.try_get("id")?,
        program,
        opportunity_id: row.try_get("opportunity_id")?,
        organization_id: row.try_get("organization_id")?,
        status: ProposalStatus::parse(program, &status).ok_or_else(|| bad_column("status", &status))?,
        details,
        scores,
        history: Vec::new(),
        submitted_at: row.try_get("submitted_at")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn evaluation_from_row(row: &Row) -> StoreResult<Evaluation> {
    let kind: String = row.try_get("kind")?;
    let status: String = row.try_get("status")?;
    let Json(scores) = row.try_get("scores")?;
    Ok(Evaluation {
        id: row.try_get("id")?,
        proposal_id: row.try_get("proposal_id")?,
        opportunity_id: row.try_get("opportunity_id")?,
        evaluator_id: row.try_get("evaluator_id")?,
        kind: EvaluationKind::parse(&kind).ok_or_else(|| bad_column("kind", &kind))?,
        status: EvaluationStatus::parse(&status).ok_or_else(|| bad_column("status", &status))?,
        scores,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn subscriber_from_row(row: &Row) -> StoreResult<Subscriber> {
    Ok(Subscriber {
        opportunity_id: row.try_get("opportunity_id")?,
        user_id: row.try_get("user_id")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, user: User) -> StoreResult<User> {
        let client = self.client().await?;
        client
            .execute(
                INSERT_USER,
                &[
                    &user.id,
                    &user.user_type.as_str(),
                    &user.status.as_str(),
                    &user.name,
                    &user.email,
                    &user.job_title,
                    &user.password_hash,
                    &user.accepted_terms_at,
                    &user.created_at,
                    &user.updated_at,
                ],
            )
            .await
            .map_err(|e| conflict_or(e, "Email already registered."))?;
        debug!("Created user {}", user.id);
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let client = self.client().await?;
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        client.query_opt(sql.as_str(), &[&id]).await?.as_ref().map(user_from_row).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let client = self.client().await?;
        let sql = format!("SELECT {} FROM users WHERE lower(email) = lower($1)", USER_COLUMNS);
        client.query_opt(sql.as_str(), &[&email]).await?.as_ref().map(user_from_row).transpose()
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let client = self.client().await?;
        let sql = format!("SELECT {} FROM users ORDER BY created_at DESC", USER_COLUMNS);
        client.query(sql.as_str(), &[]).await?.iter().map(user_from_row).collect()
    }

    async fn update_user(&self, user: User) -> StoreResult<User> {
        let client = self.client().await?;
        let affected = client
            .execute(
                UPDATE_USER,
                &[
                    &user.id,
                    &user.user_type.as_str(),
                    &user.status.as_str(),
                    &user.name,
                    &user.email,
                    &user.job_title,
                    &user.password_hash,
                    &user.accepted_terms_at,
                    &user.updated_at,
                ],
            )
            .await
            .map_err(|e| conflict_or(e, "Email already registered."))?;
        expect_one(affected, "user")?;
        Ok(user)
    }

    async fn create_session(&self, session: SessionRecord) -> StoreResult<SessionRecord> {
        let client = self.client().await?;
        client
            .execute(
                INSERT_SESSION,
                &[&session.id, &session.user_id, &session.created_at, &session.expires_at],
            )
            .await?;
        Ok(session)
    }

    async fn find_session(&self, id: Uuid) -> StoreResult<Option<SessionRecord>> {
        let client = self.client().await?;
        client.query_opt(FIND_SESSION, &[&id]).await?.as_ref().map(session_from_row).transpose()
    }

    async fn delete_session(&self, id: Uuid) -> StoreResult<bool> {
        let client = self.client().await?;
        Ok(client.execute(DELETE_SESSION, &[&id]).await? > 0)
    }

    async fn create_organization(&self, organization: Organization, owner: Affiliation) -> StoreResult<Organization> {
        let mut client = self.client().await?;
        let tx = client.transaction().await?;
        tx.execute(
            INSERT_ORGANIZATION,
            &[
                &organization.id,
                &organization.legal_name,
                &organization.website_url,
                &organization.contact_email,
                &organization.active,
                &organization.possess_all_capabilities,
                &organization.service_areas,
                &organization.accepted_swu_terms_at,
                &organization.accepted_twu_terms_at,
                &organization.created_at,
                &organization.updated_at,
            ],
        )
        .await?;
        tx.execute(
            INSERT_AFFILIATION,
            &[
                &owner.id,
                &owner.user_id,
                &owner.organization_id,
                &owner.membership_type.as_str(),
                &owner.membership_status.as_str(),
                &owner.created_at,
                &owner.updated_at,
            ],
        )
        .await?;
        tx.commit().await?;
        Ok(organization)
    }

    async fn find_organization(&self, id: Uuid) -> StoreResult<Option<Organization>> {
        let client = self.client().await?;
        let sql = format!("SELECT {} FROM organizations WHERE id = $1", ORGANIZATION_COLUMNS);
        client.query_opt(sql.as_str(), &[&id]).await?.as_ref().map(organization_from_row).transpose()
    }

    async fn list_organizations(&self) -> StoreResult<Vec<Organization>> {
        let client = self.client().await?;
        let sql = format!("SELECT {} FROM organizations ORDER BY legal_name", ORGANIZATION_COLUMNS);
        client.query(sql.as_str(), &[]).await?.iter().map(organization_from_row).collect()
    }

    async fn update_organization(&self, organization: Organization) -> StoreResult<Organization> {
        let client = self.client().await?;
        let affected = client
            .execute(
                UPDATE_ORGANIZATION,
                &[
                    &organization.id,
                    &organization.legal_name,
                    &organization.website_url,
                    &organization.contact_email,
                    &organization.active,
                    &organization.possess_all_capabilities,
                    &organization.service_areas,
                    &organization.accepted_swu_terms_at,
                    &organization.accepted_twu_terms_at,
                    &organization.updated_at,
                ],
            )
            .await?;
        expect_one(affected, "organization")?;
        Ok(organization)
    }

    async fn create_affiliation(&self, affiliation: Affiliation) -> StoreResult<Affiliation> {
        let client = self.client().await?;
        client
            .execute(
                INSERT_AFFILIATION,
                &[
                    &affiliation.id,
                    &affiliation.user_id,
                    &affiliation.organization_id,
                    &affiliation.membership_type.as_str(),
                    &affiliation.membership_status.as_str(),
                    &affiliation.created_at,
                    &affiliation.updated_at,
                ],
            )
            .await
            .map_err(|e| conflict_or(e, "User is already a member of this organization."))?;
        Ok(affiliation)
    }

    async fn find_affiliation(&self, id: Uuid) -> StoreResult<Option<Affiliation>> {
        let client = self.client().await?;
        let sql = format!("SELECT {} FROM affiliations WHERE id = $1", AFFILIATION_COLUMNS);
        client.query_opt(sql.as_str(), &[&id]).await?.as_ref().map(affiliation_from_row).transpose()
    }

    async fn list_affiliations_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Affiliation>> {
        let client = self.client().await?;
        let sql = format!(
            "SELECT {} FROM affiliations WHERE user_id = $1 ORDER BY created_at",
            AFFILIATION_COLUMNS
        );
        client.query(sql.as_str(), &[&user_id]).await?.iter().map(affiliation_from_row).collect()
    }

    async fn list_affiliations_for_organization(&self, organization_id: Uuid) -> StoreResult<Vec<Affiliation>> {
        let client = self.client().await?;
        let sql = format!(
            "SELECT {} FROM affiliations WHERE organization_id = $1 ORDER BY created_at",
            AFFILIATION_COLUMNS
        );
        client.query(sql.as_str(), &[&organization_id]).await?.iter().map(affiliation_from_row).collect()
    }

    async fn update_affiliation(&self, affiliation: Affiliation) -> StoreResult<Affiliation> {
        let client = self.client().await?;
        let affected = client
            .execute(
                UPDATE_AFFILIATION,
                &[
                    &affiliation.id,
                    &affiliation.membership_type.as_str(),
                    &affiliation.membership_status.as_str(),
                    &affiliation.updated_at,
                ],
            )
            .await?;
        expect_one(affected, "affiliation")?;
        Ok(affiliation)
    }

    async fn delete_affiliation(&self, id: Uuid) -> StoreResult<bool> {
        let client = self.client().await?;
        Ok(client.execute("DELETE FROM affiliations WHERE id = $1", &[&id]).await? > 0)
    }

    async fn insert_opportunity(&self, opportunity: Opportunity) -> StoreResult<Opportunity> {
        let mut client = self.client().await?;
        let tx = client.transaction().await?;
        tx.execute(
            INSERT_OPPORTUNITY,
            &[
                &opportunity.id,
                &opportunity.program.slug(),
                &opportunity.status.as_str(),
                &opportunity.title,
                &opportunity.teaser,
                &opportunity.description,
                &opportunity.location,
                &opportunity.remote_ok,
                &opportunity.remote_desc,
                &opportunity.proposal_deadline,
                &Json(&opportunity.details),
                &Json(&opportunity.evaluation_panel),
                &Json(&opportunity.addenda),
                &opportunity.created_by,
                &opportunity.created_at,
                &opportunity.updated_at,
            ],
        )
        .await?;
        append_history(&tx, INSERT_OPPORTUNITY_HISTORY, opportunity.id, &opportunity.history).await?;
        tx.commit().await?;
        debug!("Inserted {} opportunity {}", opportunity.program, opportunity.id);
        Ok(opportunity)
    }

    async fn find_opportunity(&self, id: Uuid) -> StoreResult<Option<Opportunity>> {
        let client = self.client().await?;
        let sql = format!("SELECT {} FROM opportunities WHERE id = $1", OPPORTUNITY_COLUMNS);
        match client.query_opt(sql.as_str(), &[&id]).await? {
            Some(row) => Ok(Some(self.opportunity_with_history(&client, &row).await?)),
            None => Ok(None),
        }
    }

    async fn list_opportunities(&self, program: Option<Program>) -> StoreResult<Vec<Opportunity>> {
        match program {
            Some(program) => {
                let sql = format!(
                    "SELECT {} FROM opportunities WHERE program = $1 ORDER BY created_at DESC",
                    OPPORTUNITY_COLUMNS
                );
                self.query_opportunities(sql.as_str(), Some(program.slug())).await
            }
            None => {
                let sql = format!("SELECT {} FROM opportunities ORDER BY created_at DESC", OPPORTUNITY_COLUMNS);
                self.query_opportunities(sql.as_str(), None).await
            }
        }
    }

    async fn insert_proposal(&self, proposal: Proposal) -> StoreResult<Proposal> {
        let mut client = self.client().await?;
        let tx = client.transaction().await?;
        tx.execute(
            INSERT_PROPOSAL,
            &[
                &proposal.id,
                &proposal.program.slug(),
                &proposal.opportunity_id,
                &proposal.organization_id,
                &proposal.status.as_str(),
                &Json(&proposal.details),
                &Json(&proposal.scores),
                &proposal.submitted_at,
                &proposal.created_by,
                &proposal.created_at,
                &proposal.updated_at,
            ],
        )
        .await
        .map_err(|e| conflict_or(e, "You already have a proposal for this opportunity."))?;
        append_history(&tx, INSERT_PROPOSAL_HISTORY, proposal.id, &proposal.history).await?;
        tx.commit().await?;
        Ok(proposal)
    }

    async fn find_proposal(&self, id: Uuid) -> StoreResult<Option<Proposal>> {
        let client = self.client().await?;
        let sql = format!("SELECT {} FROM proposals WHERE id = $1", PROPOSAL_COLUMNS);
        match client.query_opt(sql.as_str(), &[&id]).await? {
            Some(row) => Ok(Some(self.proposal_with_history(&client, &row).await?)),
            None => Ok(None),
        }
    }

    async fn list_proposals_for_opportunity(&self, opportunity_id: Uuid) -> StoreResult<Vec<Proposal>> {
        let sql = format!(
            "SELECT {} FROM proposals WHERE opportunity_id = $1 ORDER BY created_at",
            PROPOSAL_COLUMNS
        );
        self.query_proposals(sql.as_str(), opportunity_id).await
    }

    async fn list_proposals_by_author(&self, user_id: Uuid) -> StoreResult<Vec<Proposal>> {
        let sql = format!(
            "SELECT {} FROM proposals WHERE created_by = $1 ORDER BY created_at DESC",
            PROPOSAL_COLUMNS
        );
        self.query_proposals(sql.as_str(), user_id).await
    }

    async fn commit(&self, changes: ChangeSet) -> StoreResult<()> {
        if changes.is_empty() {
            return Ok(());
        }
        let mut client = self.client().await?;
        let tx = client.transaction().await?;

        if let Some(change) = &changes.opportunity {
            let o = &change.record;
            let affected = tx
                .execute(
                    UPDATE_OPPORTUNITY,
                    &[
                        &o.id,
                        &o.status.as_str(),
                        &o.title,
                        &o.teaser,
                        &o.description,
                        &o.location,
                        &o.remote_ok,
                        &o.remote_desc,
                        &o.proposal_deadline,
                        &Json(&o.details),
                        &Json(&o.evaluation_panel),
                        &Json(&o.addenda),
                        &o.updated_at,
                        &change.expected_status,
                    ],
                )
                .await?;
            if affected == 0 {
                return Err(missing_or_stale(&tx, OPPORTUNITY_EXISTS, o.id, "opportunity").await);
            }
            append_history(&tx, INSERT_OPPORTUNITY_HISTORY, o.id, &change.history).await?;
        }

        for change in &changes.proposals {
            let p = &change.record;
            let affected = tx
                .execute(
                    UPDATE_PROPOSAL,
                    &[
                        &p.id,
                        &p.organization_id,
                        &p.status.as_str(),
                        &Json(&p.details),
                        &Json(&p.scores),
                        &p.submitted_at,
                        &p.updated_at,
                        &change.expected_status,
                    ],
                )
                .await?;
            if affected == 0 {
                return Err(missing_or_stale(&tx, PROPOSAL_EXISTS, p.id, "proposal").await);
            }
            append_history(&tx, INSERT_PROPOSAL_HISTORY, p.id, &change.history).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn insert_evaluation(&self, evaluation: Evaluation) -> StoreResult<Evaluation> {
        let client = self.client().await?;
        client
            .execute(
                INSERT_EVALUATION,
                &[
                    &evaluation.id,
                    &evaluation.proposal_id,
                    &evaluation.opportunity_id,
                    &evaluation.evaluator_id,
                    &evaluation.kind.as_str(),
                    &evaluation.status.as_str(),
                    &Json(&evaluation.scores),
                    &evaluation.created_at,
                    &evaluation.updated_at,
                ],
            )
            .await
            .map_err(|e| conflict_or(e, "An evaluation already exists for this proposal."))?;
        Ok(evaluation)
    }

    async fn find_evaluation(&self, id: Uuid) -> StoreResult<Option<Evaluation>> {
        let client = self.client().await?;
        let sql = format!("SELECT {} FROM evaluations WHERE id = $1", EVALUATION_COLUMNS);
        client.query_opt(sql.as_str(), &[&id]).await?.as_ref().map(evaluation_from_row).transpose()
    }

    async fn list_evaluations_for_proposal(&self, proposal_id: Uuid) -> StoreResult<Vec<Evaluation>> {
        let client = self.client().await?;
        let sql = format!(
            "SELECT {} FROM evaluations WHERE proposal_id = $1 ORDER BY created_at",
            EVALUATION_COLUMNS
        );
        client.query(sql.as_str(), &[&proposal_id]).await?.iter().map(evaluation_from_row).collect()
    }

    async fn list_evaluations_for_opportunity(&self, opportunity_id: Uuid) -> StoreResult<Vec<Evaluation>> {
        let client = self.client().await?;
        let sql = format!(
            "SELECT {} FROM evaluations WHERE opportunity_id = $1 ORDER BY created_at",
            EVALUATION_COLUMNS
        );
        client.query(sql.as_str(), &[&opportunity_id]).await?.iter().map(evaluation_from_row).collect()
    }

    async fn update_evaluation(&self, evaluation: Evaluation) -> StoreResult<Evaluation> {
        let client = self.client().await?;
        let affected = client
            .execute(
                UPDATE_EVALUATION,
                &[
                    &evaluation.id,
                    &evaluation.status.as_str(),
                    &Json(&evaluation.scores),
                    &evaluation.updated_at,
                ],
            )
            .await?;
        expect_one(affected, "evaluation")?;
        Ok(evaluation)
    }

    async fn add_subscriber(&self, subscriber: Subscriber) -> StoreResult<Subscriber> {
        let client = self.client().await?;
        client
            .execute(
                INSERT_SUBSCRIBER,
                &[&subscriber.opportunity_id, &subscriber.user_id, &subscriber.created_at],
            )
            .await?;
        let row = client
            .query_one(FIND_SUBSCRIBER, &[&subscriber.opportunity_id, &subscriber.user_id])
            .await?;
        subscriber_from_row(&row)
    }

    async fn remove_subscriber(&self, opportunity_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        let client = self.client().await?;
        Ok(client.execute(DELETE_SUBSCRIBER, &[&opportunity_id, &user_id]).await? > 0)
    }

    async fn increment_counter(&self, name: &str) -> StoreResult<i64> {
        let client = self.client().await?;
        let row = client.query_one(INCREMENT_COUNTER, &[&name]).await?;
        Ok(row.try_get("count")?)
    }

    async fn get_counters(&self, names: &[String]) -> StoreResult<Vec<Counter>> {
        let client = self.client().await?;
        let rows = client.query(GET_COUNTERS, &[&names]).await?;
        let mut found = Vec::with_capacity(rows.len());
        for row in &rows {
            found.push(Counter { name: row.try_get("name")?, count: row.try_get("count")? });
        }
        Ok(names
            .iter()
            .map(|name| {
                found
                    .iter()
                    .find(|c| &c.name == name)
                    .cloned()
                    .unwrap_or_else(|| Counter { name: name.clone(), count: 0 })
            })
            .collect())
    }
}
