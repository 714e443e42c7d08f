//! Background task that closes opportunities once their deadline passes
//!
//! A closed opportunity enters its program's first evaluation stage and
//! every submitted proposal moves under review with it.

use crate::auth::UserType;
use crate::db::{ChangeSet, RecordChange, Store, StoreResult};
use crate::lifecycle::{OpportunityStatus, ProposalStatus};
use crate::models::Opportunity;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

const CLOSED_NOTE: &str = "This opportunity has closed.";

/// Close every published opportunity whose deadline is at or before `now`.
///
/// Returns how many opportunities were closed. Each one is committed on its
/// own; a failed commit is logged and the rest still close.
pub async fn close_due_opportunities(store: &dyn Store, now: DateTime<Utc>) -> StoreResult<usize> {
    let due: Vec<_> = store
        .list_opportunities(None)
        .await?
        .into_iter()
        .filter(|o| o.status.is_published() && o.proposal_deadline <= now)
        .collect();

    let mut closed = 0;
    for opportunity in due {
        let id = opportunity.id;
        match close_opportunity(store, opportunity, now).await {
            Ok(true) => closed += 1,
            Ok(false) => {}
            Err(e) => error!("❌ Failed to close opportunity {}: {}", id, e),
        }
    }

    Ok(closed)
}

async fn close_opportunity(store: &dyn Store, mut opportunity: Opportunity, now: DateTime<Utc>) -> StoreResult<bool> {
    let program = opportunity.program;
    let from = opportunity.status.as_str();
    let to = OpportunityStatus::first_evaluation_stage(program);
    let Some(entry) = opportunity.move_to(to, None, Some(CLOSED_NOTE.to_string()), now) else {
        return Ok(false);
    };

    let mut changes = ChangeSet::opportunity(RecordChange::with_history(from, opportunity.clone(), entry));
    let submitted = ProposalStatus::submitted(program);
    for mut proposal in store.list_proposals_for_opportunity(opportunity.id).await? {
        if proposal.status != submitted {
            continue;
        }
        let review = ProposalStatus::first_review(program);
        if let Some(entry) = proposal.move_to(review, UserType::Admin, false, None, None, now) {
            changes.proposals.push(RecordChange::with_history(submitted.as_str(), proposal, entry));
        }
    }

    let moved = changes.proposals.len();
    store.commit(changes).await?;
    info!(
        "🔒 Closed {} opportunity '{}' with {} proposals under review",
        program, opportunity.title, moved
    );
    Ok(true)
}

/// Run [`close_due_opportunities`] every `interval` until the runtime stops
pub fn spawn(store: Arc<dyn Store>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match close_due_opportunities(store.as_ref(), Utc::now()).await {
                Ok(0) => debug!("No opportunities due for closing"),
                Ok(count) => info!("Closed {} opportunities", count),
                Err(e) => error!("❌ Closing opportunities failed: {}", e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::lifecycle::{CwuProposalStatus, Program};
    use crate::models::opportunity::fixtures;
    use crate::models::{Proposal, ProposalDetails, ProposalScores};
    use chrono::Duration as ChronoDuration;
    use uuid::Uuid;

    fn proposal(opportunity_id: Uuid, status: ProposalStatus) -> Proposal {
        let now = Utc::now();
        Proposal {
            id: Uuid::new_v4(),
            program: Program::CodeWithUs,
            opportunity_id,
            organization_id: None,
            status,
            details: ProposalDetails::CodeWithUs {
                proposal_text: "We will build it.".into(),
                additional_comments: String::new(),
            },
            scores: ProposalScores::default(),
            history: Vec::new(),
            submitted_at: Some(now),
            created_by: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_closes_only_due_published_opportunities() {
        let store = MemoryStore::new();
        let author = Uuid::new_v4();
        let published = OpportunityStatus::published(Program::CodeWithUs);

        let due = store
            .insert_opportunity(fixtures::opportunity(Program::CodeWithUs, published, author))
            .await
            .unwrap();
        let draft = store
            .insert_opportunity(fixtures::opportunity(
                Program::CodeWithUs,
                OpportunityStatus::draft(Program::CodeWithUs),
                author,
            ))
            .await
            .unwrap();

        let submitted = store
            .insert_proposal(proposal(due.id, ProposalStatus::submitted(Program::CodeWithUs)))
            .await
            .unwrap();
        let drafted = store
            .insert_proposal(proposal(due.id, ProposalStatus::draft(Program::CodeWithUs)))
            .await
            .unwrap();

        // Nothing is due yet
        assert_eq!(close_due_opportunities(&store, Utc::now()).await.unwrap(), 0);

        let later = Utc::now() + ChronoDuration::days(30);
        assert_eq!(close_due_opportunities(&store, later).await.unwrap(), 1);

        let closed = store.find_opportunity(due.id).await.unwrap().unwrap();
        assert_eq!(closed.status, OpportunityStatus::first_evaluation_stage(Program::CodeWithUs));
        assert_eq!(closed.history.last().and_then(|h| h.note.as_deref()), Some(CLOSED_NOTE));

        let untouched = store.find_opportunity(draft.id).await.unwrap().unwrap();
        assert_eq!(untouched.status, OpportunityStatus::draft(Program::CodeWithUs));

        let reviewed = store.find_proposal(submitted.id).await.unwrap().unwrap();
        assert_eq!(reviewed.status, ProposalStatus::CodeWithUs(CwuProposalStatus::UnderReview));
        let still_draft = store.find_proposal(drafted.id).await.unwrap().unwrap();
        assert_eq!(still_draft.status, ProposalStatus::draft(Program::CodeWithUs));

        // Running again finds nothing left to close
        assert_eq!(close_due_opportunities(&store, later).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_commit_leaves_other_opportunities_closing() {
        let store = MemoryStore::new();
        let author = Uuid::new_v4();
        let published = OpportunityStatus::published(Program::CodeWithUs);

        let stuck = store
            .insert_opportunity(fixtures::opportunity(Program::CodeWithUs, published, author))
            .await
            .unwrap();
        let other = store
            .insert_opportunity(fixtures::opportunity(Program::CodeWithUs, published, author))
            .await
            .unwrap();
        store.refuse_commits_for(stuck.id).await;

        let later = Utc::now() + ChronoDuration::days(30);
        assert_eq!(close_due_opportunities(&store, later).await.unwrap(), 1);

        let closed = store.find_opportunity(other.id).await.unwrap().unwrap();
        assert_eq!(closed.status, OpportunityStatus::first_evaluation_stage(Program::CodeWithUs));
        let still_open = store.find_opportunity(stuck.id).await.unwrap().unwrap();
        assert_eq!(still_open.status, published);
    }
}
