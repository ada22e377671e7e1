use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use heartline_db::{Database, StoreError};
use heartline_types::models::Relationship;

use crate::error::MatchError;
use crate::machine::{self, Action, Outcome};

/// How many times a transition is re-derived after losing a race.
const MAX_ATTEMPTS: usize = 5;

/// Largest page `received_hearts` will return.
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone)]
pub struct MatchOutcome {
    pub relationship: Relationship,
    pub outcome: Outcome,
}

/// Applies relationship actions on behalf of an authenticated user.
#[derive(Clone)]
pub struct MatchService {
    db: Arc<Database>,
}

#[derive(Debug, Clone, Copy)]
enum Lookup {
    Pair(Uuid),
    Id(Uuid),
}

impl MatchService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn swipe(
        &self,
        actor: Uuid,
        target: Uuid,
        location: Option<Uuid>,
    ) -> Result<MatchOutcome, MatchError> {
        self.run(actor, Lookup::Pair(target), Action::Swipe { target, location })
            .await
    }

    pub async fn pass(&self, actor: Uuid, target: Uuid) -> Result<MatchOutcome, MatchError> {
        self.run(actor, Lookup::Pair(target), Action::Pass { target }).await
    }

    pub async fn heart_request(&self, actor: Uuid, target: Uuid) -> Result<MatchOutcome, MatchError> {
        self.run(actor, Lookup::Pair(target), Action::HeartRequest { target })
            .await
    }

    pub async fn decline_heart(
        &self,
        actor: Uuid,
        relationship_id: Uuid,
    ) -> Result<MatchOutcome, MatchError> {
        self.run(actor, Lookup::Id(relationship_id), Action::Decline).await
    }

    pub async fn set_meeting_place(
        &self,
        actor: Uuid,
        relationship_id: Uuid,
        location: Uuid,
    ) -> Result<MatchOutcome, MatchError> {
        self.run(
            actor,
            Lookup::Id(relationship_id),
            Action::SetMeetingPlace { location },
        )
        .await
    }

    pub async fn unmatch(&self, actor: Uuid, relationship_id: Uuid) -> Result<MatchOutcome, MatchError> {
        self.run(actor, Lookup::Id(relationship_id), Action::Unmatch).await
    }

    pub async fn my_matches(&self, actor: Uuid) -> Result<Vec<Relationship>, MatchError> {
        let db = self.db.clone();
        Ok(tokio::task::spawn_blocking(move || db.list_matches(actor)).await??)
    }

    /// One page (1-based) of heart requests addressed to `actor`, plus the total.
    pub async fn received_hearts(
        &self,
        actor: Uuid,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<Relationship>, u64), MatchError> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        let offset = u64::from(page.max(1) - 1) * u64::from(limit);
        let db = self.db.clone();
        Ok(tokio::task::spawn_blocking(move || db.received_hearts(actor, offset, limit)).await??)
    }

    /// Look up the relationship a conversation id refers to, for callers
    /// that need to authorize against its parties.
    pub async fn relationship(&self, id: Uuid) -> Result<Relationship, MatchError> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || db.get_relationship(id))
            .await??
            .ok_or(MatchError::NotFound)
    }

    async fn run(&self, actor: Uuid, lookup: Lookup, action: Action) -> Result<MatchOutcome, MatchError> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || transition_with_retry(&db, actor, lookup, action)).await?
    }
}

/// Read, decide, write. A lost race (duplicate create or stale version)
/// means another action for the same pair landed first, so the decision is
/// re-derived from the fresh record.
fn transition_with_retry(
    db: &Database,
    actor: Uuid,
    lookup: Lookup,
    action: Action,
) -> Result<MatchOutcome, MatchError> {
    for attempt in 1..=MAX_ATTEMPTS {
        let current = match lookup {
            Lookup::Pair(target) => db.find_relationship(actor, target)?,
            Lookup::Id(id) => db.get_relationship(id)?,
        };

        let transition = machine::apply(current.as_ref(), actor, action, Utc::now())?;

        let written = if transition.is_new {
            db.create_relationship(&transition.relationship)
                .map(|()| transition.relationship.clone())
        } else {
            db.save_relationship(&transition.relationship)
        };

        match written {
            Ok(relationship) => {
                info!(
                    "{} {} relationship {} -> {}",
                    actor,
                    transition.outcome.as_str(),
                    relationship.id,
                    relationship.state
                );
                return Ok(MatchOutcome {
                    relationship,
                    outcome: transition.outcome,
                });
            }
            Err(StoreError::DuplicateRelationship | StoreError::StaleRelationship) => {
                debug!(
                    "{} lost a race on {:?} (attempt {}/{}), re-reading",
                    actor, lookup, attempt, MAX_ATTEMPTS
                );
            }
            Err(StoreError::NotFound(_)) => return Err(MatchError::NotFound),
            Err(e) => return Err(e.into()),
        }
    }

    warn!("{} gave up on {:?} after {} attempts", actor, lookup, MAX_ATTEMPTS);
    Err(MatchError::Conflict)
}
