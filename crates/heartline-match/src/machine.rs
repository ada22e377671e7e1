use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use heartline_types::models::{Relationship, RelationshipState};

use crate::error::{InvalidTransition, MatchError};

/// Something one user does to (or within) a relationship.
///
/// Pair actions name the other user and may create the record; the rest
/// address an existing record by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Swipe { target: Uuid, location: Option<Uuid> },
    Pass { target: Uuid },
    HeartRequest { target: Uuid },
    Decline,
    Unmatch,
    SetMeetingPlace { location: Uuid },
}

impl Action {
    pub fn target(&self) -> Option<Uuid> {
        match self {
            Self::Swipe { target, .. } | Self::Pass { target } | Self::HeartRequest { target } => {
                Some(*target)
            }
            Self::Decline | Self::Unmatch | Self::SetMeetingPlace { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Swiped,
    Matched,
    Passed,
    HeartSent,
    Declined,
    Unmatched,
    MeetingPlaceSet,
}

impl Outcome {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Matched)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Swiped => "swiped",
            Self::Matched => "matched",
            Self::Passed => "passed",
            Self::HeartSent => "heart_sent",
            Self::Declined => "declined",
            Self::Unmatched => "unmatched",
            Self::MeetingPlaceSet => "meeting_place_set",
        }
    }
}

/// The record to write and what happened. `is_new` records must be created,
/// the others saved over the version they were derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub relationship: Relationship,
    pub is_new: bool,
    pub outcome: Outcome,
}

/// Decide the effect of `action` by `actor` on `current`.
///
/// Pure: the caller persists the returned record. On error nothing is to be
/// written.
pub fn apply(
    current: Option<&Relationship>,
    actor: Uuid,
    action: Action,
    now: DateTime<Utc>,
) -> Result<Transition, MatchError> {
    use RelationshipState::{Matched, NudgeSent, Pending, Unmatched};

    if action.target() == Some(actor) {
        return Err(InvalidTransition::SelfAction.into());
    }

    let Some(rel) = current else {
        return match action {
            Action::Swipe { target, .. } => Ok(create(actor, target, Pending, Outcome::Swiped, now)),
            Action::Pass { target } => Ok(create(actor, target, Unmatched, Outcome::Passed, now)),
            Action::HeartRequest { target } => {
                Ok(create(actor, target, NudgeSent, Outcome::HeartSent, now))
            }
            Action::Decline | Action::Unmatch | Action::SetMeetingPlace { .. } => {
                Err(MatchError::NotFound)
            }
        };
    };

    if !rel.is_party(actor) {
        return Err(MatchError::NotAuthorized);
    }
    if let Some(target) = action.target() {
        if rel.other_party(actor) != Some(target) {
            return Err(MatchError::NotAuthorized);
        }
    }

    let mut next = rel.clone();
    let outcome = match (action, rel.state) {
        // Swipe
        (Action::Swipe { location, .. }, Pending) if rel.user2 == actor => {
            next.state = Matched;
            if let Some(location) = location {
                next.meeting_place = Some(location);
                next.place_chosen_by = Some(actor);
            }
            Outcome::Matched
        }
        (Action::Swipe { .. }, Pending) => return Err(InvalidTransition::AlreadySwiped.into()),
        (Action::Swipe { .. }, Matched) => return Err(InvalidTransition::AlreadyMatched.into()),
        (Action::Swipe { .. }, Unmatched | NudgeSent) => {
            return Err(InvalidTransition::AlreadySwiped.into());
        }

        // Pass
        (Action::Pass { .. }, Pending | Matched | Unmatched | NudgeSent) => {
            next.state = Unmatched;
            Outcome::Passed
        }

        // Heart request
        (Action::HeartRequest { .. }, NudgeSent) if rel.user2 == actor => {
            next.state = Matched;
            Outcome::Matched
        }
        (Action::HeartRequest { .. }, NudgeSent) => {
            return Err(InvalidTransition::AlreadyNudged.into());
        }
        (Action::HeartRequest { .. }, Matched) => {
            return Err(InvalidTransition::AlreadyMatched.into());
        }
        (Action::HeartRequest { target }, Unmatched | Pending) => {
            // Reopen with the new direction.
            next.state = NudgeSent;
            next.user1 = actor;
            next.user2 = target;
            Outcome::HeartSent
        }

        // Decline
        (Action::Decline, NudgeSent) if rel.user2 == actor => {
            next.state = Unmatched;
            Outcome::Declined
        }
        (Action::Decline, NudgeSent) => return Err(MatchError::NotAuthorized),
        (Action::Decline, Pending | Matched | Unmatched) => {
            return Err(InvalidTransition::NoPendingHeart.into());
        }

        // Unmatch
        (Action::Unmatch, Matched | Pending) => {
            next.state = Unmatched;
            Outcome::Unmatched
        }
        (Action::Unmatch, Unmatched) => return Err(InvalidTransition::AlreadyUnmatched.into()),
        (Action::Unmatch, NudgeSent) => return Err(InvalidTransition::HeartPending.into()),

        // Meeting place: either party, any state
        (Action::SetMeetingPlace { location }, _) => {
            next.meeting_place = Some(location);
            next.place_chosen_by = Some(actor);
            Outcome::MeetingPlaceSet
        }
    };

    // Choosing a place is not a state change.
    if outcome != Outcome::MeetingPlaceSet {
        next.initiator = actor;
    }
    next.updated_at = now;

    Ok(Transition {
        relationship: next,
        is_new: false,
        outcome,
    })
}

fn create(
    actor: Uuid,
    target: Uuid,
    state: RelationshipState,
    outcome: Outcome,
    now: DateTime<Utc>,
) -> Transition {
    Transition {
        relationship: Relationship {
            id: Uuid::new_v4(),
            user1: actor,
            user2: target,
            state,
            initiator: actor,
            meeting_place: None,
            place_chosen_by: None,
            version: 0,
            created_at: now,
            updated_at: now,
        },
        is_new: true,
        outcome,
    }
}
