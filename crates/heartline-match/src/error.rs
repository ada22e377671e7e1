use heartline_db::StoreError;
use thiserror::Error;

/// An action that is not legal in the relationship's current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidTransition {
    #[error("Already swiped on this user")]
    AlreadySwiped,
    #[error("You already sent a heart request to this user")]
    AlreadyNudged,
    #[error("You are already matched with this user")]
    AlreadyMatched,
    #[error("This relationship is already unmatched")]
    AlreadyUnmatched,
    #[error("There is no heart request to decline")]
    NoPendingHeart,
    #[error("A heart request is outstanding; decline it instead")]
    HeartPending,
    #[error("You cannot act on yourself")]
    SelfAction,
}

impl InvalidTransition {
    pub fn code(&self) -> &'static str {
        match self {
            Self::AlreadySwiped => "already_swiped",
            Self::AlreadyNudged => "already_nudged",
            Self::AlreadyMatched => "already_matched",
            Self::AlreadyUnmatched => "already_unmatched",
            Self::NoPendingHeart => "no_pending_heart",
            Self::HeartPending => "heart_pending",
            Self::SelfAction => "self_action",
        }
    }
}

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("Relationship not found")]
    NotFound,

    #[error("Not authorized for this relationship")]
    NotAuthorized,

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    /// Concurrent writers kept invalidating our read; safe to retry.
    #[error("Relationship is being modified concurrently, try again")]
    Conflict,

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl MatchError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::NotAuthorized => "not_authorized",
            Self::InvalidTransition(t) => t.code(),
            Self::Conflict => "conflict",
            Self::Store(_) | Self::Join(_) => "internal",
        }
    }

    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Conflict
                | Self::Join(_)
                | Self::Store(StoreError::Sqlite(_) | StoreError::LockPoisoned)
        )
    }
}
