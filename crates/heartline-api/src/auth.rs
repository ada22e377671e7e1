use std::sync::Arc;

use uuid::Uuid;

use heartline_db::Database;
use heartline_match::MatchService;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub matches: MatchService,
    pub jwt_secret: String,
    /// Upper bound for `limit` on history reads.
    pub history_limit_max: u32,
}

impl AppStateInner {
    pub fn new(db: Arc<Database>, jwt_secret: String, history_limit_max: u32) -> AppState {
        Arc::new(Self {
            matches: MatchService::new(db.clone()),
            db,
            jwt_secret,
            history_limit_max: history_limit_max.max(1),
        })
    }
}

/// The verified caller, inserted by [`require_auth`](crate::middleware::require_auth).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub Uuid);
