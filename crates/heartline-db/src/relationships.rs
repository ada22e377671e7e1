use chrono::Utc;
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use uuid::Uuid;

use heartline_types::models::{Relationship, RelationshipState};

use crate::models::{RELATIONSHIP_COLUMNS, RelationshipRow};
use crate::{Database, Result, StoreError, format_ts};

impl Database {
    /// The record for the unordered pair, whichever side created it.
    pub fn find_relationship(&self, a: Uuid, b: Uuid) -> Result<Option<Relationship>> {
        let (lo, hi) = Relationship::pair_key(a, b);
        self.with_conn(|conn| {
            query_one(
                conn,
                &format!("SELECT {RELATIONSHIP_COLUMNS} FROM relationships WHERE user_lo = ?1 AND user_hi = ?2"),
                params![lo.to_string(), hi.to_string()],
            )
        })
    }

    pub fn get_relationship(&self, id: Uuid) -> Result<Option<Relationship>> {
        self.with_conn(|conn| {
            query_one(
                conn,
                &format!("SELECT {RELATIONSHIP_COLUMNS} FROM relationships WHERE id = ?1"),
                params![id.to_string()],
            )
        })
    }

    /// Insert a new record. Fails with `DuplicateRelationship` if the pair
    /// already has one; the caller should re-fetch and retry as an update.
    pub fn create_relationship(&self, rel: &Relationship) -> Result<()> {
        let (lo, hi) = Relationship::pair_key(rel.user1, rel.user2);
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO relationships
                    (id, user1, user2, user_lo, user_hi, state, initiator,
                     meeting_place, place_chosen_by, version, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    rel.id.to_string(),
                    rel.user1.to_string(),
                    rel.user2.to_string(),
                    lo.to_string(),
                    hi.to_string(),
                    rel.state.as_str(),
                    rel.initiator.to_string(),
                    rel.meeting_place.map(|id| id.to_string()),
                    rel.place_chosen_by.map(|id| id.to_string()),
                    rel.version,
                    format_ts(&rel.created_at),
                    format_ts(&rel.updated_at),
                ],
            );

            match inserted {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    Err(StoreError::DuplicateRelationship)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Compare-and-swap write: succeeds only if the stored version still
    /// equals `rel.version`. Returns the record as stored (version bumped).
    pub fn save_relationship(&self, rel: &Relationship) -> Result<Relationship> {
        let updated_at = Utc::now();
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE relationships
                 SET user1 = ?1, user2 = ?2, state = ?3, initiator = ?4,
                     meeting_place = ?5, place_chosen_by = ?6,
                     version = version + 1, updated_at = ?7
                 WHERE id = ?8 AND version = ?9",
                params![
                    rel.user1.to_string(),
                    rel.user2.to_string(),
                    rel.state.as_str(),
                    rel.initiator.to_string(),
                    rel.meeting_place.map(|id| id.to_string()),
                    rel.place_chosen_by.map(|id| id.to_string()),
                    format_ts(&updated_at),
                    rel.id.to_string(),
                    rel.version,
                ],
            )?;

            if changed == 0 {
                let exists: Option<i64> = conn
                    .query_row(
                        "SELECT version FROM relationships WHERE id = ?1",
                        [rel.id.to_string()],
                        |row| row.get(0),
                    )
                    .optional()?;
                return Err(match exists {
                    Some(_) => StoreError::StaleRelationship,
                    None => StoreError::NotFound("relationship"),
                });
            }

            Ok(Relationship {
                version: rel.version + 1,
                updated_at,
                ..rel.clone()
            })
        })
    }

    /// Matched relationships the user is a party of, newest first.
    pub fn list_matches(&self, user_id: Uuid) -> Result<Vec<Relationship>> {
        self.with_conn(|conn| {
            query_many(
                conn,
                &format!(
                    "SELECT {RELATIONSHIP_COLUMNS} FROM relationships
                     WHERE (user1 = ?1 OR user2 = ?1) AND state = ?2
                     ORDER BY created_at DESC"
                ),
                params![user_id.to_string(), RelationshipState::Matched.as_str()],
            )
        })
    }

    /// Outstanding heart requests addressed to the user, most recent first,
    /// with the total count for pagination.
    pub fn received_hearts(
        &self,
        user_id: Uuid,
        offset: u64,
        limit: u32,
    ) -> Result<(Vec<Relationship>, u64)> {
        let uid = user_id.to_string();
        let nudge = RelationshipState::NudgeSent.as_str();
        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM relationships WHERE user2 = ?1 AND state = ?2",
                params![uid, nudge],
                |row| row.get(0),
            )?;

            let page = query_many(
                conn,
                &format!(
                    "SELECT {RELATIONSHIP_COLUMNS} FROM relationships
                     WHERE user2 = ?1 AND state = ?2
                     ORDER BY updated_at DESC
                     LIMIT ?3 OFFSET ?4"
                ),
                params![uid, nudge, i64::from(limit), offset as i64],
            )?;

            Ok((page, total.max(0) as u64))
        })
    }
}

fn query_one(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Option<Relationship>> {
    let mut stmt = conn.prepare(sql)?;
    let row = stmt.query_row(params, RelationshipRow::from_row).optional()?;
    row.map(Relationship::try_from).transpose()
}

fn query_many(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Relationship>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, RelationshipRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(Relationship::try_from).collect()
}
