//! Per-key monotonic counters used to mint entity identifiers.

use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ConnectionTrait, EntityTrait, Set, TransactionTrait};
use tracing::{debug, info};

use crate::entity::sequence::{self, ActiveModel as SequenceActiveModel, Entity as SequenceEntity};
use crate::error::{backend, Result};

/// Counter key for trial session ids.
pub const TRIAL_SESSIONS: &str = "trialSessions";
/// Counter key for availability template ids.
pub const AVAILABILITY_TEMPLATES: &str = "availabilityTemplates";

/// Counter key whose row guards the schedule of one mentor.
pub fn mentor_schedule_key(mentor_id: i64) -> String {
    format!("mentorSchedule:{mentor_id}")
}

/// Atomic increment-and-fetch over the `sequence` table.
///
/// Each call is an `INSERT ... ON CONFLICT DO UPDATE` on the counter row,
/// read back in the same transaction (or through `RETURNING` where the
/// backend has it), so concurrent callers never observe the same value and
/// a missing counter row is created on first use.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceAllocator;

impl SequenceAllocator {
    pub async fn next<C>(&self, db: &C, key: &str) -> Result<i64>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let txn = db.begin().await.map_err(backend)?;
        let counter = SequenceActiveModel {
            id: Set(key.to_owned()),
            seq: Set(1),
        };
        let model = SequenceEntity::insert(counter)
            .on_conflict(
                OnConflict::column(sequence::Column::Id)
                    .value(
                        sequence::Column::Seq,
                        Expr::col((SequenceEntity, sequence::Column::Seq)).add(1),
                    )
                    .to_owned(),
            )
            .exec_with_returning(&txn)
            .await
            .map_err(backend)?;
        txn.commit().await.map_err(backend)?;

        debug!(key, seq = model.seq, "allocated sequence value");
        Ok(model.seq)
    }

    /// Bumps the schedule counter of `mentor_id` inside the transaction `db`.
    ///
    /// The counter row stays write-locked until `db` commits or rolls back,
    /// so every other writer for the same mentor waits here before it reads
    /// the mentor's sessions.
    pub async fn lock_mentor<C>(&self, db: &C, mentor_id: i64) -> Result<()>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        self.next(db, &mentor_schedule_key(mentor_id)).await?;
        Ok(())
    }

    /// Last issued value for `key`, or `None` if the counter was never used.
    pub async fn current<C>(&self, db: &C, key: &str) -> Result<Option<i64>>
    where
        C: ConnectionTrait,
    {
        Ok(SequenceEntity::find_by_id(key.to_owned())
            .one(db)
            .await
            .map_err(backend)?
            .map(|row| row.seq))
    }

    /// Pre-seeds counters at zero, leaving existing counters untouched.
    pub async fn bootstrap<C>(&self, db: &C, keys: &[&str]) -> Result<()>
    where
        C: ConnectionTrait,
    {
        for key in keys {
            let counter = SequenceActiveModel {
                id: Set((*key).to_owned()),
                seq: Set(0),
            };
            let inserted = SequenceEntity::insert(counter)
                .on_conflict(OnConflict::column(sequence::Column::Id).do_nothing().to_owned())
                .exec_without_returning(db)
                .await
                .map_err(backend)?;
            if inserted > 0 {
                info!(key, "created sequence counter");
            }
        }
        Ok(())
    }
}
