//! Status transitions of a single trial session.
//!
//! ```text
//! AVAILABLE --book--------> BOOKED
//! BOOKED    --cancel------> CANCELLED
//! BOOKED    --complete----> COMPLETED
//! BOOKED    --no_show-----> NO_SHOW
//! BOOKED    --reschedule--> BOOKED (new start)
//! AVAILABLE --delete        (never while BOOKED)
//! ```
//!
//! Every transition is one conditional `UPDATE ... WHERE status = <from>`;
//! a miss is resolved by re-reading the row, so two racing callers can
//! never both win.

use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, IntoActiveModel, QueryFilter, QueryOrder, Set, TransactionTrait, UpdateMany,
};
use tracing::{debug, info, instrument};

use crate::clock::Clock;
use crate::config::{SchedulingConfig, SlotPolicy};
use crate::conflict::{Candidate, ConflictDetector};
use crate::entity::trial_session::{
    self, ActiveModel as TrialSessionActiveModel, Entity as TrialSessionEntity, SessionStatus,
};
use crate::error::{backend, invalid_request, session_not_found, Error, ErrorCode, Result};
use crate::model::{BulkSessionUpdate, GenerationReport, MenteeContact, SessionUpdate};
use crate::recurrence::RecurrencePattern;
use crate::sequence::{SequenceAllocator, TRIAL_SESSIONS};

/// Everything needed to insert a new AVAILABLE session.
#[derive(Debug, Clone)]
pub(crate) struct SessionDraft {
    pub mentor_id: i64,
    pub package_id: Option<i64>,
    pub scheduled_date_time: NaiveDateTime,
    pub duration_minutes: i32,
    pub policy: SlotPolicy,
    pub session_title: Option<String>,
    pub session_description: Option<String>,
    pub special_instructions: Option<String>,
    pub availability_template: Option<String>,
    pub recurrence: Option<(RecurrencePattern, NaiveDateTime)>,
    pub parent_session_id: Option<i64>,
}

impl SessionDraft {
    pub fn new(mentor_id: i64, scheduled_date_time: NaiveDateTime, duration_minutes: i32, policy: SlotPolicy) -> Self {
        Self {
            mentor_id,
            package_id: None,
            scheduled_date_time,
            duration_minutes,
            policy,
            session_title: None,
            session_description: None,
            special_instructions: None,
            availability_template: None,
            recurrence: None,
            parent_session_id: None,
        }
    }

    /// Same draft moved to another start time.
    pub fn at(&self, scheduled_date_time: NaiveDateTime) -> Self {
        Self {
            scheduled_date_time,
            ..self.clone()
        }
    }

    pub fn candidate(&self) -> Candidate {
        Candidate::new(
            self.mentor_id,
            self.scheduled_date_time,
            self.duration_minutes,
            self.policy.buffer_time_minutes,
        )
    }

    pub fn validate(&self, config: &SchedulingConfig) -> Result<()> {
        validate_duration(config, self.duration_minutes)?;
        validate_policy(config, &self.policy)
    }

    fn into_active_model(self, id: i64, now: NaiveDateTime) -> TrialSessionActiveModel {
        let (pattern, end) = match self.recurrence {
            Some((pattern, end)) => (Some(pattern), Some(end)),
            None => (None, None),
        };
        TrialSessionActiveModel {
            id: Set(id),
            mentor_id: Set(self.mentor_id),
            mentee_id: Set(None),
            package_id: Set(self.package_id),
            scheduled_date_time: Set(self.scheduled_date_time),
            duration_minutes: Set(self.duration_minutes),
            status: Set(SessionStatus::Available),
            session_type: Set(self.policy.session_type),
            time_zone: Set(self.policy.time_zone),
            buffer_time_minutes: Set(self.policy.buffer_time_minutes),
            preparation_time_minutes: Set(self.policy.preparation_time_minutes),
            is_recurring: Set(pattern.is_some()),
            recurring_pattern: Set(pattern),
            recurring_end_date: Set(end),
            parent_session_id: Set(self.parent_session_id),
            availability_template: Set(self.availability_template),
            session_title: Set(self.session_title),
            session_description: Set(self.session_description),
            allow_rescheduling: Set(self.policy.allow_rescheduling),
            max_rescheduling_hours: Set(self.policy.max_rescheduling_hours),
            require_confirmation: Set(self.policy.require_confirmation),
            special_instructions: Set(self.special_instructions),
            meeting_link: Set(None),
            meeting_id: Set(None),
            meeting_password: Set(None),
            mentee_email: Set(None),
            mentee_name: Set(None),
            mentee_phone: Set(None),
            notes: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            completed_at: Set(None),
        }
    }
}

pub(crate) fn validate_duration(config: &SchedulingConfig, minutes: i32) -> Result<()> {
    if minutes < config.min_duration_minutes || minutes > config.max_duration_minutes {
        return Err(invalid_request(format!(
            "Duration must be between {} and {} minutes, got {minutes}",
            config.min_duration_minutes, config.max_duration_minutes
        )));
    }
    Ok(())
}

pub(crate) fn validate_policy(config: &SchedulingConfig, policy: &SlotPolicy) -> Result<()> {
    if policy.buffer_time_minutes < 0 || policy.buffer_time_minutes > config.max_buffer_minutes {
        return Err(invalid_request(format!(
            "Buffer must be between 0 and {} minutes, got {}",
            config.max_buffer_minutes, policy.buffer_time_minutes
        )));
    }
    if policy.preparation_time_minutes < 0 {
        return Err(invalid_request("Preparation time cannot be negative"));
    }
    if policy.max_rescheduling_hours < 0 {
        return Err(invalid_request("Reschedule window cannot be negative"));
    }
    if policy.session_type.trim().is_empty() {
        return Err(invalid_request("Session type is required"));
    }
    if policy.time_zone.trim().is_empty() {
        return Err(invalid_request("Time zone is required"));
    }
    Ok(())
}

fn unauthorized() -> Error {
    Error::rejected(
        ErrorCode::UnauthorizedAccess,
        "You can only access your own trial sessions",
    )
}

/// Status transitions and owner-scoped mutations of trial sessions.
#[derive(Debug, Clone, Copy)]
pub struct SessionStateMachine<'a> {
    conn: &'a DatabaseConnection,
    clock: &'a dyn Clock,
    config: &'a SchedulingConfig,
    detector: ConflictDetector,
    allocator: SequenceAllocator,
}

impl<'a> SessionStateMachine<'a> {
    pub fn new(conn: &'a DatabaseConnection, clock: &'a dyn Clock, config: &'a SchedulingConfig) -> Self {
        Self {
            conn,
            clock,
            config,
            detector: ConflictDetector,
            allocator: SequenceAllocator,
        }
    }

    pub async fn get(&self, id: i64) -> Result<trial_session::Model> {
        find(self.conn, id).await?.ok_or_else(|| session_not_found(id))
    }

    /// Loads the session and checks that `mentor_id` owns it.
    pub async fn validate_ownership(&self, id: i64, mentor_id: i64) -> Result<trial_session::Model> {
        let session = self.get(id).await?;
        if session.mentor_id != mentor_id {
            return Err(unauthorized());
        }
        Ok(session)
    }

    /// Opens a transaction holding the schedule lock of `mentor_id`.
    ///
    /// Every conflict check followed by a write runs inside one of these,
    /// so two writers for the same mentor never both see a free slot.
    pub(crate) async fn begin_for(&self, mentor_id: i64) -> Result<DatabaseTransaction> {
        let txn = self.conn.begin().await.map_err(backend)?;
        self.allocator.lock_mentor(&txn, mentor_id).await?;
        Ok(txn)
    }

    /// Inserts the draft inside `db` unless it overlaps an active session of
    /// the same mentor. The caller holds the mentor's schedule lock.
    pub(crate) async fn place_in<C>(&self, db: &C, draft: SessionDraft) -> Result<Option<trial_session::Model>>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        if self.detector.has_conflict(db, &draft.candidate()).await? {
            debug!(
                mentor_id = draft.mentor_id,
                start = %draft.scheduled_date_time,
                "skipping conflicting candidate"
            );
            return Ok(None);
        }

        let id = self.allocator.next(db, TRIAL_SESSIONS).await?;
        let session = draft
            .into_active_model(id, self.clock.now())
            .insert(db)
            .await
            .map_err(backend)?;
        Ok(Some(session))
    }

    /// Inserts the draft as an AVAILABLE session unless it overlaps an
    /// active session of the same mentor.
    pub(crate) async fn place_if_free(&self, draft: SessionDraft) -> Result<Option<trial_session::Model>> {
        let txn = self.begin_for(draft.mentor_id).await?;
        let placed = self.place_in(&txn, draft).await?;
        if placed.is_some() {
            txn.commit().await.map_err(backend)?;
        }
        Ok(placed)
    }

    /// Like [`place_if_free`](Self::place_if_free) but a conflict is an error.
    pub(crate) async fn place(&self, draft: SessionDraft) -> Result<trial_session::Model> {
        let start = draft.scheduled_date_time;
        self.place_if_free(draft).await?.ok_or_else(|| slot_conflict(start))
    }

    /// Places drafts of one mentor in order and in one transaction, keeping
    /// the ones that fit. A failure part way through leaves nothing behind.
    pub(crate) async fn place_all(&self, drafts: Vec<SessionDraft>) -> Result<GenerationReport> {
        let mut report = GenerationReport::default();
        let Some(first) = drafts.first() else {
            return Ok(report);
        };

        let txn = self.begin_for(first.mentor_id).await?;
        for draft in drafts {
            let start = draft.scheduled_date_time;
            match self.place_in(&txn, draft).await? {
                Some(session) => report.created.push(session.into()),
                None => report.skipped.push(start),
            }
        }
        txn.commit().await.map_err(backend)?;
        Ok(report)
    }

    /// AVAILABLE -> BOOKED. Exactly one of any number of concurrent callers
    /// succeeds; the rest get `SESSION_NOT_AVAILABLE`.
    #[instrument(skip(self, contact), fields(mentee = %contact.email))]
    pub async fn book(&self, id: i64, contact: &MenteeContact) -> Result<trial_session::Model> {
        if contact.email.trim().is_empty() {
            return Err(invalid_request("Mentee email is required"));
        }

        let update = TrialSessionEntity::update_many()
            .col_expr(trial_session::Column::Status, Expr::value(SessionStatus::Booked))
            .col_expr(trial_session::Column::MenteeId, Expr::value(contact.mentee_id))
            .col_expr(trial_session::Column::MenteeEmail, Expr::value(Some(contact.email.clone())))
            .col_expr(trial_session::Column::MenteeName, Expr::value(contact.name.clone()))
            .col_expr(trial_session::Column::MenteePhone, Expr::value(contact.phone.clone()))
            .col_expr(trial_session::Column::UpdatedAt, Expr::value(self.clock.now()));

        if !transition(self.conn, id, SessionStatus::Available, update).await? {
            return Err(self
                .miss(id, ErrorCode::SessionNotAvailable, "Session is not available for booking")
                .await);
        }

        info!(session_id = id, "session booked");
        self.get(id).await
    }

    /// BOOKED -> CANCELLED.
    #[instrument(skip(self))]
    pub async fn cancel(&self, id: i64) -> Result<trial_session::Model> {
        let update = TrialSessionEntity::update_many()
            .col_expr(trial_session::Column::Status, Expr::value(SessionStatus::Cancelled))
            .col_expr(trial_session::Column::UpdatedAt, Expr::value(self.clock.now()));
        self.finish_booked(id, update, "cancelled").await
    }

    /// BOOKED -> COMPLETED, stamping `completed_at` and replacing notes when given.
    #[instrument(skip(self, notes))]
    pub async fn complete(&self, id: i64, notes: Option<String>) -> Result<trial_session::Model> {
        let now = self.clock.now();
        let mut update = TrialSessionEntity::update_many()
            .col_expr(trial_session::Column::Status, Expr::value(SessionStatus::Completed))
            .col_expr(trial_session::Column::CompletedAt, Expr::value(Some(now)))
            .col_expr(trial_session::Column::UpdatedAt, Expr::value(now));
        if let Some(notes) = notes {
            update = update.col_expr(trial_session::Column::Notes, Expr::value(Some(notes)));
        }
        self.finish_booked(id, update, "completed").await
    }

    /// BOOKED -> NO_SHOW.
    #[instrument(skip(self))]
    pub async fn mark_no_show(&self, id: i64) -> Result<trial_session::Model> {
        let update = TrialSessionEntity::update_many()
            .col_expr(trial_session::Column::Status, Expr::value(SessionStatus::NoShow))
            .col_expr(trial_session::Column::UpdatedAt, Expr::value(self.clock.now()));
        self.finish_booked(id, update, "marked no-show").await
    }

    async fn finish_booked(
        &self,
        id: i64,
        update: UpdateMany<TrialSessionEntity>,
        outcome: &'static str,
    ) -> Result<trial_session::Model> {
        if !transition(self.conn, id, SessionStatus::Booked, update).await? {
            return Err(self
                .miss(id, ErrorCode::InvalidSessionStatus, "Only booked sessions can be closed")
                .await);
        }
        info!(session_id = id, outcome, "session closed");
        self.get(id).await
    }

    /// Moves a BOOKED session to `new_time` inside `db`, appending `note`.
    /// Fails with `INVALID_SESSION_STATUS` if the session left BOOKED or
    /// was moved by someone else since `session` was read.
    pub(crate) async fn move_booked<C>(
        &self,
        db: &C,
        session: &trial_session::Model,
        new_time: NaiveDateTime,
        note: String,
    ) -> Result<()>
    where
        C: ConnectionTrait,
    {
        let notes = match session.notes.as_deref() {
            Some(existing) if !existing.is_empty() => format!("{existing}\n{note}"),
            _ => note,
        };
        let moved = TrialSessionEntity::update_many()
            .col_expr(trial_session::Column::ScheduledDateTime, Expr::value(new_time))
            .col_expr(trial_session::Column::Notes, Expr::value(Some(notes)))
            .col_expr(trial_session::Column::UpdatedAt, Expr::value(self.clock.now()))
            .filter(trial_session::Column::ScheduledDateTime.eq(session.scheduled_date_time));
        if !transition(db, session.id, SessionStatus::Booked, moved).await? {
            return Err(Error::rejected(
                ErrorCode::InvalidSessionStatus,
                "Session changed while it was being rescheduled",
            ));
        }
        Ok(())
    }

    /// Owner edit of schedule, duration, type, meeting details and notes.
    /// A schedule change on an active session must not create an overlap.
    #[instrument(skip(self, update))]
    pub async fn update_with_ownership(
        &self,
        id: i64,
        mentor_id: i64,
        update: SessionUpdate,
    ) -> Result<trial_session::Model> {
        let txn = self.begin_for(mentor_id).await?;
        let session = find(&txn, id).await?.ok_or_else(|| session_not_found(id))?;
        if session.mentor_id != mentor_id {
            return Err(unauthorized());
        }

        if let Some(minutes) = update.duration_minutes {
            validate_duration(self.config, minutes)?;
        }
        let start = update.scheduled_date_time.unwrap_or(session.scheduled_date_time);
        let duration = update.duration_minutes.unwrap_or(session.duration_minutes);
        let reshaped = start != session.scheduled_date_time || duration != session.duration_minutes;
        if reshaped && session.status.is_active() {
            let candidate = Candidate::new(mentor_id, start, duration, session.buffer_time_minutes)
                .excluding(id);
            if self.detector.has_conflict(&txn, &candidate).await? {
                return Err(Error::rejected(
                    ErrorCode::TimeSlotConflict,
                    "The requested time slot conflicts with existing sessions",
                ));
            }
        }

        let mut active = session.into_active_model();
        if let Some(at) = update.scheduled_date_time {
            active.scheduled_date_time = Set(at);
        }
        if let Some(minutes) = update.duration_minutes {
            active.duration_minutes = Set(minutes);
        }
        if let Some(kind) = update.session_type {
            active.session_type = Set(kind);
        }
        if let Some(link) = update.meeting_link {
            active.meeting_link = Set(Some(link));
        }
        if let Some(meeting_id) = update.meeting_id {
            active.meeting_id = Set(Some(meeting_id));
        }
        if let Some(password) = update.meeting_password {
            active.meeting_password = Set(Some(password));
        }
        if let Some(notes) = update.notes {
            active.notes = Set(Some(notes));
        }
        active.updated_at = Set(self.clock.now());

        let updated = active.update(&txn).await.map_err(backend)?;
        txn.commit().await.map_err(backend)?;
        info!(session_id = id, "session updated by owner");
        Ok(updated)
    }

    /// Deletes a session owned by `mentor_id`; BOOKED sessions are kept.
    #[instrument(skip(self))]
    pub async fn delete_with_ownership(&self, id: i64, mentor_id: i64) -> Result<()> {
        let session = self.validate_ownership(id, mentor_id).await?;
        if session.status == SessionStatus::Booked {
            return Err(cannot_delete_booked());
        }

        let deleted = TrialSessionEntity::delete_many()
            .filter(trial_session::Column::Id.eq(id))
            .filter(trial_session::Column::MentorId.eq(mentor_id))
            .filter(trial_session::Column::Status.ne(SessionStatus::Booked))
            .exec(self.conn)
            .await
            .map_err(backend)?;
        if deleted.rows_affected == 0 {
            // Booked or removed between the read and the delete.
            return match find(self.conn, id).await? {
                Some(_) => Err(cannot_delete_booked()),
                None => Err(session_not_found(id)),
            };
        }

        info!(session_id = id, "session deleted");
        Ok(())
    }

    /// Applies `patch` to every session in `ids`, all owned by `mentor_id`,
    /// or to none of them.
    #[instrument(skip(self, patch))]
    pub async fn update_many(
        &self,
        ids: &[i64],
        patch: &BulkSessionUpdate,
        mentor_id: i64,
    ) -> Result<Vec<trial_session::Model>> {
        if patch.is_empty() {
            return Err(invalid_request("No fields to update"));
        }
        if let Some(hours) = patch.max_rescheduling_hours {
            if hours < 0 {
                return Err(invalid_request("Reschedule window cannot be negative"));
            }
        }
        let ids = distinct(ids)?;

        let txn = self.conn.begin().await.map_err(backend)?;
        owned_all(&txn, &ids, mentor_id).await?;

        let mut update = TrialSessionEntity::update_many()
            .col_expr(trial_session::Column::UpdatedAt, Expr::value(self.clock.now()));
        if let Some(kind) = &patch.session_type {
            update = update.col_expr(trial_session::Column::SessionType, Expr::value(kind.clone()));
        }
        if let Some(allow) = patch.allow_rescheduling {
            update = update.col_expr(trial_session::Column::AllowRescheduling, Expr::value(allow));
        }
        if let Some(hours) = patch.max_rescheduling_hours {
            update = update.col_expr(trial_session::Column::MaxReschedulingHours, Expr::value(hours));
        }
        if let Some(confirm) = patch.require_confirmation {
            update = update.col_expr(trial_session::Column::RequireConfirmation, Expr::value(confirm));
        }
        if let Some(text) = &patch.special_instructions {
            update = update.col_expr(
                trial_session::Column::SpecialInstructions,
                Expr::value(Some(text.clone())),
            );
        }
        update
            .filter(trial_session::Column::Id.is_in(ids.iter().copied()))
            .filter(trial_session::Column::MentorId.eq(mentor_id))
            .exec(&txn)
            .await
            .map_err(backend)?;

        let updated = TrialSessionEntity::find()
            .filter(trial_session::Column::Id.is_in(ids.iter().copied()))
            .order_by_asc(trial_session::Column::ScheduledDateTime)
            .all(&txn)
            .await
            .map_err(backend)?;
        txn.commit().await.map_err(backend)?;

        info!(count = updated.len(), mentor_id, "sessions updated in bulk");
        Ok(updated)
    }

    /// Deletes every session in `ids` or none: all must be owned by
    /// `mentor_id` and none may be BOOKED.
    #[instrument(skip(self))]
    pub async fn delete_many(&self, ids: &[i64], mentor_id: i64) -> Result<u64> {
        let ids = distinct(ids)?;

        let txn = self.conn.begin().await.map_err(backend)?;
        let sessions = owned_all(&txn, &ids, mentor_id).await?;
        if sessions.iter().any(|s| s.status == SessionStatus::Booked) {
            return Err(Error::rejected(
                ErrorCode::CannotDeleteBookedSession,
                "Cannot delete sessions that are already booked",
            ));
        }

        let deleted = TrialSessionEntity::delete_many()
            .filter(trial_session::Column::Id.is_in(ids.iter().copied()))
            .filter(trial_session::Column::MentorId.eq(mentor_id))
            .filter(trial_session::Column::Status.ne(SessionStatus::Booked))
            .exec(&txn)
            .await
            .map_err(backend)?;
        if deleted.rows_affected != ids.len() as u64 {
            // Dropping the transaction rolls the partial delete back.
            return Err(cannot_delete_booked());
        }
        txn.commit().await.map_err(backend)?;

        info!(count = deleted.rows_affected, mentor_id, "sessions deleted in bulk");
        Ok(deleted.rows_affected)
    }

    /// Error for a conditional update that touched no row.
    async fn miss(&self, id: i64, code: ErrorCode, detail: &str) -> Error {
        match find(self.conn, id).await {
            Ok(Some(current)) => Error::rejected(
                code,
                format!("{detail} (current status {:?})", current.status),
            ),
            Ok(None) => session_not_found(id),
            Err(err) => err,
        }
    }
}

pub(crate) fn slot_conflict(start: NaiveDateTime) -> Error {
    Error::rejected(
        ErrorCode::TimeSlotConflict,
        format!("The slot at {start} conflicts with existing sessions"),
    )
}

fn cannot_delete_booked() -> Error {
    Error::rejected(
        ErrorCode::CannotDeleteBookedSession,
        "Cannot delete a session that has been booked",
    )
}

pub(crate) async fn find<C>(db: &C, id: i64) -> Result<Option<trial_session::Model>>
where
    C: ConnectionTrait,
{
    TrialSessionEntity::find_by_id(id)
        .one(db)
        .await
        .map_err(backend)
}

/// Runs `update` against session `id` only while it is in status `from`.
async fn transition<C>(
    db: &C,
    id: i64,
    from: SessionStatus,
    update: UpdateMany<TrialSessionEntity>,
) -> Result<bool>
where
    C: ConnectionTrait,
{
    let result = update
        .filter(trial_session::Column::Id.eq(id))
        .filter(trial_session::Column::Status.eq(from))
        .exec(db)
        .await
        .map_err(backend)?;
    Ok(result.rows_affected == 1)
}

fn distinct(ids: &[i64]) -> Result<BTreeSet<i64>> {
    let ids: BTreeSet<i64> = ids.iter().copied().collect();
    if ids.is_empty() {
        return Err(invalid_request("At least one session id is required"));
    }
    Ok(ids)
}

/// Loads `ids`, failing with `UNAUTHORIZED_ACCESS` unless every one exists
/// and belongs to `mentor_id`.
async fn owned_all<C>(db: &C, ids: &BTreeSet<i64>, mentor_id: i64) -> Result<Vec<trial_session::Model>>
where
    C: ConnectionTrait,
{
    let sessions = TrialSessionEntity::find()
        .filter(trial_session::Column::Id.is_in(ids.iter().copied()))
        .filter(trial_session::Column::MentorId.eq(mentor_id))
        .all(db)
        .await
        .map_err(backend)?;
    if sessions.len() != ids.len() {
        return Err(Error::rejected(
            ErrorCode::UnauthorizedAccess,
            "Some sessions not found or access denied",
        ));
    }
    Ok(sessions)
}
