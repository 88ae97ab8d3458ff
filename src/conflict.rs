//! Overlap detection between a candidate slot and a mentor's active sessions.
//!
//! Both sides are padded by their own buffer and compared as half-open
//! intervals, so back-to-back slots whose padded edges touch do not conflict.

use std::collections::BTreeSet;

use chrono::{Duration, NaiveDateTime};
use sea_orm::sea_query::{Alias, Expr};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use tracing::debug;

use crate::entity::trial_session::{self, Entity as TrialSessionEntity, SessionStatus};
use crate::error::{backend, Result};

/// Half-open time interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Interval {
    /// `[start - buffer, start + duration + buffer)`, saturating at the
    /// ends of the calendar.
    pub fn padded(start: NaiveDateTime, duration_minutes: i32, buffer_minutes: i32) -> Self {
        let buffer = Duration::minutes(i64::from(buffer_minutes.max(0)));
        let duration = Duration::minutes(i64::from(duration_minutes.max(0)));
        Self {
            start: start.checked_sub_signed(buffer).unwrap_or(NaiveDateTime::MIN),
            end: start
                .checked_add_signed(duration + buffer)
                .unwrap_or(NaiveDateTime::MAX),
        }
    }

    pub fn intersects(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// A slot that is about to be placed or moved.
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub mentor_id: i64,
    pub start: NaiveDateTime,
    pub duration_minutes: i32,
    pub buffer_minutes: i32,
    /// Session to ignore, e.g. the one being rescheduled.
    pub exclude: Option<i64>,
}

impl Candidate {
    pub fn new(mentor_id: i64, start: NaiveDateTime, duration_minutes: i32, buffer_minutes: i32) -> Self {
        Self {
            mentor_id,
            start,
            duration_minutes,
            buffer_minutes,
            exclude: None,
        }
    }

    pub fn excluding(mut self, session_id: i64) -> Self {
        self.exclude = Some(session_id);
        self
    }

    pub fn interval(&self) -> Interval {
        Interval::padded(self.start, self.duration_minutes, self.buffer_minutes)
    }
}

/// Ids of `sessions` that conflict with `candidate`, ignoring inactive ones.
pub fn conflicting_ids<'a>(
    candidate: &Candidate,
    sessions: impl IntoIterator<Item = &'a trial_session::Model>,
) -> BTreeSet<i64> {
    let wanted = candidate.interval();
    sessions
        .into_iter()
        .filter(|s| s.mentor_id == candidate.mentor_id)
        .filter(|s| s.status.is_active())
        .filter(|s| Some(s.id) != candidate.exclude)
        .filter(|s| s.padded_interval().intersects(&wanted))
        .map(|s| s.id)
        .collect()
}

/// Read-only conflict queries against the session table.
///
/// The SQL prefilter is sized from the sessions actually stored for the
/// mentor, so rows written under looser limits are still compared.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictDetector;

impl ConflictDetector {
    pub async fn has_conflict<C>(&self, db: &C, candidate: &Candidate) -> Result<bool>
    where
        C: ConnectionTrait,
    {
        Ok(!self.list_conflicts(db, candidate).await?.is_empty())
    }

    pub async fn list_conflicts<C>(&self, db: &C, candidate: &Candidate) -> Result<BTreeSet<i64>>
    where
        C: ConnectionTrait,
    {
        let sessions = self.nearby(db, candidate).await?;
        let ids = conflicting_ids(candidate, &sessions);
        if !ids.is_empty() {
            debug!(
                mentor_id = candidate.mentor_id,
                start = %candidate.start,
                conflicts = ?ids,
                "candidate overlaps existing sessions"
            );
        }
        Ok(ids)
    }

    /// Largest `duration + buffer` and largest buffer among the mentor's
    /// active sessions, or `None` when there are none.
    async fn reach<C>(&self, db: &C, mentor_id: i64) -> Result<Option<(Duration, Duration)>>
    where
        C: ConnectionTrait,
    {
        let span = Expr::col(trial_session::Column::DurationMinutes)
            .add(Expr::col(trial_session::Column::BufferTimeMinutes))
            .cast_as(Alias::new("BIGINT"));
        let buffer = Expr::col(trial_session::Column::BufferTimeMinutes).cast_as(Alias::new("BIGINT"));
        let row: Option<(Option<i64>, Option<i64>)> = TrialSessionEntity::find()
            .select_only()
            .column_as(Expr::expr(span).max(), "max_span")
            .column_as(Expr::expr(buffer).max(), "max_buffer")
            .filter(trial_session::Column::MentorId.eq(mentor_id))
            .filter(trial_session::Column::Status.is_in(SessionStatus::ACTIVE))
            .into_tuple()
            .one(db)
            .await
            .map_err(backend)?;

        Ok(match row {
            Some((Some(span), Some(buffer))) => Some((
                Duration::minutes(span.max(0)),
                Duration::minutes(buffer.max(0)),
            )),
            _ => None,
        })
    }

    /// Active sessions of the mentor whose start lies close enough to reach
    /// the candidate's padded interval.
    async fn nearby<C>(&self, db: &C, candidate: &Candidate) -> Result<Vec<trial_session::Model>>
    where
        C: ConnectionTrait,
    {
        let Some((look_behind, look_ahead)) = self.reach(db, candidate.mentor_id).await? else {
            return Ok(Vec::new());
        };

        let wanted = candidate.interval();
        let mut query = TrialSessionEntity::find()
            .filter(trial_session::Column::MentorId.eq(candidate.mentor_id))
            .filter(trial_session::Column::Status.is_in(SessionStatus::ACTIVE));
        if let Some(lower) = wanted.start.checked_sub_signed(look_behind) {
            query = query.filter(trial_session::Column::ScheduledDateTime.gt(lower));
        }
        if let Some(upper) = wanted.end.checked_add_signed(look_ahead) {
            query = query.filter(trial_session::Column::ScheduledDateTime.lt(upper));
        }
        if let Some(id) = candidate.exclude {
            query = query.filter(trial_session::Column::Id.ne(id));
        }
        query
            .order_by_asc(trial_session::Column::ScheduledDateTime)
            .all(db)
            .await
            .map_err(backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 9, 1)
            .and_then(|d| d.and_hms_opt(h, m, 0))
            .unwrap()
    }

    fn session(id: i64, start: NaiveDateTime, duration: i32, buffer: i32, status: SessionStatus) -> trial_session::Model {
        trial_session::Model {
            id,
            mentor_id: 7,
            mentee_id: None,
            package_id: None,
            scheduled_date_time: start,
            duration_minutes: duration,
            status,
            session_type: "Video Call".into(),
            time_zone: "UTC".into(),
            buffer_time_minutes: buffer,
            preparation_time_minutes: 10,
            is_recurring: false,
            recurring_pattern: None,
            recurring_end_date: None,
            parent_session_id: None,
            availability_template: None,
            session_title: None,
            session_description: None,
            allow_rescheduling: true,
            max_rescheduling_hours: 24,
            require_confirmation: false,
            special_instructions: None,
            meeting_link: None,
            meeting_id: None,
            meeting_password: None,
            mentee_email: None,
            mentee_name: None,
            mentee_phone: None,
            notes: None,
            created_at: start,
            updated_at: start,
            completed_at: None,
        }
    }

    #[test]
    fn padded_interval_is_symmetric() {
        let iv = Interval::padded(at(9, 0), 30, 5);
        assert_eq!(iv.start, at(8, 55));
        assert_eq!(iv.end, at(9, 35));
    }

    #[test]
    fn touching_padded_edges_do_not_conflict() {
        // [8:55, 9:35) and [9:35, 10:15)
        let existing = session(1, at(9, 0), 30, 5, SessionStatus::Available);
        let candidate = Candidate::new(7, at(9, 40), 30, 5);
        assert!(conflicting_ids(&candidate, [&existing]).is_empty());

        let closer = Candidate::new(7, at(9, 39), 30, 5);
        assert_eq!(conflicting_ids(&closer, [&existing]).into_iter().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn each_side_uses_its_own_buffer() {
        // Existing [8:30, 10:00) with a 30 minute buffer.
        let existing = session(1, at(9, 0), 30, 30, SessionStatus::Booked);
        let candidate = Candidate::new(7, at(10, 0), 30, 0);
        assert!(conflicting_ids(&candidate, [&existing]).is_empty());
        let candidate = Candidate::new(7, at(9, 55), 30, 0);
        assert!(!conflicting_ids(&candidate, [&existing]).is_empty());
    }

    #[test]
    fn history_and_excluded_sessions_never_block() {
        let cancelled = session(1, at(9, 0), 30, 5, SessionStatus::Cancelled);
        let completed = session(2, at(9, 0), 30, 5, SessionStatus::Completed);
        let no_show = session(3, at(9, 0), 30, 5, SessionStatus::NoShow);
        let moving = session(4, at(9, 0), 30, 5, SessionStatus::Booked);
        let candidate = Candidate::new(7, at(9, 10), 30, 5).excluding(4);
        assert!(conflicting_ids(&candidate, [&cancelled, &completed, &no_show, &moving]).is_empty());
    }

    #[test]
    fn other_mentors_are_ignored() {
        let mut theirs = session(1, at(9, 0), 30, 5, SessionStatus::Booked);
        theirs.mentor_id = 8;
        let candidate = Candidate::new(7, at(9, 0), 30, 5);
        assert!(conflicting_ids(&candidate, [&theirs]).is_empty());
    }

    #[test]
    fn padding_saturates_at_the_calendar_edges() {
        let iv = Interval::padded(NaiveDateTime::MAX, 30, 5);
        assert_eq!(iv.end, NaiveDateTime::MAX);
        let iv = Interval::padded(NaiveDateTime::MIN, 30, 5);
        assert_eq!(iv.start, NaiveDateTime::MIN);
    }
}
