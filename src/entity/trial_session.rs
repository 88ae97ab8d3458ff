//! Trial session entity model.
//!
//! One row per bookable time slot. `mentor_id` is written once at insert and
//! no update path in this crate sets it again.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::recurrence::RecurrencePattern;

/// Booking state of a trial session.
///
/// `Available` is the initial state; `Completed`, `Cancelled` and `NoShow`
/// are terminal. Only `Available` and `Booked` sessions take part in
/// overlap checks.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    #[sea_orm(string_value = "AVAILABLE")]
    Available,
    #[sea_orm(string_value = "BOOKED")]
    Booked,
    #[sea_orm(string_value = "COMPLETED")]
    Completed,
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
    #[sea_orm(string_value = "NO_SHOW")]
    NoShow,
    #[sea_orm(string_value = "RESCHEDULED")]
    Rescheduled,
}

impl SessionStatus {
    /// Statuses that block other sessions of the same mentor.
    pub const ACTIVE: [SessionStatus; 2] = [SessionStatus::Available, SessionStatus::Booked];

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::NoShow)
    }
}

/// Sea-ORM entity model representing a trial session.
///
/// Every bookable slot a mentor opens becomes one row in the
/// `trial_sessions` table. The [`BookingOrchestrator`](crate::BookingOrchestrator)
/// creates the rows and every status change goes through the
/// [`SessionStateMachine`](crate::SessionStateMachine).
///
/// # Database Schema
///
/// | Column                | Type        | Description                             |
/// |-----------------------|-------------|-----------------------------------------|
/// | id                    | BIGINT (PK) | allocator-assigned, never reused        |
/// | mentor_id             | BIGINT      | owner, immutable after insert           |
/// | scheduled_date_time   | TIMESTAMP   | start of the session                    |
/// | duration_minutes      | INTEGER     | length of the session                   |
/// | buffer_time_minutes   | INTEGER     | padded on both sides for overlap checks |
/// | status                | VARCHAR(16) | see [`SessionStatus`]                   |
///
/// The remaining columns carry policy, recurrence, meeting and mentee
/// details and are documented per field.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "trial_sessions")]
pub struct Model {
    /// Identifier minted from the `trialSessions` counter of the
    /// [`SequenceAllocator`](crate::SequenceAllocator).
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,

    /// The mentor who opened the slot. Set once at insert; ownership checks
    /// compare against it.
    pub mentor_id: i64,

    /// Account id of the mentee who booked the slot, when they have one.
    pub mentee_id: Option<i64>,

    /// Mentorship package the slot was opened for.
    pub package_id: Option<i64>,

    /// Start of the session, in the mentor's wall-clock time.
    pub scheduled_date_time: DateTime,

    /// Length of the session in minutes.
    pub duration_minutes: i32,

    /// Current booking state.
    pub status: SessionStatus,

    /// Free-form medium, e.g. "Video Call".
    pub session_type: String,

    /// IANA zone name the mentor scheduled in. Informational only.
    pub time_zone: String,

    /// Minutes kept free before and after the session. Overlap checks pad
    /// the session by this amount on both sides.
    pub buffer_time_minutes: i32,

    /// Minutes the mentor wants to prepare. Not part of overlap checks.
    pub preparation_time_minutes: i32,

    /// Whether the slot belongs to a generated series.
    pub is_recurring: bool,

    /// Repetition rule of the series, if any.
    pub recurring_pattern: Option<RecurrencePattern>,

    /// Last instant the series may reach.
    pub recurring_end_date: Option<DateTime>,

    /// First session of the series this one was generated from.
    pub parent_session_id: Option<i64>,

    /// Name of the availability template that produced this slot.
    pub availability_template: Option<String>,

    /// Title shown to mentees.
    pub session_title: Option<String>,

    /// Longer description shown to mentees.
    pub session_description: Option<String>,

    /// Whether a booked session may be moved.
    pub allow_rescheduling: bool,

    /// Minimum lead time, in whole hours, a reschedule needs before the
    /// current start.
    pub max_rescheduling_hours: i32,

    /// Whether the mentor confirms bookings manually.
    pub require_confirmation: bool,

    /// Instructions for the mentee.
    pub special_instructions: Option<String>,

    /// Video meeting URL.
    pub meeting_link: Option<String>,

    /// Video meeting identifier.
    pub meeting_id: Option<String>,

    /// Video meeting passcode.
    pub meeting_password: Option<String>,

    /// Contact email of the booking mentee. Set together with the BOOKED
    /// status.
    pub mentee_email: Option<String>,

    /// Display name of the booking mentee.
    pub mentee_name: Option<String>,

    /// Phone number of the booking mentee.
    pub mentee_phone: Option<String>,

    /// Mentor notes. Reschedules append a line here.
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,

    /// When the row was inserted.
    pub created_at: DateTime,

    /// When the row last changed.
    pub updated_at: DateTime,

    /// When the session was marked COMPLETED.
    pub completed_at: Option<DateTime>,
}

impl Model {
    /// Buffer-padded half-open interval used for overlap checks.
    pub fn padded_interval(&self) -> crate::conflict::Interval {
        crate::conflict::Interval::padded(
            self.scheduled_date_time,
            self.duration_minutes,
            self.buffer_time_minutes,
        )
    }
}

/// Required enum for Sea-ORM entity relations.
///
/// `parent_session_id` and `mentor_id` are plain columns rather than
/// declared relations, so this enum is empty.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

/// Default behavior implementation for trial session active models.
///
/// Timestamps are set explicitly from the engine's clock, so no hooks are
/// needed.
impl ActiveModelBehavior for ActiveModel {}
