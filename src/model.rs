//! Wire-level request and response types, and their conversions to and
//! from the stored entity models.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use sea_orm::Set;
use serde::{Deserialize, Serialize};

use crate::config::SlotPolicy;
use crate::entity::availability_template::{self, ActiveModel as TemplateActiveModel};
use crate::entity::trial_session::{self, SessionStatus};
use crate::error::{Error, Result};
use crate::recurrence::RecurrencePattern;

/// A trial session as exposed to collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialSession {
    pub id: i64,
    pub mentor_id: i64,
    pub mentee_id: Option<i64>,
    pub package_id: Option<i64>,
    pub scheduled_date_time: NaiveDateTime,
    pub duration_minutes: i32,
    pub status: SessionStatus,
    pub session_type: String,
    pub time_zone: String,
    pub buffer_time_minutes: i32,
    pub preparation_time_minutes: i32,
    pub is_recurring: bool,
    pub recurring_pattern: Option<RecurrencePattern>,
    pub recurring_end_date: Option<NaiveDateTime>,
    pub parent_session_id: Option<i64>,
    pub availability_template: Option<String>,
    pub session_title: Option<String>,
    pub session_description: Option<String>,
    pub allow_rescheduling: bool,
    pub max_rescheduling_hours: i32,
    pub require_confirmation: bool,
    pub special_instructions: Option<String>,
    pub meeting_link: Option<String>,
    pub meeting_id: Option<String>,
    pub meeting_password: Option<String>,
    pub mentee_email: Option<String>,
    pub mentee_name: Option<String>,
    pub mentee_phone: Option<String>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
}

impl From<trial_session::Model> for TrialSession {
    fn from(m: trial_session::Model) -> Self {
        Self {
            id: m.id,
            mentor_id: m.mentor_id,
            mentee_id: m.mentee_id,
            package_id: m.package_id,
            scheduled_date_time: m.scheduled_date_time,
            duration_minutes: m.duration_minutes,
            status: m.status,
            session_type: m.session_type,
            time_zone: m.time_zone,
            buffer_time_minutes: m.buffer_time_minutes,
            preparation_time_minutes: m.preparation_time_minutes,
            is_recurring: m.is_recurring,
            recurring_pattern: m.recurring_pattern,
            recurring_end_date: m.recurring_end_date,
            parent_session_id: m.parent_session_id,
            availability_template: m.availability_template,
            session_title: m.session_title,
            session_description: m.session_description,
            allow_rescheduling: m.allow_rescheduling,
            max_rescheduling_hours: m.max_rescheduling_hours,
            require_confirmation: m.require_confirmation,
            special_instructions: m.special_instructions,
            meeting_link: m.meeting_link,
            meeting_id: m.meeting_id,
            meeting_password: m.meeting_password,
            mentee_email: m.mentee_email,
            mentee_name: m.mentee_name,
            mentee_phone: m.mentee_phone,
            notes: m.notes,
            created_at: m.created_at,
            updated_at: m.updated_at,
            completed_at: m.completed_at,
        }
    }
}

/// Request to open a single bookable slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSlot {
    pub scheduled_date_time: NaiveDateTime,
    pub duration_minutes: Option<i32>,
    pub package_id: Option<i64>,
    pub session_title: Option<String>,
    pub session_description: Option<String>,
    pub special_instructions: Option<String>,
    /// Policy overrides; `None` takes the configured default policy.
    pub policy: Option<SlotPolicy>,
}

impl NewSlot {
    pub fn at(scheduled_date_time: NaiveDateTime) -> Self {
        Self {
            scheduled_date_time,
            duration_minutes: None,
            package_id: None,
            session_title: None,
            session_description: None,
            special_instructions: None,
            policy: None,
        }
    }

    pub fn with_duration(mut self, minutes: i32) -> Self {
        self.duration_minutes = Some(minutes);
        self
    }

    pub fn with_policy(mut self, policy: SlotPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn with_package(mut self, package_id: i64) -> Self {
        self.package_id = Some(package_id);
        self
    }
}

/// One time-of-day slot repeated on every selected day of a bulk request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkTimeSlot {
    pub start_time: NaiveTime,
    pub duration_minutes: i32,
    pub session_title: Option<String>,
    pub session_description: Option<String>,
}

impl BulkTimeSlot {
    pub fn new(start_time: NaiveTime, duration_minutes: i32) -> Self {
        Self {
            start_time,
            duration_minutes,
            session_title: None,
            session_description: None,
        }
    }
}

/// Recurrence metadata stamped onto sessions produced by a bulk request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkRecurrence {
    pub pattern: RecurrencePattern,
    pub weeks: u32,
}

/// Request to open slots over an inclusive date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkSlotRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub time_slots: Vec<BulkTimeSlot>,
    /// Weekdays to include; `None` includes every day.
    pub days_of_week: Option<Vec<Weekday>>,
    pub package_id: Option<i64>,
    pub policy: Option<SlotPolicy>,
    pub special_instructions: Option<String>,
    pub availability_template: Option<String>,
    pub recurrence: Option<BulkRecurrence>,
}

impl BulkSlotRequest {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate, time_slots: Vec<BulkTimeSlot>) -> Self {
        Self {
            start_date,
            end_date,
            time_slots,
            days_of_week: None,
            package_id: None,
            policy: None,
            special_instructions: None,
            availability_template: None,
            recurrence: None,
        }
    }

    pub fn on_days(mut self, days: impl IntoIterator<Item = Weekday>) -> Self {
        self.days_of_week = Some(days.into_iter().collect());
        self
    }

    pub fn with_policy(mut self, policy: SlotPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub(crate) fn includes(&self, day: Weekday) -> bool {
        self.days_of_week
            .as_ref()
            .map_or(true, |days| days.contains(&day))
    }
}

/// Contact details a mentee supplies when booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenteeContact {
    pub mentee_id: Option<i64>,
    pub email: String,
    pub name: Option<String>,
    pub phone: Option<String>,
}

impl MenteeContact {
    pub fn email(email: impl Into<String>) -> Self {
        Self {
            mentee_id: None,
            email: email.into(),
            name: None,
            phone: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Owner-initiated edit of a single session; `None` leaves a field as is.
///
/// Has no mentor field: a session's owner is fixed at creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionUpdate {
    pub scheduled_date_time: Option<NaiveDateTime>,
    pub duration_minutes: Option<i32>,
    pub session_type: Option<String>,
    pub meeting_link: Option<String>,
    pub meeting_id: Option<String>,
    pub meeting_password: Option<String>,
    pub notes: Option<String>,
}

/// Policy edit applied to many sessions at once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BulkSessionUpdate {
    pub session_type: Option<String>,
    pub allow_rescheduling: Option<bool>,
    pub max_rescheduling_hours: Option<i32>,
    pub require_confirmation: Option<bool>,
    pub special_instructions: Option<String>,
}

impl BulkSessionUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Outcome of a bulk, recurring or template generation request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationReport {
    pub created: Vec<TrialSession>,
    /// Candidate start times dropped because they overlapped an active session.
    pub skipped: Vec<NaiveDateTime>,
}

/// A bookable window inside one weekday of a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindow {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    /// Falls back to the template's default duration.
    pub session_duration_minutes: Option<i32>,
    pub session_title: Option<String>,
    pub session_description: Option<String>,
}

impl TimeWindow {
    pub fn new(start_time: NaiveTime, end_time: NaiveTime) -> Self {
        Self {
            start_time,
            end_time,
            session_duration_minutes: None,
            session_title: None,
            session_description: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyAvailability {
    pub day_of_week: Weekday,
    pub is_available: bool,
    pub time_slots: Vec<TimeWindow>,
}

impl DailyAvailability {
    pub fn open(day_of_week: Weekday, time_slots: Vec<TimeWindow>) -> Self {
        Self {
            day_of_week,
            is_available: true,
            time_slots,
        }
    }
}

/// A mentor's reusable weekly availability pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityTemplate {
    /// `None` when saving a new template.
    pub id: Option<i64>,
    /// Always overwritten with the acting mentor on save.
    pub mentor_id: Option<i64>,
    pub template_name: String,
    pub description: Option<String>,
    pub daily_availabilities: Vec<DailyAvailability>,
    pub default_duration_minutes: i32,
    pub policy: SlotPolicy,
    pub is_default: bool,
    pub is_active: bool,
}

impl AvailabilityTemplate {
    pub fn new(template_name: impl Into<String>, daily_availabilities: Vec<DailyAvailability>) -> Self {
        Self {
            id: None,
            mentor_id: None,
            template_name: template_name.into(),
            description: None,
            daily_availabilities,
            default_duration_minutes: 30,
            policy: SlotPolicy::default(),
            is_default: false,
            is_active: true,
        }
    }

    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    /// The open entry for `day`, if any.
    pub fn day(&self, day: Weekday) -> Option<&DailyAvailability> {
        self.daily_availabilities
            .iter()
            .find(|d| d.day_of_week == day && d.is_available)
    }

    pub(crate) fn to_active_model(&self, id: i64, mentor_id: i64) -> Result<TemplateActiveModel> {
        let weekly_pattern = rmp_serde::to_vec(&self.daily_availabilities)
            .map_err(|e| Error::Encode(e.to_string()))?;
        Ok(TemplateActiveModel {
            id: Set(id),
            mentor_id: Set(mentor_id),
            template_name: Set(self.template_name.clone()),
            description: Set(self.description.clone()),
            weekly_pattern: Set(weekly_pattern),
            default_duration_minutes: Set(self.default_duration_minutes),
            default_session_type: Set(self.policy.session_type.clone()),
            buffer_time_minutes: Set(self.policy.buffer_time_minutes),
            preparation_time_minutes: Set(self.policy.preparation_time_minutes),
            allow_rescheduling: Set(self.policy.allow_rescheduling),
            max_rescheduling_hours: Set(self.policy.max_rescheduling_hours),
            require_confirmation: Set(self.policy.require_confirmation),
            is_default: Set(self.is_default),
            is_active: Set(self.is_active),
        })
    }
}

impl TryFrom<availability_template::Model> for AvailabilityTemplate {
    type Error = Error;

    fn try_from(m: availability_template::Model) -> Result<Self> {
        let daily_availabilities =
            rmp_serde::from_slice(&m.weekly_pattern).map_err(|e| Error::Decode(e.to_string()))?;
        Ok(Self {
            id: Some(m.id),
            mentor_id: Some(m.mentor_id),
            template_name: m.template_name,
            description: m.description,
            daily_availabilities,
            default_duration_minutes: m.default_duration_minutes,
            policy: SlotPolicy {
                session_type: m.default_session_type,
                // Templates carry no zone of their own.
                time_zone: SlotPolicy::default().time_zone,
                buffer_time_minutes: m.buffer_time_minutes,
                preparation_time_minutes: m.preparation_time_minutes,
                allow_rescheduling: m.allow_rescheduling,
                max_rescheduling_hours: m.max_rescheduling_hours,
                require_confirmation: m.require_confirmation,
            },
            is_default: m.is_default,
            is_active: m.is_active,
        })
    }
}
