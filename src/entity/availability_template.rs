//! Availability template entity model.
//!
//! A template describes the weekly rhythm a mentor is usually available in.
//! Applying it over a date range opens AVAILABLE trial sessions.

use sea_orm::entity::prelude::*;

/// Sea-ORM entity model representing a mentor's weekly availability pattern.
///
/// The per-weekday windows live in `weekly_pattern` as a MessagePack blob;
/// use [`crate::model::AvailabilityTemplate`] for the decoded form.
///
/// # Database Schema
///
/// | Column           | Type        | Description                               |
/// |------------------|-------------|-------------------------------------------|
/// | id               | BIGINT (PK) | allocator-assigned                        |
/// | mentor_id        | BIGINT      | owner                                     |
/// | template_name    | VARCHAR     | display name, copied onto generated slots |
/// | weekly_pattern   | BLOB/BYTEA  | MessagePack `Vec<DailyAvailability>`      |
/// | is_default       | BOOLEAN     | unique per mentor while true              |
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "availability_templates")]
pub struct Model {
    /// Identifier minted from the `availabilityTemplates` counter.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,

    /// The mentor who owns the template. Every read and write is scoped by it.
    pub mentor_id: i64,

    /// Display name. Generated sessions record it in their
    /// `availability_template` column.
    pub template_name: String,

    /// Optional free-form description.
    pub description: Option<String>,

    /// MessagePack-encoded `Vec<DailyAvailability>`.
    ///
    /// Stored as a binary blob (`BYTEA` in PostgreSQL) so the nested
    /// weekday windows round-trip without a child table.
    pub weekly_pattern: Vec<u8>,

    /// Session length for windows that do not set their own.
    pub default_duration_minutes: i32,

    /// Session medium copied onto generated sessions.
    pub default_session_type: String,

    /// Buffer copied onto generated sessions.
    pub buffer_time_minutes: i32,

    /// Preparation time copied onto generated sessions.
    pub preparation_time_minutes: i32,

    /// Rescheduling flag copied onto generated sessions.
    pub allow_rescheduling: bool,

    /// Reschedule lead time copied onto generated sessions.
    pub max_rescheduling_hours: i32,

    /// Confirmation flag copied onto generated sessions.
    pub require_confirmation: bool,

    /// At most one template per mentor has this set. A partial unique index
    /// enforces it.
    pub is_default: bool,

    /// Inactive templates are kept but not listed.
    pub is_active: bool,
}

/// Required enum for Sea-ORM entity relations.
///
/// This entity doesn't have any declared relations, so this enum is empty.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

/// Default behavior implementation for availability template active models.
impl ActiveModelBehavior for ActiveModel {}
