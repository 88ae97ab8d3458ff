//! Named counter entity model.

use sea_orm::entity::prelude::*;

/// One row per logical counter key, holding the last issued value.
///
/// Besides the id counters, each mentor has a `mentorSchedule:<id>` row
/// that schedule writers bump to serialize with each other.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "sequence")]
pub struct Model {
    /// The counter key, e.g. `trialSessions`.
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub id: String,

    /// Last value handed out; zero for a bootstrapped counter.
    pub seq: i64,
}

/// Required enum for Sea-ORM entity relations.
///
/// This entity doesn't have any relations to other entities, so this enum is empty.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

/// Default behavior implementation for counter active models.
impl ActiveModelBehavior for ActiveModel {}
