use sea_orm::Schema;
use sea_orm_migration::prelude::*;

use crate::entity::{availability_template, sequence, trial_session};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let schema = Schema::new(manager.get_database_backend());

        manager
            .create_table(
                schema
                    .create_table_from_entity(trial_session::Entity)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_trial_sessions_mentor_schedule")
                    .table(trial_session::Entity)
                    .col(trial_session::Column::MentorId)
                    .col(trial_session::Column::ScheduledDateTime)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_trial_sessions_parent")
                    .table(trial_session::Entity)
                    .col(trial_session::Column::ParentSessionId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(availability_template::Entity)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;
        // At most one default template per mentor.
        manager
            .create_index(
                Index::create()
                    .name("idx_availability_templates_mentor_default")
                    .table(availability_template::Entity)
                    .col(availability_template::Column::MentorId)
                    .unique()
                    .and_where(Expr::col(availability_template::Column::IsDefault).eq(true))
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(sequence::Entity)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(sequence::Entity).if_exists().to_owned())
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .table(availability_template::Entity)
                    .if_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(trial_session::Entity).if_exists().to_owned())
            .await
    }
}
