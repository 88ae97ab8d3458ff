pub use sea_orm_migration::prelude::*;

mod m20250901_000001_create_scheduling_tables;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    // Own migration table so the host application's migrator is untouched
    fn migration_table_name() -> sea_orm::DynIden {
        Alias::new("trial_sessions_seaorm_migrations").into_iden()
    }

    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20250901_000001_create_scheduling_tables::Migration)]
    }
}
