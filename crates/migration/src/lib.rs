pub use sea_orm_migration::prelude::*;

mod m20250115_000001_create_tracker_tables;
mod m20250115_000002_snapshot_indexes;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250115_000001_create_tracker_tables::Migration),
            Box::new(m20250115_000002_snapshot_indexes::Migration),
        ]
    }
}
