use entities::{portfolio_snapshot, position, position_snapshot};
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_portfolio_snapshots_timestamp")
                    .table(portfolio_snapshot::Entity)
                    .col(portfolio_snapshot::Column::Timestamp)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_position_snapshots_position_timestamp")
                    .table(position_snapshot::Entity)
                    .col(position_snapshot::Column::PositionId)
                    .col(position_snapshot::Column::Timestamp)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_positions_status")
                    .table(position::Entity)
                    .col(position::Column::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for name in [
            "idx_positions_status",
            "idx_position_snapshots_position_timestamp",
            "idx_portfolio_snapshots_timestamp",
        ] {
            manager
                .drop_index(Index::drop().if_exists().name(name).to_owned())
                .await?;
        }
        Ok(())
    }
}
