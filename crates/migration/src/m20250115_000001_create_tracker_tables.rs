use entities::{
    catalyst, cluster, market, portfolio_snapshot, position, position_snapshot,
    sea_orm_active_enums,
};
use sea_orm_migration::prelude::extension::postgres::Type;
use sea_orm_migration::{prelude::*, sea_orm::Schema};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db_backend = manager.get_database_backend();
        let schema = Schema::new(db_backend);

        // ----- Enums (the bot may have created them already) -----
        let enums = [
            schema.create_enum_from_active_enum::<sea_orm_active_enums::PositionDirection>(),
            schema.create_enum_from_active_enum::<sea_orm_active_enums::PositionStatus>(),
            schema.create_enum_from_active_enum::<sea_orm_active_enums::ThesisStatus>(),
        ];
        for stmt in enums {
            if let Err(err) = manager.create_type(stmt).await
                && !is_duplicate_type_error(&err)
            {
                return Err(err);
            }
        }

        // ----- Tables (parents first) -----
        manager
            .create_table(
                schema
                    .create_table_from_entity(cluster::Entity)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(market::Entity)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(catalyst::Entity)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(position::Entity)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(position_snapshot::Entity)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(portfolio_snapshot::Entity)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ----- Drop tables in reverse order -----
        manager
            .drop_table(Table::drop().table(portfolio_snapshot::Entity).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(position_snapshot::Entity).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(position::Entity).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(catalyst::Entity).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(market::Entity).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(cluster::Entity).to_owned())
            .await?;

        for name in ["thesis_status", "position_status", "position_direction"] {
            manager
                .drop_type(Type::drop().if_exists().name(Alias::new(name)).to_owned())
                .await?;
        }

        Ok(())
    }
}

fn is_duplicate_type_error(err: &DbErr) -> bool {
    err.to_string().contains("already exists")
}
