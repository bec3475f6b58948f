use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_query::Expr;

use crate::m20260301_000001_create_users_and_categories::{Categories, Users};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Proposals::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Proposals::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Proposals::Title).string_len(200).not_null())
                    .col(ColumnDef::new(Proposals::Description).text().not_null())
                    .col(ColumnDef::new(Proposals::CategoryId).integer().not_null())
                    .col(ColumnDef::new(Proposals::AuthorId).big_integer().not_null())
                    .col(
                        ColumnDef::new(Proposals::Status)
                            .string_len(24)
                            .not_null()
                            .default("active"),
                    )
                    .col(
                        ColumnDef::new(Proposals::VotesFor)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Proposals::VotesAgainst)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Proposals::VotesAbstain)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Proposals::WeightedFor)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Proposals::WeightedAgainst)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Proposals::ViewCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Proposals::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Proposals::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Proposals::ClosedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_proposals_category")
                            .from(Proposals::Table, Proposals::CategoryId)
                            .to(Categories::Table, Categories::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_proposals_author")
                            .from(Proposals::Table, Proposals::AuthorId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_proposals_status_created")
                    .table(Proposals::Table)
                    .col(Proposals::Status)
                    .col(Proposals::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_proposals_category")
                    .table(Proposals::Table)
                    .col(Proposals::CategoryId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_proposals_author")
                    .table(Proposals::Table)
                    .col(Proposals::AuthorId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Proposals::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
pub(crate) enum Proposals {
    Table,
    Id,
    Title,
    Description,
    CategoryId,
    AuthorId,
    Status,
    VotesFor,
    VotesAgainst,
    VotesAbstain,
    WeightedFor,
    WeightedAgainst,
    ViewCount,
    CreatedAt,
    UpdatedAt,
    ClosedAt,
}
