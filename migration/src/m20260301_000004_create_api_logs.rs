use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_query::Expr;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ApiLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ApiLogs::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ApiLogs::Method).string_len(8).not_null())
                    .col(ColumnDef::new(ApiLogs::Path).string_len(512).not_null())
                    .col(ColumnDef::new(ApiLogs::StatusCode).integer().not_null())
                    .col(ColumnDef::new(ApiLogs::DurationMs).big_integer().not_null())
                    .col(ColumnDef::new(ApiLogs::UserId).big_integer().null())
                    .col(
                        ColumnDef::new(ApiLogs::ClientIp)
                            .string_len(45) // IPv6 max length
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ApiLogs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_api_logs_created")
                    .table(ApiLogs::Table)
                    .col(ApiLogs::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ApiLogs::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum ApiLogs {
    Table,
    Id,
    Method,
    Path,
    StatusCode,
    DurationMs,
    UserId,
    ClientIp,
    CreatedAt,
}
