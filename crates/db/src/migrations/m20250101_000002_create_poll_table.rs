//! Create poll table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Poll::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Poll::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(Poll::Token).string_len(32).not_null())
                    .col(ColumnDef::new(Poll::Title).string_len(128).not_null())
                    .col(ColumnDef::new(Poll::Description).text())
                    .col(ColumnDef::new(Poll::CreatorName).string_len(128))
                    .col(
                        ColumnDef::new(Poll::ResponseMode)
                            .string_len(16)
                            .not_null()
                            .default("single"),
                    )
                    .col(
                        ColumnDef::new(Poll::PollType)
                            .string_len(16)
                            .not_null()
                            .default("meeting"),
                    )
                    .col(
                        ColumnDef::new(Poll::RequireConsent)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Poll::DeadlineAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Poll::OrganizerCodeHash).string_len(256))
                    .col(ColumnDef::new(Poll::IsArchived).boolean().not_null().default(false))
                    .col(
                        ColumnDef::new(Poll::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: token (public lookup)
        manager
            .create_index(
                Index::create()
                    .name("idx_poll_token")
                    .table(Poll::Table)
                    .col(Poll::Token)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Poll::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Poll {
    Table,
    Id,
    Token,
    Title,
    Description,
    CreatorName,
    ResponseMode,
    PollType,
    RequireConsent,
    DeadlineAt,
    OrganizerCodeHash,
    IsArchived,
    CreatedAt,
}
