//! Create poll vote table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PollVote::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PollVote::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PollVote::PollId).string_len(32).not_null())
                    .col(ColumnDef::new(PollVote::OptionId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(PollVote::ParticipantName)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PollVote::ParticipantNameLower)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(ColumnDef::new(PollVote::ParticipantEmail).string_len(256))
                    .col(ColumnDef::new(PollVote::Comment).text())
                    .col(
                        ColumnDef::new(PollVote::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_poll_vote_poll")
                            .from(PollVote::Table, PollVote::PollId)
                            .to(Poll::Table, Poll::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_poll_vote_option")
                            .from(PollVote::Table, PollVote::OptionId)
                            .to(PollOption::Table, PollOption::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (poll_id, participant_email) - ballot lookup for emailed participants
        manager
            .create_index(
                Index::create()
                    .name("idx_poll_vote_poll_email")
                    .table(PollVote::Table)
                    .col(PollVote::PollId)
                    .col(PollVote::ParticipantEmail)
                    .to_owned(),
            )
            .await?;

        // Index: (poll_id, participant_name_lower) - ballot lookup by name
        manager
            .create_index(
                Index::create()
                    .name("idx_poll_vote_poll_name")
                    .table(PollVote::Table)
                    .col(PollVote::PollId)
                    .col(PollVote::ParticipantNameLower)
                    .to_owned(),
            )
            .await?;

        // Index: option_id (cascade deletes, per-option counts)
        manager
            .create_index(
                Index::create()
                    .name("idx_poll_vote_option_id")
                    .table(PollVote::Table)
                    .col(PollVote::OptionId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PollVote::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum PollVote {
    Table,
    Id,
    PollId,
    OptionId,
    ParticipantName,
    ParticipantNameLower,
    ParticipantEmail,
    Comment,
    CreatedAt,
}

#[derive(Iden)]
enum Poll {
    Table,
    Id,
}

#[derive(Iden)]
enum PollOption {
    Table,
    Id,
}
