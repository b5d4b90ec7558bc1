//! Create manage grant table migration.

use sea_orm_migration::prelude::*;

use super::m20250101_000001_create_user_table::User;
use super::m20250101_000002_create_survey_table::Survey;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Manage::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Manage::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(Manage::UserId).string_len(32).not_null())
                    .col(ColumnDef::new(Manage::SurveyId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(Manage::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_manage_user")
                            .from(Manage::Table, Manage::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_manage_survey")
                            .from(Manage::Table, Manage::SurveyId)
                            .to(Survey::Table, Survey::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: one grant per (user, survey)
        manager
            .create_index(
                Index::create()
                    .name("idx_manage_user_survey")
                    .table(Manage::Table)
                    .col(Manage::UserId)
                    .col(Manage::SurveyId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_manage_survey_id")
                    .table(Manage::Table)
                    .col(Manage::SurveyId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Manage::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Manage {
    Table,
    Id,
    UserId,
    SurveyId,
    CreatedAt,
}
