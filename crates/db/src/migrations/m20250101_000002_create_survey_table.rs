//! Create survey table migration.

use sea_orm_migration::prelude::*;

use super::m20250101_000001_create_user_table::User;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Survey::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Survey::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(Survey::UserId).string_len(32).not_null())
                    .col(ColumnDef::new(Survey::Title).string_len(256).not_null())
                    .col(ColumnDef::new(Survey::Description).text().not_null())
                    .col(ColumnDef::new(Survey::Img).string_len(1024))
                    .col(ColumnDef::new(Survey::Status).string_len(16).not_null())
                    .col(ColumnDef::new(Survey::SurveyType).integer().not_null().default(0))
                    .col(ColumnDef::new(Survey::DailyLimit).integer().not_null().default(0))
                    .col(ColumnDef::new(Survey::SumLimit).integer().not_null().default(0))
                    .col(ColumnDef::new(Survey::Verify).boolean().not_null().default(false))
                    .col(ColumnDef::new(Survey::Num).integer().not_null().default(0))
                    .col(ColumnDef::new(Survey::StartTime).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Survey::Deadline).timestamp_with_time_zone().not_null())
                    .col(
                        ColumnDef::new(Survey::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Survey::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_survey_user")
                            .from(Survey::Table, Survey::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_survey_user_id")
                    .table(Survey::Table)
                    .col(Survey::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Survey::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Survey {
    Table,
    Id,
    UserId,
    Title,
    Description,
    Img,
    Status,
    SurveyType,
    DailyLimit,
    SumLimit,
    Verify,
    Num,
    StartTime,
    Deadline,
    CreatedAt,
    UpdatedAt,
}
