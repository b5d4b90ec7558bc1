//! Create verification record table migration.

use sea_orm_migration::prelude::*;

use super::m20250101_000002_create_survey_table::Survey;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(RecordSheet::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(RecordSheet::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(RecordSheet::SurveyId).string_len(32).not_null())
                    .col(ColumnDef::new(RecordSheet::RespondentId).string_len(256).not_null())
                    .col(ColumnDef::new(RecordSheet::Name).string_len(256).not_null())
                    .col(ColumnDef::new(RecordSheet::College).string_len(256))
                    .col(ColumnDef::new(RecordSheet::UserType).string_len(64))
                    .col(ColumnDef::new(RecordSheet::Gender).string_len(16))
                    .col(
                        ColumnDef::new(RecordSheet::VerifiedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_record_sheet_survey")
                            .from(RecordSheet::Table, RecordSheet::SurveyId)
                            .to(Survey::Table, Survey::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: one record per (survey, respondent)
        manager
            .create_index(
                Index::create()
                    .name("idx_record_sheet_survey_respondent")
                    .table(RecordSheet::Table)
                    .col(RecordSheet::SurveyId)
                    .col(RecordSheet::RespondentId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RecordSheet::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum RecordSheet {
    Table,
    Id,
    SurveyId,
    RespondentId,
    Name,
    College,
    UserType,
    Gender,
    VerifiedAt,
}
