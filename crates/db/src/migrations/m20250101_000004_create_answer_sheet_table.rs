//! Create answer sheet, answer and unique answer tables migration.

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
                    .table(AnswerSheet::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(AnswerSheet::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(AnswerSheet::SurveyId).string_len(32).not_null())
                    .col(ColumnDef::new(AnswerSheet::RespondentId).string_len(256).not_null())
                    .col(
                        ColumnDef::new(AnswerSheet::SubmittedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(AnswerSheet::IsUnique).boolean().not_null().default(true))
                    .col(
                        ColumnDef::new(AnswerSheet::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_answer_sheet_survey")
                            .from(AnswerSheet::Table, AnswerSheet::SurveyId)
                            .to(Survey::Table, Survey::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (survey_id, respondent_id) for clearing earlier sheets
        manager
            .create_index(
                Index::create()
                    .name("idx_answer_sheet_survey_respondent")
                    .table(AnswerSheet::Table)
                    .col(AnswerSheet::SurveyId)
                    .col(AnswerSheet::RespondentId)
                    .to_owned(),
            )
            .await?;

        // Index: (survey_id, submitted_at) for paging
        manager
            .create_index(
                Index::create()
                    .name("idx_answer_sheet_survey_submitted_at")
                    .table(AnswerSheet::Table)
                    .col(AnswerSheet::SurveyId)
                    .col(AnswerSheet::SubmittedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Answer::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Answer::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(Answer::AnswerSheetId).string_len(32).not_null())
                    .col(ColumnDef::new(Answer::SurveyId).string_len(32).not_null())
                    .col(ColumnDef::new(Answer::QuestionId).string_len(32).not_null())
                    .col(ColumnDef::new(Answer::QuestionType).integer().not_null())
                    .col(ColumnDef::new(Answer::Position).integer().not_null())
                    .col(ColumnDef::new(Answer::Content).text().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_answer_answer_sheet")
                            .from(Answer::Table, Answer::AnswerSheetId)
                            .to(AnswerSheet::Table, AnswerSheet::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_answer_answer_sheet_id")
                    .table(Answer::Table)
                    .col(Answer::AnswerSheetId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_answer_survey_id")
                    .table(Answer::Table)
                    .col(Answer::SurveyId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UniqueAnswer::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(UniqueAnswer::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(UniqueAnswer::SurveyId).string_len(32).not_null())
                    .col(ColumnDef::new(UniqueAnswer::QuestionId).string_len(32).not_null())
                    .col(ColumnDef::new(UniqueAnswer::ContentDigest).string_len(64).not_null())
                    .col(ColumnDef::new(UniqueAnswer::AnswerSheetId).string_len(32).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_unique_answer_answer_sheet")
                            .from(UniqueAnswer::Table, UniqueAnswer::AnswerSheetId)
                            .to(AnswerSheet::Table, AnswerSheet::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: one sheet per (survey, question, content)
        manager
            .create_index(
                Index::create()
                    .name("idx_unique_answer_survey_question_digest")
                    .table(UniqueAnswer::Table)
                    .col(UniqueAnswer::SurveyId)
                    .col(UniqueAnswer::QuestionId)
                    .col(UniqueAnswer::ContentDigest)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_unique_answer_answer_sheet_id")
                    .table(UniqueAnswer::Table)
                    .col(UniqueAnswer::AnswerSheetId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UniqueAnswer::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Answer::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AnswerSheet::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum AnswerSheet {
    Table,
    Id,
    SurveyId,
    RespondentId,
    SubmittedAt,
    IsUnique,
    CreatedAt,
}

#[derive(Iden)]
enum Answer {
    Table,
    Id,
    AnswerSheetId,
    SurveyId,
    QuestionId,
    QuestionType,
    Position,
    Content,
}

#[derive(Iden)]
enum UniqueAnswer {
    Table,
    Id,
    SurveyId,
    QuestionId,
    ContentDigest,
    AnswerSheetId,
}
