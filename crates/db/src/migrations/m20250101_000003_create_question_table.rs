//! Create question and option tables migration.

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
                    .table(Question::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Question::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(Question::SurveyId).string_len(32).not_null())
                    .col(ColumnDef::new(Question::SerialNum).integer().not_null())
                    .col(ColumnDef::new(Question::Subject).text().not_null())
                    .col(ColumnDef::new(Question::Description).text().not_null())
                    .col(ColumnDef::new(Question::Img).string_len(1024))
                    .col(ColumnDef::new(Question::QuestionType).integer().not_null())
                    .col(ColumnDef::new(Question::Required).boolean().not_null().default(false))
                    .col(ColumnDef::new(Question::IsUnique).boolean().not_null().default(false))
                    .col(ColumnDef::new(Question::OtherOption).boolean().not_null().default(false))
                    .col(ColumnDef::new(Question::MinimumOption).integer())
                    .col(ColumnDef::new(Question::MaximumOption).integer())
                    .col(ColumnDef::new(Question::Reg).string_len(1024))
                    .col(
                        ColumnDef::new(Question::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_question_survey")
                            .from(Question::Table, Question::SurveyId)
                            .to(Survey::Table, Survey::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_question_survey_serial")
                    .table(Question::Table)
                    .col(Question::SurveyId)
                    .col(Question::SerialNum)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(QuestionOption::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(QuestionOption::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(QuestionOption::QuestionId).string_len(32).not_null())
                    .col(ColumnDef::new(QuestionOption::SurveyId).string_len(32).not_null())
                    .col(ColumnDef::new(QuestionOption::SerialNum).integer().not_null())
                    .col(ColumnDef::new(QuestionOption::Content).text().not_null())
                    .col(ColumnDef::new(QuestionOption::Img).string_len(1024))
                    .col(ColumnDef::new(QuestionOption::Description).text())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_question_option_question")
                            .from(QuestionOption::Table, QuestionOption::QuestionId)
                            .to(Question::Table, Question::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_question_option_question_id")
                    .table(QuestionOption::Table)
                    .col(QuestionOption::QuestionId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_question_option_survey_id")
                    .table(QuestionOption::Table)
                    .col(QuestionOption::SurveyId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(QuestionOption::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Question::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Question {
    Table,
    Id,
    SurveyId,
    SerialNum,
    Subject,
    Description,
    Img,
    QuestionType,
    Required,
    IsUnique,
    OtherOption,
    MinimumOption,
    MaximumOption,
    Reg,
    CreatedAt,
}

#[derive(Iden)]
enum QuestionOption {
    Table,
    Id,
    QuestionId,
    SurveyId,
    SerialNum,
    Content,
    Img,
    Description,
}
