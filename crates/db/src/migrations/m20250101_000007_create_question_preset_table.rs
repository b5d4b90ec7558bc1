//! Create question preset table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(QuestionPreset::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(QuestionPreset::Id).string_len(32).not_null().primary_key())
                    .col(
                        ColumnDef::new(QuestionPreset::Name)
                            .string_len(128)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(QuestionPreset::Value).text().not_null())
                    .col(
                        ColumnDef::new(QuestionPreset::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(QuestionPreset::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(QuestionPreset::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum QuestionPreset {
    Table,
    Id,
    Name,
    Value,
    CreatedAt,
    UpdatedAt,
}
