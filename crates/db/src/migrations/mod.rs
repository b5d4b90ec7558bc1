//! Database migrations.
//!
//! Schema migrations for the database.

#![allow(missing_docs)]

use sea_orm_migration::prelude::*;

mod m20250101_000001_create_user_table;
mod m20250101_000002_create_survey_table;
mod m20250101_000003_create_question_table;
mod m20250101_000004_create_answer_sheet_table;
mod m20250101_000005_create_manage_table;
mod m20250101_000006_create_record_sheet_table;
mod m20250101_000007_create_question_preset_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_user_table::Migration),
            Box::new(m20250101_000002_create_survey_table::Migration),
            Box::new(m20250101_000003_create_question_table::Migration),
            Box::new(m20250101_000004_create_answer_sheet_table::Migration),
            Box::new(m20250101_000005_create_manage_table::Migration),
            Box::new(m20250101_000006_create_record_sheet_table::Migration),
            Box::new(m20250101_000007_create_question_preset_table::Migration),
        ]
    }
}
