//! Database entities.

#![allow(missing_docs)]

pub mod answer;
pub mod answer_sheet;
pub mod manage;
pub mod question;
pub mod question_option;
pub mod question_preset;
pub mod record_sheet;
pub mod survey;
pub mod unique_answer;
pub mod user;

pub use answer::Entity as Answer;
pub use answer_sheet::Entity as AnswerSheet;
pub use manage::Entity as Manage;
pub use question::Entity as Question;
pub use question_option::Entity as QuestionOption;
pub use question_preset::Entity as QuestionPreset;
pub use record_sheet::Entity as RecordSheet;
pub use survey::Entity as Survey;
pub use unique_answer::Entity as UniqueAnswer;
pub use user::Entity as User;
