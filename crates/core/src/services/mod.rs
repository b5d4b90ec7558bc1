//! Business logic services.

#![allow(missing_docs)]

pub mod aggregation;
pub mod cache;
pub mod export;
pub mod lifecycle;
pub mod media;
pub mod notifier;
pub mod permission;
pub mod preset;
pub mod record;
pub mod report;
pub mod submission;
pub mod survey;
pub mod user;
pub mod vote_limit;

pub use aggregation::{
    AnswerRow, AnswerTable, MULTI_CHOICE_SEPARATOR, OptionCount, QuestionStatistics, aggregate,
    tabulate,
};
pub use cache::{
    CacheScope, ContentCache, ContentCacheService, ContentService, InMemoryContentCache,
    NoOpContentCache, RedisContentCache,
};
pub use export::{CsvExporter, ExportAdapter, ExportAdapterService};
pub use lifecycle::{OptionInput, QuestionInput, SurveyDefinition, SurveyLifecycleService};
pub use media::{MediaService, UploadedMedia};
pub use notifier::{
    NoOpNotifier, SubmissionEvent, SubmissionNotifier, SubmissionNotifierService, WebhookNotifier,
};
pub use permission::PermissionService;
pub use preset::{QuestionPresetService, QuestionPresetView, SavePresetInput};
pub use record::{RecordVerificationInput, VerificationService};
pub use report::{AnswerPage, ListAnswersInput, ReportService, SurveyStatistics};
pub use submission::{AnswerInput, Respondent, SubmissionService, SubmitInput};
pub use survey::{
    ListSurveysInput, QuestionDetail, SurveyDetail, SurveyPage, SurveyService, SurveySummary,
};
pub use user::{CreateAdminInput, CreatedAdmin, UserService};
pub use vote_limit::{
    InMemoryVoteLimiter, RedisVoteLimiter, VoteLimitService, VoteLimiter, VoteLimiterService,
    VoteTicket,
};
