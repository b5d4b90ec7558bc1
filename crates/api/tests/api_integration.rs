//! API integration tests.
//!
//! These tests drive the full router over an in-memory database.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::redundant_clone)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::{Value, json};
use survey_api::{AppState, RateLimitConfig, RateLimiterState, app};
use survey_common::config::StorageConfig;
use survey_common::{IdGenerator, LocalMediaStorage, MediaStorageService};
use survey_core::{
    ContentService, CreateAdminInput, CsvExporter, InMemoryContentCache, InMemoryVoteLimiter,
    MediaService, PermissionService, QuestionPresetService, ReportService, SubmissionService,
    SurveyLifecycleService, SurveyService, UserService, VerificationService, VoteLimitService,
};
use survey_db::repositories::{
    AnswerSheetRepository, ManageRepository, QuestionOptionRepository, QuestionPresetRepository,
    QuestionRepository, RecordSheetRepository, SurveyRepository, UserRepository,
};
use survey_db::test_utils::memory_database;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    root: PathBuf,
    owner_token: String,
    other_token: String,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

/// Create the app over a fresh database with two administrators.
async fn create_test_app(requests_per_minute: u32) -> TestApp {
    let db = Arc::new(memory_database().await.unwrap());
    let root = std::env::temp_dir().join(format!("survey-api-{}", IdGenerator::new().generate()));
    let storage: MediaStorageService = Arc::new(LocalMediaStorage::new(&StorageConfig {
        url_host: "http://localhost:3000".to_string(),
        static_dir: root.join("static"),
        file_dir: root.join("file"),
        export_dir: root.join("xlsx"),
    }));

    let user_repo = UserRepository::new(Arc::clone(&db));
    let survey_repo = SurveyRepository::new(Arc::clone(&db));
    let question_repo = QuestionRepository::new(Arc::clone(&db));
    let option_repo = QuestionOptionRepository::new(Arc::clone(&db));
    let sheet_repo = AnswerSheetRepository::new(Arc::clone(&db));
    let record_repo = RecordSheetRepository::new(Arc::clone(&db));
    let manage_repo = ManageRepository::new(Arc::clone(&db));

    let content = ContentService::new(
        question_repo.clone(),
        option_repo.clone(),
        Arc::new(InMemoryContentCache::new(Duration::from_secs(60))),
    );
    let user_service = UserService::new(user_repo.clone());

    let state = AppState {
        user_service: user_service.clone(),
        survey_service: SurveyService::new(survey_repo.clone(), content.clone()),
        lifecycle_service: SurveyLifecycleService::new(
            survey_repo.clone(),
            question_repo.clone(),
            option_repo,
            sheet_repo.clone(),
            content.clone(),
            storage.clone(),
        ),
        submission_service: SubmissionService::new(
            survey_repo.clone(),
            question_repo,
            record_repo.clone(),
            sheet_repo.clone(),
            content.clone(),
            VoteLimitService::new(Arc::new(InMemoryVoteLimiter::new()), 8),
        ),
        report_service: ReportService::new(
            survey_repo.clone(),
            sheet_repo,
            content,
            Arc::new(CsvExporter::new(storage.clone())),
            storage.clone(),
        ),
        permission_service: PermissionService::new(survey_repo.clone(), user_repo, manage_repo),
        verification_service: VerificationService::new(survey_repo, record_repo),
        media_service: MediaService::new(storage),
        preset_service: QuestionPresetService::new(QuestionPresetRepository::new(Arc::clone(&db))),
    };

    let mut tokens = Vec::new();
    for username in ["owner", "other"] {
        let created = user_service
            .create_admin(CreateAdminInput {
                username: username.to_string(),
                name: None,
                is_super_admin: false,
            })
            .await
            .unwrap();
        tokens.push(created.token);
    }

    TestApp {
        router: app(
            state,
            RateLimiterState::new(RateLimitConfig::new(requests_per_minute, 60)),
        ),
        root,
        other_token: tokens.pop().unwrap(),
        owner_token: tokens.pop().unwrap(),
    }
}

async fn post(
    app: &TestApp,
    path: &str,
    token: Option<&str>,
    body: Value,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri(path)
        .header("Content-Type", "application/json")
        .header("X-Forwarded-For", "10.0.0.1");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }

    let response = app
        .router
        .clone()
        .oneshot(builder.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn survey_body() -> Value {
    let now = Utc::now();
    json!({
        "title": "Library hours",
        "status": "published",
        "startTime": (now - ChronoDuration::hours(1)).to_rfc3339(),
        "deadline": (now + ChronoDuration::days(3)).to_rfc3339(),
        "questions": [
            {
                "serialNum": 1,
                "subject": "Student ID",
                "questionType": "fill_blank",
                "required": true,
                "unique": true,
            },
            {
                "serialNum": 2,
                "subject": "Preferred closing time",
                "questionType": "single_choice",
                "options": [
                    { "serialNum": 1, "content": "22:00" },
                    { "serialNum": 2, "content": "24:00" },
                ],
            },
        ],
    })
}

async fn create_survey(app: &TestApp) -> String {
    let (status, body) = post(
        app,
        "/api/admin/survey/create",
        Some(&app.owner_token),
        survey_body(),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["data"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_admin_routes_require_token() {
    let app = create_test_app(100).await;

    let (status, body) = post(&app, "/api/admin/survey/list", None, json!({})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, _) = post(&app, "/api/admin/survey/list", Some("bogus"), json!({})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_list_and_show() {
    let app = create_test_app(100).await;
    let survey_id = create_survey(&app).await;

    let (status, body) = post(
        &app,
        "/api/admin/survey/list",
        Some(&app.owner_token),
        json!({ "title": "LIBRARY" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["effectiveStatus"], "published");

    // Other administrators neither see nor open it without a grant
    let (_, body) = post(&app, "/api/admin/survey/list", Some(&app.other_token), json!({})).await;
    assert_eq!(body["data"]["total"], 0);
    let (status, _) = post(
        &app,
        "/api/admin/survey/show",
        Some(&app.other_token),
        json!({ "surveyId": survey_id }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = post(
        &app,
        "/api/admin/permission/grant",
        Some(&app.owner_token),
        json!({ "surveyId": survey_id, "username": "other" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post(
        &app,
        "/api/admin/survey/show",
        Some(&app.other_token),
        json!({ "surveyId": survey_id }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["questions"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["questions"][1]["options"][0]["content"], "22:00");
}

#[tokio::test]
async fn test_invalid_definition_is_rejected() {
    let app = create_test_app(100).await;
    let mut body = survey_body();
    body["deadline"] = body["startTime"].clone();

    let (status, body) = post(
        &app,
        "/api/admin/survey/create",
        Some(&app.owner_token),
        body,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_submit_and_report() {
    let app = create_test_app(100).await;
    let survey_id = create_survey(&app).await;

    let (status, body) = post(
        &app,
        "/api/user/survey/show",
        None,
        json!({ "surveyId": survey_id }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let questions = body["data"]["questions"].as_array().unwrap();
    let id_question = questions[0]["id"].as_str().unwrap().to_string();
    let time_question = questions[1]["id"].as_str().unwrap().to_string();

    let submission = json!({
        "surveyId": survey_id,
        "answers": [
            { "questionId": id_question, "content": "2021001" },
            { "questionId": time_question, "content": "24:00" },
        ],
    });
    let (status, body) = post(&app, "/api/user/survey/submit", None, submission.clone()).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["data"]["sheetId"].is_string());

    let (status, body) = post(&app, "/api/user/survey/submit", None, submission).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "DUPLICATE_ANSWER");

    let (status, body) = post(
        &app,
        "/api/admin/answers/statistics",
        Some(&app.owner_token),
        json!({ "surveyId": survey_id }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["totalSheets"], 1);
    assert_eq!(body["data"]["questions"][1]["options"][1]["count"], 1);

    let (status, body) = post(
        &app,
        "/api/admin/answers/list",
        Some(&app.owner_token),
        json!({ "surveyId": survey_id, "pageSize": 5 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["rows"][0]["cells"][0], "2021001");

    let (status, body) = post(
        &app,
        "/api/admin/answers/download",
        Some(&app.owner_token),
        json!({ "surveyId": survey_id }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["url"].as_str().unwrap().ends_with("/public/xlsx/Library_hours.csv"));
}

#[tokio::test]
async fn test_draft_survey_is_not_shown_to_respondents() {
    let app = create_test_app(100).await;
    let survey_id = create_survey(&app).await;

    let (status, _) = post(
        &app,
        "/api/admin/survey/status",
        Some(&app.owner_token),
        json!({ "surveyId": survey_id, "status": "draft" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = post(
        &app,
        "/api/user/survey/show",
        None,
        json!({ "surveyId": survey_id }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_only_super_admins_create_admins() {
    let app = create_test_app(100).await;

    let (status, _) = post(
        &app,
        "/api/admin/user/create",
        Some(&app.owner_token),
        json!({ "username": "intruder" }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_rate_limit_per_ip() {
    let app = create_test_app(2).await;

    for _ in 0..2 {
        let (status, _) = post(&app, "/api/user/survey/show", None, json!({ "surveyId": "x" })).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    let (status, body) = post(&app, "/api/user/survey/show", None, json!({ "surveyId": "x" })).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "RATE_LIMIT_EXCEEDED");
}

#[tokio::test]
async fn test_respondent_sees_own_record() {
    let app = create_test_app(100).await;
    let survey_id = create_survey(&app).await;

    let (_, body) = post(&app, "/api/user/survey/show", None, json!({ "surveyId": survey_id })).await;
    let questions = body["data"]["questions"].as_array().unwrap();
    let submission = json!({
        "surveyId": survey_id,
        "answers": [
            { "questionId": questions[0]["id"], "content": "2021001" },
            { "questionId": questions[1]["id"], "content": "24:00" },
        ],
    });
    let (status, _) = post(&app, "/api/user/survey/submit", None, submission).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post(
        &app,
        "/api/user/survey/record",
        None,
        json!({ "surveyId": survey_id }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["totalSheets"], 1);
    assert_eq!(body["data"]["questions"][1]["options"][1]["content"], "24:00");
    assert_eq!(body["data"]["questions"][1]["options"][1]["count"], 1);

    let (status, _) = post(
        &app,
        "/api/user/survey/record",
        None,
        json!({ "surveyId": "missing" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_question_presets() {
    let app = create_test_app(100).await;

    let (status, _) = post(
        &app,
        "/api/admin/question/pre/create",
        None,
        json!({ "name": "colleges", "values": ["Arts"] }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = post(
        &app,
        "/api/admin/question/pre/create",
        Some(&app.owner_token),
        json!({ "name": "colleges", "values": ["Arts", "Science"] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    // Presets are shared between administrators
    let (status, body) = post(
        &app,
        "/api/admin/question/pre/get",
        Some(&app.other_token),
        json!({ "name": "colleges" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["values"], json!(["Arts", "Science"]));

    let (status, body) = post(
        &app,
        "/api/admin/question/pre/create",
        Some(&app.owner_token),
        json!({ "name": "bad", "values": ["a,b"] }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, _) = post(
        &app,
        "/api/admin/question/pre/get",
        Some(&app.owner_token),
        json!({ "name": "missing" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
