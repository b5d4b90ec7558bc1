//! Survey server entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use fred::prelude::*;
use survey_api::{AppState, RateLimitConfig, RateLimiterState};
use survey_common::{Config, LocalMediaStorage, MediaKind, MediaStorageService};
use survey_core::{
    ContentCacheService, ContentService, CsvExporter, InMemoryContentCache, InMemoryVoteLimiter,
    MediaService, PermissionService, QuestionPresetService, RedisContentCache, RedisVoteLimiter,
    ReportService,
    SubmissionService, SurveyLifecycleService, SurveyService, UserService, VerificationService,
    VoteLimitService, VoteLimiterService, WebhookNotifier,
};
use survey_db::repositories::{
    AnswerSheetRepository, ManageRepository, QuestionOptionRepository, QuestionPresetRepository,
    QuestionRepository, RecordSheetRepository, SurveyRepository, UserRepository,
};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

/// Connect the shared Redis client.
async fn connect_redis(url: &str) -> Result<Arc<fred::clients::Client>, Box<dyn std::error::Error>> {
    let redis_config = fred::types::config::Config::from_url(url)?;
    let client = fred::clients::Client::new(redis_config, None, None, None);
    client.connect();
    client.wait_for_connect().await?;
    Ok(Arc::new(client))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "survey=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting survey server...");

    let config = Config::load()?;

    let db = Arc::new(survey_db::init(&config).await?);
    info!("Connected to database");

    info!("Running database migrations...");
    survey_db::migrate(&db).await?;
    info!("Migrations completed");

    let cache_ttl = Duration::from_secs(config.limits.cache_ttl_secs);
    let (vote_limiter, content_cache): (VoteLimiterService, ContentCacheService) =
        match &config.redis {
            Some(redis) => {
                info!("Connecting to Redis...");
                let client = connect_redis(&redis.url).await?;
                info!("Connected to Redis");
                (
                    Arc::new(RedisVoteLimiter::new(client.clone(), &redis.prefix)),
                    Arc::new(RedisContentCache::new(client, &redis.prefix, cache_ttl)),
                )
            }
            None => {
                info!("Redis not configured, using in-process vote limits and cache");
                (
                    Arc::new(InMemoryVoteLimiter::new()),
                    Arc::new(InMemoryContentCache::new(cache_ttl)),
                )
            }
        };

    let storage: MediaStorageService = Arc::new(LocalMediaStorage::new(&config.storage));

    // Repositories
    let user_repo = UserRepository::new(Arc::clone(&db));
    let survey_repo = SurveyRepository::new(Arc::clone(&db));
    let question_repo = QuestionRepository::new(Arc::clone(&db));
    let option_repo = QuestionOptionRepository::new(Arc::clone(&db));
    let sheet_repo = AnswerSheetRepository::new(Arc::clone(&db));
    let record_repo = RecordSheetRepository::new(Arc::clone(&db));
    let manage_repo = ManageRepository::new(Arc::clone(&db));
    let preset_repo = QuestionPresetRepository::new(Arc::clone(&db));

    // Services
    let content = ContentService::new(question_repo.clone(), option_repo.clone(), content_cache);
    let user_service = UserService::new(user_repo.clone());

    let mut submission_service = SubmissionService::new(
        survey_repo.clone(),
        question_repo.clone(),
        record_repo.clone(),
        sheet_repo.clone(),
        content.clone(),
        VoteLimitService::new(vote_limiter, config.limits.day_offset_hours),
    );
    if let Some(webhook) = &config.webhook {
        info!(url = %webhook.url, "Submission webhook enabled");
        submission_service.set_notifier(Arc::new(WebhookNotifier::new(webhook)));
    }

    if let Some(username) = &config.server.bootstrap_admin
        && let Some(token) = user_service.ensure_super_admin(username).await?
    {
        // Printed once; the token is not recoverable afterwards
        info!(username = %username, token = %token, "Created bootstrap super admin");
    }

    let state = AppState {
        user_service,
        survey_service: SurveyService::new(survey_repo.clone(), content.clone()),
        lifecycle_service: SurveyLifecycleService::new(
            survey_repo.clone(),
            question_repo,
            option_repo,
            sheet_repo.clone(),
            content.clone(),
            storage.clone(),
        ),
        submission_service,
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
        preset_service: QuestionPresetService::new(preset_repo),
    };

    let rate_limit = RateLimitConfig::from_limits(&config.limits);
    let rate_limiter = RateLimiterState::new(rate_limit.clone());

    // Forget idle clients periodically
    let cleanup_limiter = rate_limiter.limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(rate_limit.window_secs));
        loop {
            interval.tick().await;
            cleanup_limiter.cleanup(rate_limit.window_secs).await;
        }
    });

    let public = axum::Router::new()
        .nest_service(
            &format!("/{}", MediaKind::Image.url_segment()),
            ServeDir::new(&config.storage.static_dir),
        )
        .nest_service(
            &format!("/{}", MediaKind::File.url_segment()),
            ServeDir::new(&config.storage.file_dir),
        )
        .nest_service(
            &format!("/{}", MediaKind::Export.url_segment()),
            ServeDir::new(&config.storage.export_dir),
        );

    let app = survey_api::app(state, rate_limiter)
        .nest("/public", public)
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!(%addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server shut down");
    Ok(())
}
