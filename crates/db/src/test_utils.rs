//! Test utilities for database operations.
//!
//! Provides an in-memory SQLite database with the real schema for behavioural
//! tests, and connection settings for an optional `PostgreSQL` test server.

use sea_orm::{ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, DbErr, Statement};
use tracing::info;

/// Test database configuration.
#[derive(Debug, Clone)]
pub struct TestDbConfig {
    /// Database host.
    pub host: String,
    /// Database port.
    pub port: u16,
    /// Database username.
    pub username: String,
    /// Database password.
    pub password: String,
    /// Database name.
    pub database: String,
}

impl Default for TestDbConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("TEST_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("TEST_DB_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5433),
            username: std::env::var("TEST_DB_USER").unwrap_or_else(|_| "survey_test".to_string()),
            password: std::env::var("TEST_DB_PASSWORD")
                .unwrap_or_else(|_| "survey_test".to_string()),
            database: std::env::var("TEST_DB_NAME").unwrap_or_else(|_| "survey_test".to_string()),
        }
    }
}

impl TestDbConfig {
    /// Get the database URL.
    #[must_use]
    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database
        )
    }
}

/// Connect to the configured `PostgreSQL` test database and migrate it.
pub async fn postgres_database(config: &TestDbConfig) -> Result<DatabaseConnection, DbErr> {
    use sea_orm_migration::MigratorTrait;

    let conn = Database::connect(&config.database_url()).await?;
    crate::migrations::Migrator::up(&conn, None).await?;

    info!(database = %config.database, "Connected to test database");
    Ok(conn)
}

/// Fresh in-memory SQLite database with all migrations applied.
///
/// The pool holds exactly one connection: every connection to
/// `sqlite::memory:` would otherwise see its own empty database. Requires the
/// `test-utils` feature for the SQLite driver.
pub async fn memory_database() -> Result<DatabaseConnection, DbErr> {
    use sea_orm::ConnectOptions;
    use sea_orm_migration::MigratorTrait;

    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);

    let conn = Database::connect(opt).await?;
    conn.execute(Statement::from_string(
        DatabaseBackend::Sqlite,
        "PRAGMA foreign_keys = ON".to_string(),
    ))
    .await?;
    crate::migrations::Migrator::up(&conn, None).await?;
    Ok(conn)
}

/// Count rows of a table, for assertions on cascading deletes.
pub async fn count_rows(
    conn: &DatabaseConnection,
    table: &str,
    column: &str,
    value: &str,
) -> Result<i64, DbErr> {
    let backend = conn.get_database_backend();
    let sql = match backend {
        DatabaseBackend::Postgres => {
            format!("SELECT COUNT(*) AS n FROM \"{table}\" WHERE \"{column}\" = $1")
        }
        _ => format!("SELECT COUNT(*) AS n FROM \"{table}\" WHERE \"{column}\" = ?"),
    };
    let row = conn
        .query_one(Statement::from_sql_and_values(
            backend,
            sql,
            [value.into()],
        ))
        .await?;
    match row {
        Some(row) => row.try_get::<i64>("", "n"),
        None => Ok(0),
    }
}
