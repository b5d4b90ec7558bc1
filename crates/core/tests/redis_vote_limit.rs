//! Redis vote limiter tests.
//!
//! These tests require a running Redis instance.
//! Run with: `cargo test --test redis_vote_limit -- --ignored`
//!
//! Set `REDIS_URL` environment variable to point to your Redis instance.
//! Default: <redis://localhost:6379>

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use fred::clients::Client;
use fred::interfaces::{ClientLike, KeysInterface};
use survey_common::{AppError, IdGenerator};
use survey_core::{RedisVoteLimiter, VoteLimiter};

fn get_redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
}

async fn connect() -> Arc<Client> {
    let config = fred::types::config::Config::from_url(&get_redis_url()).unwrap();
    let client = Client::new(config, None, None, None);
    client.connect();
    client.wait_for_connect().await.expect("Failed to connect to Redis");
    Arc::new(client)
}

/// Fresh prefix per test run.
fn prefix() -> String {
    format!("survey-test-{}", IdGenerator::new().generate())
}

#[tokio::test]
#[ignore = "requires running Redis instance"]
async fn test_acquire_sets_expiry_with_first_vote() {
    let client = connect().await;
    let prefix = prefix();
    let limiter = RedisVoteLimiter::new(client.clone(), prefix.clone());

    assert_eq!(limiter.acquire("k", 2, Duration::from_secs(60)).await.unwrap(), 1);

    let ttl: i64 = client.ttl(format!("{prefix}:k")).await.unwrap();
    assert!(ttl > 0 && ttl <= 60, "ttl was {ttl}");
}

#[tokio::test]
#[ignore = "requires running Redis instance"]
async fn test_acquire_stops_at_limit() {
    let client = connect().await;
    let prefix = prefix();
    let limiter = RedisVoteLimiter::new(client.clone(), prefix.clone());

    limiter.acquire("k", 1, Duration::from_secs(60)).await.unwrap();
    let result = limiter.acquire("k", 1, Duration::from_secs(60)).await;
    assert!(matches!(result, Err(AppError::LimitExceeded(_))));

    // The refused vote left the counter untouched
    let count: i64 = client.get(format!("{prefix}:k")).await.unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
#[ignore = "requires running Redis instance"]
async fn test_release_of_missing_key_creates_nothing() {
    let client = connect().await;
    let prefix = prefix();
    let limiter = RedisVoteLimiter::new(client.clone(), prefix.clone());

    limiter.release("gone").await.unwrap();

    let exists: i64 = client.exists(format!("{prefix}:gone")).await.unwrap();
    assert_eq!(exists, 0);
}

#[tokio::test]
#[ignore = "requires running Redis instance"]
async fn test_release_gives_vote_back() {
    let client = connect().await;
    let limiter = RedisVoteLimiter::new(client, prefix());

    limiter.acquire("k", 1, Duration::from_secs(60)).await.unwrap();
    limiter.release("k").await.unwrap();

    assert_eq!(limiter.acquire("k", 1, Duration::from_secs(60)).await.unwrap(), 1);
}
