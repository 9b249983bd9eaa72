//! Database integration tests.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test --test db_integration -- --ignored`
//!
//! Environment variables:
//!   `TEST_DB_HOST` (default: localhost)
//!   `TEST_DB_PORT` (default: 5433)
//!   `TEST_DB_USER` (default: `forum_test`)
//!   `TEST_DB_PASSWORD` (default: `forum_test`)
//!   `TEST_DB_NAME` (default: `forum_test`)

#![allow(clippy::unwrap_used)]

use forum_db::test_utils::{FORUM_TABLES, TestDatabase, TestDbConfig};

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_database_connection() {
    let config = TestDbConfig::default();
    let result = TestDatabase::with_config(config).await;
    assert!(result.is_ok(), "Failed to connect: {:?}", result.err());
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_database_cleanup_empties_forum_tables() {
    use sea_orm::ConnectionTrait;

    let db = TestDatabase::create_unique()
        .await
        .expect("Failed to create database");
    db.migrate().await.expect("Migrations failed");

    db.connection()
        .execute(sea_orm::Statement::from_string(
            sea_orm::DatabaseBackend::Postgres,
            r#"INSERT INTO "user" (id, username, created_at) VALUES ('u1', 'alice', now())"#
                .to_string(),
        ))
        .await
        .unwrap();
    let counts = db.row_counts().await.unwrap();
    assert!(counts.contains(&("user", 1)));

    db.cleanup().await.unwrap();
    let counts = db.row_counts().await.unwrap();
    assert_eq!(counts.len(), FORUM_TABLES.len());
    assert!(counts.iter().all(|(_, n)| *n == 0));

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_shared_database_is_never_dropped() {
    let db = TestDatabase::new().await.expect("Failed to connect");
    assert!(db.drop_database().await.is_err());
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_execute_query() {
    let db = TestDatabase::new().await.expect("Failed to connect");

    // Connection should be valid
    use sea_orm::ConnectionTrait;
    let result = db
        .connection()
        .execute(sea_orm::Statement::from_string(
            sea_orm::DatabaseBackend::Postgres,
            "SELECT 1".to_string(),
        ))
        .await;

    assert!(result.is_ok(), "Query failed: {:?}", result.err());
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_migrations_apply_and_enforce_vote_rules() {
    use sea_orm::ConnectionTrait;

    let db = TestDatabase::create_unique()
        .await
        .expect("Failed to create database");
    db.migrate().await.expect("Migrations failed");

    let conn = db.connection();
    let exec = |sql: &str| {
        conn.execute(sea_orm::Statement::from_string(
            sea_orm::DatabaseBackend::Postgres,
            sql.to_string(),
        ))
    };

    exec(r#"INSERT INTO "user" (id, username, created_at) VALUES ('u1', 'alice', now())"#)
        .await
        .unwrap();
    exec("INSERT INTO vote (id, user_id, target_id, target_kind, value, created_at) VALUES ('v1', 'u1', 'p1', 'post', 1, now())")
        .await
        .unwrap();

    // Zero is never stored.
    let zero = exec("INSERT INTO vote (id, user_id, target_id, target_kind, value, created_at) VALUES ('v2', 'u1', 'p2', 'post', 0, now())").await;
    assert!(zero.is_err());

    // One vote per (user, target), whatever the kind.
    let duplicate = exec("INSERT INTO vote (id, user_id, target_id, target_kind, value, created_at) VALUES ('v3', 'u1', 'p1', 'comment', -1, now())").await;
    assert!(duplicate.is_err());

    db.drop_database().await.unwrap();
}

#[test]
fn test_config_from_env() {
    // Test that default config is valid
    let config = TestDbConfig::default();
    assert!(!config.host.is_empty());
    assert!(config.port > 0);
    assert!(!config.username.is_empty());
    assert!(!config.database.is_empty());
}

#[test]
fn test_database_url_format() {
    let config = TestDbConfig {
        host: "testhost".to_string(),
        port: 5432,
        username: "testuser".to_string(),
        password: "testpass".to_string(),
        database: "testdb".to_string(),
    };

    let url = config.database_url();
    assert!(url.starts_with("postgres://"));
    assert!(url.contains("testhost"));
    assert!(url.contains("5432"));
    assert!(url.contains("testuser"));
    assert!(url.contains("testdb"));
}

#[test]
fn test_postgres_url_format() {
    let config = TestDbConfig::default();
    let url = config.postgres_url();
    assert!(url.ends_with("/postgres"));
}
