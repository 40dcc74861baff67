//! Database integration tests.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test --test db_integration -- --ignored`
//!
//! Environment variables:
//!   `TEST_DB_HOST` (default: localhost)
//!   `TEST_DB_PORT` (default: 5433)
//!   `TEST_DB_USER` (default: `rapport_test`)
//!   `TEST_DB_PASSWORD` (default: `rapport_test`)

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use rapport_common::{AppError, IdGenerator};
use rapport_db::entities::{Content, User, profile_review};
use rapport_db::repositories::{
    ContentLikeRepository, FollowingRepository, ProfileReviewRepository, UserRepository,
};
use rapport_db::test_utils::{TestDatabase, TestDbConfig};
use sea_orm::{EntityTrait, Set};
use tokio::task::JoinSet;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires running PostgreSQL instance"]
async fn test_concurrent_reviews_exactly_one_wins() {
    let db = TestDatabase::create_unique().await.expect("Failed to connect");
    db.seed_user("alice").await.unwrap();
    db.seed_user("bob").await.unwrap();

    let repo = ProfileReviewRepository::new(Arc::new(db.conn.clone()));
    let ids = IdGenerator::new();

    let mut tasks = JoinSet::new();
    for rating in 1..=8_i16 {
        let repo = repo.clone();
        let id = ids.generate();
        tasks.spawn(async move {
            repo.insert_unique(profile_review::ActiveModel {
                id: Set(id),
                reviewer_id: Set("alice".to_string()),
                subject_id: Set("bob".to_string()),
                rating: Set(rating.min(5)),
                comment: Set("Concurrent".to_string()),
                created_at: Set(chrono::Utc::now().into()),
                updated_at: Set(None),
            })
            .await
        });
    }

    let mut created = 0;
    let mut duplicates = 0;
    while let Some(result) = tasks.join_next().await {
        match result.unwrap() {
            Ok(_) => created += 1,
            Err(AppError::DuplicateReview) => duplicates += 1,
            Err(e) => panic!("Unexpected error: {e}"),
        }
    }

    assert_eq!(created, 1);
    assert_eq!(duplicates, 7);
    assert_eq!(repo.summary("bob").await.unwrap().count, 1);

    db.drop_database().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires running PostgreSQL instance"]
async fn test_concurrent_follow_single_edge() {
    let db = TestDatabase::create_unique().await.expect("Failed to connect");
    db.seed_user("alice").await.unwrap();
    db.seed_user("bob").await.unwrap();

    let conn = Arc::new(db.conn.clone());
    let repo = FollowingRepository::new(Arc::clone(&conn));
    let ids = IdGenerator::new();

    let mut tasks = JoinSet::new();
    for _ in 0..6 {
        let repo = repo.clone();
        let id = ids.generate();
        tasks.spawn(async move { repo.create_edge(&id, "alice", "bob").await });
    }

    let mut created = 0;
    while let Some(result) = tasks.join_next().await {
        match result.unwrap() {
            Ok(_) => created += 1,
            Err(AppError::AlreadyRelated) => {}
            Err(e) => panic!("Unexpected error: {e}"),
        }
    }
    assert_eq!(created, 1);

    assert!(repo.is_following("alice", "bob").await.unwrap());
    let alice = User::find_by_id("alice").one(conn.as_ref()).await.unwrap().unwrap();
    let bob = User::find_by_id("bob").one(conn.as_ref()).await.unwrap().unwrap();
    assert_eq!(alice.following_count, 1);
    assert_eq!(bob.followers_count, 1);

    db.drop_database().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires running PostgreSQL instance"]
async fn test_concurrent_toggles_keep_count_exact() {
    let db = TestDatabase::create_unique().await.expect("Failed to connect");
    db.seed_user("owner").await.unwrap();
    db.seed_content("c1", "owner").await.unwrap();
    for i in 0..10 {
        db.seed_user(&format!("fan{i}")).await.unwrap();
    }

    let conn = Arc::new(db.conn.clone());
    let repo = ContentLikeRepository::new(Arc::clone(&conn));
    let ids = IdGenerator::new();

    // Each fan toggles three times: ends up liking.
    let mut tasks = JoinSet::new();
    for i in 0..10 {
        let repo = repo.clone();
        let toggle_ids = [ids.generate(), ids.generate(), ids.generate()];
        tasks.spawn(async move {
            let user = format!("fan{i}");
            for id in toggle_ids {
                repo.toggle(&id, "c1", &user).await?;
            }
            Ok::<_, AppError>(())
        });
    }
    while let Some(result) = tasks.join_next().await {
        result.unwrap().unwrap();
    }

    let content = Content::find_by_id("c1").one(conn.as_ref()).await.unwrap().unwrap();
    assert_eq!(content.likes_count, 10);
    let likes = repo.find_by_content("c1", 100, None).await.unwrap();
    assert_eq!(likes.len(), 10);

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_hard_delete_leaves_no_dangling_edges() {
    let db = TestDatabase::create_unique().await.expect("Failed to connect");
    for id in ["alice", "bob", "carol"] {
        db.seed_user(id).await.unwrap();
    }
    db.seed_content("c1", "bob").await.unwrap();

    let conn = Arc::new(db.conn.clone());
    let follows = FollowingRepository::new(Arc::clone(&conn));
    let likes = ContentLikeRepository::new(Arc::clone(&conn));
    let users = UserRepository::new(Arc::clone(&conn));
    let ids = IdGenerator::new();

    follows.create_edge(&ids.generate(), "alice", "bob").await.unwrap();
    follows.create_edge(&ids.generate(), "bob", "alice").await.unwrap();
    follows.create_edge(&ids.generate(), "carol", "alice").await.unwrap();
    likes.toggle(&ids.generate(), "c1", "alice").await.unwrap();

    let report = users.hard_delete("alice").await.unwrap();
    assert_eq!(report.neighbours_repaired, 2);
    assert_eq!(report.contents_repaired, 1);

    let bob = users.get_by_id("bob").await.unwrap();
    let carol = users.get_by_id("carol").await.unwrap();
    assert_eq!((bob.followers_count, bob.following_count), (0, 0));
    assert_eq!(carol.following_count, 0);
    assert!(follows.find_followers("bob", 10, None).await.unwrap().is_empty());
    assert!(follows.find_following("carol", 10, None).await.unwrap().is_empty());

    let content = Content::find_by_id("c1").one(conn.as_ref()).await.unwrap().unwrap();
    assert_eq!(content.likes_count, 0);

    db.drop_database().await.unwrap();
}

#[test]
fn test_config_from_env() {
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
    assert!(url.contains("testdb"));
}
