//! API integration tests.
//!
//! Requests go through the full router and auth middleware; every
//! repository sits on its own mock connection.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::redundant_clone)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
    middleware,
};
use chrono::Utc;
use rapport_api::{AppState, auth_middleware, router as api_router};
use rapport_common::{AppError, AppResult, ConsistencyConfig, LocalStorage, StorageBackend};
use rapport_core::{
    AccountService, Actor, Authenticator, ContentService, EngagementService, RelationshipService,
    ReviewService,
};
use rapport_db::{
    entities::{content, content_like, following, user},
    repositories::{
        CommentRepository, ContentLikeRepository, ContentRepository, FollowingRepository,
        ProfileReviewRepository, UserRepository,
    },
};
use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, Value};
use serde_json::Value as Json;
use tower::ServiceExt;

/// Accepts `token-{id}`; `token-root` is an administrator and
/// `token-outage` fails as if the user store were down.
struct StubAuthenticator;

#[async_trait]
impl Authenticator for StubAuthenticator {
    async fn authenticate(&self, token: &str) -> AppResult<Actor> {
        if token == "token-outage" {
            return Err(AppError::Database("connection refused".to_string()));
        }
        let id = token
            .strip_prefix("token-")
            .ok_or(AppError::Unauthenticated)?;
        let role = if id == "root" {
            user::Role::Admin
        } else {
            user::Role::Normal
        };
        Ok(Actor {
            id: id.to_string(),
            role,
        })
    }
}

fn empty_db() -> DatabaseConnection {
    MockDatabase::new(DatabaseBackend::Postgres).into_connection()
}

/// Per-service mock connections.
struct Dbs {
    relationship_users: DatabaseConnection,
    following: DatabaseConnection,
    likes: DatabaseConnection,
    comments: DatabaseConnection,
    engagement_contents: DatabaseConnection,
    contents: DatabaseConnection,
}

impl Default for Dbs {
    fn default() -> Self {
        Self {
            relationship_users: empty_db(),
            following: empty_db(),
            likes: empty_db(),
            comments: empty_db(),
            engagement_contents: empty_db(),
            contents: empty_db(),
        }
    }
}

fn create_test_user(id: &str) -> user::Model {
    user::Model {
        id: id.to_string(),
        username: id.to_string(),
        username_lower: id.to_string(),
        email: format!("{id}@example.com"),
        mobile: None,
        password_hash: "hash".to_string(),
        token: Some(format!("token-{id}")),
        role: user::Role::Normal,
        is_verified: true,
        name: format!("User {id}"),
        avatar_url: None,
        state: None,
        job: None,
        district: None,
        office: None,
        office_place: None,
        followers_count: 0,
        following_count: 0,
        deleted_at: None,
        created_at: Utc::now().into(),
        updated_at: None,
    }
}

fn create_test_post(id: &str, owner: &str) -> content::Model {
    content::Model {
        id: id.to_string(),
        user_id: owner.to_string(),
        kind: content::ContentKind::Image,
        name: Some("Backwaters".to_string()),
        media_url: format!("/files/posts/{id}.png"),
        description: None,
        likes_count: 1,
        created_at: Utc::now().into(),
        updated_at: None,
    }
}

fn create_test_router(dbs: Dbs) -> Router {
    let config = ConsistencyConfig::default();
    let users = || UserRepository::new(Arc::new(empty_db()));
    let storage: Arc<dyn StorageBackend> = Arc::new(LocalStorage::new(
        std::env::temp_dir().join("rapport-api-tests"),
        "/files".to_string(),
    ));

    let state = AppState {
        relationship_service: RelationshipService::new(
            FollowingRepository::new(Arc::new(dbs.following)),
            UserRepository::new(Arc::new(dbs.relationship_users)),
            config.clone(),
        ),
        engagement_service: EngagementService::new(
            ContentRepository::new(Arc::new(dbs.engagement_contents)),
            ContentLikeRepository::new(Arc::new(dbs.likes)),
            CommentRepository::new(Arc::new(dbs.comments)),
            users(),
            config.clone(),
        ),
        review_service: ReviewService::new(
            ProfileReviewRepository::new(Arc::new(empty_db())),
            users(),
            config,
        ),
        content_service: ContentService::new(
            ContentRepository::new(Arc::new(dbs.contents)),
            Arc::clone(&storage),
        ),
        account_service: AccountService::new(users(), storage),
        authenticator: Arc::new(StubAuthenticator),
    };

    api_router()
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn body_json(response: axum::response::Response) -> Json {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_follow_without_token_is_unauthenticated() {
    let app = create_test_router(Dbs::default());

    let response = app
        .oneshot(json_request(
            "POST",
            "/following/create",
            None,
            r#"{"userId":"bob"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "UNAUTHENTICATED");
}

#[tokio::test]
async fn test_rejected_token_is_unauthenticated() {
    let app = create_test_router(Dbs::default());

    let response = app
        .oneshot(json_request(
            "POST",
            "/following/create",
            Some("garbage"),
            r#"{"userId":"bob"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_store_failure_is_server_error() {
    let app = create_test_router(Dbs::default());

    let response = app
        .oneshot(json_request(
            "POST",
            "/following/create",
            Some("token-outage"),
            r#"{"userId":"bob"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "DATABASE_ERROR");
}

#[tokio::test]
async fn test_auth_store_failure_on_public_route_is_server_error() {
    let app = create_test_router(Dbs::default());

    let response = app
        .oneshot(json_request(
            "GET",
            "/users/search?query=%20",
            Some("token-outage"),
            "",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_follow_self_is_rejected() {
    let dbs = Dbs {
        relationship_users: MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_user("alice")]])
            .into_connection(),
        ..Dbs::default()
    };
    let app = create_test_router(dbs);

    let response = app
        .oneshot(json_request(
            "POST",
            "/following/create",
            Some("token-alice"),
            r#"{"userId":"alice"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "SELF_REFERENCE");
}

#[tokio::test]
async fn test_follow_missing_user_is_not_found() {
    let dbs = Dbs {
        relationship_users: MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()])
            .into_connection(),
        ..Dbs::default()
    };
    let app = create_test_router(dbs);

    let response = app
        .oneshot(json_request(
            "POST",
            "/following/create",
            Some("token-alice"),
            r#"{"userId":"ghost"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_followers_page() {
    let edge = following::Model {
        id: "edge1".to_string(),
        follower_id: "alice".to_string(),
        followee_id: "bob".to_string(),
        created_at: Utc::now().into(),
    };
    let dbs = Dbs {
        relationship_users: MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_user("bob")]])
            .append_query_results([[create_test_user("alice")]])
            .into_connection(),
        following: MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[edge]])
            .into_connection(),
        ..Dbs::default()
    };
    let app = create_test_router(dbs);

    let response = app
        .oneshot(json_request("GET", "/users/bob/followers", None, ""))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["items"][0]["id"], "alice");
    assert_eq!(body["data"]["items"][0]["name"], "User alice");
    assert!(body["data"]["nextUntilId"].is_null());
}

#[tokio::test]
async fn test_like_missing_post_is_not_found() {
    let dbs = Dbs {
        likes: MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<content::Model>::new()])
            .into_connection(),
        ..Dbs::default()
    };
    let app = create_test_router(dbs);

    let response = app
        .oneshot(json_request("PUT", "/posts/nope/like", Some("token-alice"), ""))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_show_post_with_viewer_engagement() {
    let dbs = Dbs {
        contents: MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_post("c1", "bob")]])
            .into_connection(),
        comments: MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[maplit::btreemap! {
                "num_items" => Value::BigInt(Some(2))
            }]])
            .into_connection(),
        likes: MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[content_like::Model {
                id: "l1".to_string(),
                content_id: "c1".to_string(),
                user_id: "alice".to_string(),
                created_at: Utc::now().into(),
            }]])
            .into_connection(),
        ..Dbs::default()
    };
    let app = create_test_router(dbs);

    let response = app
        .oneshot(json_request("GET", "/posts/c1", Some("token-alice"), ""))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["id"], "c1");
    assert_eq!(body["data"]["likesCount"], 1);
    assert_eq!(body["data"]["commentsCount"], 2);
    assert_eq!(body["data"]["likedByMe"], true);
}

#[tokio::test]
async fn test_show_post_anonymous_omits_liked_by_me() {
    let dbs = Dbs {
        contents: MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_post("c1", "bob")]])
            .into_connection(),
        comments: MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[maplit::btreemap! {
                "num_items" => Value::BigInt(Some(0))
            }]])
            .into_connection(),
        ..Dbs::default()
    };
    let app = create_test_router(dbs);

    let response = app
        .oneshot(json_request("GET", "/posts/c1", None, ""))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["commentsCount"], 0);
    assert!(body["data"].get("likedByMe").is_none());
}

#[tokio::test]
async fn test_repair_likes_requires_admin() {
    let app = create_test_router(Dbs::default());

    let response = app
        .oneshot(json_request(
            "POST",
            "/posts/c1/repair-likes",
            Some("token-alice"),
            "",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_blank_comment_is_rejected() {
    let app = create_test_router(Dbs::default());

    let response = app
        .oneshot(json_request(
            "POST",
            "/posts/c1/comments",
            Some("token-alice"),
            r#"{"text":"   "}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "EMPTY_TEXT");
}

#[tokio::test]
async fn test_review_rating_out_of_range() {
    let app = create_test_router(Dbs::default());

    let response = app
        .oneshot(json_request(
            "POST",
            "/reviews",
            Some("token-alice"),
            r#"{"userId":"bob","rating":9,"comment":"Great"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_purge_requires_admin() {
    let app = create_test_router(Dbs::default());

    let response = app
        .oneshot(json_request("DELETE", "/users/bob", Some("token-alice"), ""))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_repair_counts_requires_admin() {
    let app = create_test_router(Dbs::default());

    let response = app
        .oneshot(json_request(
            "POST",
            "/users/bob/repair-counts",
            Some("token-alice"),
            "",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_deactivate_requires_password() {
    let app = create_test_router(Dbs::default());

    let response = app
        .oneshot(json_request("DELETE", "/i", Some("token-alice"), "{}"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_blank_search_returns_empty_list() {
    let app = create_test_router(Dbs::default());

    let response = app
        .oneshot(json_request("GET", "/users/search?query=%20", None, ""))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"], serde_json::json!([]));
}
