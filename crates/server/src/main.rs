//! Rapport server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, extract::DefaultBodyLimit, middleware};
use rapport_api::{AppState, auth_middleware, router as api_router};
use rapport_common::{Config, LocalStorage, StorageBackend, storage::MAX_VIDEO_BYTES};
use rapport_core::{
    AccountService, Authenticator, ContentService, EngagementService, RelationshipService,
    ReviewService, TokenAuthenticator,
};
use rapport_db::repositories::{
    CommentRepository, ContentLikeRepository, ContentRepository, FollowingRepository,
    ProfileReviewRepository, UserRepository,
};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Multipart overhead allowed on top of the largest media upload.
const FORM_OVERHEAD_BYTES: u64 = 1_000_000;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
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
                error!(error = %e, "Failed to install SIGTERM handler");
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

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rapport=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting rapport server...");

    // Load configuration
    let config = Config::load()?;

    let db = rapport_db::init(&config).await?;
    info!("Connected to database");

    info!("Running database migrations...");
    rapport_db::migrate(&db).await?;
    info!("Migrations completed");

    let db = Arc::new(db);

    // Initialize repositories
    let user_repo = UserRepository::new(Arc::clone(&db));
    let following_repo = FollowingRepository::new(Arc::clone(&db));
    let content_repo = ContentRepository::new(Arc::clone(&db));
    let like_repo = ContentLikeRepository::new(Arc::clone(&db));
    let comment_repo = CommentRepository::new(Arc::clone(&db));
    let review_repo = ProfileReviewRepository::new(Arc::clone(&db));

    let storage: Arc<dyn StorageBackend> = Arc::new(LocalStorage::from_settings(&config.storage));
    let authenticator: Arc<dyn Authenticator> =
        Arc::new(TokenAuthenticator::new(user_repo.clone()));

    let consistency = config.consistency.clone();
    info!(
        conflict_retries = consistency.conflict_retries,
        restricted_can_follow = consistency.restricted_can_follow,
        allow_self_review = consistency.allow_self_review,
        "Consistency settings"
    );

    let state = AppState {
        relationship_service: RelationshipService::new(
            following_repo,
            user_repo.clone(),
            consistency.clone(),
        ),
        engagement_service: EngagementService::new(
            content_repo.clone(),
            like_repo,
            comment_repo,
            user_repo.clone(),
            consistency.clone(),
        ),
        review_service: ReviewService::new(review_repo, user_repo.clone(), consistency),
        content_service: ContentService::new(content_repo, Arc::clone(&storage)),
        account_service: AccountService::new(user_repo, storage),
        authenticator,
    };

    if let Some(admin) = &config.admin {
        let created = state.account_service.ensure_admin(admin).await?;
        info!(created, username = %admin.username, "Admin account checked");
    }

    // Build router
    let app = Router::new()
        .nest("/api", api_router())
        .nest_service(
            &config.storage.base_url,
            ServeDir::new(&config.storage.base_path),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .layer(DefaultBodyLimit::max(
            (MAX_VIDEO_BYTES + FORM_OVERHEAD_BYTES) as usize,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
