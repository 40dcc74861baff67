//! Post endpoints: content, likes and comments.

use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
};
use rapport_common::{AppError, AppResult};
use rapport_core::{
    AccountSummary, CommentView, ContentEngagement, CreateContentInput, MediaUpload, Page,
    UpdateContentInput, clamp_limit,
};
use rapport_db::{
    entities::content::{self, ContentKind},
    repositories::LikeToggle,
};
use serde::{Deserialize, Serialize};

use super::{PageQuery, media_from_field};
use crate::{
    extractors::{AuthUser, MaybeAuthUser},
    middleware::AppState,
    response,
    response::ApiResponse,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(show).put(update).delete(delete))
        .route("/{id}/like", put(toggle_like))
        .route("/{id}/likes", get(likers))
        .route("/{id}/repair-likes", post(repair_likes))
        .route("/{id}/comments", get(comments).post(add_comment))
}

/// Post response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    pub id: String,
    pub created_at: String,
    pub updated_at: Option<String>,
    pub user_id: String,
    pub kind: ContentKind,
    pub name: Option<String>,
    pub description: Option<String>,
    pub media_url: String,
    pub likes_count: i32,
}

impl From<content::Model> for PostResponse {
    fn from(c: content::Model) -> Self {
        Self {
            id: c.id,
            created_at: c.created_at.to_rfc3339(),
            updated_at: c.updated_at.map(|t| t.to_rfc3339()),
            user_id: c.user_id,
            kind: c.kind,
            name: c.name,
            description: c.description,
            media_url: c.media_url,
            likes_count: c.likes_count,
        }
    }
}

/// Create a post from a multipart form with `kind`, `name`, `description`
/// and a `file` part.
async fn create(
    AuthUser(actor): AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<ApiResponse<PostResponse>> {
    let mut kind: Option<ContentKind> = None;
    let mut name: Option<String> = None;
    let mut description: Option<String> = None;
    let mut media: Option<MediaUpload> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "file" => media = Some(media_from_field(field).await?),
            "kind" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                kind = Some(parse_kind(&text)?);
            }
            "name" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                if !text.trim().is_empty() {
                    name = Some(text);
                }
            }
            "description" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                if !text.is_empty() {
                    description = Some(text);
                }
            }
            _ => {}
        }
    }

    let media = media.ok_or_else(|| AppError::BadRequest("No file provided".to_string()))?;
    let input = CreateContentInput {
        kind: kind.unwrap_or(ContentKind::Image),
        name,
        description,
    };

    let created = state.content_service.create(&actor, input, media).await?;
    Ok(ApiResponse::created(created.into()))
}

fn parse_kind(text: &str) -> AppResult<ContentKind> {
    match text.trim() {
        "image" => Ok(ContentKind::Image),
        "video" => Ok(ContentKind::Video),
        other => Err(AppError::Validation(format!("Unknown post kind: {other}"))),
    }
}

/// Listing query.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPostsQuery {
    pub kind: Option<ContentKind>,
    pub user_id: Option<String>,
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: u64,
}

/// Newest posts first.
async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListPostsQuery>,
) -> AppResult<ApiResponse<Vec<PostResponse>>> {
    let posts = state
        .content_service
        .list(query.kind, query.user_id, query.limit, query.offset)
        .await?;
    Ok(ApiResponse::ok(posts.into_iter().map(Into::into).collect()))
}

/// A single post with its engagement figures.
#[derive(Debug, Serialize)]
pub struct PostDetailResponse {
    #[serde(flatten)]
    pub post: PostResponse,
    #[serde(flatten)]
    pub engagement: ContentEngagement,
}

async fn show(
    MaybeAuthUser(viewer): MaybeAuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<PostDetailResponse>> {
    let post = state.content_service.get(&id).await?;
    let engagement = state
        .engagement_service
        .engagement(&post.id, viewer.as_ref())
        .await?;
    Ok(ApiResponse::ok(PostDetailResponse {
        post: post.into(),
        engagement,
    }))
}

async fn update(
    AuthUser(actor): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdateContentInput>,
) -> AppResult<ApiResponse<PostResponse>> {
    let post = state.content_service.update(&id, &actor, input).await?;
    Ok(ApiResponse::ok(post.into()))
}

async fn delete(
    AuthUser(actor): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    state.content_service.delete(&id, &actor).await?;
    Ok(response::ok())
}

/// Like the post, or take the like back.
async fn toggle_like(
    AuthUser(actor): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<LikeToggle>> {
    let toggle = state.engagement_service.toggle_like(&id, &actor).await?;
    Ok(ApiResponse::ok(toggle))
}

/// Likes count after a repair.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikesCountResponse {
    pub likes_count: i32,
}

/// Recount the post's likes. Administrators only.
async fn repair_likes(
    AuthUser(actor): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<LikesCountResponse>> {
    let likes_count = state.engagement_service.repair_likes(&id, &actor).await?;
    Ok(ApiResponse::ok(LikesCountResponse { likes_count }))
}

/// Accounts that like the post.
async fn likers(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<ApiResponse<Page<AccountSummary>>> {
    let page = state
        .engagement_service
        .likers(&id, clamp_limit(query.limit), query.until_id.as_deref())
        .await?;
    Ok(ApiResponse::ok(page))
}

/// New comment body.
#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub text: String,
}

/// Comment on the post; responds with the whole thread.
async fn add_comment(
    AuthUser(actor): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CommentRequest>,
) -> AppResult<ApiResponse<Vec<CommentView>>> {
    let thread = state
        .engagement_service
        .add_comment(&id, &actor, &req.text)
        .await?;
    Ok(ApiResponse::created(thread))
}

async fn comments(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Vec<CommentView>>> {
    let thread = state.engagement_service.get_comments(&id).await?;
    Ok(ApiResponse::ok(thread))
}
