//! Post handlers.

use actix_web::{HttpResponse, web};
use uuid::Uuid;

use quill_core::domain::{PostStatus, PostWithAuthor};
use quill_core::query::PostListQuery;
use quill_core::services::{NewPost, PostChanges, UpdateMode};
use quill_shared::PaginatedResponse;
use quill_shared::dto::{AuthorResponse, PostDetailResponse, PostRequest, PostResponse};

use super::comments::comment_response;
use crate::middleware::auth::Identity;
use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

fn post_response(entry: PostWithAuthor) -> PostResponse {
    let PostWithAuthor { post, author } = entry;
    PostResponse {
        id: post.id,
        title: post.title,
        content: post.content,
        author: AuthorResponse {
            id: author.id,
            name: author.name,
            email: author.email,
            user: author.user_id,
        },
        published_date: post.published_date,
        status: post.status.to_string(),
        active: post.active,
    }
}

fn parse_status(raw: Option<&str>) -> AppResult<Option<PostStatus>> {
    raw.map(|s| s.parse::<PostStatus>().map_err(AppError::BadRequest))
        .transpose()
}

fn changes_from(req: PostRequest) -> AppResult<PostChanges> {
    Ok(PostChanges {
        status: parse_status(req.status.as_deref())?,
        title: req.title,
        content: req.content,
        active: req.active,
    })
}

/// GET /api/posts
pub async fn list_posts(
    state: web::Data<AppState>,
    query: web::Query<PostListQuery>,
) -> AppResult<HttpResponse> {
    let page = state.blog.list_posts(&query).await?;

    let body = PaginatedResponse {
        count: page.total,
        page: page.page,
        page_size: page.page_size,
        next: page.next_page(),
        previous: page.previous_page(),
        results: page.items.into_iter().map(post_response).collect(),
    };

    Ok(HttpResponse::Ok().json(body))
}

/// POST /api/posts
pub async fn create_post(
    state: web::Data<AppState>,
    identity: Identity,
    body: web::Json<PostRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    let input = NewPost {
        status: parse_status(req.status.as_deref())?,
        title: req.title.unwrap_or_default(),
        content: req.content.unwrap_or_default(),
        active: req.active,
    };

    let created = state.blog.create_post(identity.user_id, input).await?;

    Ok(HttpResponse::Created().json(post_response(created)))
}

/// GET /api/posts/{id}
pub async fn get_post(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let detail = state.blog.get_post(path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(PostDetailResponse {
        post: post_response(detail.post),
        comments: detail.comments.into_iter().map(comment_response).collect(),
    }))
}

/// PUT /api/posts/{id}
pub async fn replace_post(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
    body: web::Json<PostRequest>,
) -> AppResult<HttpResponse> {
    update(state, identity, path.into_inner(), body.into_inner(), UpdateMode::Replace).await
}

/// PATCH /api/posts/{id}
pub async fn patch_post(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
    body: web::Json<PostRequest>,
) -> AppResult<HttpResponse> {
    update(state, identity, path.into_inner(), body.into_inner(), UpdateMode::Partial).await
}

async fn update(
    state: web::Data<AppState>,
    identity: Identity,
    id: Uuid,
    req: PostRequest,
    mode: UpdateMode,
) -> AppResult<HttpResponse> {
    let changes = changes_from(req)?;
    let updated = state
        .blog
        .update_post(identity.user_id, id, changes, mode)
        .await?;

    Ok(HttpResponse::Ok().json(post_response(updated)))
}

/// DELETE /api/posts/{id}
pub async fn delete_post(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    state
        .blog
        .delete_post(identity.user_id, path.into_inner())
        .await?;

    Ok(HttpResponse::NoContent().finish())
}
