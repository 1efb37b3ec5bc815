//! Comment handlers.

use actix_web::{HttpResponse, web};
use uuid::Uuid;

use quill_core::domain::Comment;
use quill_shared::dto::{CommentRequest, CommentResponse};

use crate::middleware::auth::{Identity, OptionalIdentity};
use crate::middleware::error::AppResult;
use crate::state::AppState;

pub(super) fn comment_response(comment: Comment) -> CommentResponse {
    CommentResponse {
        id: comment.id,
        post: comment.post_id,
        user: comment.user_id,
        content: comment.content,
        created: comment.created,
    }
}

/// POST /api/posts/{id}/comments - open to anonymous visitors.
pub async fn add_comment(
    state: web::Data<AppState>,
    identity: OptionalIdentity,
    path: web::Path<Uuid>,
    body: web::Json<CommentRequest>,
) -> AppResult<HttpResponse> {
    let actor = identity.0.map(|i| i.user_id);
    let content = body.into_inner().content.unwrap_or_default();

    let comment = state
        .blog
        .add_comment(actor, path.into_inner(), &content)
        .await?;

    Ok(HttpResponse::Created().json(comment_response(comment)))
}

/// DELETE /api/posts/{id}/comments/{comment_id}
pub async fn remove_comment(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<(Uuid, Uuid)>,
) -> AppResult<HttpResponse> {
    let (post_id, comment_id) = path.into_inner();
    state
        .blog
        .remove_comment(identity.user_id, post_id, comment_id)
        .await?;

    Ok(HttpResponse::NoContent().finish())
}
