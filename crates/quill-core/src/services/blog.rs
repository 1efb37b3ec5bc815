//! Post and comment use cases.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::{Comment, Post, PostStatus, PostWithAuthor};
use crate::error::{DomainError, RepoError};
use crate::policy;
use crate::ports::{AuthorRepository, CommentRepository, PostRepository, UserRepository};
use crate::query::{Page, PostListQuery};

const MAX_TITLE_LEN: usize = 200;

/// Input for a new post.
#[derive(Debug, Clone, Default)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub status: Option<PostStatus>,
    pub active: Option<bool>,
}

/// Requested changes to an existing post. Author and publication date are
/// not part of it: they never change.
#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub status: Option<PostStatus>,
    pub active: Option<bool>,
}

/// Whether an update replaces the editable fields (PUT) or patches them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    Replace,
    Partial,
}

/// A post with its author and comments.
#[derive(Debug, Clone)]
pub struct PostDetail {
    pub post: PostWithAuthor,
    pub comments: Vec<Comment>,
}

/// Blog use cases: listing, post CRUD and comments.
#[derive(Clone)]
pub struct BlogService {
    users: Arc<dyn UserRepository>,
    authors: Arc<dyn AuthorRepository>,
    posts: Arc<dyn PostRepository>,
    comments: Arc<dyn CommentRepository>,
}

impl BlogService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        authors: Arc<dyn AuthorRepository>,
        posts: Arc<dyn PostRepository>,
        comments: Arc<dyn CommentRepository>,
    ) -> Self {
        Self {
            users,
            authors,
            posts,
            comments,
        }
    }

    /// Filtered, paginated listing.
    pub async fn list_posts(
        &self,
        query: &PostListQuery,
    ) -> Result<Page<PostWithAuthor>, DomainError> {
        let (filter, page) = query.parse()?;
        tracing::debug!(?filter, page = page.page, page_size = page.page_size, "Listing posts");

        Ok(self.posts.list(&filter, page).await?)
    }

    /// A single post regardless of its `active` flag, with its comments.
    pub async fn get_post(&self, id: Uuid) -> Result<PostDetail, DomainError> {
        let post = self.load_post(id).await?;
        let comments = self.comments.list_for_post(id).await?;

        Ok(PostDetail { post, comments })
    }

    /// Create a post owned by the actor, creating their author profile on
    /// first use.
    pub async fn create_post(
        &self,
        actor: Uuid,
        input: NewPost,
    ) -> Result<PostWithAuthor, DomainError> {
        let title = validate_title(&input.title)?;
        let content = validate_content(&input.content)?;

        let user = self
            .users
            .find_by_id(actor)
            .await?
            .ok_or(DomainError::Unauthorized)?;
        let author = self.authors.get_or_create_for_user(&user).await?;

        let mut post = Post::new(author.id, title, content);
        if let Some(status) = input.status {
            post.status = status;
        }
        if let Some(active) = input.active {
            post.active = active;
        }

        let post = self.posts.create(post).await?;
        tracing::info!(post_id = %post.id, author_id = %author.id, "Post created");

        Ok(PostWithAuthor { post, author })
    }

    /// Edit a post. Only its owner may do so.
    pub async fn update_post(
        &self,
        actor: Uuid,
        id: Uuid,
        changes: PostChanges,
        mode: UpdateMode,
    ) -> Result<PostWithAuthor, DomainError> {
        let PostWithAuthor { mut post, author } = self.load_post(id).await?;
        policy::ensure_post_owner(actor, &author)?;

        if mode == UpdateMode::Replace && (changes.title.is_none() || changes.content.is_none())
        {
            return Err(DomainError::Validation(
                "title and content are required".to_string(),
            ));
        }

        if let Some(title) = changes.title {
            post.title = validate_title(&title)?;
        }
        if let Some(content) = changes.content {
            post.content = validate_content(&content)?;
        }
        if let Some(status) = changes.status {
            post.status = status;
        }
        if let Some(active) = changes.active {
            post.active = active;
        }

        let post = self.posts.update(post).await?;
        tracing::info!(post_id = %post.id, "Post updated");

        Ok(PostWithAuthor { post, author })
    }

    /// Delete a post and, with it, its comments. Only its owner may do so.
    pub async fn delete_post(&self, actor: Uuid, id: Uuid) -> Result<(), DomainError> {
        let existing = self.load_post(id).await?;
        policy::ensure_post_owner(actor, &existing.author)?;

        self.posts.delete(id).await.map_err(|e| missing_as(e, "Post", id))?;
        tracing::info!(post_id = %id, "Post deleted");

        Ok(())
    }

    /// Add a comment. Anyone may comment; `actor` is `None` for anonymous
    /// visitors.
    pub async fn add_comment(
        &self,
        actor: Option<Uuid>,
        post_id: Uuid,
        content: &str,
    ) -> Result<Comment, DomainError> {
        if content.trim().is_empty() {
            return Err(DomainError::Validation("Content is required.".to_string()));
        }

        if self.posts.find_by_id(post_id).await?.is_none() {
            return Err(DomainError::not_found("Post", post_id));
        }

        let comment = Comment::new(post_id, content.to_string(), actor);
        let comment = self.comments.create(comment).await?;
        tracing::info!(comment_id = %comment.id, %post_id, anonymous = actor.is_none(), "Comment added");

        Ok(comment)
    }

    /// Remove a comment from a post.
    pub async fn remove_comment(
        &self,
        actor: Uuid,
        post_id: Uuid,
        comment_id: Uuid,
    ) -> Result<(), DomainError> {
        let post = self.load_post(post_id).await?;
        let comment = self
            .comments
            .find_for_post(post_id, comment_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Comment", comment_id))?;

        policy::ensure_comment_removable(actor, &comment, &post.author)?;

        self.comments
            .delete(comment_id)
            .await
            .map_err(|e| missing_as(e, "Comment", comment_id))?;
        tracing::info!(%comment_id, %post_id, "Comment removed");

        Ok(())
    }

    async fn load_post(&self, id: Uuid) -> Result<PostWithAuthor, DomainError> {
        self.posts
            .find_with_author(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Post", id))
    }
}

fn validate_title(raw: &str) -> Result<String, DomainError> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(DomainError::Validation("title may not be blank".to_string()));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(DomainError::Validation(format!(
            "title may not exceed {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(title.to_string())
}

fn validate_content(raw: &str) -> Result<String, DomainError> {
    let content = raw.trim();
    if content.is_empty() {
        return Err(DomainError::Validation("content may not be blank".to_string()));
    }
    Ok(content.to_string())
}

fn missing_as(err: RepoError, entity_type: &'static str, id: Uuid) -> DomainError {
    match err {
        RepoError::NotFound => DomainError::not_found(entity_type, id),
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_is_trimmed_and_bounded() {
        assert_eq!(validate_title("  Hello  ").unwrap(), "Hello");
        assert!(validate_title("   ").is_err());
        assert!(validate_title(&"x".repeat(MAX_TITLE_LEN)).is_ok());
        assert!(validate_title(&"x".repeat(MAX_TITLE_LEN + 1)).is_err());
    }

    #[test]
    fn test_blank_content_rejected() {
        assert!(matches!(
            validate_content("\n\t "),
            Err(DomainError::Validation(_))
        ));
    }
}
