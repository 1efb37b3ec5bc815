//! Ownership rules for mutating posts and comments.

use uuid::Uuid;

use crate::domain::{Author, Comment};
use crate::error::DomainError;

/// Only the identity linked to a post's author may edit or delete the post.
pub fn ensure_post_owner(actor: Uuid, author: &Author) -> Result<(), DomainError> {
    if author.is_owned_by(actor) {
        Ok(())
    } else {
        Err(DomainError::PermissionDenied(
            "You do not have permission to modify this post.".to_string(),
        ))
    }
}

/// A comment may be removed by its own user or by the author of the post it
/// belongs to.
pub fn ensure_comment_removable(
    actor: Uuid,
    comment: &Comment,
    post_author: &Author,
) -> Result<(), DomainError> {
    if comment.user_id == Some(actor) || post_author.is_owned_by(actor) {
        Ok(())
    } else {
        Err(DomainError::PermissionDenied(
            "You are not allowed to delete this comment.".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn author_for(user_id: Uuid) -> Author {
        Author {
            id: Uuid::new_v4(),
            name: "owner".to_string(),
            email: "owner@example.com".to_string(),
            user_id,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_post_owner_allowed() {
        let owner = Uuid::new_v4();
        assert!(ensure_post_owner(owner, &author_for(owner)).is_ok());
    }

    #[test]
    fn test_post_non_owner_denied() {
        let author = author_for(Uuid::new_v4());
        let result = ensure_post_owner(Uuid::new_v4(), &author);
        assert!(matches!(result, Err(DomainError::PermissionDenied(_))));
    }

    #[test]
    fn test_comment_removable_by_commenter_or_post_author() {
        let post_owner = Uuid::new_v4();
        let commenter = Uuid::new_v4();
        let author = author_for(post_owner);
        let comment = Comment::new(Uuid::new_v4(), "hi".to_string(), Some(commenter));

        assert!(ensure_comment_removable(commenter, &comment, &author).is_ok());
        assert!(ensure_comment_removable(post_owner, &comment, &author).is_ok());
        assert!(ensure_comment_removable(Uuid::new_v4(), &comment, &author).is_err());
    }

    #[test]
    fn test_anonymous_comment_only_removable_by_post_author() {
        let post_owner = Uuid::new_v4();
        let author = author_for(post_owner);
        let comment = Comment::new(Uuid::new_v4(), "anon".to_string(), None);

        assert!(ensure_comment_removable(post_owner, &comment, &author).is_ok());
        assert!(matches!(
            ensure_comment_removable(Uuid::new_v4(), &comment, &author),
            Err(DomainError::PermissionDenied(_))
        ));
    }
}
