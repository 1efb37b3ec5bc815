//! Domain entities - the core business objects.

mod author;
mod comment;
mod post;
mod user;

pub use author::Author;
pub use comment::Comment;
pub use post::{Post, PostStatus, PostWithAuthor};
pub use user::User;
