//! Ports - trait definitions for external dependencies.
//! These are the "interfaces" that infrastructure must implement.

mod auth;
mod repository;

pub use auth::{
    AuthError, PasswordService, TokenBlacklist, TokenClaims, TokenKind, TokenService,
    TokenSubject,
};
pub use repository::{
    AuthorRepository, BaseRepository, CommentRepository, PostRepository, UserRepository,
};
