//! Application use cases built on the ports.

mod auth;
mod blog;

pub use auth::{AuthService, LoginOutcome, MAX_NAME_LEN, NewUser, RotationPolicy, TokenPair};
pub use blog::{BlogService, NewPost, PostChanges, PostDetail, UpdateMode};
