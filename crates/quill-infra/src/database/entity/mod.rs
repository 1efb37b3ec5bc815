//! SeaORM entities mirroring the migration schema.

pub mod author;
pub mod blacklisted_token;
pub mod comment;
pub mod post;
pub mod user;
