//! # Quill Core
//!
//! The domain layer of the Quill blog backend.
//! This crate contains pure business logic with zero infrastructure dependencies:
//! entities, ports, the post query filter, ownership rules and the use cases
//! that tie them together.

pub mod domain;
pub mod error;
pub mod policy;
pub mod ports;
pub mod query;
pub mod services;

pub use error::DomainError;
