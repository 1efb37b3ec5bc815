//! # Quill API Server
//!
//! Actix-web application exposing the blog and authentication use cases.

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod state;
pub mod telemetry;

use actix_web::{
    HttpRequest,
    error::{JsonPayloadError, QueryPayloadError},
    web,
};

use crate::middleware::error::AppError;

/// JSON extractor configuration: malformed bodies become RFC 7807 400s.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err: JsonPayloadError, _req: &HttpRequest| {
        tracing::debug!(error = %err, "Rejected JSON body");
        AppError::BadRequest(err.to_string()).into()
    })
}

/// Query-string extractor configuration, mirroring [`json_config`].
pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err: QueryPayloadError, _req: &HttpRequest| {
        tracing::debug!(error = %err, "Rejected query string");
        AppError::BadRequest(err.to_string()).into()
    })
}
