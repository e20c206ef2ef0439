//! HTTP middleware for Songforge Core
//!
//! This module provides middleware components for the REST API:
//! - JWT authentication middleware and AuthUser extractor

pub mod auth;

pub use auth::{AuthError, AuthUser};
