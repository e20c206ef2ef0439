//! Songforge Core - Music Generation Dashboard Backend
//!
//! This crate provides the core functionality for the Songforge dashboard,
//! including the REST API, the gateway to the Suno generation service, and
//! the reconciler that keeps stored track records in step with remote jobs.

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod jwt;
pub mod middleware;
pub mod migration;
pub mod poller;
pub mod repository;
pub mod server;
pub mod service;
pub mod state;
pub mod suno;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, Result};
