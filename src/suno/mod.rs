//! Suno generation API integration

pub mod client;
pub mod types;

pub use client::SunoClient;
pub use types::*;
