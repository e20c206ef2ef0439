//! Application state traits for dependency injection
//!
//! This module defines traits that abstract the application state,
//! enabling the same handler code to work with both production
//! and test implementations.

use crate::config::Config;
use crate::jwt::JwtManager;
use crate::poller::TrackPoller;
use crate::repository::TrackRepository;
use crate::service::TrackService;

/// Trait for application state that provides access to the track stack.
///
/// This trait enables dependency injection by allowing handlers to work
/// with any type that provides the required services, whether that's
/// the production `AppState` or a test implementation.
pub trait HasTracks: Clone + Send + Sync + 'static {
    /// The track repository type; `'static` because the poller's spawned
    /// loops hold it
    type TrackRepo: TrackRepository + 'static;

    /// Get the application configuration
    fn config(&self) -> &Config;

    /// Get the track service
    fn track_service(&self) -> &TrackService<Self::TrackRepo>;

    /// Get the background poller
    fn track_poller(&self) -> &TrackPoller<Self::TrackRepo>;

    /// Get the JWT manager
    fn jwt_manager(&self) -> &JwtManager;

    /// Check if the system is ready (database is healthy)
    fn check_ready(&self) -> impl std::future::Future<Output = bool> + Send;
}
