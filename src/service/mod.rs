//! Business logic layer

pub mod reconcile;
pub mod track;

pub use reconcile::{merge_signal, ReconcileOutcome, Reconciler};
pub use track::{CreatedTrack, GenerateMusicRequest, TrackService, TrackStatusView};
