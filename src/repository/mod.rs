//! Data access layer (Repository pattern)

pub mod track;

pub use track::TrackRepository;
